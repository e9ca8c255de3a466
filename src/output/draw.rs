// 该文件是 Lukou （路口） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};

use crate::{annotation::ClassNames, bbox::PixelBox, model::DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_HEIGHT: i32 = 20;
const LABEL_CHAR_WIDTH: f32 = 9.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: u32 = 2;
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]); // 红色
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// 在图像上绘制检测框与类别标签
///
/// 没有字体时只绘制边框和标签底色。
#[derive(Default)]
pub struct Draw {
  font: Option<FontVec>,
  class_names: Option<ClassNames>,
}

impl Draw {
  pub fn load_font(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    FontVec::try_from_vec(data).ok()
  }

  pub fn with_font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_class_names(mut self, class_names: ClassNames) -> Self {
    self.class_names = Some(class_names);
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  fn label(&self, class_id: u32) -> String {
    match self.class_names.as_ref().and_then(|names| names.name(class_id)) {
      Some(name) => name.to_string(),
      None => format!("Class {}", class_id),
    }
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      let label = format!("{} {:.2}", self.label(item.class_id), item.score);
      self.draw_bbox_with_label(image, &item.bbox, &label);
    }
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, bbox: &PixelBox, label: &str) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }

    // 边框加粗，向内收缩
    for t in 0..BOX_THICKNESS {
      let (x_min, y_min) = (bbox.x_min + t, bbox.y_min + t);
      let (x_max, y_max) = (bbox.x_max.saturating_sub(t), bbox.y_max.saturating_sub(t));
      if x_min > x_max || y_min > y_max {
        break;
      }
      let rect = Rect::at(x_min as i32, y_min as i32).of_size(x_max - x_min + 1, y_max - y_min + 1);
      draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }

    // 标签放在边框上方，空间不足时贴近图像顶部
    let text_width = (label.len() as f32 * LABEL_CHAR_WIDTH) as i32;
    let label_x = bbox.x_min as i32;
    let label_y = (bbox.y_min as i32 - LABEL_TEXT_HEIGHT).max(0);
    let label_width = text_width.min(image.width() as i32 - label_x);
    if label_width <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width as u32, LABEL_TEXT_HEIGHT as u32);
    draw_filled_rect_mut(image, rect, BOX_COLOR);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        TEXT_COLOR,
        label_x,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        PxScale::from(LABEL_FONT_SIZE),
        font,
        label,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;

  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  fn result(bbox: PixelBox) -> DetectResult {
    DetectResult {
      items: vec![DetectItem {
        class_id: 1,
        score: 0.9,
        bbox,
      }]
      .into_boxed_slice(),
    }
  }

  #[test]
  fn draws_box_outline_and_label_background() {
    let mut image = RgbImage::new(64, 48);
    let bbox = PixelBox {
      x_min: 10,
      y_min: 24,
      x_max: 40,
      y_max: 44,
    };
    Draw::default().draw_detections(&mut image, &result(bbox));

    // 边框两像素宽
    assert_eq!(image.get_pixel(10, 30), &BOX_COLOR);
    assert_eq!(image.get_pixel(11, 30), &BOX_COLOR);
    assert_eq!(image.get_pixel(40, 30), &BOX_COLOR);
    assert_eq!(image.get_pixel(25, 44), &BOX_COLOR);
    assert_eq!(image.get_pixel(25, 34), &BLACK);

    // 标签底色在边框上方，宽度不超过图像
    assert_eq!(image.get_pixel(12, 10), &BOX_COLOR);
    assert_eq!(image.get_pixel(63, 10), &BOX_COLOR);
    assert_eq!(image.get_pixel(5, 10), &BLACK);
  }

  #[test]
  fn label_uses_class_names() {
    let draw = Draw::default().with_class_names(ClassNames::new(["Car", "Bus"]));
    assert_eq!(draw.label(1), "Bus");
    assert_eq!(draw.label(2), "Class 2");
    assert_eq!(Draw::default().label(0), "Class 0");
  }

  #[test]
  fn degenerate_box_at_image_corner() {
    let mut image = RgbImage::new(8, 8);
    let bbox = PixelBox {
      x_min: 7,
      y_min: 7,
      x_max: 7,
      y_max: 7,
    };
    Draw::default().draw_detections(&mut image, &result(bbox));
    assert_eq!(image.get_pixel(7, 7), &BOX_COLOR);
  }

  #[test]
  fn missing_font_file() {
    assert!(Draw::load_font(Path::new("/does/not/exist.ttf")).is_none());
  }
}
