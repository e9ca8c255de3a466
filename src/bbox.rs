// 该文件是 Lukou （路口） 项目的一部分。
// src/bbox.rs - 边界框定义
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

use serde::Serialize;

/// 归一化的中心点/宽高边界框，坐标为图像宽高的比例
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormBox {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

impl NormBox {
  pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self { cx, cy, w, h }
  }

  pub fn from_slice(values: &[f32]) -> Option<Self> {
    match *values {
      [cx, cy, w, h] => Some(Self { cx, cy, w, h }),
      _ => None,
    }
  }

  pub fn to_array(&self) -> [f32; 4] {
    [self.cx, self.cy, self.w, self.h]
  }
}

/// 图像尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
  pub width: u32,
  pub height: u32,
}

impl ImageSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

/// 像素坐标边界框 [x_min, y_min, x_max, y_max]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelBox {
  pub x_min: u32,
  pub y_min: u32,
  pub x_max: u32,
  pub y_max: u32,
}

impl PixelBox {
  /// 反归一化并裁剪到图像范围 [0, width) x [0, height)
  ///
  /// 输入坐标可以超出 [0, 1]，负宽高会被交换为有序区间。
  pub fn from_norm(bbox: &NormBox, size: ImageSize) -> Self {
    let (width, height) = (size.width as f32, size.height as f32);

    let (x_min, x_max) = clamp_span(
      (bbox.cx - bbox.w / 2.0) * width,
      (bbox.cx + bbox.w / 2.0) * width,
      size.width,
    );
    let (y_min, y_max) = clamp_span(
      (bbox.cy - bbox.h / 2.0) * height,
      (bbox.cy + bbox.h / 2.0) * height,
      size.height,
    );

    Self {
      x_min,
      y_min,
      x_max,
      y_max,
    }
  }

  pub fn width(&self) -> u32 {
    self.x_max - self.x_min
  }

  pub fn height(&self) -> u32 {
    self.y_max - self.y_min
  }
}

fn clamp_span(lo: f32, hi: f32, limit: u32) -> (u32, u32) {
  // `as` 向零截断，NaN 变为 0
  let (a, b) = (lo as i64, hi as i64);
  let upper = (limit as i64 - 1).max(0);
  let lo = a.min(b).clamp(0, upper);
  let hi = a.max(b).clamp(0, upper);
  (lo as u32, hi as u32)
}
