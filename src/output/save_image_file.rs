// 该文件是 Lukou （路口） 项目的一部分。
// src/output/save_image_file.rs - 保存标注后的图像
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  annotation::ClassNames,
  frame::Frame,
  model::DetectResult,
  output::{Render, draw::Draw},
};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("无法加载字体文件: {0}")]
  FontLoadError(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把检测框画在原图上并保存
///
/// `save:///tmp/out.png` 每帧覆盖同一个文件；路径没有图像扩展名时视为目录，
/// 每帧按来源文件名保存为 `<名称>.png`。可选参数 `names=Car,Bus` 与
/// `font=/path/to/font.ttf`。
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "save";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    for (key, value) in uri.query_pairs() {
      match &*key {
        "names" => draw = draw.with_class_names(ClassNames::new(value.split(',').map(str::trim))),
        "font" => {
          let font = Draw::load_font(Path::new(&*value))
            .ok_or_else(|| SaveImageFileError::FontLoadError(value.to_string()))?;
          draw = draw.with_font(font);
        }
        _ => debug!("忽略未知输出参数: {}={}", key, value),
      }
    }
    if !draw.has_font() {
      warn!("未指定字体，标签只绘制底色");
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
      draw,
    })
  }
}

impl SaveImageFileOutput {
  fn target_path(&self, frame: &Frame) -> PathBuf {
    let is_file = self
      .path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
      .unwrap_or(false);
    if is_file {
      return self.path.clone();
    }

    let name = Path::new(&frame.source)
      .file_stem()
      .and_then(|s| s.to_str())
      .map(str::to_string)
      .unwrap_or_else(|| format!("frame_{:06}", frame.index));
    self.path.join(format!("{}.png", name))
  }

  fn save_image(&self, path: &Path, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image.save(path).map_err(SaveImageFileError::ImageError)?;

    info!("保存图像到文件: {:?}", path);

    Ok(())
  }
}

impl Render<Frame, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let mut image = frame.image.clone();
    self.draw.draw_detections(&mut image, result);
    self.save_image(&self.target_path(frame), &image)
  }
}
