// 该文件是 Lukou （路口） 项目的一部分。
// src/frame.rs - 帧与模型输入张量
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

use image::{RgbImage, imageops::FilterType};
use ndarray::{Array3, ArrayView3};

use crate::bbox::ImageSize;

const RGB_CHANNELS: usize = 3;
pub const DEFAULT_INPUT_SIZE: ImageSize = ImageSize {
  width: 224,
  height: 224,
};

/// 输入帧
#[derive(Debug, Clone)]
pub struct Frame {
  pub image: RgbImage,
  /// 帧序号
  pub index: u64,
  /// 帧来源（文件路径等）
  pub source: String,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, source: impl Into<String>) -> Self {
    Self {
      image,
      index,
      source: source.into(),
    }
  }

  pub fn size(&self) -> ImageSize {
    ImageSize::new(self.image.width(), self.image.height())
  }
}

/// 张量通道顺序，OpenCV 读入的训练数据为 BGR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  Rgb,
  #[default]
  Bgr,
}

/// 模型输入 [H, W, 3]，像素值归一化到 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
  data: Array3<f32>,
}

impl ImageTensor {
  pub fn from_rgb_image(image: &RgbImage, size: ImageSize, order: ChannelOrder) -> Self {
    let resized;
    let image = if image.dimensions() == (size.width, size.height) {
      image
    } else {
      resized = image::imageops::resize(image, size.width, size.height, FilterType::Triangle);
      &resized
    };

    let shape = (size.height as usize, size.width as usize, RGB_CHANNELS);
    let data = Array3::from_shape_fn(shape, |(y, x, c)| {
      let channel = match order {
        ChannelOrder::Rgb => c,
        ChannelOrder::Bgr => RGB_CHANNELS - 1 - c,
      };
      image.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
    });

    Self { data }
  }

  pub fn view(&self) -> ArrayView3<'_, f32> {
    self.data.view()
  }

  pub fn size(&self) -> ImageSize {
    let (height, width, _) = self.data.dim();
    ImageSize::new(width as u32, height as u32)
  }
}
