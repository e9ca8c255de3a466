// 该文件是 Lukou （路口） 项目的一部分。
// src/model.rs - 模型
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

use ndarray::Array3;

use crate::{bbox::PixelBox, frame::ImageTensor};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 卷积网络主干，对编解码器而言是黑盒
///
/// 输入 [H, W, 3]，输出 [G, G, A * (4 + C)]。
pub trait Backbone {
  type Error: std::error::Error + Send + Sync + 'static;

  fn forward(&self, input: &ImageTensor) -> Result<Array3<f32>, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: PixelBox,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 按类别统计检测数量，下标为类别编号
  pub fn count_by_class(&self, num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_classes];
    for item in self.items.iter() {
      if let Some(count) = counts.get_mut(item.class_id as usize) {
        *count += 1;
      }
    }
    counts
  }
}

mod replay;
mod ssd;
pub use self::replay::{ReplayBackbone, ReplayError};
pub use self::ssd::{SSD_SCHEME, SsdConfig, SsdDetector, SsdError};
