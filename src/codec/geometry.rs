// 该文件是 Lukou （路口） 项目的一部分。
// src/codec/geometry.rs - 锚框网格几何配置
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

use std::ops::Range;

use thiserror::Error;

pub const DEFAULT_GRID_SIZE: usize = 7;
pub const DEFAULT_NUM_ANCHORS: usize = 9;
/// 每个锚框的回归量: cx, cy, w, h
pub const BOX_SLOTS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
  #[error("网格参数无效: {0} 必须大于 0")]
  ZeroDimension(&'static str),
  #[error("张量形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: [usize; 3],
    actual: Vec<usize>,
  },
  #[error("类别编号 {class_id} 超出范围 (类别数 {num_classes})")]
  ClassOutOfRange { class_id: u32, num_classes: usize },
  #[error("置信度阈值 {0} 不在 [0, 1] 范围内")]
  InvalidThreshold(f32),
  #[error("配置参数 {key} 无法解析: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
}

/// 编码器与解码器共享的网格几何
///
/// 每个网格单元的通道布局与模型输出头一致，先是全部锚框的回归量，
/// 然后是每个锚框各自的类别块:
///
/// ```text
/// 锚框 a 的回归量: [a * 4, a * 4 + 4)
/// 锚框 a 的类别块: [A * 4 + a * C, A * 4 + (a + 1) * C)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
  grid_size: usize,
  num_anchors: usize,
  num_classes: usize,
}

impl GridGeometry {
  pub fn new(
    grid_size: usize,
    num_anchors: usize,
    num_classes: usize,
  ) -> Result<Self, ConfigurationError> {
    if grid_size == 0 {
      return Err(ConfigurationError::ZeroDimension("grid_size"));
    }
    if num_anchors == 0 {
      return Err(ConfigurationError::ZeroDimension("num_anchors"));
    }
    if num_classes == 0 {
      return Err(ConfigurationError::ZeroDimension("num_classes"));
    }

    Ok(Self {
      grid_size,
      num_anchors,
      num_classes,
    })
  }

  /// 7x7 网格、每格 9 个锚框
  pub fn with_classes(num_classes: usize) -> Result<Self, ConfigurationError> {
    Self::new(DEFAULT_GRID_SIZE, DEFAULT_NUM_ANCHORS, num_classes)
  }

  pub fn grid_size(&self) -> usize {
    self.grid_size
  }

  pub fn num_anchors(&self) -> usize {
    self.num_anchors
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  /// 每个网格单元的通道数 A * (4 + C)
  pub fn depth(&self) -> usize {
    self.num_anchors * (BOX_SLOTS + self.num_classes)
  }

  pub fn shape(&self) -> [usize; 3] {
    [self.grid_size, self.grid_size, self.depth()]
  }

  pub fn box_range(&self, anchor: usize) -> Range<usize> {
    debug_assert!(anchor < self.num_anchors);
    let start = anchor * BOX_SLOTS;
    start..start + BOX_SLOTS
  }

  pub fn class_range(&self, anchor: usize) -> Range<usize> {
    debug_assert!(anchor < self.num_anchors);
    let start = self.num_anchors * BOX_SLOTS + anchor * self.num_classes;
    start..start + self.num_classes
  }

  pub fn check_class(&self, class_id: u32) -> Result<(), ConfigurationError> {
    if (class_id as usize) < self.num_classes {
      Ok(())
    } else {
      Err(ConfigurationError::ClassOutOfRange {
        class_id,
        num_classes: self.num_classes,
      })
    }
  }

  pub fn check_shape(&self, actual: &[usize]) -> Result<(), ConfigurationError> {
    let expected = self.shape();
    if actual == expected.as_slice() {
      Ok(())
    } else {
      Err(ConfigurationError::ShapeMismatch {
        expected,
        actual: actual.to_vec(),
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_geometry_shape() {
    let geometry = GridGeometry::with_classes(3).unwrap();
    assert_eq!(geometry.shape(), [7, 7, 63]);
    assert_eq!(geometry.depth(), 9 * 4 + 9 * 3);
  }

  #[test]
  fn slot_ranges_do_not_overlap() {
    let geometry = GridGeometry::with_classes(3).unwrap();
    assert_eq!(geometry.box_range(0), 0..4);
    assert_eq!(geometry.box_range(8), 32..36);
    assert_eq!(geometry.class_range(0), 36..39);
    assert_eq!(geometry.class_range(1), 39..42);
    assert_eq!(geometry.class_range(8).end, geometry.depth());
  }

  #[test]
  fn zero_dimensions_are_rejected() {
    assert_eq!(
      GridGeometry::new(0, 9, 3),
      Err(ConfigurationError::ZeroDimension("grid_size"))
    );
    assert_eq!(
      GridGeometry::new(7, 0, 3),
      Err(ConfigurationError::ZeroDimension("num_anchors"))
    );
    assert!(GridGeometry::with_classes(0).is_err());
  }

  #[test]
  fn shape_check() {
    let geometry = GridGeometry::with_classes(3).unwrap();
    assert!(geometry.check_shape(&[7, 7, 63]).is_ok());
    assert!(matches!(
      geometry.check_shape(&[7, 7, 36]),
      Err(ConfigurationError::ShapeMismatch { .. })
    ));
    assert!(geometry.check_shape(&[1, 7, 7, 63]).is_err());
  }

  #[test]
  fn class_check() {
    let geometry = GridGeometry::with_classes(3).unwrap();
    assert!(geometry.check_class(2).is_ok());
    assert!(geometry.check_class(3).is_err());
  }
}
