// 该文件是 Lukou （路口） 项目的一部分。
// src/codec/decoder.rs - 模型输出解码
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

use ndarray::{ArrayView3, s};
use tracing::{debug, error};

use crate::{
  bbox::{ImageSize, NormBox, PixelBox},
  codec::geometry::{ConfigurationError, GridGeometry},
  model::{DetectItem, DetectResult},
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionDecoder {
  geometry: GridGeometry,
  threshold: f32,
}

impl DetectionDecoder {
  pub fn new(geometry: GridGeometry, threshold: f32) -> Result<Self, ConfigurationError> {
    if !(0.0..=1.0).contains(&threshold) {
      return Err(ConfigurationError::InvalidThreshold(threshold));
    }
    Ok(Self {
      geometry,
      threshold,
    })
  }

  pub fn geometry(&self) -> &GridGeometry {
    &self.geometry
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  /// 解码模型输出，结果按 (行, 列, 锚框) 顺序排列
  ///
  /// 张量形状与几何配置不一致时直接报错，不做部分解码。
  pub fn decode(
    &self,
    raw: ArrayView3<'_, f32>,
    size: ImageSize,
  ) -> Result<DetectResult, ConfigurationError> {
    if let Err(e) = self.geometry.check_shape(raw.shape()) {
      error!("模型输出形状与配置不一致: {}", e);
      return Err(e);
    }

    let grid = self.geometry.grid_size();
    let mut items = Vec::new();

    for row in 0..grid {
      for col in 0..grid {
        let cell = raw.slice(s![row, col, ..]);

        for anchor in 0..self.geometry.num_anchors() {
          let classes = cell.slice(s![self.geometry.class_range(anchor)]);

          // 严格大于，相同概率取编号最小的类别，NaN 永远不会被选中
          let (class_id, score) = classes.iter().enumerate().fold(
            (0usize, f32::NEG_INFINITY),
            |best, (id, &p)| if p > best.1 { (id, p) } else { best },
          );

          if score <= self.threshold {
            continue;
          }

          let regression = cell.slice(s![self.geometry.box_range(anchor)]);
          let bbox = NormBox::new(regression[0], regression[1], regression[2], regression[3]);

          items.push(DetectItem {
            class_id: class_id as u32,
            score,
            bbox: PixelBox::from_norm(&bbox, size),
          });
        }
      }
    }

    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}
