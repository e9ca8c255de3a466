// 该文件是 Lukou （路口） 项目的一部分。
// src/codec/encoder.rs - 训练标签编码
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

use ndarray::{Array3, Array4, ArrayView1, ArrayView3, Axis, s};
use tracing::{debug, warn};

use crate::{
  annotation::Annotation,
  codec::geometry::{ConfigurationError, GridGeometry},
};

/// 标注在目标张量中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSlot {
  pub row: usize,
  pub col: usize,
  pub anchor: usize,
}

/// 真值标注到锚框的分配策略
pub trait AnchorAssigner {
  /// 返回 (标注序号, 锚框位置)，未出现的标注不参与编码
  fn assign(
    &self,
    geometry: &GridGeometry,
    annotations: &[Annotation],
  ) -> Vec<(usize, AnchorSlot)>;
}

/// 按标注顺序依次占用网格 (0, 0) 的锚框，超出锚框数量的标注被丢弃
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalAssigner;

impl AnchorAssigner for PositionalAssigner {
  fn assign(
    &self,
    geometry: &GridGeometry,
    annotations: &[Annotation],
  ) -> Vec<(usize, AnchorSlot)> {
    (0..annotations.len().min(geometry.num_anchors()))
      .map(|index| {
        (
          index,
          AnchorSlot {
            row: 0,
            col: 0,
            anchor: index,
          },
        )
      })
      .collect()
  }
}

/// 单张图像的训练目标，形状为 [G, G, A * (4 + C)]
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTarget {
  tensor: Array3<f32>,
}

impl EncodedTarget {
  pub fn view(&self) -> ArrayView3<'_, f32> {
    self.tensor.view()
  }

  pub fn cell(&self, row: usize, col: usize) -> ArrayView1<'_, f32> {
    self.tensor.slice(s![row, col, ..])
  }

  pub fn into_inner(self) -> Array3<f32> {
    self.tensor
  }
}

pub struct LabelEncoder<A = PositionalAssigner> {
  geometry: GridGeometry,
  assigner: A,
}

impl LabelEncoder<PositionalAssigner> {
  pub fn new(geometry: GridGeometry) -> Self {
    Self {
      geometry,
      assigner: PositionalAssigner,
    }
  }
}

impl<A: AnchorAssigner> LabelEncoder<A> {
  pub fn with_assigner(geometry: GridGeometry, assigner: A) -> Self {
    Self { geometry, assigner }
  }

  pub fn geometry(&self) -> &GridGeometry {
    &self.geometry
  }

  pub fn encode(&self, annotations: &[Annotation]) -> Result<EncodedTarget, ConfigurationError> {
    for annotation in annotations {
      self.geometry.check_class(annotation.class_id)?;
    }

    let [grid_h, grid_w, depth] = self.geometry.shape();
    let mut tensor = Array3::<f32>::zeros((grid_h, grid_w, depth));

    let assigned = self.assigner.assign(&self.geometry, annotations);
    if assigned.len() < annotations.len() {
      debug!(
        "标注数量 {} 超过可分配锚框，丢弃 {} 个标注",
        annotations.len(),
        annotations.len() - assigned.len()
      );
    }

    for (index, slot) in assigned {
      let Some(annotation) = annotations.get(index) else {
        warn!("分配结果引用了不存在的标注 {}", index);
        continue;
      };
      if slot.row >= grid_h || slot.col >= grid_w || slot.anchor >= self.geometry.num_anchors() {
        warn!("锚框位置 {:?} 超出网格范围，忽略", slot);
        continue;
      }

      let box_range = self.geometry.box_range(slot.anchor);
      tensor
        .slice_mut(s![slot.row, slot.col, box_range])
        .iter_mut()
        .zip(annotation.bbox.to_array())
        .for_each(|(dst, value)| *dst = value);

      let class_slot = self.geometry.class_range(slot.anchor).start + annotation.class_id as usize;
      tensor[[slot.row, slot.col, class_slot]] = 1.0;
    }

    Ok(EncodedTarget { tensor })
  }

  /// 将多张图像的标注编码为 [N, G, G, A * (4 + C)] 的批量张量
  pub fn encode_batch<S: AsRef<[Annotation]>>(
    &self,
    images: &[S],
  ) -> Result<Array4<f32>, ConfigurationError> {
    let [grid_h, grid_w, depth] = self.geometry.shape();
    let mut batch = Array4::<f32>::zeros((images.len(), grid_h, grid_w, depth));

    for (index, annotations) in images.iter().enumerate() {
      let target = self.encode(annotations.as_ref())?;
      batch.index_axis_mut(Axis(0), index).assign(&target.view());
    }

    Ok(batch)
  }
}
