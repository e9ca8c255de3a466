// 该文件是 Lukou （路口） 项目的一部分。
// src/model/replay.rs - 回放导出的模型输出
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

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
  sync::Mutex,
};

use ndarray::Array3;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  frame::ImageTensor,
  model::{Backbone, SsdConfig},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("读取模型输出 {path:?} 失败: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("解析模型输出 {path:?} 失败: {source}")]
  Json {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error("第 {index} 个模型输出不是规则的三维数组: {reason}")]
  Ragged { index: usize, reason: String },
  #[error("录制的模型输出已用完 (共 {0} 个)")]
  Exhausted(usize),
  #[error("模型输出队列锁已损坏")]
  Poisoned,
}

/// 导出的张量，`[G][G][D]` 或带批量维度的 `[N][G][G][D]`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrediction {
  Batched(Vec<Vec<Vec<Vec<f32>>>>),
  Single(Vec<Vec<Vec<f32>>>),
}

fn to_array(cells: Vec<Vec<Vec<f32>>>) -> Result<Array3<f32>, String> {
  let rows = cells.len();
  let cols = cells.first().map(Vec::len).unwrap_or(0);
  let depth = cells
    .first()
    .and_then(|row| row.first())
    .map(Vec::len)
    .unwrap_or(0);

  for (i, row) in cells.iter().enumerate() {
    if row.len() != cols {
      return Err(format!("第 {} 行长度为 {}, 期望 {}", i, row.len(), cols));
    }
    for (j, cell) in row.iter().enumerate() {
      if cell.len() != depth {
        return Err(format!(
          "网格 ({}, {}) 长度为 {}, 期望 {}",
          i,
          j,
          cell.len(),
          depth
        ));
      }
    }
  }

  let flat: Vec<f32> = cells.into_iter().flatten().flatten().collect();
  Array3::from_shape_vec((rows, cols, depth), flat).map_err(|e| e.to_string())
}

/// 按顺序回放预先导出的模型输出，每次推理取出一个
///
/// 文件中可以连续存放多个 JSON 张量，批量张量按批次顺序展开。
/// 输入图像不参与计算。
pub struct ReplayBackbone {
  outputs: Mutex<VecDeque<Array3<f32>>>,
  total: usize,
}

impl ReplayBackbone {
  pub fn new(outputs: impl IntoIterator<Item = Array3<f32>>) -> Self {
    let outputs: VecDeque<_> = outputs.into_iter().collect();
    Self {
      total: outputs.len(),
      outputs: Mutex::new(outputs),
    }
  }

  pub fn parse(content: &str, path: &Path) -> Result<Self, ReplayError> {
    let mut outputs = Vec::new();
    let stream = serde_json::Deserializer::from_str(content).into_iter::<RawPrediction>();
    for raw in stream {
      let raw = raw.map_err(|source| ReplayError::Json {
        path: path.to_path_buf(),
        source,
      })?;
      let batch = match raw {
        RawPrediction::Batched(batch) => batch,
        RawPrediction::Single(cells) => vec![cells],
      };
      for cells in batch {
        let index = outputs.len();
        outputs.push(to_array(cells).map_err(|reason| ReplayError::Ragged { index, reason })?);
      }
    }

    debug!("从 {:?} 解析出 {} 个模型输出", path, outputs.len());
    Ok(Self::new(outputs))
  }

  pub fn open(path: &Path) -> Result<Self, ReplayError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let backbone = Self::parse(&content, path)?;
    info!("读取录制的模型输出 {:?}: 共 {} 个", path, backbone.total);
    Ok(backbone)
  }

  /// 从 `ssd://` 配置中的模型路径读取
  pub fn from_config(config: &SsdConfig) -> Result<Self, ReplayError> {
    Self::open(&config.model_path)
  }

  pub fn remaining(&self) -> usize {
    self.outputs.lock().map(|outputs| outputs.len()).unwrap_or(0)
  }
}

impl Backbone for ReplayBackbone {
  type Error = ReplayError;

  fn forward(&self, _input: &ImageTensor) -> Result<Array3<f32>, Self::Error> {
    self
      .outputs
      .lock()
      .map_err(|_| ReplayError::Poisoned)?
      .pop_front()
      .ok_or(ReplayError::Exhausted(self.total))
  }
}
