// 该文件是 Lukou （路口） 项目的一部分。
// src/annotation.rs - 标注文件读取
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

use thiserror::Error;
use tracing::debug;

use crate::bbox::NormBox;

pub const CLASSES_FILE_NAME: &str = "classes.txt";
const ANNOTATION_COLUMNS: usize = 5;

#[derive(Error, Debug)]
pub enum AnnotationError {
  #[error("读取 {path:?} 失败: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("解析 {path:?} 第 {line} 行失败: {reason}")]
  Parse {
    path: PathBuf,
    line: usize,
    reason: String,
  },
  #[error("{path:?} 第 {line} 行类别编号 {class_id} 超出范围 (类别数 {num_classes})")]
  ClassOutOfRange {
    path: PathBuf,
    line: usize,
    class_id: u32,
    num_classes: usize,
  },
  #[error("类别文件 {0:?} 为空")]
  EmptyClasses(PathBuf),
}

/// 单个真值标注
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
  pub class_id: u32,
  pub bbox: NormBox,
}

impl Annotation {
  pub fn new(class_id: u32, bbox: NormBox) -> Self {
    Self { class_id, bbox }
  }
}

/// 类别名称表，行号即类别编号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
  names: Vec<String>,
}

impl ClassNames {
  pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  pub fn read(path: &Path) -> Result<Self, AnnotationError> {
    let content = std::fs::read_to_string(path).map_err(|source| AnnotationError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let names = Self::new(
      content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty()),
    );

    if names.is_empty() {
      return Err(AnnotationError::EmptyClasses(path.to_path_buf()));
    }

    debug!("从 {:?} 读取到 {} 个类别", path, names.len());
    Ok(names)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, class_id: u32) -> Option<&str> {
    self.names.get(class_id as usize).map(String::as_str)
  }

  /// 类别名称，未知编号回退为 `class_{id}`
  pub fn label(&self, class_id: u32) -> String {
    self
      .name(class_id)
      .map(str::to_string)
      .unwrap_or_else(|| format!("class_{}", class_id))
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

/// 解析标注文本，每行 `class x_center y_center width height`
pub fn parse_annotations(
  content: &str,
  path: &Path,
  num_classes: usize,
) -> Result<Vec<Annotation>, AnnotationError> {
  let mut annotations = Vec::new();

  for (index, row) in content.lines().enumerate() {
    let line = index + 1;
    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.is_empty() {
      continue;
    }

    let parse_error = |reason: String| AnnotationError::Parse {
      path: path.to_path_buf(),
      line,
      reason,
    };

    if fields.len() != ANNOTATION_COLUMNS {
      return Err(parse_error(format!(
        "期望 {} 列, 实际 {} 列",
        ANNOTATION_COLUMNS,
        fields.len()
      )));
    }

    let class_id: u32 = fields[0]
      .parse()
      .map_err(|e| parse_error(format!("类别 '{}' 不是整数: {}", fields[0], e)))?;

    let mut coords = [0f32; 4];
    for (slot, field) in coords.iter_mut().zip(&fields[1..]) {
      *slot = field
        .parse()
        .map_err(|e| parse_error(format!("坐标 '{}' 不是数字: {}", field, e)))?;
    }

    if class_id as usize >= num_classes {
      return Err(AnnotationError::ClassOutOfRange {
        path: path.to_path_buf(),
        line,
        class_id,
        num_classes,
      });
    }

    let [cx, cy, w, h] = coords;
    annotations.push(Annotation::new(class_id, NormBox::new(cx, cy, w, h)));
  }

  Ok(annotations)
}

pub fn read_annotation_file(
  path: &Path,
  num_classes: usize,
) -> Result<Vec<Annotation>, AnnotationError> {
  let content = std::fs::read_to_string(path).map_err(|source| AnnotationError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  parse_annotations(&content, path, num_classes)
}
