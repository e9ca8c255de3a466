// 该文件是 Lukou （路口） 项目的一部分。
// src/output/camera_record.rs - 摄像头检测记录输出
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
  fs::{File, OpenOptions},
  io::Write,
  path::Path,
  sync::Mutex,
};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  annotation::{AnnotationError, ClassNames},
  frame::Frame,
  model::DetectResult,
  output::Render,
};

const DEFAULT_CAMERA_LABEL: &str = "Camera 1";

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("类别文件错误: {0}")]
  ClassNamesError(#[from] AnnotationError),
  #[error("输出文件锁已损坏")]
  Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
  pub category: String,
  pub objects_detected: usize,
}

/// 单帧的分类统计，交通监控后端消费的消息体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraRecord {
  pub label: String,
  pub timestamp: String,
  pub categories: Vec<CategoryCount>,
}

impl CameraRecord {
  /// 按类别顺序统计，包含数量为 0 的类别
  pub fn from_result(
    label: &str,
    class_names: &ClassNames,
    result: &DetectResult,
    timestamp: NaiveDateTime,
  ) -> Self {
    let num_classes = result
      .items
      .iter()
      .map(|item| item.class_id as usize + 1)
      .fold(class_names.len(), usize::max);

    let categories = result
      .count_by_class(num_classes)
      .into_iter()
      .enumerate()
      .map(|(class_id, objects_detected)| CategoryCount {
        category: class_names.label(class_id as u32),
        objects_detected,
      })
      .collect();

    Self {
      label: label.to_string(),
      timestamp: timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
      categories,
    }
  }
}

/// 将每帧的记录追加为一行 JSON
///
/// `jsonl:///path/to/records.jsonl?camera=Camera%201&classes=/data/labels/classes.txt`，
/// 也可用 `names=Car,Bus,Motorbike` 直接给出类别名称。
pub struct JsonRecordOutput {
  camera: String,
  class_names: ClassNames,
  file: Mutex<File>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch);
    }

    let mut camera = DEFAULT_CAMERA_LABEL.to_string();
    let mut class_names = ClassNames::new(Vec::<String>::new());
    for (key, value) in url.query_pairs() {
      match &*key {
        "camera" => camera = value.to_string(),
        "classes" => class_names = ClassNames::read(Path::new(&*value))?,
        "names" => class_names = ClassNames::new(value.split(',').map(str::trim)),
        _ => debug!("忽略未知输出参数: {}={}", key, value),
      }
    }

    Self::create(Path::new(url.path()), camera, class_names)
  }
}

impl JsonRecordOutput {
  pub fn create(
    path: &Path,
    camera: impl Into<String>,
    class_names: ClassNames,
  ) -> Result<Self, JsonRecordOutputError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let camera = camera.into();
    info!("摄像头 {} 的检测记录写入 {:?}", camera, path);

    Ok(Self {
      camera,
      class_names,
      file: Mutex::new(file),
    })
  }

  pub fn write_record(&self, record: &CameraRecord) -> Result<(), JsonRecordOutputError> {
    let line = serde_json::to_string(record)?;
    let mut file = self
      .file
      .lock()
      .map_err(|_| JsonRecordOutputError::Poisoned)?;
    writeln!(file, "{}", line)?;
    file.flush()?;
    Ok(())
  }
}

impl Render<Frame, DetectResult> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let record = CameraRecord::from_result(
      &self.camera,
      &self.class_names,
      result,
      Local::now().naive_local(),
    );
    debug!("帧 {} 记录: {:?}", frame.index, record.categories);
    self.write_record(&record)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use image::RgbImage;

  use super::*;
  use crate::{bbox::PixelBox, model::DetectItem};

  fn result(classes: &[u32]) -> DetectResult {
    DetectResult {
      items: classes
        .iter()
        .map(|&class_id| DetectItem {
          class_id,
          score: 0.8,
          bbox: PixelBox {
            x_min: 1,
            y_min: 2,
            x_max: 3,
            y_max: 4,
          },
        })
        .collect(),
    }
  }

  fn timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
      .unwrap()
      .and_hms_micro_opt(12, 30, 15, 250)
      .unwrap()
  }

  #[test]
  fn record_counts_every_class() {
    let names = ClassNames::new(["Car", "Bus", "Motorbike"]);
    let record = CameraRecord::from_result("Camera 1", &names, &result(&[0, 2, 0]), timestamp());

    assert_eq!(record.timestamp, "2024-05-01T12:30:15.000250");
    let counts: Vec<(&str, usize)> = record
      .categories
      .iter()
      .map(|c| (c.category.as_str(), c.objects_detected))
      .collect();
    assert_eq!(counts, vec![("Car", 2), ("Bus", 0), ("Motorbike", 1)]);
  }

  #[test]
  fn unknown_classes_get_fallback_names() {
    let names = ClassNames::new(["Car"]);
    let record = CameraRecord::from_result("cam", &names, &result(&[2]), timestamp());
    assert_eq!(record.categories.len(), 3);
    assert_eq!(record.categories[2].category, "class_2");
    assert_eq!(record.categories[2].objects_detected, 1);
  }

  #[test]
  fn record_json_field_names() {
    let names = ClassNames::new(["Car"]);
    let record = CameraRecord::from_result("cam", &names, &result(&[0]), timestamp());
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["label"], "cam");
    assert_eq!(value["categories"][0]["category"], "Car");
    assert_eq!(value["categories"][0]["objectsDetected"], 1);
  }

  #[test]
  fn appends_one_line_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("records.jsonl");
    let url = Url::parse(&format!(
      "jsonl://{}?camera=Highway%200&names=Car,Bus",
      path.display()
    ))
    .unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();

    let frame = Frame::new(RgbImage::new(4, 4), 0, "test");
    output.render_result(&frame, &result(&[1])).unwrap();
    output.render_result(&frame, &result(&[])).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let records: Vec<CameraRecord> = content
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].label, "Highway 0");
    assert_eq!(records[0].categories[1].objects_detected, 1);
    assert_eq!(records[1].categories[1].objects_detected, 0);
  }
}
