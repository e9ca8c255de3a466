// 该文件是 Lukou （路口） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::convert::Infallible;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, annotation::ClassNames, frame::Frame, model::DetectResult,
  output::Render,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 只把检测结果写入日志，`log://?names=Car,Bus,Motorbike`
#[derive(Debug, Clone, Default)]
pub struct LogOutput {
  class_names: Option<ClassNames>,
}

impl LogOutput {
  pub fn with_class_names(mut self, class_names: ClassNames) -> Self {
    self.class_names = Some(class_names);
    self
  }

  fn label(&self, class_id: u32) -> String {
    match &self.class_names {
      Some(names) => names.label(class_id),
      None => format!("class_{}", class_id),
    }
  }
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }

    let output = LogOutput::default();
    match url.query_pairs().find(|(k, _)| k == "names") {
      Some((_, names)) => Ok(output.with_class_names(ClassNames::new(names.split(',')))),
      None => Ok(output),
    }
  }
}

impl Render<Frame, DetectResult> for LogOutput {
  type Error = Infallible;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    info!(
      "帧 {} ({}): 检测到 {} 个对象",
      frame.index,
      frame.source,
      result.len()
    );
    for item in result.items.iter() {
      info!(
        "  - {}: {:.2}% at ({}, {}, {}x{})",
        self.label(item.class_id),
        item.score * 100.0,
        item.bbox.x_min,
        item.bbox.y_min,
        item.bbox.width(),
        item.bbox.height()
      );
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_from_query() {
    let url = Url::parse("log://?names=Car,Bus").unwrap();
    let output = LogOutput::from_url(&url).unwrap();
    assert_eq!(output.label(1), "Bus");
    assert_eq!(output.label(4), "class_4");

    let plain = LogOutput::from_url(&Url::parse("log://").unwrap()).unwrap();
    assert_eq!(plain.label(0), "class_0");
  }
}
