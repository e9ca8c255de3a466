// 该文件是 Lukou （路口） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, model::DetectResult};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod camera_record;
mod draw;
mod log_output;
mod save_image_file;

pub use self::camera_record::{CameraRecord, CategoryCount, JsonRecordOutput, JsonRecordOutputError};
pub use self::draw::Draw;
pub use self::log_output::{LogOutput, LogOutputError};
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("JSON 记录输出错误: {0}")]
  JsonRecordOutputError(#[from] JsonRecordOutputError),
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[error("图像保存错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  JsonRecordOutput(JsonRecordOutput),
  LogOutput(LogOutput),
  SaveImageFile(SaveImageFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      JsonRecordOutput::SCHEME => Ok(OutputWrapper::JsonRecordOutput(
        JsonRecordOutput::from_url(url)?,
      )),
      LogOutput::SCHEME => Ok(OutputWrapper::LogOutput(LogOutput::from_url(url)?)),
      SaveImageFileOutput::SCHEME => Ok(OutputWrapper::SaveImageFile(
        SaveImageFileOutput::from_url(url)?,
      )),
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Render<Frame, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::JsonRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::LogOutput(output) => {
        let Ok(()) = output.render_result(frame, result);
        Ok(())
      }
      OutputWrapper::SaveImageFile(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dispatch_by_scheme() {
    let dir = tempfile::tempdir().unwrap();

    let save = Url::parse(&format!("save://{}/annotated", dir.path().display())).unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&save),
      Ok(OutputWrapper::SaveImageFile(_))
    ));

    let jsonl = Url::parse(&format!("jsonl://{}/records.jsonl", dir.path().display())).unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&jsonl),
      Ok(OutputWrapper::JsonRecordOutput(_))
    ));

    assert!(matches!(
      OutputWrapper::from_url(&Url::parse("log://").unwrap()),
      Ok(OutputWrapper::LogOutput(_))
    ));
    assert!(matches!(
      OutputWrapper::from_url(&Url::parse("rtsp://camera/stream").unwrap()),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}
