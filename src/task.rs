// 该文件是 Lukou （路口） 项目的一部分。
// src/task.rs - 推理任务
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

use tracing::info;

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 依次处理全部输入帧，可限制最大帧数
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");

    let mut frame_index = 0usize;
    for frame in input {
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      frame_index += 1;

      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      info!(
        "第 {} 帧完成，耗时: {:.2?} / {:.2?}",
        frame_index, elapsed_a, elapsed_b
      );
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible};

  use image::RgbImage;
  use ndarray::Array3;
  use url::Url;

  use super::*;
  use crate::{
    FromUrl,
    codec::GridGeometry,
    input::InputWrapper,
    model::{ReplayBackbone, SsdConfig, SsdDetector},
    output::{CameraRecord, OutputWrapper},
  };

  struct Doubler;

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = Infallible;

    fn infer(&self, input: &u32) -> Result<u32, Infallible> {
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(u32, u32)>>,
  }

  impl Render<u32, u32> for &Collect {
    type Error = Infallible;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Infallible> {
      self.seen.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn one_shot_uses_first_frame() {
    let output = Collect::default();
    OneShotTask.run_task(vec![3u32, 4].into_iter(), Doubler, &output).unwrap();
    assert_eq!(*output.seen.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let output = Collect::default();
    assert!(OneShotTask.run_task(Vec::<u32>::new().into_iter(), Doubler, &output).is_err());
  }

  #[test]
  fn continuous_respects_frame_limit() {
    let output = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(1u32..10, Doubler, &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(1, 2), (2, 4)]);
  }

  #[test]
  fn continuous_processes_everything() {
    let output = Collect::default();
    ContinuousTask::default()
      .run_task(1u32..4, Doubler, &output)
      .unwrap();
    assert_eq!(output.seen.borrow().len(), 3);
  }

  #[test]
  fn detects_over_folder_into_records() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    RgbImage::new(64, 32).save(images.join("a.png")).unwrap();
    RgbImage::new(64, 32).save(images.join("b.png")).unwrap();

    let geometry = GridGeometry::with_classes(3).unwrap();
    let mut hit = Array3::<f32>::zeros(geometry.shape());
    for (slot, value) in geometry.box_range(0).zip([0.5, 0.5, 0.5, 0.5]) {
      hit[[0, 0, slot]] = value;
    }
    hit[[0, 0, geometry.class_range(0).start + 2]] = 0.8;
    let miss = Array3::<f32>::zeros(geometry.shape());

    let backbone = ReplayBackbone::new([hit, miss]);
    let model = SsdDetector::new(&SsdConfig::new(geometry), backbone).unwrap();
    let folder = Url::parse(&format!("folder://{}", images.display())).unwrap();
    let input = InputWrapper::from_url(&folder).unwrap();
    let records = dir.path().join("records.jsonl");
    let jsonl =
      Url::parse(&format!("jsonl://{}?names=Car,Bus,Motorbike", records.display())).unwrap();
    let output = OutputWrapper::from_url(&jsonl).unwrap();

    ContinuousTask::default().run_task(input, model, output).unwrap();

    let records: Vec<CameraRecord> = std::fs::read_to_string(&records)
      .unwrap()
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].categories[2].category, "Motorbike");
    assert_eq!(records[0].categories[2].objects_detected, 1);
    assert!(records[1].categories.iter().all(|c| c.objects_detected == 0));
  }

  #[test]
  fn one_shot_fails_when_outputs_run_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbImage::new(8, 8).save(&path).unwrap();

    let geometry = GridGeometry::with_classes(3).unwrap();
    let backbone = ReplayBackbone::new(Vec::<Array3<f32>>::new());
    let model = SsdDetector::new(&SsdConfig::new(geometry), backbone).unwrap();
    let image = Url::parse(&format!("image://{}", path.display())).unwrap();
    let input = InputWrapper::from_url(&image).unwrap();
    let output = OutputWrapper::from_url(&Url::parse("log://").unwrap()).unwrap();

    assert!(OneShotTask.run_task(input, model, output).is_err());
  }
}
