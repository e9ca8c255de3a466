// 该文件是 Lukou （路口） 项目的一部分。
// src/bin/decode_prediction.rs - 解码导出的模型输出
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use lukou::{
  FromUrl,
  input::InputWrapper,
  model::{ReplayBackbone, SsdConfig, SsdDetector},
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, Task},
};

/// 回放导出的模型输出并解码
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型配置，路径指向导出的模型输出 (JSON 张量 [G][G][D] 或 [N][G][G][D])，
  /// 例如 ssd:///data/prediction.json?classes=3&threshold=0.5
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///data/images/frame.jpg 或 folder:///data/images
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 jsonl:///tmp/records.jsonl?names=Car,Bus,Motorbike 或 save:///tmp/annotated
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,
  /// 最多处理的帧数
  #[arg(long, value_name = "N")]
  pub frames: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型配置: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = SsdConfig::from_url(&args.model)?;
  let backbone = ReplayBackbone::from_config(&config)?;
  let model = SsdDetector::new(&config, backbone)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  if matches!(input, InputWrapper::ReadImageFile(_)) {
    OneShotTask.run_task(input, model, output)?;
  } else {
    ContinuousTask::default()
      .with_frame_number(args.frames)
      .run_task(input, model, output)?;
  }

  info!("处理完成");
  Ok(())
}
