// 该文件是 Lukou （路口） 项目的一部分。
// src/bin/dataset_summary.rs - 训练数据集读取与标签编码
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use lukou::{
  bbox::ImageSize,
  codec::{DEFAULT_GRID_SIZE, DEFAULT_NUM_ANCHORS},
  dataset::DatasetLoader,
};

/// 读取标注数据集并编码训练目标
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 图像目录
  #[arg(long, value_name = "DIR", default_value = "data/images")]
  pub images: PathBuf,
  /// 标注目录（包含 classes.txt）
  #[arg(long, value_name = "DIR", default_value = "data/labels")]
  pub labels: PathBuf,
  /// 测试集比例 (0.0 - 1.0)
  #[arg(long, default_value = "0.2", value_name = "RATIO")]
  pub test_ratio: f64,
  /// 划分随机种子
  #[arg(long, default_value = "42")]
  pub seed: u64,
  /// 网格大小
  #[arg(long, default_value_t = DEFAULT_GRID_SIZE)]
  pub grid: usize,
  /// 每个网格的锚框数量
  #[arg(long, default_value_t = DEFAULT_NUM_ANCHORS)]
  pub anchors: usize,
  /// 模型输入边长
  #[arg(long, default_value = "224", value_name = "PIXELS")]
  pub input_size: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("图像目录: {:?}", args.images);
  info!("标注目录: {:?}", args.labels);

  let dataset = DatasetLoader::new(&args.images, &args.labels)
    .grid(args.grid, args.anchors)
    .input_size(ImageSize::new(args.input_size, args.input_size))
    .load()?;

  let classes: Vec<&str> = dataset.class_names.iter().collect();
  info!("类别: {:?}", classes);

  let (train, test) = dataset.split(args.test_ratio, args.seed)?;

  info!("训练数据形状: {:?}", train.images().shape());
  info!("测试数据形状: {:?}", test.images().shape());
  info!("训练标签形状: {:?}", train.targets().shape());
  info!("测试标签形状: {:?}", test.targets().shape());

  let dropped: usize = train
    .samples
    .iter()
    .chain(test.samples.iter())
    .map(|s| s.annotations.len().saturating_sub(train.geometry.num_anchors()))
    .sum();
  if dropped > 0 {
    info!("共有 {} 个标注超出锚框数量未被编码", dropped);
  }

  Ok(())
}
