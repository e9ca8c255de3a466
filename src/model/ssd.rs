// 该文件是 Lukou （路口） 项目的一部分。
// src/model/ssd.rs - SSD 检测器
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

use std::{path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  bbox::ImageSize,
  codec::{
    ConfigurationError, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_GRID_SIZE, DEFAULT_NUM_ANCHORS,
    DetectionDecoder, GridGeometry,
  },
  frame::{ChannelOrder, DEFAULT_INPUT_SIZE, Frame, ImageTensor},
  model::{Backbone, DetectResult, Model},
};

pub const SSD_SCHEME: &str = "ssd";

#[derive(Error, Debug)]
pub enum SsdError {
  #[error("配置错误: {0}")]
  Configuration(#[from] ConfigurationError),
  #[error("模型推理错误: {0}")]
  Backbone(Box<dyn std::error::Error + Send + Sync>),
}

/// SSD 检测器配置
///
/// `ssd:///path/to/model?classes=3&threshold=0.5&grid=7&anchors=9&width=224&height=224&order=bgr`
#[derive(Debug, Clone, PartialEq)]
pub struct SsdConfig {
  pub model_path: PathBuf,
  pub geometry: GridGeometry,
  pub threshold: f32,
  pub input_size: ImageSize,
  pub channel_order: ChannelOrder,
}

impl SsdConfig {
  pub fn new(geometry: GridGeometry) -> Self {
    Self {
      model_path: PathBuf::new(),
      geometry,
      threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      input_size: DEFAULT_INPUT_SIZE,
      channel_order: ChannelOrder::default(),
    }
  }

  pub fn threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn input_size(mut self, input_size: ImageSize) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn channel_order(mut self, channel_order: ChannelOrder) -> Self {
    self.channel_order = channel_order;
    self
  }

  pub fn decoder(&self) -> Result<DetectionDecoder, ConfigurationError> {
    DetectionDecoder::new(self.geometry, self.threshold)
  }
}

fn parse_param<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigurationError> {
  value
    .parse()
    .map_err(|_| ConfigurationError::InvalidParameter {
      key: key.to_string(),
      value: value.to_string(),
    })
}

impl FromUrlWithScheme for SsdConfig {
  const SCHEME: &'static str = SSD_SCHEME;
}

impl FromUrl for SsdConfig {
  type Error = ConfigurationError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConfigurationError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let mut grid = DEFAULT_GRID_SIZE;
    let mut anchors = DEFAULT_NUM_ANCHORS;
    let mut classes = None;
    let mut threshold = DEFAULT_CONFIDENCE_THRESHOLD;
    let mut input_size = DEFAULT_INPUT_SIZE;
    let mut channel_order = ChannelOrder::default();

    for (key, value) in url.query_pairs() {
      match &*key {
        "grid" => grid = parse_param(&key, &value)?,
        "anchors" => anchors = parse_param(&key, &value)?,
        "classes" => classes = Some(parse_param(&key, &value)?),
        "threshold" => threshold = parse_param(&key, &value)?,
        "width" => input_size.width = parse_param(&key, &value)?,
        "height" => input_size.height = parse_param(&key, &value)?,
        "order" => {
          channel_order = match &*value {
            "rgb" => ChannelOrder::Rgb,
            "bgr" => ChannelOrder::Bgr,
            _ => {
              return Err(ConfigurationError::InvalidParameter {
                key: key.to_string(),
                value: value.to_string(),
              });
            }
          }
        }
        _ => debug!("忽略未知配置参数: {}={}", key, value),
      }
    }

    let classes = classes.ok_or_else(|| ConfigurationError::InvalidParameter {
      key: "classes".to_string(),
      value: String::new(),
    })?;

    let config = SsdConfig {
      model_path: PathBuf::from(url.path()),
      geometry: GridGeometry::new(grid, anchors, classes)?,
      threshold,
      input_size,
      channel_order,
    };
    // 阈值在此处校验，避免构建检测器时才报错
    config.decoder()?;

    Ok(config)
  }
}

/// 主干网络加解码器组成的检测器
pub struct SsdDetector<B> {
  backbone: B,
  decoder: DetectionDecoder,
  input_size: ImageSize,
  channel_order: ChannelOrder,
}

impl<B: Backbone> SsdDetector<B> {
  pub fn new(config: &SsdConfig, backbone: B) -> Result<Self, SsdError> {
    let decoder = config.decoder()?;
    info!(
      "创建 SSD 检测器: 网格 {}x{}, 锚框 {}, 类别 {}, 阈值 {}",
      config.geometry.grid_size(),
      config.geometry.grid_size(),
      config.geometry.num_anchors(),
      config.geometry.num_classes(),
      config.threshold
    );

    Ok(Self {
      backbone,
      decoder,
      input_size: config.input_size,
      channel_order: config.channel_order,
    })
  }

  pub fn decoder(&self) -> &DetectionDecoder {
    &self.decoder
  }
}

impl<B: Backbone> Model for SsdDetector<B> {
  type Input = Frame;
  type Output = DetectResult;
  type Error = SsdError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理第 {} 帧: {}", input.index, input.source);
    let tensor = ImageTensor::from_rgb_image(&input.image, self.input_size, self.channel_order);

    debug!("执行模型推理");
    let raw = self
      .backbone
      .forward(&tensor)
      .map_err(|e| SsdError::Backbone(Box::new(e)))?;

    debug!("解码模型输出");
    Ok(self.decoder.decode(raw.view(), input.size())?)
  }
}
