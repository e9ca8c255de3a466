// 该文件是 Lukou （路口） 项目的一部分。
// src/codec.rs - 锚框网格标签编解码
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

mod decoder;
mod encoder;
mod geometry;

pub use self::decoder::{DEFAULT_CONFIDENCE_THRESHOLD, DetectionDecoder};
pub use self::encoder::{AnchorAssigner, AnchorSlot, EncodedTarget, LabelEncoder, PositionalAssigner};
pub use self::geometry::{
  BOX_SLOTS, ConfigurationError, DEFAULT_GRID_SIZE, DEFAULT_NUM_ANCHORS, GridGeometry,
};
