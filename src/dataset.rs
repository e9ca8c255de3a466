// 该文件是 Lukou （路口） 项目的一部分。
// src/dataset.rs - 训练数据集读取
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
  collections::HashMap,
  path::{Path, PathBuf},
};

use ndarray::{Array4, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  annotation::{Annotation, AnnotationError, CLASSES_FILE_NAME, ClassNames, read_annotation_file},
  bbox::ImageSize,
  codec::{
    ConfigurationError, DEFAULT_GRID_SIZE, DEFAULT_NUM_ANCHORS, EncodedTarget, GridGeometry,
    LabelEncoder,
  },
  frame::{ChannelOrder, DEFAULT_INPUT_SIZE, ImageTensor},
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const LABEL_EXTENSION: &str = "txt";

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("读取目录 {path:?} 失败: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("标注错误: {0}")]
  Annotation(#[from] AnnotationError),
  #[error("图像 {path:?} 加载失败: {source}")]
  ImageLoad {
    path: PathBuf,
    source: image::ImageError,
  },
  #[error("配置错误: {0}")]
  Configuration(#[from] ConfigurationError),
  #[error("测试集比例 {0} 不在 [0, 1] 范围内")]
  InvalidRatio(f64),
}

/// 单张训练图像
#[derive(Debug, Clone)]
pub struct Sample {
  pub name: String,
  pub image: ImageTensor,
  pub annotations: Vec<Annotation>,
  pub target: EncodedTarget,
}

#[derive(Debug, Clone)]
pub struct Dataset {
  pub class_names: ClassNames,
  pub geometry: GridGeometry,
  pub input_size: ImageSize,
  pub samples: Vec<Sample>,
}

impl Dataset {
  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  /// 图像批量张量 [N, H, W, 3]
  pub fn images(&self) -> Array4<f32> {
    let (width, height) = (self.input_size.width as usize, self.input_size.height as usize);
    let mut batch = Array4::<f32>::zeros((self.samples.len(), height, width, 3));
    for (index, sample) in self.samples.iter().enumerate() {
      batch.index_axis_mut(Axis(0), index).assign(&sample.image.view());
    }
    batch
  }

  /// 目标批量张量 [N, G, G, A * (4 + C)]
  pub fn targets(&self) -> Array4<f32> {
    let [grid_h, grid_w, depth] = self.geometry.shape();
    let mut batch = Array4::<f32>::zeros((self.samples.len(), grid_h, grid_w, depth));
    for (index, sample) in self.samples.iter().enumerate() {
      batch.index_axis_mut(Axis(0), index).assign(&sample.target.view());
    }
    batch
  }

  /// 随机划分训练集与测试集，相同种子得到相同划分
  pub fn split(self, test_ratio: f64, seed: u64) -> Result<(Dataset, Dataset), DatasetError> {
    if !(0.0..=1.0).contains(&test_ratio) {
      return Err(DatasetError::InvalidRatio(test_ratio));
    }

    let Dataset {
      class_names,
      geometry,
      input_size,
      samples,
    } = self;

    let mut indices: Vec<usize> = (0..samples.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let test_len = (samples.len() as f64 * test_ratio).ceil() as usize;
    let mut in_test = vec![false; samples.len()];
    for &index in &indices[..test_len] {
      in_test[index] = true;
    }

    let (mut train, mut test) = (Vec::new(), Vec::new());
    for (sample, is_test) in samples.into_iter().zip(in_test) {
      if is_test {
        test.push(sample);
      } else {
        train.push(sample);
      }
    }
    debug!("划分数据集: 训练 {} 张, 测试 {} 张", train.len(), test.len());

    let part = |samples| Dataset {
      class_names: class_names.clone(),
      geometry,
      input_size,
      samples,
    };
    Ok((part(train), part(test)))
  }
}

/// 从 `images/` 与 `labels/` 目录读取数据集
///
/// 标注文件与图像按文件名（不含扩展名）配对。解析失败的标注文件、
/// 缺失或无法解码的图像只记录警告并跳过。
#[derive(Debug, Clone)]
pub struct DatasetLoader {
  images_dir: PathBuf,
  labels_dir: PathBuf,
  grid_size: usize,
  num_anchors: usize,
  input_size: ImageSize,
  channel_order: ChannelOrder,
}

impl DatasetLoader {
  pub fn new(images_dir: impl Into<PathBuf>, labels_dir: impl Into<PathBuf>) -> Self {
    Self {
      images_dir: images_dir.into(),
      labels_dir: labels_dir.into(),
      grid_size: DEFAULT_GRID_SIZE,
      num_anchors: DEFAULT_NUM_ANCHORS,
      input_size: DEFAULT_INPUT_SIZE,
      channel_order: ChannelOrder::default(),
    }
  }

  pub fn grid(mut self, grid_size: usize, num_anchors: usize) -> Self {
    self.grid_size = grid_size;
    self.num_anchors = num_anchors;
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

  pub fn load(&self) -> Result<Dataset, DatasetError> {
    let class_names = ClassNames::read(&self.labels_dir.join(CLASSES_FILE_NAME))?;
    let geometry = GridGeometry::new(self.grid_size, self.num_anchors, class_names.len())?;
    let encoder = LabelEncoder::new(geometry);
    info!(
      "读取数据集: 图像目录 {:?}, 标注目录 {:?}, 类别数 {}",
      self.images_dir,
      self.labels_dir,
      class_names.len()
    );

    let images = index_images(&self.images_dir)?;
    let mut samples = Vec::new();

    for label_path in label_files(&self.labels_dir)? {
      let Some(name) = file_stem(&label_path) else {
        continue;
      };

      let annotations = match read_annotation_file(&label_path, class_names.len()) {
        Ok(annotations) => annotations,
        Err(e) => {
          warn!("跳过标注文件: {}", e);
          continue;
        }
      };

      let Some(image_path) = images.get(&name) else {
        warn!("标注 {:?} 没有对应的图像，跳过", label_path);
        continue;
      };

      let image = match load_image(image_path, self.input_size, self.channel_order) {
        Ok(image) => image,
        Err(e) => {
          warn!("跳过图像: {}", e);
          continue;
        }
      };

      let target = encoder.encode(&annotations)?;
      samples.push(Sample {
        name,
        image,
        annotations,
        target,
      });
    }

    info!("数据集读取完成: {} 张图像", samples.len());
    Ok(Dataset {
      class_names,
      geometry,
      input_size: self.input_size,
      samples,
    })
  }
}

fn file_stem(path: &Path) -> Option<String> {
  path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
    .unwrap_or(false)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
  let io_error = |source: std::io::Error| DatasetError::Io {
    path: dir.to_path_buf(),
    source,
  };

  let mut paths = Vec::new();
  for entry in std::fs::read_dir(dir).map_err(io_error)? {
    let path = entry.map_err(io_error)?.path();
    if path.is_file() {
      paths.push(path);
    }
  }
  paths.sort();
  Ok(paths)
}

fn label_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
  Ok(
    read_dir_sorted(dir)?
      .into_iter()
      .filter(|path| has_extension(path, &[LABEL_EXTENSION]))
      .filter(|path| path.file_name().and_then(|n| n.to_str()) != Some(CLASSES_FILE_NAME))
      .collect(),
  )
}

fn index_images(dir: &Path) -> Result<HashMap<String, PathBuf>, DatasetError> {
  let mut images = HashMap::new();
  for path in read_dir_sorted(dir)? {
    if !has_extension(&path, &IMAGE_EXTENSIONS) {
      continue;
    }
    if let Some(name) = file_stem(&path) {
      images.entry(name).or_insert(path);
    }
  }
  Ok(images)
}

fn load_image(
  path: &Path,
  size: ImageSize,
  order: ChannelOrder,
) -> Result<ImageTensor, DatasetError> {
  let image = image::open(path)
    .map_err(|source| DatasetError::ImageLoad {
      path: path.to_path_buf(),
      source,
    })?
    .to_rgb8();
  Ok(ImageTensor::from_rgb_image(&image, size, order))
}

#[cfg(test)]
mod tests {
  use image::{Rgb, RgbImage};

  use super::*;

  fn write(path: PathBuf, content: &str) {
    std::fs::write(path, content).unwrap();
  }

  fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    let labels = dir.path().join("labels");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::create_dir_all(&labels).unwrap();

    write(labels.join(CLASSES_FILE_NAME), "Car\nBus\nMotorbike\n");
    write(labels.join("a.txt"), "1 0.5 0.5 0.2 0.3\n0 0.1 0.1 0.1 0.1\n");
    write(labels.join("b.txt"), "1 0.5 oops 0.2 0.3\n");
    write(labels.join("c.txt"), "2 0.5 0.5 0.2 0.3\n");
    write(labels.join("d.txt"), "2 0.5 0.5 0.2 0.3\n");
    write(labels.join("e.txt"), "0 0.5 0.5 0.2 0.3\n");

    RgbImage::from_pixel(32, 16, Rgb([10, 20, 30]))
      .save(images.join("a.png"))
      .unwrap();
    RgbImage::new(8, 8).save(images.join("b.png")).unwrap();
    write(images.join("d.png"), "not an image");
    RgbImage::new(8, 8).save(images.join("e.PNG")).unwrap();

    dir
  }

  fn loader(dir: &tempfile::TempDir) -> DatasetLoader {
    DatasetLoader::new(dir.path().join("images"), dir.path().join("labels"))
      .input_size(ImageSize::new(16, 16))
  }

  #[test]
  fn load_skips_broken_samples() {
    let dir = fixture();
    let dataset = loader(&dir).load().unwrap();

    let names: Vec<&str> = dataset.samples.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "e"]);
    assert_eq!(dataset.class_names.len(), 3);
    assert_eq!(dataset.geometry, GridGeometry::with_classes(3).unwrap());

    let a = &dataset.samples[0];
    assert_eq!(a.annotations.len(), 2);
    assert_eq!(a.target.cell(0, 0)[9 * 4 + 1], 1.0);
  }

  #[test]
  fn load_skips_label_without_image() {
    let dir = fixture();
    let dataset = loader(&dir).load().unwrap();

    assert!(dir.path().join("labels").join("c.txt").exists());
    assert!(dataset.samples.iter().all(|s| s.name != "c"));
  }

  #[test]
  fn batch_shapes() {
    let dir = fixture();
    let dataset = loader(&dir).load().unwrap();

    assert_eq!(dataset.images().shape(), &[2, 16, 16, 3]);
    assert_eq!(dataset.targets().shape(), &[2, 7, 7, 63]);
  }

  #[test]
  fn missing_classes_file_is_fatal() {
    let dir = fixture();
    std::fs::remove_file(dir.path().join("labels").join(CLASSES_FILE_NAME)).unwrap();
    assert!(matches!(
      loader(&dir).load(),
      Err(DatasetError::Annotation(AnnotationError::Io { .. }))
    ));
  }

  fn synthetic(len: usize) -> Dataset {
    let geometry = GridGeometry::with_classes(1).unwrap();
    let encoder = LabelEncoder::new(geometry);
    let image = ImageTensor::from_rgb_image(
      &RgbImage::new(2, 2),
      ImageSize::new(2, 2),
      ChannelOrder::Rgb,
    );
    Dataset {
      class_names: ClassNames::new(["Car"]),
      geometry,
      input_size: ImageSize::new(2, 2),
      samples: (0..len)
        .map(|i| Sample {
          name: i.to_string(),
          image: image.clone(),
          annotations: Vec::new(),
          target: encoder.encode(&[]).unwrap(),
        })
        .collect(),
    }
  }

  fn names(dataset: &Dataset) -> Vec<String> {
    dataset.samples.iter().map(|s| s.name.clone()).collect()
  }

  #[test]
  fn split_is_deterministic_partition() {
    let (train, test) = synthetic(10).split(0.2, 42).unwrap();
    assert_eq!(train.len(), 8);
    assert_eq!(test.len(), 2);

    let mut all = names(&train);
    all.extend(names(&test));
    all.sort_by_key(|n| n.parse::<usize>().unwrap());
    assert_eq!(all, (0..10).map(|i| i.to_string()).collect::<Vec<_>>());

    let (train_again, test_again) = synthetic(10).split(0.2, 42).unwrap();
    assert_eq!(names(&train), names(&train_again));
    assert_eq!(names(&test), names(&test_again));
  }

  #[test]
  fn split_rounds_test_count_up() {
    let (train, test) = synthetic(100).split(0.3, 42).unwrap();
    assert_eq!((train.len(), test.len()), (70, 30));

    let (train, test) = synthetic(50).split(0.3, 7).unwrap();
    assert_eq!((train.len(), test.len()), (35, 15));

    let (train, test) = synthetic(7).split(0.2, 42).unwrap();
    assert_eq!((train.len(), test.len()), (5, 2));
  }

  #[test]
  fn split_rejects_bad_ratio() {
    assert!(matches!(
      synthetic(3).split(1.5, 0),
      Err(DatasetError::InvalidRatio(_))
    ));
  }
}
