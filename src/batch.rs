// 该文件是 Shanan （山南西风） 项目的一部分。
// src/batch.rs - 批次定义
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

use image::RgbImage;

/// 一次推理所用的图像批次
///
/// 图像与其来源路径按位置一一对应。
#[derive(Debug, Clone, Default)]
pub struct Batch {
  images: Vec<RgbImage>,
  sources: Vec<PathBuf>,
  // 导致本批次提前截断的解码失败文件
  truncated_by: Option<PathBuf>,
}

impl Batch {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      images: Vec::with_capacity(capacity),
      sources: Vec::with_capacity(capacity),
      truncated_by: None,
    }
  }

  /// 标记本批次因 `source` 解码失败而截断
  pub fn truncate_at(&mut self, source: PathBuf) {
    self.truncated_by = Some(source);
  }

  pub fn truncated_by(&self) -> Option<&Path> {
    self.truncated_by.as_deref()
  }

  pub fn push(&mut self, source: PathBuf, image: RgbImage) {
    self.sources.push(source);
    self.images.push(image);
  }

  pub fn len(&self) -> usize {
    self.images.len()
  }

  pub fn is_empty(&self) -> bool {
    self.images.is_empty()
  }

  pub fn images(&self) -> &[RgbImage] {
    &self.images
  }

  pub fn sources(&self) -> &[PathBuf] {
    &self.sources
  }

  /// 拆分为 (来源路径, 图像) 对，按批次顺序
  pub fn into_pairs(self) -> impl Iterator<Item = (PathBuf, RgbImage)> {
    self.sources.into_iter().zip(self.images)
  }

  pub fn source(&self, index: usize) -> Option<&Path> {
    self.sources.get(index).map(PathBuf::as_path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pairs_keep_positional_order() {
    let mut batch = Batch::with_capacity(2);
    batch.push(PathBuf::from("a.png"), RgbImage::new(1, 1));
    batch.push(PathBuf::from("b.png"), RgbImage::new(2, 2));

    assert_eq!(batch.len(), 2);
    assert_eq!(batch.source(1), Some(Path::new("b.png")));

    let pairs: Vec<_> = batch.into_pairs().collect();
    assert_eq!(pairs[0].0, PathBuf::from("a.png"));
    assert_eq!(pairs[1].1.dimensions(), (2, 2));
  }
}
