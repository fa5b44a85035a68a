// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/image_folder.rs - 图像目录枚举与批次组装
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

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

use super::{ImageFolderInputError, read_rgb_image};
use crate::{FromUrl, FromUrlWithScheme, batch::Batch, url_file_path};

/// 列出目录下的普通文件，按路径排序
///
/// 子目录与符号链接都会被跳过。
pub fn list_image_files(directory: &Path) -> Result<Vec<PathBuf>, ImageFolderInputError> {
  if !directory.is_dir() {
    return Err(ImageFolderInputError::NotADirectory(
      directory.to_path_buf(),
    ));
  }

  let mut files = Vec::new();
  for entry in std::fs::read_dir(directory)? {
    let entry = entry?;
    // DirEntry::file_type 不跟随符号链接
    if entry.file_type()?.is_file() {
      files.push(entry.path());
    }
  }
  files.sort();

  debug!("目录 {} 中共有 {} 个文件", directory.display(), files.len());
  Ok(files)
}

/// 图像目录输入，按批次读取图像
pub struct ImageFolderInput {
  files: Vec<PathBuf>,
  cursor: usize,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    Self::open(url_file_path(url)?)
  }
}

impl ImageFolderInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageFolderInputError> {
    let files = list_image_files(directory.as_ref())?;
    Ok(Self::from_files(files))
  }

  pub fn from_files(files: Vec<PathBuf>) -> Self {
    Self { files, cursor: 0 }
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn is_exhausted(&self) -> bool {
    self.cursor >= self.files.len()
  }

  /// 从游标处开始组装至多 `batch_size` 张图像
  ///
  /// 遇到无法解码的图像时立即截断本批次：该图像及本轮剩余的图像都不会进入批次，
  /// 但游标会越过失败的文件，下一批次从其后开始。输入耗尽时返回 `None`。
  /// 若批次的第一张图像就失败，返回的是一个空批次而不是 `None`。
  pub fn next_batch(&mut self, batch_size: NonZeroUsize) -> Option<Batch> {
    if self.is_exhausted() {
      return None;
    }

    let mut batch = Batch::with_capacity(batch_size.get());
    while batch.len() < batch_size.get() && !self.is_exhausted() {
      let path = self.files[self.cursor].clone();
      self.cursor += 1;

      match read_rgb_image(&path) {
        Ok(image) => batch.push(path, image),
        Err(e) => {
          warn!("无法读取图像 {}: {}，截断当前批次", path.display(), e);
          batch.truncate_at(path);
          break;
        }
      }
    }

    Some(batch)
  }
}
