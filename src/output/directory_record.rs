// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectItem,
  output::{
    Render,
    draw::{Draw, Rendered},
  },
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("输出路径不是合法的 UTF-8: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
  #[error("输出路径不是目录: {0}")]
  NotADirectory(PathBuf),
  #[error("无法从输入路径推导输出文件名: {0}")]
  InvalidSource(PathBuf),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 把标注图像与检测文本写入同一个目录
///
/// 对输入 `dir/name.ext`，写出 `<输出目录>/name.ext` 和 `<输出目录>/name.txt`，已有文件会被覆盖。
/// 输出目录必须事先存在。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch {
        expected: Self::SCHEME,
        found: uri.scheme().to_string(),
      });
    }

    Self::new(url_file_path(uri)?, Draw::default())
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, draw: Draw) -> Result<Self, DirectoryRecordOutputError> {
    let directory = directory.into();
    if !directory.is_dir() {
      return Err(DirectoryRecordOutputError::NotADirectory(directory));
    }
    Ok(Self { directory, draw })
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn image_path(&self, source: &Path) -> Result<PathBuf, DirectoryRecordOutputError> {
    let name = source
      .file_name()
      .ok_or_else(|| DirectoryRecordOutputError::InvalidSource(source.to_path_buf()))?;
    Ok(self.directory.join(name))
  }

  pub fn record_path(&self, source: &Path) -> Result<PathBuf, DirectoryRecordOutputError> {
    let mut name = source
      .file_stem()
      .ok_or_else(|| DirectoryRecordOutputError::InvalidSource(source.to_path_buf()))?
      .to_os_string();
    name.push(".txt");
    Ok(self.directory.join(name))
  }

  /// 写出一张图像的文本记录与标注图像
  ///
  /// 图像先在内存中编码，编码失败时两个文件都不会写出。
  pub fn write(&self, source: &Path, rendered: &Rendered) -> Result<(), DirectoryRecordOutputError> {
    let record_path = self.record_path(source)?;
    let image_path = self.image_path(source)?;

    // 扩展名无法识别时按 PNG 编码
    let format = ImageFormat::from_path(&image_path).unwrap_or(ImageFormat::Png);
    let mut encoded = Cursor::new(Vec::new());
    rendered.image.write_to(&mut encoded, format)?;

    std::fs::write(&image_path, encoded.into_inner())?;
    std::fs::write(&record_path, rendered.text())?;

    debug!(
      "写出结果: {} / {}",
      image_path.display(),
      record_path.display()
    );
    Ok(())
  }
}

impl Render<RgbImage, Vec<DetectItem>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    source: &Path,
    frame: RgbImage,
    result: &Vec<DetectItem>,
  ) -> Result<(), Self::Error> {
    let rendered = self.draw.render(frame, result);
    self.write(source, &rendered)
  }
}
