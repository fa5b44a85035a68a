// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 检测服务接口
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

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

mod config;
pub use self::config::{DetectorConfig, DetectorConfigError, NetType, Precision};

#[cfg(feature = "replay_detector")]
mod replay;
#[cfg(feature = "replay_detector")]
pub use self::replay::{ReplayDetector, ReplayDetectorError};

/// 批量检测服务
///
/// 每张输入图像对应一个检测结果列表，顺序与输入一致。调用是阻塞的。
pub trait Detector {
  type Error;

  fn detect(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<DetectItem>>, Self::Error>;
}

/// 像素坐标下的矩形框，左上角加宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl BoundingBox {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 右边界（不含），以 i64 计算，坐标来自外部数据时也不会溢出
  pub fn right(&self) -> i64 {
    i64::from(self.x) + i64::from(self.width)
  }

  pub fn bottom(&self) -> i64 {
    i64::from(self.y) + i64::from(self.height)
  }

  pub fn area(&self) -> i64 {
    i64::from(self.width.max(0)) * i64::from(self.height.max(0))
  }

  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let w = (self.right().min(other.right()) - i64::from(self.x.max(other.x))).max(0);
    let h = (self.bottom().min(other.bottom()) - i64::from(self.y.max(other.y))).max(0);
    let inter = w * h;
    let union = self.area() + other.area() - inter;
    if union <= 0 {
      return 0.0;
    }
    inter as f32 / union as f32
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub rect: BoundingBox,
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("检测器配置错误: {0}")]
  ConfigError(#[from] DetectorConfigError),
  #[cfg(feature = "replay_detector")]
  #[error("回放检测器错误: {0}")]
  ReplayDetectorError(#[from] ReplayDetectorError),
}

/// 按配置选择的检测后端
pub enum DetectorWrapper {
  #[cfg(feature = "replay_detector")]
  Replay(ReplayDetector),
}

impl DetectorWrapper {
  pub fn from_config(config: &DetectorConfig) -> Result<Self, DetectorError> {
    info!(
      "初始化检测器: 后端 {}, 网络 {:?}, 精度 {:?}",
      config.backend, config.net_type, config.precision
    );

    #[cfg(feature = "replay_detector")]
    {
      if config.backend == ReplayDetector::BACKEND {
        return Ok(DetectorWrapper::Replay(ReplayDetector::load(config)?));
      }
    }

    Err(DetectorConfigError::UnknownBackend(config.backend.clone()).into())
  }
}

impl Detector for DetectorWrapper {
  type Error = DetectorError;

  // 未启用任何后端时枚举没有变体，`images` 用不到
  #[cfg_attr(not(feature = "replay_detector"), allow(unused_variables))]
  fn detect(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<DetectItem>>, Self::Error> {
    match *self {
      #[cfg(feature = "replay_detector")]
      DetectorWrapper::Replay(ref mut detector) => {
        detector.detect(images).map_err(DetectorError::from)
      }
    }
  }
}
