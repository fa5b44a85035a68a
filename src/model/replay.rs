// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/replay.rs - 回放检测器
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

use std::collections::VecDeque;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{DetectItem, Detector, DetectorConfig};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("记录文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录文件格式错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("记录已耗尽: 请求 {requested} 张图像的结果, 剩余 {remaining}")]
  Exhausted { requested: usize, remaining: usize },
}

/// 按调用顺序回放预先记录的检测结果
///
/// 记录文件是 JSON 数组，每个元素对应一张图像的检测列表：
///
/// ```json
/// [[{"class_id": 0, "score": 0.87, "rect": {"x": 5, "y": 5, "width": 10, "height": 10}}], []]
/// ```
///
/// 回放时按置信度阈值过滤并做同类别 NMS，与真实引擎的后处理一致。
pub struct ReplayDetector {
  recording: VecDeque<Vec<DetectItem>>,
  detect_thresh: f32,
  detect_nms: f32,
}

impl ReplayDetector {
  pub const BACKEND: &'static str = "replay";

  pub fn load(config: &DetectorConfig) -> Result<Self, ReplayDetectorError> {
    info!("加载检测记录: {}", config.model_cfg.display());
    let data = std::fs::read(&config.model_cfg)?;
    let recording: Vec<Vec<DetectItem>> = serde_json::from_slice(&data)?;
    debug!("记录中共有 {} 张图像的结果", recording.len());

    Ok(Self::from_recording(
      recording,
      config.detect_thresh,
      config.detect_nms,
    ))
  }

  pub fn from_recording(recording: Vec<Vec<DetectItem>>, detect_thresh: f32, detect_nms: f32) -> Self {
    Self {
      recording: recording.into(),
      detect_thresh,
      detect_nms,
    }
  }

  pub fn remaining(&self) -> usize {
    self.recording.len()
  }

  fn postprocess(&self, items: Vec<DetectItem>) -> Vec<DetectItem> {
    let mut candidates: Vec<DetectItem> = items
      .into_iter()
      .filter(|item| item.score >= self.detect_thresh)
      .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<DetectItem> = Vec::with_capacity(candidates.len());
    for item in candidates {
      let suppressed = kept
        .iter()
        .any(|k| k.class_id == item.class_id && k.rect.iou(&item.rect) > self.detect_nms);
      if !suppressed {
        kept.push(item);
      }
    }
    kept
  }
}

impl Detector for ReplayDetector {
  type Error = ReplayDetectorError;

  fn detect(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<DetectItem>>, Self::Error> {
    if images.len() > self.recording.len() {
      return Err(ReplayDetectorError::Exhausted {
        requested: images.len(),
        remaining: self.recording.len(),
      });
    }

    let recorded: Vec<_> = self.recording.drain(..images.len()).collect();
    Ok(
      recorded
        .into_iter()
        .map(|items| self.postprocess(items))
        .collect(),
    )
  }
}
