// 该文件是 Shanan （山南西风） 项目的一部分。
// src/stats.rs - 推理耗时统计
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

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatsError {
  #[error("没有处理任何图像，无法计算吞吐量")]
  NoImages,
  #[error("累计推理时间为零，无法计算吞吐量")]
  ZeroInferenceTime,
}

/// 运行期间累积的计数，只增不减
#[derive(Debug, Clone, Default)]
pub struct RunStats {
  pub inference_time: Duration,
  pub inference_count: usize,
  pub image_count: usize,
  pub decode_failures: usize,
  pub batch_times: Vec<Duration>,
}

/// 运行结束时的汇总
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
  /// 仅计推理时间的吞吐量
  pub fps: f64,
  pub avg_inference_secs: f64,
  pub total_inference_secs: f64,
  pub wall_secs: f64,
  pub min_batch_secs: f64,
  pub max_batch_secs: f64,
  pub images: usize,
  pub inferences: usize,
  pub skipped_images: usize,
}

#[derive(Debug, Default)]
pub struct StatsTracker {
  stats: RunStats,
}

impl StatsTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// 记录一次推理调用及其处理的图像数
  pub fn record_inference(&mut self, duration: Duration, images: usize) {
    self.stats.inference_time += duration;
    self.stats.inference_count += 1;
    self.stats.image_count += images;
    self.stats.batch_times.push(duration);
  }

  pub fn record_decode_failure(&mut self) {
    self.stats.decode_failures += 1;
  }

  pub fn stats(&self) -> &RunStats {
    &self.stats
  }

  pub fn into_stats(self) -> RunStats {
    self.stats
  }

  /// 计算吞吐量与平均推理时间
  ///
  /// `fps = total_images / 累计推理秒数`，`avg = 累计推理秒数 / total_images`。
  /// 图像数为零或累计推理时间为零时返回错误，不产生 NaN 或无穷大。
  pub fn finalize(&self, total_images: usize, wall_time: Duration) -> Result<Summary, StatsError> {
    if total_images == 0 {
      return Err(StatsError::NoImages);
    }
    let total = self.stats.inference_time.as_secs_f64();
    if total == 0.0 {
      return Err(StatsError::ZeroInferenceTime);
    }

    let min_batch = self.stats.batch_times.iter().min().copied().unwrap_or_default();
    let max_batch = self.stats.batch_times.iter().max().copied().unwrap_or_default();

    Ok(Summary {
      fps: total_images as f64 / total,
      avg_inference_secs: total / total_images as f64,
      total_inference_secs: total,
      wall_secs: wall_time.as_secs_f64(),
      min_batch_secs: min_batch.as_secs_f64(),
      max_batch_secs: max_batch.as_secs_f64(),
      images: total_images,
      inferences: self.stats.inference_count,
      skipped_images: self.stats.decode_failures,
    })
  }
}
