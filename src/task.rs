// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 批量推理任务
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
use std::time::{Duration, Instant};

use anyhow::Context;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  input::ImageFolderInput,
  model::{DetectItem, Detector},
  output::Render,
  stats::{RunStats, StatsTracker, Summary},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("检测结果数量与批次不符: 批次 {batch} 张图像, 返回 {results} 组结果")]
  ResultCountMismatch { batch: usize, results: usize },
}

/// 一次运行的结果
#[derive(Debug)]
pub struct RunReport {
  /// 实际调用检测服务的次数
  pub iterations: usize,
  pub wall_time: Duration,
  pub stats: RunStats,
  /// 没有处理任何图像时为 `None`
  pub summary: Option<Summary>,
}

/// 按批次遍历图像目录：组装批次、检测、绘制并写出，直到输入耗尽
///
/// 检测、绘制或写出失败会立即终止任务；图像解码失败只截断当前批次。
#[derive(Debug, Clone, Copy)]
pub struct BatchTask {
  batch_size: NonZeroUsize,
}

impl BatchTask {
  pub fn new(batch_size: NonZeroUsize) -> Self {
    Self { batch_size }
  }

  pub fn batch_size(&self) -> NonZeroUsize {
    self.batch_size
  }
}

impl Default for BatchTask {
  fn default() -> Self {
    Self::new(NonZeroUsize::MIN)
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  M: Detector<Error = ME>,
  O: Render<RgbImage, Vec<DetectItem>, Error = RE>,
> Task<ImageFolderInput, M, O> for BatchTask
{
  type Output = RunReport;
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: ImageFolderInput,
    mut model: M,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!(
      "开始任务: 共 {} 个文件, 批次大小 {}",
      input.len(),
      self.batch_size
    );

    let mut tracker = StatsTracker::new();
    let mut iterations = 0usize;
    let started = Instant::now();

    while let Some(batch) = input.next_batch(self.batch_size) {
      if batch.truncated_by().is_some() {
        tracker.record_decode_failure();
      }
      if batch.is_empty() {
        debug!("批次为空，跳过推理");
        continue;
      }

      iterations += 1;
      let now = Instant::now();
      let results = model.detect(batch.images()).context("检测服务调用失败")?;
      let elapsed = now.elapsed();
      info!(
        "({}) 推理完成, {} 张图像, 耗时: {:.6} 秒",
        iterations,
        batch.len(),
        elapsed.as_secs_f64()
      );

      if results.len() != batch.len() {
        return Err(
          TaskError::ResultCountMismatch {
            batch: batch.len(),
            results: results.len(),
          }
          .into(),
        );
      }
      tracker.record_inference(elapsed, batch.len());

      for (index, ((source, image), detections)) in batch.into_pairs().zip(results).enumerate() {
        for item in &detections {
          debug!(
            "batch {} id:{} prob:{} rect:{:?}",
            index, item.class_id, item.score, item.rect
          );
        }
        output
          .render_result(&source, image, &detections)
          .with_context(|| format!("写出结果失败: {}", source.display()))?;
      }
    }

    let wall_time = started.elapsed();
    let summary = match tracker.finalize(tracker.stats().image_count, wall_time) {
      Ok(summary) => {
        info!("推理吞吐量 (仅推理): {:.2} FPS", summary.fps);
        info!("总耗时: {:.2?}", wall_time);
        info!("平均推理时间: {:.6} 秒", summary.avg_inference_secs);
        if summary.skipped_images > 0 {
          warn!("共有 {} 张图像解码失败被跳过", summary.skipped_images);
        }
        Some(summary)
      }
      Err(e) => {
        warn!("{}", e);
        None
      }
    };

    info!("任务完成，退出");
    Ok(RunReport {
      iterations,
      wall_time,
      stats: tracker.into_stats(),
      summary,
    })
  }
}
