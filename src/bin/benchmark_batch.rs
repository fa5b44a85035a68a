// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/benchmark_batch.rs - 图像目录批量推理基准
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
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use url::Url;

use shanan_bench::{
  FromUrl,
  input::ImageFolderInput,
  model::{DetectorConfig, DetectorWrapper},
  output::{
    DirectoryRecordOutput,
    draw::{DEFAULT_LABEL_FONT_SIZE, Draw},
  },
  stats::Summary,
  task::{BatchTask, Task},
  url_file_path,
};

/// 图像目录批量推理基准参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器配置，例如 replay:///path/rec.json?net=yolov5&precision=fp16&thresh=0.6&nms=0.3&batch=1
  #[arg(long, value_name = "DETECTOR")]
  pub detector: Url,
  /// 输入图像目录，例如 folder:///data/images
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出目录，例如 folder:///data/results
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 覆盖检测器配置中的批次大小
  #[arg(long, value_name = "N")]
  pub batch_size: Option<NonZeroUsize>,
  /// 标签字体文件（TrueType），缺省使用内置点阵字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 标签字号（像素），仅在指定字体时生效
  #[arg(long, default_value_t = DEFAULT_LABEL_FONT_SIZE, value_name = "PX")]
  pub font_size: f32,
  /// 输出目录不存在时创建
  #[arg(long)]
  pub create_output: bool,
  /// 将运行汇总写为 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunRecord<'a> {
  started_at: String,
  detector: &'a DetectorConfig,
  input: &'a str,
  output: &'a str,
  iterations: usize,
  summary: Option<&'a Summary>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let started_at = chrono::Utc::now();

  info!("检测器配置: {}", args.detector);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut config = DetectorConfig::from_url(&args.detector)?;
  if let Some(batch_size) = args.batch_size {
    config = config.with_batch_size(batch_size);
  }

  let model = DetectorWrapper::from_config(&config)?;
  let input = ImageFolderInput::from_url(&args.input)?;

  if args.create_output {
    let directory = url_file_path(&args.output)?;
    std::fs::create_dir_all(&directory)
      .with_context(|| format!("无法创建输出目录: {}", directory.display()))?;
  }
  let draw = match &args.font {
    Some(path) => Draw::with_font_file(path)
      .with_context(|| format!("无法加载字体: {}", path.display()))?
      .font_size(args.font_size),
    None => Draw::default(),
  };
  let output = DirectoryRecordOutput::from_url(&args.output)?.with_draw(draw);

  let report = BatchTask::new(config.batch_size).run_task(input, model, output)?;

  if let Some(path) = &args.report {
    let record = RunRecord {
      started_at: started_at.to_rfc3339(),
      detector: &config,
      input: args.input.as_str(),
      output: args.output.as_str(),
      iterations: report.iterations,
      summary: report.summary.as_ref(),
    };
    let file = std::fs::File::create(path)
      .with_context(|| format!("无法创建汇总文件: {}", path.display()))?;
    serde_json::to_writer_pretty(file, &record)?;
    info!("运行汇总已写入: {}", path.display());
  }

  Ok(())
}
