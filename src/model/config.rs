// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/config.rs - 检测器配置
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

//! 检测器配置以 URL 表示：
//!
//! ```text
//! <后端>://<模型定义文件>?net=yolov5&precision=fp16&thresh=0.6&nms=0.3&batch=1
//!                        &weights=<权重文件>&calibration=<校准图像列表>
//! ```
//!
//! 方案名选择检测后端，路径为模型定义文件，其余选项都在查询参数中。

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, url_file_path};

const DEFAULT_DETECT_THRESH: f32 = 0.5;
const DEFAULT_DETECT_NMS: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorConfigError {
  #[error("未知的检测后端: {0}")]
  UnknownBackend(String),
  #[error("未知的配置项: {0}")]
  UnknownKey(String),
  #[error("配置项 {key} 的值无效: {value}")]
  InvalidValue { key: &'static str, value: String },
  #[error("配置项 {key} 超出范围 [0, 1]: {value}")]
  OutOfRange { key: &'static str, value: f32 },
  #[error("批次大小必须大于 0")]
  ZeroBatchSize,
  #[error("缺少模型定义文件路径")]
  MissingModelPath,
  #[error("模型定义文件路径不是合法的 UTF-8: {0}")]
  InvalidPath(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetType {
  YoloV3,
  YoloV4,
  YoloV5,
}

impl FromStr for NetType {
  type Err = DetectorConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "yolov3" => Ok(NetType::YoloV3),
      "yolov4" => Ok(NetType::YoloV4),
      "yolov5" => Ok(NetType::YoloV5),
      _ => Err(DetectorConfigError::InvalidValue {
        key: "net",
        value: s.to_string(),
      }),
    }
  }
}

/// 推理精度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
  Int8,
  Fp16,
  Fp32,
}

impl FromStr for Precision {
  type Err = DetectorConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "int8" => Ok(Precision::Int8),
      "fp16" => Ok(Precision::Fp16),
      "fp32" => Ok(Precision::Fp32),
      _ => Err(DetectorConfigError::InvalidValue {
        key: "precision",
        value: s.to_string(),
      }),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorConfig {
  pub backend: String,
  pub net_type: NetType,
  pub model_cfg: PathBuf,
  pub model_weights: Option<PathBuf>,
  pub calibration_list: Option<PathBuf>,
  pub precision: Precision,
  pub detect_thresh: f32,
  pub detect_nms: f32,
  pub batch_size: NonZeroUsize,
}

impl DetectorConfig {
  pub fn new(backend: impl Into<String>, model_cfg: impl Into<PathBuf>) -> Self {
    Self {
      backend: backend.into(),
      net_type: NetType::YoloV3,
      model_cfg: model_cfg.into(),
      model_weights: None,
      calibration_list: None,
      precision: Precision::Fp32,
      detect_thresh: DEFAULT_DETECT_THRESH,
      detect_nms: DEFAULT_DETECT_NMS,
      batch_size: NonZeroUsize::MIN,
    }
  }

  pub fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
    self.batch_size = batch_size;
    self
  }
}

fn parse_threshold(key: &'static str, value: &str) -> Result<f32, DetectorConfigError> {
  let parsed: f32 = value.parse().map_err(|_| DetectorConfigError::InvalidValue {
    key,
    value: value.to_string(),
  })?;
  if !(0.0..=1.0).contains(&parsed) {
    return Err(DetectorConfigError::OutOfRange { key, value: parsed });
  }
  Ok(parsed)
}

fn parse_batch_size(value: &str) -> Result<NonZeroUsize, DetectorConfigError> {
  let parsed: usize = value.parse().map_err(|_| DetectorConfigError::InvalidValue {
    key: "batch",
    value: value.to_string(),
  })?;
  NonZeroUsize::new(parsed).ok_or(DetectorConfigError::ZeroBatchSize)
}

impl FromUrl for DetectorConfig {
  type Error = DetectorConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.path().is_empty() || url.path() == "/" {
      return Err(DetectorConfigError::MissingModelPath);
    }

    let mut config = DetectorConfig::new(url.scheme(), url_file_path(url)?);
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "net" => config.net_type = value.parse()?,
        "precision" => config.precision = value.parse()?,
        "weights" => config.model_weights = Some(PathBuf::from(value.as_ref())),
        "calibration" => config.calibration_list = Some(PathBuf::from(value.as_ref())),
        "thresh" => config.detect_thresh = parse_threshold("thresh", &value)?,
        "nms" => config.detect_nms = parse_threshold("nms", &value)?,
        "batch" => config.batch_size = parse_batch_size(&value)?,
        other => return Err(DetectorConfigError::UnknownKey(other.to_string())),
      }
    }

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(s: &str) -> Result<DetectorConfig, DetectorConfigError> {
    DetectorConfig::from_url(&Url::parse(s).unwrap())
  }

  #[test]
  fn parses_full_configuration() {
    let config = parse(
      "replay:///models/yolov5m.cfg?net=yolov5&precision=fp16&thresh=0.6&nms=0.3&batch=4\
       &weights=/models/best.weights&calibration=/models/calibration_images.txt",
    )
    .unwrap();

    assert_eq!(config.backend, "replay");
    assert_eq!(config.model_cfg, PathBuf::from("/models/yolov5m.cfg"));
    assert_eq!(config.net_type, NetType::YoloV5);
    assert_eq!(config.precision, Precision::Fp16);
    assert_eq!(config.detect_thresh, 0.6);
    assert_eq!(config.detect_nms, 0.3);
    assert_eq!(config.batch_size.get(), 4);
    assert_eq!(
      config.model_weights.as_deref(),
      Some(std::path::Path::new("/models/best.weights"))
    );
    assert!(config.calibration_list.is_some());
  }

  #[test]
  fn defaults_apply_when_query_is_empty() {
    let config = parse("replay:///models/yolov3.cfg").unwrap();
    assert_eq!(config.net_type, NetType::YoloV3);
    assert_eq!(config.precision, Precision::Fp32);
    assert_eq!(config.batch_size.get(), 1);
    assert!(config.model_weights.is_none());
  }

  #[test]
  fn rejects_malformed_options() {
    assert!(matches!(
      parse("replay:///m.cfg?precision=fp64"),
      Err(DetectorConfigError::InvalidValue { key: "precision", .. })
    ));
    assert!(matches!(
      parse("replay:///m.cfg?thresh=1.5"),
      Err(DetectorConfigError::OutOfRange { key: "thresh", .. })
    ));
    assert!(matches!(
      parse("replay:///m.cfg?nms=abc"),
      Err(DetectorConfigError::InvalidValue { key: "nms", .. })
    ));
    assert!(matches!(
      parse("replay:///m.cfg?batch=0"),
      Err(DetectorConfigError::ZeroBatchSize)
    ));
    assert!(matches!(
      parse("replay:///m.cfg?gpu=1"),
      Err(DetectorConfigError::UnknownKey(_))
    ));
    assert!(matches!(
      parse("replay:///"),
      Err(DetectorConfigError::MissingModelPath)
    ));
  }

  #[test]
  fn model_path_is_percent_decoded() {
    let config = parse("replay:///models/my models/yolov5 s.cfg").unwrap();
    assert_eq!(
      config.model_cfg,
      PathBuf::from("/models/my models/yolov5 s.cfg")
    );
  }
}
