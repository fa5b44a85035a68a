// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化与文本记录
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, drawing::draw_text_mut, rect::Rect};
use thiserror::Error;

use crate::model::{BoundingBox, DetectItem};
use crate::output::glyph::{GLYPH_HEIGHT, draw_bitmap_text};

// 绘制常量
const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const LABEL_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: i64 = 2;
const LABEL_OFFSET: i32 = 5; // 标签底边距离框顶的像素
/// 标签字号（像素），仅在使用 TrueType 字体时生效
pub const DEFAULT_LABEL_FONT_SIZE: f32 = 14.0;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 单张图像的渲染结果
#[derive(Debug, Clone)]
pub struct Rendered {
  pub image: RgbImage,
  pub lines: Vec<String>,
}

impl Rendered {
  /// 文本文件内容，每行以换行符结尾
  pub fn text(&self) -> String {
    self.lines.iter().map(|line| format!("{line}\n")).collect()
  }
}

/// 一条检测记录：`<id> <置信度> <x1> <y1> <x2> <y2>`
///
/// 文本中的矩形以左上角和右下角表示，置信度保留六位小数。
pub fn record_line(item: &DetectItem) -> String {
  let BoundingBox { x, y, .. } = item.rect;
  format!(
    "{} {:.6} {} {} {} {}",
    item.class_id,
    item.score,
    x,
    y,
    item.rect.right(),
    item.rect.bottom()
  )
}

pub fn label_text(item: &DetectItem) -> String {
  format!("id:{}  score:{:.2}", item.class_id, item.score)
}

pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  box_color: [u8; 3],
  label_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: DEFAULT_LABEL_FONT_SIZE,
      box_color: BOX_COLOR,
      label_color: LABEL_COLOR,
    }
  }
}

impl Draw {
  /// 使用 TrueType 字体绘制标签；未指定字体时使用内置点阵字体
  pub fn with_font_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)?;
    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  pub fn font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  /// 在图像上绘制检测框与标签，并生成文本记录
  ///
  /// 没有检测结果时图像原样返回。
  pub fn render(&self, mut image: RgbImage, detections: &[DetectItem]) -> Rendered {
    let mut lines = Vec::with_capacity(detections.len());
    for item in detections {
      self.draw_bbox(&mut image, &item.rect);
      self.draw_label(&mut image, &item.rect, &label_text(item));
      lines.push(record_line(item));
    }
    Rendered { image, lines }
  }

  fn draw_bbox(&self, image: &mut RgbImage, rect: &BoundingBox) {
    let color = Rgb(self.box_color);
    // 裁到图像外一圈边框宽度以内，图像内的像素不受影响
    let left = i64::from(rect.x).max(-BOX_THICKNESS);
    let top = i64::from(rect.y).max(-BOX_THICKNESS);
    let right = rect.right().min(i64::from(image.width()) + BOX_THICKNESS);
    let bottom = rect.bottom().min(i64::from(image.height()) + BOX_THICKNESS);

    // 向内加粗
    for t in 0..BOX_THICKNESS {
      let (w, h) = (right - left - 2 * t, bottom - top - 2 * t);
      if w <= 0 || h <= 0 {
        break;
      }
      // 此处 w, h 为正，且各坐标都在图像尺寸加边框宽度以内
      let r = Rect::at((left + t) as i32, (top + t) as i32).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(image, r, color);
    }
  }

  fn draw_label(&self, image: &mut RgbImage, rect: &BoundingBox, label: &str) {
    let color = Rgb(self.label_color);
    let text_height = match &self.font {
      Some(_) => self.font_size.ceil() as i32,
      None => GLYPH_HEIGHT,
    };
    let top = rect.y.saturating_sub(LABEL_OFFSET).saturating_sub(text_height);

    // 标签完全落在图像外时不绘制，字宽按不超过字高估计
    let extent = label.chars().count() as i64 * i64::from(text_height);
    if i64::from(rect.x) + extent <= 0
      || i64::from(top) + i64::from(text_height) <= 0
      || i64::from(rect.x) >= i64::from(image.width())
      || i64::from(top) >= i64::from(image.height())
    {
      return;
    }

    match &self.font {
      Some(font) => {
        draw_text_mut(image, color, rect.x, top, PxScale::from(self.font_size), font, label);
      }
      None => draw_bitmap_text(image, rect.x, top, label, color),
    }
  }
}
