// 该文件是 Huakuang （画框） 项目的一部分。
// src/output/draw.rs - 检测框与标签绘制
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
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::boxes::BoxRow;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 13.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;

// 坐标截断范围，远大于任何图像尺寸
const BOX_COORD_LIMIT: i64 = 1 << 32;
const LABEL_COORD_LIMIT: i32 = 1 << 24;

const SYSTEM_FONT_PATHS: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体读取错误: {0}")]
  FontIoError(#[from] std::io::Error),
  #[error("无法解析字体文件: {0}")]
  InvalidFont(String),
}

/// 检测框绘制器
///
/// 没有可用字体时只绘制检测框，跳过标签文本。
pub struct Draw {
  font: Option<FontVec>,
  font_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    Self::with_system_font()
  }
}

impl Draw {
  /// 不绘制标签文本
  pub fn without_font() -> Self {
    Self {
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }

  /// 从常见的系统字体位置加载字体
  pub fn with_system_font() -> Self {
    for path in SYSTEM_FONT_PATHS {
      if let Ok(font_data) = std::fs::read(path)
        && let Ok(font) = FontVec::try_from_vec(font_data)
      {
        info!("加载系统字体: {}", path);
        return Self {
          font: Some(font),
          font_scale: PxScale::from(LABEL_FONT_SIZE),
        };
      }
    }

    debug!("未找到系统字体, 将跳过标签文本");
    Self::without_font()
  }

  pub fn with_font_path(path: &Path) -> Result<Self, DrawError> {
    let font_data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(font_data)
      .map_err(|_| DrawError::InvalidFont(path.display().to_string()))?;
    Ok(Self {
      font: Some(font),
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    })
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 绘制空心矩形，线宽向框内延伸
  ///
  /// 线宽不小于框的一半时整个框被填满；超出图像的部分被裁掉。
  pub fn draw_box(&self, image: &mut RgbImage, corners: [f32; 4], color: Rgb<u8>, thickness: u32) {
    let [x1, y1, x2, y2] = corners.map(|v| (v as i64).clamp(-BOX_COORD_LIMIT, BOX_COORD_LIMIT));
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));
    let t = i64::from(thickness.max(1));

    // 上、下、左、右四条边带
    let bands = [
      (left, right, top, (top + t - 1).min(bottom)),
      (left, right, (bottom - t + 1).max(top), bottom),
      (left, (left + t - 1).min(right), top, bottom),
      ((right - t + 1).max(left), right, top, bottom),
    ];
    for (x_min, x_max, y_min, y_max) in bands {
      fill_clipped(image, x_min, x_max, y_min, y_max, color);
    }
  }

  /// 在 (x, y) 上方绘制标签文本
  pub fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let Some(font) = &self.font else {
      debug!("无字体, 跳过标签: {}", text);
      return;
    };

    let x = x.clamp(-LABEL_COORD_LIMIT, LABEL_COORD_LIMIT);
    let y = y.clamp(-LABEL_COORD_LIMIT, LABEL_COORD_LIMIT);
    let text_y = y - LABEL_TEXT_VERTICAL_PADDING - self.font_scale.y.ceil() as i32;
    draw_text_mut(image, color, x, text_y, self.font_scale, font, text);
  }

  /// 绘制检测框，并在框的上边缘上方写出标签
  pub fn draw_bbox_with_label(
    &self,
    image: &mut RgbImage,
    row: BoxRow<'_>,
    label: &str,
    color: Rgb<u8>,
    thickness: u32,
  ) {
    let corners = row.corners();
    self.draw_box(image, corners, color, thickness);

    let label = label_with_score(label, row);
    self.draw_label(image, corners[0] as i32, corners[1] as i32, &label, color);
  }
}

/// 标签文本：有分数时追加 `|分数`，保留两位小数
pub fn label_with_score(label: &str, row: BoxRow<'_>) -> String {
  match row.score() {
    Some(score) => format!("{}|{:.2}", label, score),
    None => label.to_string(),
  }
}

/// 填充闭区间矩形与图像的交集
fn fill_clipped(
  image: &mut RgbImage,
  x_min: i64,
  x_max: i64,
  y_min: i64,
  y_max: i64,
  color: Rgb<u8>,
) {
  let x_min = x_min.max(0);
  let y_min = y_min.max(0);
  let x_max = x_max.min(i64::from(image.width()) - 1);
  let y_max = y_max.min(i64::from(image.height()) - 1);
  if x_min > x_max || y_min > y_max {
    return;
  }

  let rect = Rect::at(x_min as i32, y_min as i32)
    .of_size((x_max - x_min + 1) as u32, (y_max - y_min + 1) as u32);
  draw_filled_rect_mut(image, rect, color);
}
