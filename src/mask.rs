// 该文件是 Huakuang （画框） 项目的一部分。
// src/mask.rs - 分割掩码解码
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

//! # 分割掩码
//!
//! 所有掩码最终都转换为与图像同尺寸的稠密二值掩码（[`GrayImage`]，前景为 1）。
//! 一组掩码按 (实例, 高, 宽) 排列，即 `Vec<GrayImage>`。
//!
//! 支持的输入形式：
//!
//! - COCO RLE，`counts` 为整数数组（未压缩）或字符串（压缩）
//! - 多边形，每个实例由若干 `[x0, y0, x1, y1, ...]` 组成
//! - 稠密位图

use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const FOREGROUND: Luma<u8> = Luma([1]);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MaskError {
  #[error("RLE 计数之和 {found} 与掩码像素数 {expected} 不一致")]
  RleLength { expected: u64, found: u64 },
  #[error("压缩 RLE 字符串在第 {0} 字节处非法")]
  InvalidCompressedCounts(usize),
  #[error("压缩 RLE 解码得到的计数 {0} 超出 0..=u32::MAX")]
  CountOutOfRange(i64),
  #[error("多边形坐标数 {0} 无效, 需要至少 3 个点的偶数个坐标")]
  InvalidPolygon(usize),
  #[error("掩码尺寸 {found:?} 与图像尺寸 {expected:?} 不一致")]
  ShapeMismatch {
    expected: (u32, u32),
    found: (u32, u32),
  },
}

/// COCO 格式的游程编码
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rle {
  /// [高, 宽]
  pub size: [u32; 2],
  pub counts: RleCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RleCounts {
  Uncompressed(Vec<u32>),
  Compressed(String),
}

impl Rle {
  pub fn height(&self) -> u32 {
    self.size[0]
  }

  pub fn width(&self) -> u32 {
    self.size[1]
  }

  /// 解码为稠密掩码
  ///
  /// 计数从背景开始交替，按列优先顺序填充。
  pub fn decode(&self) -> Result<GrayImage, MaskError> {
    let counts = match &self.counts {
      RleCounts::Uncompressed(counts) => counts.clone(),
      RleCounts::Compressed(s) => decode_compressed_counts(s)?,
    };

    let (height, width) = (self.height(), self.width());
    let expected = height as u64 * width as u64;
    let found = counts.iter().map(|&c| c as u64).sum::<u64>();
    if found != expected {
      return Err(MaskError::RleLength { expected, found });
    }

    let mut mask = GrayImage::new(width, height);
    let mut position = 0u64;
    let mut value = 0u8;
    for count in counts {
      if value == 1 {
        for index in position..position + count as u64 {
          let x = (index / height as u64) as u32;
          let y = (index % height as u64) as u32;
          mask.put_pixel(x, y, FOREGROUND);
        }
      }
      position += count as u64;
      value ^= 1;
    }

    Ok(mask)
  }
}

/// 解码 COCO 压缩 RLE 字符串
///
/// 每个计数以 5 位一组、低位在前写成 ASCII 字符（'0' 起始），第 6 位表示后续
/// 还有分组，最后一组的第 5 位为符号位。从第 3 个计数开始存储的是与前两个计数的差值。
pub fn decode_compressed_counts(s: &str) -> Result<Vec<u32>, MaskError> {
  let bytes = s.as_bytes();
  let mut counts: Vec<i64> = Vec::new();
  let mut p = 0;

  while p < bytes.len() {
    let mut x: i64 = 0;
    let mut k = 0;
    loop {
      let byte = *bytes.get(p).ok_or(MaskError::InvalidCompressedCounts(p))?;
      if !(48..48 + 64).contains(&byte) || k >= 12 {
        return Err(MaskError::InvalidCompressedCounts(p));
      }
      let c = (byte - 48) as i64;
      x |= (c & 0x1f) << (5 * k);
      p += 1;
      k += 1;
      if c & 0x20 == 0 {
        if c & 0x10 != 0 {
          x |= -1i64 << (5 * k);
        }
        break;
      }
    }
    if counts.len() > 2 {
      x += counts[counts.len() - 2];
    }
    counts.push(x);
  }

  counts
    .into_iter()
    .map(|c| u32::try_from(c).map_err(|_| MaskError::CountOutOfRange(c)))
    .collect()
}

/// 将一个实例的多边形栅格化为稠密掩码
pub fn polygons_to_mask(
  polygons: &[Vec<f32>],
  width: u32,
  height: u32,
) -> Result<GrayImage, MaskError> {
  let mut mask = GrayImage::new(width, height);
  for polygon in polygons {
    if polygon.len() < 6 || polygon.len() % 2 != 0 {
      return Err(MaskError::InvalidPolygon(polygon.len()));
    }

    let mut points: Vec<Point<i32>> = polygon
      .chunks_exact(2)
      .map(|xy| Point::new(xy[0].round() as i32, xy[1].round() as i32))
      .collect();
    points.dedup();
    // draw_polygon_mut 要求首尾不重合
    while points.len() > 1 && points.first() == points.last() {
      points.pop();
    }

    if points.len() < 3 {
      debug!("多边形退化为 {} 个点, 跳过", points.len());
      continue;
    }
    draw_polygon_mut(&mut mask, &points, FOREGROUND);
  }
  Ok(mask)
}

/// 校验掩码数量之外的尺寸约束：每个掩码都与图像同尺寸
pub fn check_shapes(masks: &[GrayImage], width: u32, height: u32) -> Result<(), MaskError> {
  for mask in masks {
    if mask.dimensions() != (width, height) {
      return Err(MaskError::ShapeMismatch {
        expected: (width, height),
        found: mask.dimensions(),
      });
    }
  }
  Ok(())
}

/// 批量解码 RLE，结果按 (实例, 高, 宽) 排列
pub fn decode_all(rles: &[Rle]) -> Result<Vec<GrayImage>, MaskError> {
  rles.iter().map(Rle::decode).collect()
}

/// 标注中的真值掩码
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum GtMasks {
  /// 每个实例一张 [高][宽] 的位图
  Bitmap(Vec<Vec<Vec<u8>>>),
  /// 每个实例若干多边形
  Polygon(Vec<Vec<Vec<f32>>>),
  /// 每个实例一个 RLE
  Rle(Vec<Rle>),
}

impl GtMasks {
  pub fn len(&self) -> usize {
    match self {
      GtMasks::Bitmap(masks) => masks.len(),
      GtMasks::Polygon(masks) => masks.len(),
      GtMasks::Rle(masks) => masks.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 转换为与图像同尺寸的稠密掩码
  pub fn to_dense(&self, width: u32, height: u32) -> Result<Vec<GrayImage>, MaskError> {
    let masks = match self {
      GtMasks::Bitmap(bitmaps) => bitmaps
        .iter()
        .map(|rows| bitmap_to_mask(rows, width, height))
        .collect::<Result<Vec<_>, _>>()?,
      GtMasks::Polygon(instances) => instances
        .iter()
        .map(|polygons| polygons_to_mask(polygons, width, height))
        .collect::<Result<Vec<_>, _>>()?,
      GtMasks::Rle(rles) => decode_all(rles)?,
    };
    check_shapes(&masks, width, height)?;
    Ok(masks)
  }
}

fn bitmap_to_mask(rows: &[Vec<u8>], width: u32, height: u32) -> Result<GrayImage, MaskError> {
  let found = (
    rows.first().map(|row| row.len()).unwrap_or(0) as u32,
    rows.len() as u32,
  );
  if found != (width, height) || rows.iter().any(|row| row.len() != width as usize) {
    return Err(MaskError::ShapeMismatch {
      expected: (width, height),
      found,
    });
  }

  Ok(GrayImage::from_fn(width, height, |x, y| {
    Luma([u8::from(rows[y as usize][x as usize] != 0)])
  }))
}
