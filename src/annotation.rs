// 该文件是 Huakuang （画框） 项目的一部分。
// src/annotation.rs - 真值标注与检测结果
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

use std::{fs::File, io::BufReader, path::Path};

use image::GrayImage;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  boxes::{BoxError, BoxTable},
  mask::{self, GtMasks, MaskError, Rle},
};

const GT_BBOXES_KEY: &str = "gt_bboxes";
const GT_LABELS_KEY: &str = "gt_labels";

#[derive(Error, Debug)]
pub enum AnnotationError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标注应为 JSON 对象, 实际为 {0}")]
  NotAnObject(&'static str),
  #[error("缺少必需字段 '{0}'")]
  MissingKey(&'static str),
  #[error("检测结果应为列表或 {{bbox, segm}} 对象, 实际为 {0}")]
  ResultShape(&'static str),
  #[error("检测框错误: {0}")]
  BoxError(#[from] BoxError),
  #[error("掩码错误: {0}")]
  MaskError(#[from] MaskError),
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// 读取 JSON 文件
pub fn read_json(path: impl AsRef<Path>) -> Result<Value, AnnotationError> {
  let reader = BufReader::new(File::open(path)?);
  Ok(serde_json::from_reader(reader)?)
}

/// 单张图像的真值标注
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Annotation {
  pub gt_bboxes: BoxTable,
  pub gt_labels: Vec<u32>,
  #[serde(default)]
  pub gt_masks: Option<GtMasks>,
}

impl Annotation {
  pub fn new(gt_bboxes: BoxTable, gt_labels: Vec<u32>) -> Self {
    Self {
      gt_bboxes,
      gt_labels,
      gt_masks: None,
    }
  }

  pub fn with_masks(mut self, gt_masks: GtMasks) -> Self {
    self.gt_masks = Some(gt_masks);
    self
  }

  /// 从 JSON 值解析，`gt_bboxes` 与 `gt_labels` 为必需字段
  pub fn from_json(value: Value) -> Result<Self, AnnotationError> {
    let Some(object) = value.as_object() else {
      error!("标注应为 JSON 对象, 实际为 {}", json_kind(&value));
      return Err(AnnotationError::NotAnObject(json_kind(&value)));
    };
    for key in [GT_BBOXES_KEY, GT_LABELS_KEY] {
      if !object.contains_key(key) {
        error!("标注缺少必需字段 '{}'", key);
        return Err(AnnotationError::MissingKey(key));
      }
    }
    Ok(serde_json::from_value(value)?)
  }

  /// 真值掩码的稠密形式
  pub fn dense_masks(&self, width: u32, height: u32) -> Result<Option<Vec<GrayImage>>, MaskError> {
    self
      .gt_masks
      .as_ref()
      .map(|masks| masks.to_dense(width, height))
      .transpose()
  }
}

/// 检测器输出的分割结果，按类别分组
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SegmResult {
  PerClass(Vec<Vec<Rle>>),
  /// 掩码打分类检测器（如 MS R-CNN）的输出：掩码外再包一层，并附带每个掩码的得分
  WithMaskScores {
    masks: Vec<Vec<Rle>>,
    mask_scores: Vec<Vec<f32>>,
  },
}

impl SegmResult {
  /// 取主掩码
  ///
  /// 掩码打分类检测器把 (掩码, 掩码得分) 一起返回，绘制只需要掩码本身，
  /// 这里丢弃外层包装。其他检测器的输出原样返回。
  pub fn into_primary(self) -> Vec<Vec<Rle>> {
    match self {
      SegmResult::PerClass(masks) => masks,
      SegmResult::WithMaskScores { masks, .. } => {
        debug!("丢弃掩码得分, 只保留主掩码");
        masks
      }
    }
  }
}

#[derive(Deserialize)]
struct PairResult {
  bbox: Vec<BoxTable>,
  #[serde(default)]
  segm: Option<SegmResult>,
}

/// 检测结果：按类别分组的检测框，可附带按类别分组的掩码
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
  Boxes(Vec<BoxTable>),
  WithMasks {
    bbox: Vec<BoxTable>,
    segm: Option<SegmResult>,
  },
}

/// 展平后的检测结果，与单组绘制的输入一一对应
#[derive(Debug, Clone, PartialEq)]
pub struct FlatDetections {
  pub boxes: BoxTable,
  pub labels: Vec<u32>,
  pub masks: Option<Vec<Rle>>,
}

impl DetectionResult {
  /// 从 JSON 值解析
  ///
  /// - 列表：每个类别一组检测框
  /// - 对象 `{"bbox": [...], "segm": [...]}`：检测框与掩码
  pub fn from_json(value: Value) -> Result<Self, AnnotationError> {
    if let Value::Object(object) = &value
      && !object.contains_key("bbox")
    {
      error!("检测结果缺少 'bbox' 字段");
      return Err(AnnotationError::MissingKey("bbox"));
    }

    match value {
      Value::Array(_) => Ok(DetectionResult::Boxes(serde_json::from_value(value)?)),
      Value::Object(_) => {
        let PairResult { bbox, segm } = serde_json::from_value(value)?;
        Ok(DetectionResult::WithMasks { bbox, segm })
      }
      other => {
        error!("无法识别的检测结果类型: {}", json_kind(&other));
        Err(AnnotationError::ResultShape(json_kind(&other)))
      }
    }
  }

  /// 展平各类别的检测框与掩码，并为每个框生成其所在分组序号作为标签
  pub fn flatten(self) -> Result<FlatDetections, AnnotationError> {
    let (groups, segm) = match self {
      DetectionResult::Boxes(groups) => (groups, None),
      DetectionResult::WithMasks { bbox, segm } => (bbox, segm.map(SegmResult::into_primary)),
    };

    let labels: Vec<u32> = groups
      .iter()
      .enumerate()
      .flat_map(|(class, group)| std::iter::repeat_n(class as u32, group.len()))
      .collect();
    let boxes = BoxTable::concat(&groups)?;

    let masks = match segm {
      Some(groups) if !labels.is_empty() => Some(groups.into_iter().flatten().collect()),
      _ => None,
    };

    debug!(
      "展平 {} 个类别, 共 {} 个检测框, 掩码: {}",
      groups.len(),
      labels.len(),
      masks.as_ref().map(Vec::len).unwrap_or(0)
    );

    Ok(FlatDetections {
      boxes,
      labels,
      masks,
    })
  }
}

impl FlatDetections {
  /// 解码掩码，结果按 (实例, 高, 宽) 排列
  pub fn decode_masks(&self) -> Result<Option<Vec<GrayImage>>, MaskError> {
    self.masks.as_deref().map(mask::decode_all).transpose()
  }
}
