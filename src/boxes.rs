// 该文件是 Huakuang （画框） 项目的一部分。
// src/boxes.rs - 检测框表
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

use serde::Deserialize;
use thiserror::Error;

/// 不带分数的列数：x1, y1, x2, y2
pub const PLAIN_COLUMNS: usize = 4;
/// 带分数的列数：x1, y1, x2, y2, score
pub const SCORED_COLUMNS: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum BoxError {
  #[error("检测框列数应为 4 或 5, 实际为 {0}")]
  ColumnCount(usize),
  #[error("第 {row} 行列数为 {found}, 与首行列数 {expected} 不一致")]
  RaggedRow {
    row: usize,
    expected: usize,
    found: usize,
  },
  #[error("数据长度 {len} 不是列数 {columns} 的整数倍")]
  DataLength { len: usize, columns: usize },
  #[error("检测框数量 {boxes} 与标签数量 {labels} 不一致")]
  LabelCount { boxes: usize, labels: usize },
  #[error("检测框数量 {boxes} 与掩码数量 {masks} 不一致")]
  MaskCount { boxes: usize, masks: usize },
  #[error("按分数阈值 {threshold} 过滤需要 5 列检测框, 实际为 {columns} 列")]
  ScoresRequired { threshold: f32, columns: usize },
  #[error("各类别检测框列数不一致: {expected} 与 {found}")]
  GroupColumns { expected: usize, found: usize },
}

/// 按行存储的检测框表，每行 4 列或 5 列
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Vec<f32>>")]
pub struct BoxTable {
  columns: usize,
  data: Vec<f32>,
}

/// 检测框表中的一行
#[derive(Debug, Clone, Copy)]
pub struct BoxRow<'a>(&'a [f32]);

impl BoxRow<'_> {
  /// [x1, y1, x2, y2]
  pub fn corners(&self) -> [f32; 4] {
    [self.0[0], self.0[1], self.0[2], self.0[3]]
  }

  pub fn score(&self) -> Option<f32> {
    self.0.get(PLAIN_COLUMNS).copied()
  }
}

fn check_columns(columns: usize) -> Result<(), BoxError> {
  match columns {
    PLAIN_COLUMNS | SCORED_COLUMNS => Ok(()),
    other => Err(BoxError::ColumnCount(other)),
  }
}

impl TryFrom<Vec<Vec<f32>>> for BoxTable {
  type Error = BoxError;

  fn try_from(rows: Vec<Vec<f32>>) -> Result<Self, Self::Error> {
    Self::from_rows(&rows)
  }
}

impl BoxTable {
  pub fn new(columns: usize, data: Vec<f32>) -> Result<Self, BoxError> {
    check_columns(columns)?;
    if data.len() % columns != 0 {
      return Err(BoxError::DataLength {
        len: data.len(),
        columns,
      });
    }
    Ok(Self { columns, data })
  }

  pub fn empty(columns: usize) -> Result<Self, BoxError> {
    Self::new(columns, Vec::new())
  }

  /// 由行构造；空输入得到 4 列的空表
  pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, BoxError> {
    let Some(first) = rows.first() else {
      return Self::empty(PLAIN_COLUMNS);
    };
    let columns = first.as_ref().len();
    check_columns(columns)?;

    let mut data = Vec::with_capacity(rows.len() * columns);
    for (row, values) in rows.iter().enumerate() {
      let values = values.as_ref();
      if values.len() != columns {
        return Err(BoxError::RaggedRow {
          row,
          expected: columns,
          found: values.len(),
        });
      }
      data.extend_from_slice(values);
    }
    Ok(Self { columns, data })
  }

  /// 纵向拼接多张表，空表不参与列数校验
  pub fn concat(tables: &[BoxTable]) -> Result<Self, BoxError> {
    let mut non_empty = tables.iter().filter(|table| !table.is_empty());
    let Some(first) = non_empty.next() else {
      return Self::empty(SCORED_COLUMNS);
    };

    let mut data = first.data.clone();
    for table in non_empty {
      if table.columns != first.columns {
        return Err(BoxError::GroupColumns {
          expected: first.columns,
          found: table.columns,
        });
      }
      data.extend_from_slice(&table.data);
    }
    Ok(Self {
      columns: first.columns,
      data,
    })
  }

  pub fn columns(&self) -> usize {
    self.columns
  }

  pub fn has_scores(&self) -> bool {
    self.columns == SCORED_COLUMNS
  }

  pub fn len(&self) -> usize {
    self.data.len() / self.columns
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn row(&self, index: usize) -> BoxRow<'_> {
    let start = index * self.columns;
    BoxRow(&self.data[start..start + self.columns])
  }

  pub fn rows(&self) -> impl Iterator<Item = BoxRow<'_>> {
    self.data.chunks_exact(self.columns).map(BoxRow)
  }

  /// 标签数量必须与行数一致
  pub fn check_labels(&self, labels: &[u32]) -> Result<(), BoxError> {
    if labels.len() != self.len() {
      return Err(BoxError::LabelCount {
        boxes: self.len(),
        labels: labels.len(),
      });
    }
    Ok(())
  }

  /// 返回分数严格大于阈值的行号，保持原有顺序
  pub fn keep_above(&self, threshold: f32) -> Result<Vec<usize>, BoxError> {
    if !self.has_scores() {
      return Err(BoxError::ScoresRequired {
        threshold,
        columns: self.columns,
      });
    }
    Ok(
      self
        .rows()
        .enumerate()
        .filter(|(_, row)| row.score().is_some_and(|score| score > threshold))
        .map(|(index, _)| index)
        .collect(),
    )
  }

  /// 按行号选取子表
  pub fn select(&self, indices: &[usize]) -> Self {
    let mut data = Vec::with_capacity(indices.len() * self.columns);
    for &index in indices {
      let start = index * self.columns;
      data.extend_from_slice(&self.data[start..start + self.columns]);
    }
    Self {
      columns: self.columns,
      data,
    }
  }
}
