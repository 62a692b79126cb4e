// 该文件是 Huakuang （画框） 项目的一部分。
// src/color.rs - 类别颜色映射
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

use std::collections::BTreeMap;

use image::Rgb;
use serde::Deserialize;
use thiserror::Error;

/// 真值默认颜色（RGB）
pub const GT_COLOR: Rgb<u8> = Rgb([61, 102, 255]);
/// 检测结果默认颜色（RGB）
pub const DET_COLOR: Rgb<u8> = Rgb([241, 101, 72]);

/// 文档版面类别
pub const DOCUMENT_LAYOUT_CLASSES: [&str; 4] = ["caption", "figure", "table", "formula"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ColorError {
  #[error("类别 '{0}' 不在颜色映射中")]
  UnknownClass(String),
  #[error("未知的颜色名称: '{0}'")]
  UnknownColorName(String),
}

/// 按名称解析颜色
pub fn color_from_name(name: &str) -> Result<Rgb<u8>, ColorError> {
  let rgb = match name.to_ascii_lowercase().as_str() {
    "red" => [255, 0, 0],
    "green" => [0, 255, 0],
    "blue" => [0, 0, 255],
    "cyan" => [0, 255, 255],
    "yellow" => [255, 255, 0],
    "magenta" => [255, 0, 255],
    "white" => [255, 255, 255],
    "black" => [0, 0, 0],
    _ => return Err(ColorError::UnknownColorName(name.to_string())),
  };
  Ok(Rgb(rgb))
}

/// 配置文件中的颜色写法：名称或 `[r, g, b]`
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ColorSpec {
  Name(String),
  Rgb([u8; 3]),
}

impl TryFrom<ColorSpec> for Rgb<u8> {
  type Error = ColorError;

  fn try_from(spec: ColorSpec) -> Result<Self, Self::Error> {
    match spec {
      ColorSpec::Name(name) => color_from_name(&name),
      ColorSpec::Rgb(rgb) => Ok(Rgb(rgb)),
    }
  }
}

/// 类别名称到颜色的映射
///
/// 映射是封闭的：查找不存在的类别名称返回 [`ColorError::UnknownClass`]，
/// 不做任何回退着色。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, ColorSpec>")]
pub struct ColorScheme {
  colors: BTreeMap<String, Rgb<u8>>,
}

impl TryFrom<BTreeMap<String, ColorSpec>> for ColorScheme {
  type Error = ColorError;

  fn try_from(specs: BTreeMap<String, ColorSpec>) -> Result<Self, Self::Error> {
    let colors = specs
      .into_iter()
      .map(|(class, spec)| Ok((class, Rgb::try_from(spec)?)))
      .collect::<Result<_, ColorError>>()?;
    Ok(Self { colors })
  }
}

impl Default for ColorScheme {
  fn default() -> Self {
    Self::document_layout()
  }
}

impl ColorScheme {
  pub fn new() -> Self {
    Self {
      colors: BTreeMap::new(),
    }
  }

  /// 文档版面分析的预设配色
  pub fn document_layout() -> Self {
    Self::new()
      .with_class("caption", Rgb([255, 0, 0]))
      .with_class("figure", Rgb([0, 0, 255]))
      .with_class("table", Rgb([0, 255, 0]))
      .with_class("formula", Rgb([255, 255, 0]))
  }

  /// 所有类别使用同一种颜色
  pub fn uniform<I, S>(classes: I, color: Rgb<u8>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    classes
      .into_iter()
      .fold(Self::new(), |scheme, class| scheme.with_class(class, color))
  }

  pub fn with_class(mut self, class: impl Into<String>, color: Rgb<u8>) -> Self {
    self.colors.insert(class.into(), color);
    self
  }

  pub fn lookup(&self, class: &str) -> Result<Rgb<u8>, ColorError> {
    self
      .colors
      .get(class)
      .copied()
      .ok_or_else(|| ColorError::UnknownClass(class.to_string()))
  }

  pub fn classes(&self) -> impl Iterator<Item = &str> {
    self.colors.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.colors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn document_layout_colors() {
    let scheme = ColorScheme::document_layout();
    assert_eq!(scheme.lookup("caption"), Ok(Rgb([255, 0, 0])));
    assert_eq!(scheme.lookup("figure"), Ok(Rgb([0, 0, 255])));
    assert_eq!(scheme.lookup("table"), Ok(Rgb([0, 255, 0])));
    assert_eq!(scheme.lookup("formula"), Ok(Rgb([255, 255, 0])));
    assert_eq!(scheme.len(), DOCUMENT_LAYOUT_CLASSES.len());
  }

  #[test]
  fn unknown_class_is_an_error() {
    let scheme = ColorScheme::document_layout();
    assert_eq!(
      scheme.lookup("person"),
      Err(ColorError::UnknownClass("person".to_string()))
    );
  }

  #[test]
  fn uniform_scheme() {
    let scheme = ColorScheme::uniform(DOCUMENT_LAYOUT_CLASSES, GT_COLOR);
    for class in DOCUMENT_LAYOUT_CLASSES {
      assert_eq!(scheme.lookup(class), Ok(GT_COLOR));
    }
  }

  #[test]
  fn deserialize_names_and_triples() {
    let scheme: ColorScheme =
      serde_json::from_str(r#"{"person": "Magenta", "car": [1, 2, 3]}"#).unwrap();
    assert_eq!(scheme.lookup("person"), Ok(Rgb([255, 0, 255])));
    assert_eq!(scheme.lookup("car"), Ok(Rgb([1, 2, 3])));
  }

  #[test]
  fn deserialize_rejects_unknown_color_name() {
    let err = serde_json::from_str::<ColorScheme>(r#"{"person": "mauve"}"#).unwrap_err();
    assert!(err.to_string().contains("mauve"));
  }
}
