// 该文件是 Huakuang （画框） 项目的一部分。
// src/visualize.rs - 检测结果与真值可视化
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

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use image::{GrayImage, Rgb, RgbImage};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  annotation::{Annotation, AnnotationError, DetectionResult},
  boxes::{BoxError, BoxTable},
  color::{ColorError, ColorScheme, DET_COLOR, GT_COLOR},
  input::{ImageFileInputError, ImageSource},
  mask::{self, MaskError},
  output::{
    ImageViewer, NoViewer, SaveImageFileError, ViewerError,
    draw::{Draw, DrawError},
    save_image,
  },
};

const DEFAULT_THICKNESS: u32 = 2;
const DEFAULT_FONT_SIZE: u32 = 13;

#[derive(Error, Debug)]
pub enum VisualizeError {
  #[error("图像输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("检测框错误: {0}")]
  BoxError(#[from] BoxError),
  #[error("颜色错误: {0}")]
  ColorError(#[from] ColorError),
  #[error("掩码错误: {0}")]
  MaskError(#[from] MaskError),
  #[error("标注错误: {0}")]
  AnnotationError(#[from] AnnotationError),
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("显示错误: {0}")]
  ViewerError(#[from] ViewerError),
  #[error("标签 {label} 超出类别名称表范围 ({classes} 个类别)")]
  LabelOutOfRange { label: u32, classes: usize },
}

/// 单组检测框的绘制选项
#[derive(Debug, Clone)]
pub struct RenderOptions {
  /// 大于零时只绘制分数高于该值的检测框
  pub score_threshold: f32,
  pub scheme: ColorScheme,
  /// 掩码颜色，目前不绘制掩码
  pub mask_color: Option<Rgb<u8>>,
  pub thickness: u32,
  /// 目前不影响文字大小
  pub font_size: u32,
  pub show: bool,
  pub win_name: String,
  /// 零表示等待窗口关闭
  pub wait_time: Duration,
  pub out_file: Option<PathBuf>,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self {
      score_threshold: 0.0,
      scheme: ColorScheme::default(),
      mask_color: None,
      thickness: DEFAULT_THICKNESS,
      font_size: DEFAULT_FONT_SIZE,
      show: false,
      win_name: String::new(),
      wait_time: Duration::ZERO,
      out_file: None,
    }
  }
}

impl RenderOptions {
  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }

  pub fn with_scheme(mut self, scheme: ColorScheme) -> Self {
    self.scheme = scheme;
    self
  }

  pub fn with_mask_color(mut self, mask_color: Option<Rgb<u8>>) -> Self {
    self.mask_color = mask_color;
    self
  }

  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness;
    self
  }

  pub fn with_font_size(mut self, font_size: u32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn with_show(mut self, win_name: impl Into<String>, wait_time: Duration) -> Self {
    self.show = true;
    self.win_name = win_name.into();
    self.wait_time = wait_time;
    self
  }

  pub fn with_out_file(mut self, out_file: impl Into<PathBuf>) -> Self {
    self.out_file = Some(out_file.into());
    self
  }
}

/// 真值与检测结果叠加绘制的选项
#[derive(Debug, Clone)]
pub struct ComposeOptions {
  /// 只作用于检测结果
  pub score_threshold: f32,
  pub gt_scheme: ColorScheme,
  pub det_scheme: ColorScheme,
  pub gt_mask_color: Option<Rgb<u8>>,
  pub det_mask_color: Option<Rgb<u8>>,
  pub thickness: u32,
  pub font_size: u32,
  pub show: bool,
  pub win_name: String,
  pub wait_time: Duration,
  pub out_file: Option<PathBuf>,
}

impl Default for ComposeOptions {
  fn default() -> Self {
    Self {
      score_threshold: 0.0,
      gt_scheme: ColorScheme::default(),
      det_scheme: ColorScheme::default(),
      gt_mask_color: Some(GT_COLOR),
      det_mask_color: Some(DET_COLOR),
      thickness: DEFAULT_THICKNESS,
      font_size: DEFAULT_FONT_SIZE,
      show: false,
      win_name: String::new(),
      wait_time: Duration::ZERO,
      out_file: None,
    }
  }
}

impl ComposeOptions {
  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }

  pub fn with_gt_scheme(mut self, gt_scheme: ColorScheme) -> Self {
    self.gt_scheme = gt_scheme;
    self
  }

  pub fn with_det_scheme(mut self, det_scheme: ColorScheme) -> Self {
    self.det_scheme = det_scheme;
    self
  }

  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness;
    self
  }

  pub fn with_font_size(mut self, font_size: u32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn with_show(mut self, win_name: impl Into<String>, wait_time: Duration) -> Self {
    self.show = true;
    self.win_name = win_name.into();
    self.wait_time = wait_time;
    self
  }

  pub fn with_out_file(mut self, out_file: impl Into<PathBuf>) -> Self {
    self.out_file = Some(out_file.into());
    self
  }

  /// 真值绘制：不过滤、不显示、不保存
  fn ground_truth(&self) -> RenderOptions {
    RenderOptions {
      score_threshold: 0.0,
      scheme: self.gt_scheme.clone(),
      mask_color: self.gt_mask_color,
      thickness: self.thickness,
      font_size: self.font_size,
      show: false,
      win_name: self.win_name.clone(),
      wait_time: self.wait_time,
      out_file: None,
    }
  }

  fn detections(&self) -> RenderOptions {
    RenderOptions {
      score_threshold: self.score_threshold,
      scheme: self.det_scheme.clone(),
      mask_color: self.det_mask_color,
      thickness: self.thickness,
      font_size: self.font_size,
      show: self.show,
      win_name: self.win_name.clone(),
      wait_time: self.wait_time,
      out_file: self.out_file.clone(),
    }
  }
}

fn label_text(label: u32, class_names: Option<&[String]>) -> Result<String, VisualizeError> {
  match class_names {
    Some(names) => names
      .get(label as usize)
      .cloned()
      .ok_or(VisualizeError::LabelOutOfRange {
        label,
        classes: names.len(),
      }),
    None => Ok(format!("cls {}", label)),
  }
}

/// 可视化工具
pub struct Visualizer<V: ImageViewer = NoViewer> {
  draw: Draw,
  viewer: V,
}

impl Default for Visualizer {
  fn default() -> Self {
    Self::new()
  }
}

impl Visualizer {
  pub fn new() -> Self {
    Self {
      draw: Draw::default(),
      viewer: NoViewer,
    }
  }
}

impl<V: ImageViewer> Visualizer<V> {
  pub fn with_viewer<W: ImageViewer>(self, viewer: W) -> Visualizer<W> {
    Visualizer {
      draw: self.draw,
      viewer,
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn with_font_path(self, path: &Path) -> Result<Self, VisualizeError> {
    Ok(self.with_draw(Draw::with_font_path(path)?))
  }

  pub fn viewer(&self) -> &V {
    &self.viewer
  }

  /// 在图像上绘制一组检测框与标签，按需显示和保存
  ///
  /// 掩码只做校验，不绘制。
  pub fn render(
    &mut self,
    image: impl Into<ImageSource>,
    boxes: &BoxTable,
    labels: &[u32],
    masks: Option<&[GrayImage]>,
    class_names: Option<&[String]>,
    options: &RenderOptions,
  ) -> Result<RgbImage, VisualizeError> {
    check_inputs(boxes, labels, masks)?;
    let mut image = image.into().load()?;
    self.render_checked(&mut image, boxes, labels, masks, class_names, options)?;
    Ok(image)
  }

  /// 同 [`Visualizer::render`]，直接在给定图像上绘制
  pub fn render_on(
    &mut self,
    image: &mut RgbImage,
    boxes: &BoxTable,
    labels: &[u32],
    masks: Option<&[GrayImage]>,
    class_names: Option<&[String]>,
    options: &RenderOptions,
  ) -> Result<(), VisualizeError> {
    check_inputs(boxes, labels, masks)?;
    self.render_checked(image, boxes, labels, masks, class_names, options)
  }

  /// 标签与掩码数量已校验
  fn render_checked(
    &mut self,
    image: &mut RgbImage,
    boxes: &BoxTable,
    labels: &[u32],
    masks: Option<&[GrayImage]>,
    class_names: Option<&[String]>,
    options: &RenderOptions,
  ) -> Result<(), VisualizeError> {
    if let Some(masks) = masks {
      mask::check_shapes(masks, image.width(), image.height())?;
      debug!("收到 {} 个掩码, 不绘制", masks.len());
    }

    let keep: Vec<usize> = if options.score_threshold > 0.0 {
      boxes.keep_above(options.score_threshold)?
    } else {
      (0..boxes.len()).collect()
    };

    for &index in &keep {
      let label = label_text(labels[index], class_names)?;
      let color = options.scheme.lookup(&label)?;
      debug!("绘制 {} ({:?})", label, boxes.row(index).corners());
      self
        .draw
        .draw_bbox_with_label(image, boxes.row(index), &label, color, options.thickness);
    }

    info!(
      "绘制 {} 个检测框, 过滤 {} 个",
      keep.len(),
      boxes.len() - keep.len()
    );

    if options.show {
      self
        .viewer
        .show(&options.win_name, image, options.wait_time)?;
    }

    if let Some(out_file) = &options.out_file {
      save_image(image, out_file)?;
    }

    Ok(())
  }

  /// 在同一张图像上先绘制真值、再绘制检测结果
  pub fn compose(
    &mut self,
    image: impl Into<ImageSource>,
    annotation: &Annotation,
    result: DetectionResult,
    class_names: Option<&[String]>,
    options: &ComposeOptions,
  ) -> Result<RgbImage, VisualizeError> {
    check_inputs(&annotation.gt_bboxes, &annotation.gt_labels, None)?;
    let detections = result.flatten()?;
    check_inputs(&detections.boxes, &detections.labels, None)?;

    let mut image = image.into().load()?;
    let (width, height) = image.dimensions();

    let gt_masks = annotation.dense_masks(width, height)?;
    let det_masks = detections.decode_masks()?;

    self.render_on(
      &mut image,
      &annotation.gt_bboxes,
      &annotation.gt_labels,
      gt_masks.as_deref(),
      class_names,
      &options.ground_truth(),
    )?;

    self.render_on(
      &mut image,
      &detections.boxes,
      &detections.labels,
      det_masks.as_deref(),
      class_names,
      &options.detections(),
    )?;

    Ok(image)
  }

  /// 同 [`Visualizer::compose`]，标注与检测结果以 JSON 给出
  pub fn compose_json(
    &mut self,
    image: impl Into<ImageSource>,
    annotation: Value,
    result: Value,
    class_names: Option<&[String]>,
    options: &ComposeOptions,
  ) -> Result<RgbImage, VisualizeError> {
    let annotation = Annotation::from_json(annotation)?;
    let result = DetectionResult::from_json(result)?;
    self.compose(image, &annotation, result, class_names, options)
  }
}

fn check_inputs(
  boxes: &BoxTable,
  labels: &[u32],
  masks: Option<&[GrayImage]>,
) -> Result<(), VisualizeError> {
  boxes.check_labels(labels)?;
  if let Some(masks) = masks
    && masks.len() != boxes.len()
  {
    return Err(
      BoxError::MaskCount {
        boxes: boxes.len(),
        masks: masks.len(),
      }
      .into(),
    );
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::color::DOCUMENT_LAYOUT_CLASSES;

  const RED: Rgb<u8> = Rgb([255, 0, 0]);
  const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  #[derive(Default)]
  struct RecordingViewer {
    shown: Vec<(String, (u32, u32), Duration)>,
  }

  impl ImageViewer for RecordingViewer {
    fn show(&mut self, win_name: &str, image: &RgbImage, wait: Duration) -> Result<(), ViewerError> {
      self
        .shown
        .push((win_name.to_string(), image.dimensions(), wait));
      Ok(())
    }
  }

  fn visualizer() -> Visualizer {
    Visualizer::new().with_draw(Draw::without_font())
  }

  fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  fn table(rows: &[&[f32]]) -> BoxTable {
    BoxTable::from_rows(rows).unwrap()
  }

  #[test]
  fn single_caption_box() {
    let boxes = table(&[&[10.0, 10.0, 50.0, 50.0]]);
    let class_names = names(&["caption"]);
    let image = visualizer()
      .render(
        RgbImage::new(100, 100),
        &boxes,
        &[0],
        None,
        Some(&class_names),
        &RenderOptions::default(),
      )
      .unwrap();

    assert_eq!(image.dimensions(), (100, 100));
    assert_eq!(image.get_pixel(10, 10), &RED);
    assert_eq!(image.get_pixel(50, 50), &RED);
    assert_eq!(image.get_pixel(30, 30), &BLACK);
  }

  #[test]
  fn label_count_mismatch_is_rejected() {
    let boxes = table(&[&[10.0, 10.0, 50.0, 50.0], &[1.0, 1.0, 5.0, 5.0]]);
    let err = visualizer()
      .render(
        RgbImage::new(100, 100),
        &boxes,
        &[0],
        None,
        None,
        &RenderOptions::default(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::BoxError(BoxError::LabelCount {
        boxes: 2,
        labels: 1
      })
    ));
  }

  #[test]
  fn inputs_are_checked_before_loading_image() {
    let boxes = table(&[&[10.0, 10.0, 50.0, 50.0]]);
    let err = visualizer()
      .render(
        Path::new("/nonexistent/huakuang-page.png"),
        &boxes,
        &[],
        None,
        None,
        &RenderOptions::default(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::BoxError(BoxError::LabelCount {
        boxes: 1,
        labels: 0
      })
    ));
  }

  #[test]
  fn box_far_outside_image_is_clipped() {
    let boxes = table(&[&[-3.0e9, 10.0, 3.0e9, 50.0]]);
    let class_names = names(&["caption"]);
    let image = visualizer()
      .render(
        RgbImage::new(100, 100),
        &boxes,
        &[0],
        None,
        Some(&class_names),
        &RenderOptions::default(),
      )
      .unwrap();
    assert_eq!(image.get_pixel(0, 10), &RED);
    assert_eq!(image.get_pixel(99, 50), &RED);
    assert_eq!(image.get_pixel(50, 30), &BLACK);
  }

  #[test]
  fn huge_thickness_still_draws() {
    let boxes = table(&[&[10.0, 10.0, 50.0, 50.0]]);
    let class_names = names(&["caption"]);
    let image = visualizer()
      .render(
        RgbImage::new(100, 100),
        &boxes,
        &[0],
        None,
        Some(&class_names),
        &RenderOptions::default().with_thickness(u32::MAX),
      )
      .unwrap();
    assert_eq!(image.get_pixel(10, 10), &RED);
    assert_eq!(image.get_pixel(30, 30), &RED);
    assert_eq!(image.get_pixel(60, 60), &BLACK);
  }

  #[test]
  fn threshold_keeps_only_confident_boxes() {
    let boxes = table(&[
      &[10.0, 10.0, 20.0, 20.0, 0.1],
      &[60.0, 60.0, 80.0, 80.0, 0.9],
    ]);
    let class_names = names(&["caption"]);
    let options = RenderOptions::default().with_score_threshold(0.5);
    let image = visualizer()
      .render(
        RgbImage::new(100, 100),
        &boxes,
        &[0, 0],
        None,
        Some(&class_names),
        &options,
      )
      .unwrap();

    assert_eq!(image.get_pixel(10, 10), &BLACK);
    assert_eq!(image.get_pixel(60, 60), &RED);
    assert_eq!(image.get_pixel(80, 80), &RED);
  }

  #[test]
  fn threshold_needs_scores() {
    let boxes = table(&[&[10.0, 10.0, 20.0, 20.0]]);
    let options = RenderOptions::default().with_score_threshold(0.5);
    let err = visualizer()
      .render(RgbImage::new(100, 100), &boxes, &[0], None, None, &options)
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::BoxError(BoxError::ScoresRequired { columns: 4, .. })
    ));
  }

  #[test]
  fn unknown_class_is_a_lookup_failure() {
    let boxes = table(&[&[10.0, 10.0, 20.0, 20.0]]);
    let class_names = names(&["person"]);
    let err = visualizer()
      .render(
        RgbImage::new(100, 100),
        &boxes,
        &[0],
        None,
        Some(&class_names),
        &RenderOptions::default(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::ColorError(ColorError::UnknownClass(ref class)) if class == "person"
    ));
  }

  #[test]
  fn generic_label_without_class_names() {
    let boxes = table(&[&[10.0, 10.0, 20.0, 20.0]]);

    let err = visualizer()
      .render(
        RgbImage::new(30, 30),
        &boxes,
        &[3],
        None,
        None,
        &RenderOptions::default(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::ColorError(ColorError::UnknownClass(ref class)) if class == "cls 3"
    ));

    let options =
      RenderOptions::default().with_scheme(ColorScheme::new().with_class("cls 3", BLUE));
    let image = visualizer()
      .render(RgbImage::new(30, 30), &boxes, &[3], None, None, &options)
      .unwrap();
    assert_eq!(image.get_pixel(10, 10), &BLUE);
  }

  #[test]
  fn label_outside_class_names() {
    let boxes = table(&[&[10.0, 10.0, 20.0, 20.0]]);
    let class_names = names(&["caption"]);
    let err = visualizer()
      .render(
        RgbImage::new(30, 30),
        &boxes,
        &[1],
        None,
        Some(&class_names),
        &RenderOptions::default(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::LabelOutOfRange {
        label: 1,
        classes: 1
      }
    ));
  }

  #[test]
  fn masks_are_checked_but_not_drawn() {
    let boxes = table(&[&[2.0, 2.0, 8.0, 8.0]]);
    let class_names = names(&["table"]);
    let masks = vec![GrayImage::from_pixel(10, 10, image::Luma([1]))];
    let image = visualizer()
      .render(
        RgbImage::new(10, 10),
        &boxes,
        &[0],
        Some(&masks),
        Some(&class_names),
        &RenderOptions::default().with_thickness(1),
      )
      .unwrap();
    assert_eq!(image.get_pixel(0, 0), &BLACK);
    assert_eq!(image.get_pixel(5, 5), &BLACK);

    let two_masks = vec![masks[0].clone(), masks[0].clone()];
    let err = visualizer()
      .render(
        RgbImage::new(10, 10),
        &boxes,
        &[0],
        Some(&two_masks),
        Some(&class_names),
        &RenderOptions::default(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::BoxError(BoxError::MaskCount { boxes: 1, masks: 2 })
    ));

    let small = vec![GrayImage::new(5, 5)];
    let err = visualizer()
      .render(
        RgbImage::new(10, 10),
        &boxes,
        &[0],
        Some(&small),
        Some(&class_names),
        &RenderOptions::default(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::MaskError(MaskError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn show_without_viewer_fails() {
    let boxes = table(&[]);
    let options = RenderOptions::default().with_show("result", Duration::ZERO);
    let err = visualizer()
      .render(RgbImage::new(10, 10), &boxes, &[], None, None, &options)
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::ViewerError(ViewerError::Unavailable)
    ));
  }

  #[test]
  fn show_uses_named_window() {
    let boxes = table(&[]);
    let options = RenderOptions::default().with_show("result", Duration::from_millis(500));
    let mut visualizer = visualizer().with_viewer(RecordingViewer::default());
    visualizer
      .render(RgbImage::new(12, 10), &boxes, &[], None, None, &options)
      .unwrap();
    assert_eq!(
      visualizer.viewer().shown,
      vec![("result".to_string(), (12, 10), Duration::from_millis(500))]
    );
  }

  #[test]
  fn writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out_file = dir.path().join("nested").join("out.png");
    let boxes = table(&[&[1.0, 1.0, 6.0, 6.0]]);
    let class_names = names(&["figure"]);
    let options = RenderOptions::default().with_out_file(&out_file);
    let image = visualizer()
      .render(
        RgbImage::new(8, 8),
        &boxes,
        &[0],
        None,
        Some(&class_names),
        &options,
      )
      .unwrap();

    let written = image::open(&out_file).unwrap().into_rgb8();
    assert_eq!(written, image);
    assert_eq!(written.get_pixel(1, 1), &BLUE);
  }

  fn compose_options() -> ComposeOptions {
    ComposeOptions::default()
      .with_gt_scheme(ColorScheme::uniform(DOCUMENT_LAYOUT_CLASSES, GT_COLOR))
      .with_det_scheme(ColorScheme::uniform(DOCUMENT_LAYOUT_CLASSES, DET_COLOR))
      .with_thickness(1)
  }

  #[test]
  fn compose_draws_ground_truth_then_detections() {
    let class_names = names(&DOCUMENT_LAYOUT_CLASSES);
    let annotation = Annotation::new(table(&[&[10.0, 10.0, 30.0, 30.0]]), vec![0]);
    let result = DetectionResult::from_json(json!([
      [[50, 50, 70, 70, 0.9], [5, 60, 20, 90, 0.2]],
      [[60, 5, 90, 40, 0.8]]
    ]))
    .unwrap();

    let image = visualizer()
      .compose(
        RgbImage::new(100, 100),
        &annotation,
        result,
        Some(&class_names),
        &compose_options().with_score_threshold(0.5),
      )
      .unwrap();

    assert_eq!(image.dimensions(), (100, 100));
    assert_eq!(image.get_pixel(10, 10), &GT_COLOR);
    assert_eq!(image.get_pixel(50, 50), &DET_COLOR);
    assert_eq!(image.get_pixel(60, 5), &DET_COLOR);
    // 低分检测框被过滤
    assert_eq!(image.get_pixel(5, 60), &BLACK);
  }

  #[test]
  fn compose_with_empty_detections_keeps_ground_truth_only() {
    let class_names = names(&DOCUMENT_LAYOUT_CLASSES);
    let annotation = Annotation::new(table(&[&[10.0, 10.0, 30.0, 30.0]]), vec![2]);
    let result = DetectionResult::from_json(json!([[], [], [], []])).unwrap();

    let image = visualizer()
      .compose(
        RgbImage::new(64, 48),
        &annotation,
        result,
        Some(&class_names),
        &compose_options().with_score_threshold(0.3),
      )
      .unwrap();

    assert_eq!(image.dimensions(), (64, 48));
    assert_eq!(image.get_pixel(10, 10), &GT_COLOR);
    let det_pixels = image.pixels().filter(|p| **p == DET_COLOR).count();
    assert_eq!(det_pixels, 0);
  }

  #[test]
  fn compose_decodes_detection_masks() {
    let class_names = names(&DOCUMENT_LAYOUT_CLASSES);
    let annotation = Annotation::new(table(&[]), vec![]);
    let result = DetectionResult::from_json(json!({
      "bbox": [[[0, 0, 2, 2, 0.9]]],
      "segm": [[{ "size": [4, 4], "counts": [5, 2, 9] }]]
    }))
    .unwrap();
    let image = visualizer()
      .compose(
        RgbImage::new(4, 4),
        &annotation,
        result,
        Some(&class_names),
        &compose_options(),
      )
      .unwrap();
    assert_eq!(image.get_pixel(0, 0), &DET_COLOR);

    // 掩码尺寸与图像不符
    let result = DetectionResult::from_json(json!({
      "bbox": [[[0, 0, 2, 2, 0.9]]],
      "segm": [[{ "size": [3, 3], "counts": [9] }]]
    }))
    .unwrap();
    let err = visualizer()
      .compose(
        RgbImage::new(4, 4),
        &annotation,
        result,
        Some(&class_names),
        &compose_options(),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::MaskError(MaskError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn compose_json_rejects_malformed_input_before_drawing() {
    let dir = tempfile::tempdir().unwrap();
    let out_file = dir.path().join("out.png");
    let options = compose_options().with_out_file(&out_file);

    let err = visualizer()
      .compose_json(
        RgbImage::new(10, 10),
        json!({ "gt_bboxes": [] }),
        json!([]),
        None,
        &options,
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::AnnotationError(AnnotationError::MissingKey("gt_labels"))
    ));

    let err = visualizer()
      .compose_json(
        RgbImage::new(10, 10),
        json!({ "gt_bboxes": [], "gt_labels": [] }),
        json!("not a result"),
        None,
        &options,
      )
      .unwrap_err();
    assert!(matches!(
      err,
      VisualizeError::AnnotationError(AnnotationError::ResultShape("string"))
    ));
    assert!(!out_file.exists());
  }

  #[test]
  fn compose_json_writes_combined_image() {
    let dir = tempfile::tempdir().unwrap();
    let out_file = dir.path().join("combined.png");
    let class_names = names(&DOCUMENT_LAYOUT_CLASSES);
    let image = visualizer()
      .compose_json(
        RgbImage::new(40, 40),
        json!({ "gt_bboxes": [[1, 1, 10, 10]], "gt_labels": [3] }),
        json!([[], [], [], [[20, 20, 30, 30, 0.7]]]),
        Some(&class_names),
        &compose_options().with_out_file(&out_file),
      )
      .unwrap();
    let written = image::open(&out_file).unwrap().into_rgb8();
    assert_eq!(written, image);
    assert_eq!(written.get_pixel(1, 1), &GT_COLOR);
    assert_eq!(written.get_pixel(20, 20), &DET_COLOR);
  }
}
