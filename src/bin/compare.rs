// 该文件是 Huakuang （画框） 项目的一部分。
// src/bin/compare.rs - 叠加绘制真值与检测结果
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

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use huakuang::{
  ColorScheme, ComposeOptions, FromUrl, Visualizer,
  annotation::read_json,
  input::ImageFileInput,
  output::{ImageViewer, NoViewer, SaveImageFileOutput},
};

/// 在同一张图像上叠加绘制真值与检测结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///data/demo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 真值标注 JSON 文件: {"gt_bboxes": [...], "gt_labels": [...], "gt_masks": ...}
  #[arg(long, value_name = "FILE")]
  pub annotation: PathBuf,
  /// 检测结果 JSON 文件：按类别分组的检测框，或 {"bbox": [...], "segm": [...]}
  #[arg(long, value_name = "FILE")]
  pub result: PathBuf,
  /// 类别名称，逗号分隔
  #[arg(long, value_delimiter = ',', value_name = "NAMES")]
  pub class_names: Option<Vec<String>>,
  /// 检测结果的分数阈值
  #[arg(long, default_value = "0", value_name = "THRESHOLD")]
  pub score_threshold: f32,
  /// 线宽
  #[arg(long, default_value = "2", value_name = "PIXELS")]
  pub thickness: u32,
  /// 真值颜色映射 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub gt_colors: Option<PathBuf>,
  /// 检测结果颜色映射 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub det_colors: Option<PathBuf>,
  /// 在窗口中显示结果
  #[arg(long)]
  pub show: bool,
  /// 窗口标题
  #[arg(long, default_value = "", value_name = "TITLE")]
  pub win_name: String,
  /// 窗口等待时间（毫秒），0 表示等待窗口关闭
  #[arg(long, default_value = "0", value_name = "MS")]
  pub wait_ms: u64,
  /// 显示窗口，例如 window://?sink=ximagesink
  #[arg(long, default_value = "window://", value_name = "VIEWER")]
  pub viewer: Url,
  /// 输出图像，例如 image:///tmp/out.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
}

#[cfg(feature = "gstreamer_display")]
fn open_viewer(url: &Url) -> Result<Box<dyn ImageViewer>> {
  Ok(Box::new(huakuang::output::GStreamerViewer::from_url(url)?))
}

#[cfg(not(feature = "gstreamer_display"))]
fn open_viewer(url: &Url) -> Result<Box<dyn ImageViewer>> {
  warn!("未启用 gstreamer_display 特性, 无法打开窗口 {}", url);
  Ok(Box::new(NoViewer))
}

fn read_scheme(path: &Option<PathBuf>) -> Result<Option<ColorScheme>> {
  match path {
    Some(path) => Ok(Some(serde_json::from_value(read_json(path)?)?)),
    None => Ok(None),
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入图像: {}", args.input);
  info!("真值标注: {}", args.annotation.display());
  info!("检测结果: {}", args.result.display());

  let input = ImageFileInput::from_url(&args.input)?;
  let annotation = read_json(&args.annotation)?;
  let result = read_json(&args.result)?;

  let mut options = ComposeOptions::default()
    .with_score_threshold(args.score_threshold)
    .with_thickness(args.thickness);
  if let Some(scheme) = read_scheme(&args.gt_colors)? {
    options = options.with_gt_scheme(scheme);
  }
  if let Some(scheme) = read_scheme(&args.det_colors)? {
    options = options.with_det_scheme(scheme);
  }
  if args.show {
    options = options.with_show(args.win_name.clone(), Duration::from_millis(args.wait_ms));
  }
  if let Some(url) = &args.output {
    options = options.with_out_file(SaveImageFileOutput::from_url(url)?.into_path());
  }

  let viewer: Box<dyn ImageViewer> = if args.show {
    open_viewer(&args.viewer)?
  } else {
    Box::new(NoViewer)
  };
  let mut visualizer = Visualizer::new().with_viewer(viewer);

  let now = std::time::Instant::now();
  visualizer.compose_json(
    input,
    annotation,
    result,
    args.class_names.as_deref(),
    &options,
  )?;
  info!("绘制完成，耗时: {:.2?}", now.elapsed());

  Ok(())
}
