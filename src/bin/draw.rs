// 该文件是 Huakuang （画框） 项目的一部分。
// src/bin/draw.rs - 绘制单组检测框
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
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use huakuang::{
  BoxTable, ColorScheme, FromUrl, RenderOptions, Visualizer,
  annotation::read_json,
  input::ImageFileInput,
  mask::GtMasks,
  output::{ImageViewer, NoViewer, SaveImageFileOutput},
};

/// 在图像上绘制一组检测框
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///data/demo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 检测框 JSON 文件: {"bboxes": [[x1, y1, x2, y2(, score)]...], "labels": [...]}
  #[arg(long, value_name = "FILE")]
  pub boxes: PathBuf,
  /// 类别名称，逗号分隔
  #[arg(long, value_delimiter = ',', value_name = "NAMES")]
  pub class_names: Option<Vec<String>>,
  /// 分数阈值，大于零时只绘制分数高于该值的检测框
  #[arg(long, default_value = "0", value_name = "THRESHOLD")]
  pub score_threshold: f32,
  /// 线宽
  #[arg(long, default_value = "2", value_name = "PIXELS")]
  pub thickness: u32,
  /// 颜色映射 JSON 文件: {"类别": "red" | [r, g, b]}
  #[arg(long, value_name = "FILE")]
  pub colors: Option<PathBuf>,
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

#[derive(Deserialize)]
struct BoxesFile {
  bboxes: BoxTable,
  labels: Vec<u32>,
  #[serde(default)]
  masks: Option<GtMasks>,
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

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入图像: {}", args.input);
  info!("检测框文件: {}", args.boxes.display());

  let image = ImageFileInput::from_url(&args.input)?.read()?;
  let BoxesFile {
    bboxes,
    labels,
    masks,
  } = serde_json::from_value(read_json(&args.boxes)?)?;
  let masks = masks
    .map(|masks| masks.to_dense(image.width(), image.height()))
    .transpose()?;

  let mut options = RenderOptions::default()
    .with_score_threshold(args.score_threshold)
    .with_thickness(args.thickness);
  if let Some(path) = &args.colors {
    options = options.with_scheme(serde_json::from_value::<ColorScheme>(read_json(path)?)?);
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
  visualizer.render(
    image,
    &bboxes,
    &labels,
    masks.as_deref(),
    args.class_names.as_deref(),
    &options,
  )?;
  info!("绘制完成，耗时: {:.2?}", now.elapsed());

  Ok(())
}
