// 该文件是 Huakuang （画框） 项目的一部分。
// src/output/gstreamer_viewer.rs - GStreamer 窗口显示
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

//! # GStreamer 窗口显示模块
//!
//! 每个窗口名对应一条 `appsrc ! videoconvert ! <sink>` 管道，窗口在多次显示之间复用。
//!
//! ## URL Scheme
//!
//! `window://`
//!
//! ## 参数说明
//!
//! - `sink`: 视频输出元素，默认 `autovideosink`
//!
//! ```no_run
//! use huakuang::{FromUrl, output::GStreamerViewer};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("window://?sink=ximagesink")?;
//! let viewer = GStreamerViewer::from_url(&url)?;
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, time::Duration};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{ImageViewer, ViewerError},
};

const DEFAULT_VIDEO_SINK: &str = "autovideosink";

/// GStreamer 显示错误类型
#[derive(Error, Debug)]
pub enum GStreamerViewerError {
  /// URI scheme 不匹配
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsrc 元素
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  /// 无法转换元素为 appsrc
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 缓冲区创建错误
  #[error("Buffer creation error")]
  BufferCreationError,
}

struct Window {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  info: gst_video::VideoInfo,
}

impl Drop for Window {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer window pipeline: {}", e);
    }
  }
}

impl Window {
  fn open(sink: &str, win_name: &str, width: u32, height: u32) -> Result<Self, GStreamerViewerError> {
    let pipeline_desc = format!("appsrc name=src ! videoconvert ! {}", sink);
    info!("Creating window '{}' pipeline: {}", win_name, pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerViewerError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerViewerError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerViewerError::AppSrcConversionFailed)?;

    let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height)
      .fps(gst::Fraction::new(0, 1))
      .build()?;
    appsrc.set_caps(Some(&info.to_caps()?));
    appsrc.set_format(gst::Format::Time);
    appsrc.set_is_live(true);
    appsrc.set_property("do-timestamp", true);

    pipeline.set_state(gst::State::Playing)?;

    // 部分视频输出元素以 title 标签作为窗口标题
    let mut tags = gst::TagList::new();
    tags
      .make_mut()
      .add::<gst::tags::Title>(&win_name, gst::TagMergeMode::Replace);
    if !appsrc.send_event(gst::event::Tag::new(tags)) {
      warn!("Failed to set title of window '{}'", win_name);
    }

    Ok(Window {
      pipeline,
      appsrc,
      info,
    })
  }

  fn matches(&self, width: u32, height: u32) -> bool {
    self.info.width() == width && self.info.height() == height
  }

  /// 按 GStreamer 的行对齐要求拷贝 RGB 数据
  fn push_image(&self, image: &RgbImage) -> Result<(), GStreamerViewerError> {
    let mut buffer =
      gst::Buffer::with_size(self.info.size()).map_err(|_| GStreamerViewerError::BufferCreationError)?;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerViewerError::BufferCreationError)?;
      let mut buffer_map = buffer_ref.map_writable().map_err(|_| {
        GStreamerViewerError::PipelineError("Failed to map buffer".to_string())
      })?;

      let stride = self.info.stride()[0] as usize;
      let row_bytes = image.width() as usize * 3;
      for (dst, src) in buffer_map
        .chunks_mut(stride)
        .zip(image.as_raw().chunks_exact(row_bytes))
      {
        dst[..row_bytes].copy_from_slice(src);
      }
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerViewerError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;

    Ok(())
  }

  /// 等待窗口关闭或超时，返回窗口是否已关闭
  fn wait(&self, wait: Duration) -> Result<bool, GStreamerViewerError> {
    let bus = self
      .pipeline
      .bus()
      .ok_or_else(|| GStreamerViewerError::PipelineError("Pipeline has no bus".to_string()))?;

    let timeout = if wait.is_zero() {
      gst::ClockTime::NONE
    } else {
      Some(gst::ClockTime::from_mseconds(wait.as_millis() as u64))
    };

    let Some(message) =
      bus.timed_pop_filtered(timeout, &[gst::MessageType::Error, gst::MessageType::Eos])
    else {
      return Ok(false);
    };

    match message.view() {
      gst::MessageView::Eos(..) => Ok(true),
      gst::MessageView::Error(err) if err.error().matches(gst::ResourceError::NotFound) => {
        // 视频输出元素在窗口被用户关闭时报告 NotFound
        info!("Window closed: {}", err.error());
        Ok(true)
      }
      gst::MessageView::Error(err) => {
        error!(
          "Window pipeline error: {} ({:?})",
          err.error(),
          err.debug()
        );
        Err(GStreamerViewerError::PipelineError(err.error().to_string()))
      }
      _ => Ok(false),
    }
  }
}

/// 基于 GStreamer 的具名窗口显示
pub struct GStreamerViewer {
  sink: String,
  windows: HashMap<String, Window>,
}

impl FromUrlWithScheme for GStreamerViewer {
  const SCHEME: &'static str = "window";
}

impl FromUrl for GStreamerViewer {
  type Error = GStreamerViewerError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerViewerError::SchemeMismatch);
    }

    let sink = url
      .query_pairs()
      .find(|(k, _)| k == "sink")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_VIDEO_SINK.to_string());

    Self::with_sink(&sink)
  }
}

impl GStreamerViewer {
  pub fn new() -> Result<Self, GStreamerViewerError> {
    Self::with_sink(DEFAULT_VIDEO_SINK)
  }

  pub fn with_sink(sink: &str) -> Result<Self, GStreamerViewerError> {
    // Initialize GStreamer (subsequent calls are safe no-ops)
    gst::init()?;
    Ok(Self {
      sink: sink.to_string(),
      windows: HashMap::new(),
    })
  }

  fn show_image(
    &mut self,
    win_name: &str,
    image: &RgbImage,
    wait: Duration,
  ) -> Result<(), GStreamerViewerError> {
    let (width, height) = image.dimensions();
    if self
      .windows
      .get(win_name)
      .is_some_and(|window| !window.matches(width, height))
    {
      // 尺寸变化时重建窗口
      self.windows.remove(win_name);
    }

    if !self.windows.contains_key(win_name) {
      let window = Window::open(&self.sink, win_name, width, height)?;
      self.windows.insert(win_name.to_string(), window);
    }

    let closed = match self.windows.get(win_name) {
      Some(window) => {
        window.push_image(image)?;
        window.wait(wait)?
      }
      None => false,
    };
    if closed {
      self.windows.remove(win_name);
    }
    Ok(())
  }
}

impl ImageViewer for GStreamerViewer {
  fn show(&mut self, win_name: &str, image: &RgbImage, wait: Duration) -> Result<(), ViewerError> {
    Ok(self.show_image(win_name, image, wait)?)
  }
}
