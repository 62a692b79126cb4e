// 该文件是 Huakuang （画框） 项目的一部分。
// src/output/viewer.rs - 窗口显示
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

use std::time::Duration;

use image::RgbImage;
use thiserror::Error;

#[cfg(feature = "gstreamer_display")]
use super::GStreamerViewerError;

#[derive(Error, Debug)]
pub enum ViewerError {
  #[error("没有可用的显示窗口")]
  Unavailable,
  #[cfg(feature = "gstreamer_display")]
  #[error("GStreamer 显示错误: {0}")]
  GStreamerViewerError(#[from] GStreamerViewerError),
}

/// 在具名窗口中显示图像
///
/// 同名窗口可被重复使用。`wait` 为零时阻塞到窗口关闭，否则最多阻塞 `wait`。
pub trait ImageViewer {
  fn show(&mut self, win_name: &str, image: &RgbImage, wait: Duration) -> Result<(), ViewerError>;
}

/// 不显示任何窗口，请求显示时报错
#[derive(Debug, Default, Clone, Copy)]
pub struct NoViewer;

impl ImageViewer for NoViewer {
  fn show(&mut self, _win_name: &str, _image: &RgbImage, _wait: Duration) -> Result<(), ViewerError> {
    Err(ViewerError::Unavailable)
  }
}

impl<V: ImageViewer + ?Sized> ImageViewer for Box<V> {
  fn show(&mut self, win_name: &str, image: &RgbImage, wait: Duration) -> Result<(), ViewerError> {
    (**self).show(win_name, image, wait)
  }
}
