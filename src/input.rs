// 该文件是 Huakuang （画框） 项目的一部分。
// src/input.rs - 图像输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(image::ImageError),
}

impl From<std::io::Error> for ImageFileInputError {
  fn from(err: std::io::Error) -> Self {
    ImageFileInputError::IoError(err)
  }
}

impl From<image::ImageError> for ImageFileInputError {
  fn from(err: image::ImageError) -> Self {
    ImageFileInputError::ImageLoadError(err)
  }
}

/// 待标注的图像：文件路径或已解码的图像
#[derive(Debug, Clone)]
pub enum ImageSource {
  Path(PathBuf),
  Buffer(RgbImage),
}

impl From<RgbImage> for ImageSource {
  fn from(image: RgbImage) -> Self {
    ImageSource::Buffer(image)
  }
}

impl From<PathBuf> for ImageSource {
  fn from(path: PathBuf) -> Self {
    ImageSource::Path(path)
  }
}

impl From<&Path> for ImageSource {
  fn from(path: &Path) -> Self {
    ImageSource::Path(path.to_path_buf())
  }
}

impl From<ImageFileInput> for ImageSource {
  fn from(input: ImageFileInput) -> Self {
    ImageSource::Path(input.path)
  }
}

impl ImageSource {
  /// 读取图像；内存中的图像直接返回
  pub fn load(self) -> Result<RgbImage, ImageFileInputError> {
    match self {
      ImageSource::Buffer(image) => Ok(image),
      ImageSource::Path(path) => read_rgb_image(&path),
    }
  }
}

/// 读取并解码为 RGB 图像
pub fn read_rgb_image(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  let image = ImageReader::open(path)?.decode()?;
  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(image.into_rgb8())
}

/// `image:///path/to/file.png` 形式的图像文件输入
#[derive(Debug, Clone)]
pub struct ImageFileInput {
  path: PathBuf,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Ok(ImageFileInput {
      path: PathBuf::from(url.path()),
    })
  }
}

impl ImageFileInput {
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn read(&self) -> Result<RgbImage, ImageFileInputError> {
    read_rgb_image(&self.path)
  }
}
