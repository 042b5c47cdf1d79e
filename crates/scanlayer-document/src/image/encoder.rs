// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page raster encoder: prepares a rasterized page for embedding as a PDF image
// XObject, either as a JPEG (`DCTDecode`) or as raw RGB samples that the
// output document deflates on save.

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use scanlayer_core::ImageEncoding;
use scanlayer_core::error::{Result, ScanLayerError};
use tracing::{debug, instrument};

/// How the encoded sample data must be decoded by a PDF reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    /// Baseline JPEG; the stream is stored as-is with `/Filter /DCTDecode`.
    Dct,
    /// 8-bit RGB samples; compressed with `FlateDecode` when the document is saved.
    Raw,
}

/// A page raster ready to become an image XObject.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub filter: ImageFilter,
    pub data: Vec<u8>,
}

impl EncodedImage {
    /// Encode `image` the way `encoding` asks for.
    #[instrument(skip(image), fields(width = image.width(), height = image.height()))]
    pub fn encode(image: &RgbImage, encoding: ImageEncoding, jpeg_quality: u8) -> Result<Self> {
        let encoded = match encoding {
            ImageEncoding::Lossy => Self::jpeg(image, jpeg_quality)?,
            ImageEncoding::Lossless => Self::raw(image),
        };
        debug!(bytes = encoded.data.len(), filter = ?encoded.filter, "Page raster encoded");
        Ok(encoded)
    }

    /// JPEG-encode at `quality` (1-100).
    pub fn jpeg(image: &RgbImage, quality: u8) -> Result<Self> {
        let mut data = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100));
        image
            .write_with_encoder(encoder)
            .map_err(|err| ScanLayerError::ImageError(format!("JPEG encoding failed: {err}")))?;

        Ok(Self {
            width: image.width(),
            height: image.height(),
            filter: ImageFilter::Dct,
            data,
        })
    }

    /// Keep the raw interleaved RGB samples.
    pub fn raw(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            filter: ImageFilter::Raw,
            data: image.as_raw().clone(),
        }
    }
}
