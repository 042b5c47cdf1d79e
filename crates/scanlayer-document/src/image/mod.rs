// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: encoding of page rasters for the output PDF.

pub mod encoder;

pub use encoder::{EncodedImage, ImageFilter};
