// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: reading the scanned source and writing the searchable output.

pub mod reader;
pub mod writer;

pub use reader::SourcePdf;
pub use writer::{EncodedPage, OutputDocument};
