// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR block graph: parsing and per-page line resolution.

pub mod graph;
pub mod resolver;

pub use graph::{Block, BlockGraph, BlockIndex};
pub use resolver::BlockResolver;
