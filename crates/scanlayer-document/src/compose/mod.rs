// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page composition: font fitting, overlay planning, and document assembly.

pub mod compositor;
pub mod font;
pub mod overlay;

pub use compositor::{ComposedDocument, Compositor, RenderedPage};
pub use font::{FontFit, FontMetrics};
pub use overlay::{OverlayPlan, TextPlacement, plan_overlay};
