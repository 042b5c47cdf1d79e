// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overlay placement: turns resolved text lines into positioned, invisible
// text draws in PDF page space.

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use scanlayer_core::config::DebugOverlay;
use scanlayer_core::{PageRect, TextLine};
use tracing::debug;

use super::font::{FontFit, FontMetrics, encode_win_ansi, unencodable_chars};

/// Text rendering mode 3: neither fill nor stroke.
const RENDER_INVISIBLE: i64 = 3;
/// Text rendering mode 0: fill.
const RENDER_FILL: i64 = 0;

/// One text draw, in PDF page space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub text: String,
    /// `x` of the text origin.
    pub x: f32,
    /// `y` of the baseline.
    pub baseline: f32,
    pub fit: FontFit,
    /// The OCR box flipped into page space; `y` is its bottom edge.
    pub rect: PageRect,
}

/// Every text draw for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPlan {
    pub page_width: f32,
    pub page_height: f32,
    pub placements: Vec<TextPlacement>,
    /// Lines that produced no draw (blank text or zero width).
    pub skipped: usize,
    /// Characters written as `?` because the overlay font cannot encode them.
    pub replaced_chars: usize,
}

impl OverlayPlan {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Position each line on a `page_width` x `page_height` page.
///
/// The OCR box has a top-left origin; PDF pages have a bottom-left origin, so
/// the baseline sits at `H - H*top - textHeight`. Lines are independent and
/// keep their input order.
pub fn plan_overlay(
    lines: &[TextLine],
    page_width: f32,
    page_height: f32,
    metrics: &FontMetrics,
) -> OverlayPlan {
    let mut plan = OverlayPlan {
        page_width,
        page_height,
        ..OverlayPlan::default()
    };

    for line in lines {
        let rect = line.bbox.to_page_rect(page_width, page_height);
        let Some(fit) = FontFit::compute(metrics, &line.text, rect.width) else {
            debug!(text = %line.text, width = rect.width, "Skipping line without fittable text");
            plan.skipped += 1;
            continue;
        };

        let replaced = unencodable_chars(&line.text);
        if replaced > 0 {
            debug!(text = %line.text, replaced, "Characters outside WinAnsi will not be searchable");
            plan.replaced_chars += replaced;
        }

        plan.placements.push(TextPlacement {
            text: line.text.clone(),
            x: rect.x,
            baseline: page_height - rect.y - fit.rendered_height,
            fit,
            rect: PageRect {
                x: rect.x,
                y: page_height - rect.y - rect.height,
                width: rect.width,
                height: rect.height,
            },
        });
    }

    plan
}

/// Content-stream operations drawing `plan` with the font resource `font`.
///
/// Each placement is its own `BT`/`ET` block. Debug options switch the text
/// to visible red fill and stroke the placement boxes.
pub fn overlay_operations(plan: &OverlayPlan, font: &str, debug: DebugOverlay) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(plan.placements.len() * 6);

    if debug.draw_boxes && !plan.is_empty() {
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("RG", reals(&[1.0, 0.0, 0.0])));
        ops.push(Operation::new("w", reals(&[0.7])));
        for placement in &plan.placements {
            let r = placement.rect;
            ops.push(Operation::new("re", reals(&[r.x, r.y, r.width, r.height])));
            ops.push(Operation::new("S", vec![]));
        }
        ops.push(Operation::new("Q", vec![]));
    }

    let mode = if debug.visible_text {
        RENDER_FILL
    } else {
        RENDER_INVISIBLE
    };

    for placement in &plan.placements {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(font.as_bytes().to_vec()),
                Object::Real(placement.fit.font_size),
            ],
        ));
        ops.push(Operation::new("Tr", vec![Object::Integer(mode)]));
        if debug.visible_text {
            ops.push(Operation::new("rg", reals(&[1.0, 0.0, 0.0])));
        }
        ops.push(Operation::new("Td", reals(&[placement.x, placement.baseline])));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&placement.text),
                StringFormat::Literal,
            )],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    ops
}

fn reals(values: &[f32]) -> Vec<Object> {
    values.iter().map(|&v| Object::Real(v)).collect()
}
