// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font metrics and width-driven font-size fitting for the overlay text.
//
// The overlay uses the standard-14 Courier faces, so no font program is
// embedded: viewers supply the face, and the metrics below come from the
// Adobe Font Metrics files shipped with every PDF reader.

use scanlayer_core::OverlayFont;

/// Glyph-space units per em in Type 1 metrics.
const UNITS_PER_EM: f32 = 1000.0;

/// Horizontal advance of every Courier glyph, in glyph-space units.
const COURIER_ADVANCE: f32 = 600.0;

/// Immutable metrics table for one overlay face.
///
/// Passed explicitly into the compositor so that concurrent documents never
/// share font state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    font: OverlayFont,
    advance: f32,
    /// `FontBBox` as `[llx, lly, urx, ury]`.
    bbox: [f32; 4],
}

impl FontMetrics {
    pub fn for_font(font: OverlayFont) -> Self {
        let bbox = match font {
            OverlayFont::Courier => [-23.0, -250.0, 715.0, 805.0],
            OverlayFont::CourierBold => [-113.0, -250.0, 749.0, 801.0],
            OverlayFont::CourierOblique => [-27.0, -250.0, 849.0, 805.0],
            OverlayFont::CourierBoldOblique => [-57.0, -250.0, 869.0, 801.0],
        };
        Self {
            font,
            advance: COURIER_ADVANCE,
            bbox,
        }
    }

    pub fn font(&self) -> OverlayFont {
        self.font
    }

    pub fn base_font(&self) -> &'static str {
        self.font.base_font()
    }

    /// Width of `text` at font size 1, after WinAnsi substitution.
    pub fn natural_width(&self, text: &str) -> f32 {
        encode_win_ansi(text).len() as f32 * self.advance / UNITS_PER_EM
    }

    /// Height of the font bounding box at `font_size`.
    pub fn text_height(&self, font_size: f32) -> f32 {
        (self.bbox[3] - self.bbox[1]) / UNITS_PER_EM * font_size
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::for_font(OverlayFont::default())
    }
}

/// Font size and rendered extent for one line of overlay text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    pub font_size: f32,
    pub rendered_width: f32,
    pub rendered_height: f32,
}

impl FontFit {
    /// Choose the font size at which `text` spans exactly `target_width`.
    ///
    /// Returns `None` for text that cannot be fitted: empty or whitespace-only
    /// strings and non-positive target widths. Height is derived, never
    /// corrected towards the box height.
    pub fn compute(metrics: &FontMetrics, text: &str, target_width: f32) -> Option<Self> {
        if text.trim().is_empty() || !target_width.is_finite() || target_width <= 0.0 {
            return None;
        }

        let natural = metrics.natural_width(text);
        if natural <= 0.0 {
            return None;
        }

        let font_size = target_width / natural;
        Some(Self {
            font_size,
            rendered_width: natural * font_size,
            rendered_height: metrics.text_height(font_size),
        })
    }
}

/// Encode `text` for a `WinAnsiEncoding` simple font.
///
/// Control whitespace becomes a space and characters without a WinAnsi code
/// become `?`, so the output always has exactly one byte per input `char`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

/// Number of characters in `text` that [`encode_win_ansi`] replaces with `?`.
pub fn unencodable_chars(text: &str) -> usize {
    text.chars().filter(|&c| c != '?' && win_ansi_byte(c) == b'?').count()
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        '\t' | '\n' | '\r' => b' ',
        ' '..='~' | '\u{A0}'..='\u{FF}' => c as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}
