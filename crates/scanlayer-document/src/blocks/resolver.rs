// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Block graph resolver: builds the immutable page → text line index the
// compositor reads from.

use std::collections::BTreeMap;

use scanlayer_core::error::{Result, ScanLayerError};
use scanlayer_core::{Granularity, TextLine};
use tracing::{debug, info, instrument};

use super::graph::{Block, BlockGraph};

/// Text resolved for one PAGE number.
#[derive(Debug, Clone, Default, PartialEq)]
struct PageText {
    lines: Vec<TextLine>,
    words: Vec<TextLine>,
}

/// Read-only index from 1-based page number to its text lines.
///
/// Built once in a single pass over the graph; every lookup afterwards is a
/// map access returning a borrowed slice, so the resolver can be shared across
/// page workers without locking.
#[derive(Debug, Clone)]
pub struct BlockResolver {
    graph: BlockGraph,
    pages: BTreeMap<u32, PageText>,
}

impl BlockResolver {
    /// Parse an OCR block document and build the page index.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::build(BlockGraph::from_json_bytes(bytes)?))
    }

    /// Index the LINE (and WORD) children of every PAGE block.
    ///
    /// Lines keep the order of the PAGE's `CHILD` ids; nothing is re-sorted by
    /// geometry. Several PAGE blocks carrying the same page number append to
    /// the same entry in document order.
    #[instrument(skip_all, fields(blocks = graph.len()))]
    pub fn build(graph: BlockGraph) -> Self {
        let mut pages: BTreeMap<u32, PageText> = BTreeMap::new();

        for (page, children) in graph.pages() {
            let entry = pages.entry(page).or_default();
            for &child in children {
                let Some(Block::Line {
                    text,
                    bbox,
                    children: words,
                    ..
                }) = graph.get(child)
                else {
                    continue;
                };

                entry.lines.push(TextLine::new(text.clone(), *bbox));
                entry.words.extend(words.iter().filter_map(|&w| match graph.get(w) {
                    Some(Block::Word { text, bbox, .. }) => Some(TextLine::new(text.clone(), *bbox)),
                    _ => None,
                }));
            }
            debug!(page, lines = entry.lines.len(), "PAGE block resolved");
        }

        info!(
            pages = pages.len(),
            lines = pages.values().map(|p| p.lines.len()).sum::<usize>(),
            "Block graph resolved"
        );

        Self { graph, pages }
    }

    // -- Lookup ---------------------------------------------------------------

    /// Lines on a 1-based page, in OCR reading order.
    ///
    /// A page without a PAGE block yields an empty slice: it simply carries no
    /// recognised text.
    pub fn lines_on_page(&self, page_number: u32) -> &[TextLine] {
        self.pages
            .get(&page_number)
            .map(|p| p.lines.as_slice())
            .unwrap_or_default()
    }

    /// Like [`lines_on_page`](Self::lines_on_page) but reports a missing PAGE
    /// block as [`ScanLayerError::PageNotFound`].
    pub fn try_lines_on_page(&self, page_number: u32) -> Result<&[TextLine]> {
        self.pages
            .get(&page_number)
            .map(|p| p.lines.as_slice())
            .ok_or(ScanLayerError::PageNotFound(page_number))
    }

    /// WORD children of the page's lines, line by line in reading order.
    pub fn words_on_page(&self, page_number: u32) -> &[TextLine] {
        self.pages
            .get(&page_number)
            .map(|p| p.words.as_slice())
            .unwrap_or_default()
    }

    /// The text units to overlay for the requested granularity.
    pub fn text_on_page(&self, page_number: u32, granularity: Granularity) -> &[TextLine] {
        match granularity {
            Granularity::Line => self.lines_on_page(page_number),
            Granularity::Word => self.words_on_page(page_number),
        }
    }

    pub fn has_page(&self, page_number: u32) -> bool {
        self.pages.contains_key(&page_number)
    }

    /// Page numbers that have a PAGE block, ascending.
    pub fn page_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }
}
