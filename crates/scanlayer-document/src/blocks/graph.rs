// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR block graph: parses the flat, id-cross-referenced block collection
// produced by the OCR service into an arena of typed blocks.

use std::collections::HashMap;

use scanlayer_core::BoundingBox;
use scanlayer_core::error::{Result, ScanLayerError};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Position of a block inside [`BlockGraph::blocks`].
pub type BlockIndex = usize;

/// A typed node of the OCR graph.
///
/// Children are stored as arena indices, resolved from the `CHILD`
/// relationship ids at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Page {
        id: String,
        page: u32,
        children: Vec<BlockIndex>,
    },
    Line {
        id: String,
        text: String,
        bbox: BoundingBox,
        children: Vec<BlockIndex>,
    },
    Word {
        id: String,
        text: String,
        bbox: BoundingBox,
    },
    /// TABLE, CELL, KEY_VALUE_SET, ...: kept addressable, never rendered.
    Other {
        id: String,
        kind: String,
        children: Vec<BlockIndex>,
    },
}

impl Block {
    pub fn id(&self) -> &str {
        match self {
            Self::Page { id, .. }
            | Self::Line { id, .. }
            | Self::Word { id, .. }
            | Self::Other { id, .. } => id,
        }
    }

    pub fn children(&self) -> &[BlockIndex] {
        match self {
            Self::Page { children, .. }
            | Self::Line { children, .. }
            | Self::Other { children, .. } => children,
            Self::Word { .. } => &[],
        }
    }
}

// -- Wire format --------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBlock {
    id: Option<String>,
    block_type: Option<String>,
    page: Option<u32>,
    text: Option<String>,
    geometry: Option<RawGeometry>,
    relationships: Option<Vec<RawRelationship>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGeometry {
    bounding_box: Option<RawBoundingBox>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBoundingBox {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRelationship {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    ids: Vec<String>,
}

impl RawBlock {
    /// Ids referenced through `CHILD` relationships, in document order.
    fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .flatten()
            .filter(|rel| rel.kind == "CHILD")
            .flat_map(|rel| rel.ids.iter().map(String::as_str))
    }

    fn bbox(&self) -> Option<Result<BoundingBox>> {
        self.geometry
            .as_ref()
            .and_then(|g| g.bounding_box.as_ref())
            .map(|b| BoundingBox::normalized(b.left, b.top, b.width, b.height))
    }
}

// -- Graph --------------------------------------------------------------------

/// All blocks of one OCR document, owned by a single arena.
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    blocks: Vec<Block>,
    index: HashMap<String, BlockIndex>,
}

impl BlockGraph {
    /// Parse an OCR block document.
    ///
    /// Accepts either an object with a `Blocks` array or a bare array of
    /// blocks. Fails with [`ScanLayerError::MalformedInput`] when the bytes are
    /// not JSON, a block lacks `Id` or `BlockType`, an id is duplicated, a
    /// `CHILD` id does not exist, or a LINE lacks text or geometry.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|err| ScanLayerError::MalformedInput(format!("not valid JSON: {err}")))?;

        let raw_blocks = match document {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("Blocks") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(ScanLayerError::MalformedInput(
                        "`Blocks` is not an array".into(),
                    ));
                }
                None => {
                    return Err(ScanLayerError::MalformedInput(
                        "document has no `Blocks` array".into(),
                    ));
                }
            },
            _ => {
                return Err(ScanLayerError::MalformedInput(
                    "expected a JSON object or array of blocks".into(),
                ));
            }
        };

        let raw: Vec<RawBlock> = raw_blocks
            .into_iter()
            .enumerate()
            .map(|(position, value)| {
                serde_json::from_value(value).map_err(|err| {
                    ScanLayerError::MalformedInput(format!("block #{position}: {err}"))
                })
            })
            .collect::<Result<_>>()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: Vec<RawBlock>) -> Result<Self> {
        // Pass 1: assign arena slots.
        let mut index = HashMap::with_capacity(raw.len());
        for (position, block) in raw.iter().enumerate() {
            let id = block.id.as_deref().ok_or_else(|| {
                ScanLayerError::MalformedInput(format!("block #{position} has no `Id`"))
            })?;
            if block.block_type.is_none() {
                return Err(ScanLayerError::MalformedInput(format!(
                    "block {id} has no `BlockType`"
                )));
            }
            if index.insert(id.to_owned(), position).is_some() {
                return Err(ScanLayerError::MalformedInput(format!(
                    "duplicate block id {id}"
                )));
            }
        }

        // Pass 2: resolve children and type each block.
        let mut blocks = Vec::with_capacity(raw.len());
        for block in raw {
            let id = block.id.clone().unwrap_or_default();
            let children = block
                .child_ids()
                .map(|child| {
                    index.get(child).copied().ok_or_else(|| {
                        ScanLayerError::MalformedInput(format!(
                            "block {id} references missing child {child}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let kind = block.block_type.as_deref().unwrap_or_default();
            let typed = match kind {
                "PAGE" => Block::Page {
                    id,
                    page: block.page.unwrap_or(1),
                    children,
                },
                "LINE" => {
                    let text = block.text.clone().ok_or_else(|| {
                        ScanLayerError::MalformedInput(format!("LINE {id} has no `Text`"))
                    })?;
                    let bbox = block.bbox().ok_or_else(|| {
                        ScanLayerError::MalformedInput(format!(
                            "LINE {id} has no `Geometry.BoundingBox`"
                        ))
                    })??;
                    Block::Line {
                        id,
                        text,
                        bbox,
                        children,
                    }
                }
                "WORD" => match (block.text.clone(), block.bbox()) {
                    (Some(text), Some(bbox)) => Block::Word {
                        id,
                        text,
                        bbox: bbox?,
                    },
                    _ => {
                        warn!(id = %id, "WORD block without text or geometry; ignoring");
                        Block::Other {
                            id,
                            kind: kind.to_owned(),
                            children,
                        }
                    }
                },
                other => Block::Other {
                    id,
                    kind: other.to_owned(),
                    children,
                },
            };
            blocks.push(typed);
        }

        debug!(blocks = blocks.len(), "OCR block graph parsed");
        Ok(Self { blocks, index })
    }

    // -- Lookup ---------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: BlockIndex) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn by_id(&self, id: &str) -> Option<&Block> {
        self.index.get(id).and_then(|&i| self.blocks.get(i))
    }

    /// PAGE blocks in document order.
    pub fn pages(&self) -> impl Iterator<Item = (u32, &[BlockIndex])> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Page { page, children, .. } => Some((*page, children.as_slice())),
            _ => None,
        })
    }
}
