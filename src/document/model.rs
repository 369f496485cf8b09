//! Document, page and block types.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::kinds::BlockKind;
use super::Properties;
use crate::types::{BlockId, DocumentId, PageId, Timestamp};

/// Property keys owned by the block itself rather than its property map.
pub const RESERVED_BLOCK_KEYS: &[&str] = &["id", "type", "order"];

/// A single content unit within a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,

    #[serde(rename = "type")]
    pub kind: BlockKind,

    /// Mirrors the block's position in its page.
    #[serde(default)]
    pub order: u32,

    /// Kind-specific properties, flattened onto the block object.
    #[serde(flatten)]
    pub properties: Properties,
}

impl Block {
    /// Create a block with the kind's default properties and a fresh id.
    pub fn new(kind: BlockKind) -> Self {
        let properties = kind.default_properties();
        Self {
            id: BlockId::generate(),
            kind,
            order: 0,
            properties,
        }
    }

    /// The block's text content, if it has any.
    pub fn content(&self) -> Option<&str> {
        self.properties.get("content").and_then(|v| v.as_str())
    }

    /// Merge `partial` into the property map, skipping reserved keys.
    ///
    /// Returns true if any property value changed.
    pub fn merge_properties(&mut self, partial: &Properties) -> bool {
        let mut changed = false;
        for (key, value) in partial {
            if RESERVED_BLOCK_KEYS.contains(&key.as_str()) {
                continue;
            }
            if self.properties.get(key) != Some(value) {
                self.properties.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

/// A page of the funnel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub name: String,

    /// Page kind, e.g. `intro`, `question`, `result`, `offer`.
    #[serde(rename = "type", default)]
    pub kind: String,

    pub blocks: Vec<Block>,

    #[serde(default)]
    pub settings: Properties,

    #[serde(default)]
    pub order: u32,
}

impl Page {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: PageId::generate(),
            name: name.into(),
            kind: kind.into(),
            blocks: Vec::new(),
            settings: Properties::new(),
            order: 0,
        }
    }

    /// Rewrite block `order` fields to match positions.
    pub fn renumber_blocks(&mut self) {
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.order = i as u32;
        }
    }
}

/// The editable funnel draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub pages: Vec<Page>,

    #[serde(default)]
    pub settings: Properties,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub is_published: bool,

    #[serde(default)]
    pub created_at: Timestamp,

    #[serde(default)]
    pub last_modified: Timestamp,
}

fn default_version() -> u32 {
    1
}

impl Document {
    /// A document with a single empty page.
    pub fn empty(id: DocumentId) -> Self {
        let now = Timestamp::now();
        let mut doc = Self {
            id,
            name: "New funnel".to_string(),
            pages: vec![Page::new("Start", "intro")],
            settings: Properties::new(),
            version: 1,
            is_published: false,
            created_at: now,
            last_modified: now,
        };
        doc.renumber();
        doc
    }

    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.pages.iter().find(|p| &p.id == id)
    }

    pub fn page_index(&self, id: &PageId) -> Option<usize> {
        self.pages.iter().position(|p| &p.id == id)
    }

    /// Locate a block as `(page index, block index)`.
    pub fn locate_block(&self, id: &BlockId) -> Option<(usize, usize)> {
        self.pages.iter().enumerate().find_map(|(pi, page)| {
            page.blocks
                .iter()
                .position(|b| &b.id == id)
                .map(|bi| (pi, bi))
        })
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.locate_block(id)
            .map(|(pi, bi)| &self.pages[pi].blocks[bi])
    }

    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }

    /// Rewrite page and block `order` fields to match positions.
    pub fn renumber(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.order = i as u32;
            page.renumber_blocks();
        }
    }

    /// Check structural invariants. Returns the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.as_str().is_empty() {
            return Err("document id is empty".into());
        }

        let mut page_ids = HashSet::new();
        let mut block_ids = HashSet::new();
        for page in &self.pages {
            if page.id.as_str().is_empty() {
                return Err("page id is empty".into());
            }
            if !page_ids.insert(&page.id) {
                return Err(format!("duplicate page id {}", page.id));
            }
            for block in &page.blocks {
                if block.id.as_str().is_empty() {
                    return Err(format!("empty block id on page {}", page.id));
                }
                if !block_ids.insert(&block.id) {
                    return Err(format!("duplicate block id {}", block.id));
                }
            }
        }
        Ok(())
    }
}
