//! In-memory draft store.

use std::sync::Arc;
use tracing::debug;

use crate::document::{Block, BlockKind, Document, Page, Properties};
use crate::types::{BlockId, PageId, Timestamp};

/// Holds the authoritative document and applies mutations to it.
///
/// Every successful mutation publishes a new `Arc<Document>` and bumps the
/// revision, so observers can detect change by revision or `Arc::ptr_eq`
/// without diffing. Documents handed out earlier are never touched.
pub struct DraftStore {
    current: Arc<Document>,
    revision: u64,
}

impl DraftStore {
    pub fn new(mut document: Document) -> Self {
        document.renumber();
        Self {
            current: Arc::new(document),
            revision: 0,
        }
    }

    /// The current document value.
    pub fn document(&self) -> Arc<Document> {
        Arc::clone(&self.current)
    }

    /// Incremented on every change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the whole document (load, restore, start fresh).
    pub fn replace(&mut self, mut document: Document) {
        document.renumber();
        self.current = Arc::new(document);
        self.revision += 1;
    }

    /// Apply `edit` to a copy of the document, publishing it only if the edit
    /// reports a change.
    fn apply<T>(&mut self, edit: impl FnOnce(&mut Document) -> Option<T>) -> Option<T> {
        let mut next = (*self.current).clone();
        let out = edit(&mut next)?;
        next.last_modified = Timestamp::now();
        self.current = Arc::new(next);
        self.revision += 1;
        Some(out)
    }

    // --- Block Operations ---

    /// Append a block of `kind` to the page. Returns `None` if the page does
    /// not exist.
    pub fn add_block(&mut self, page_id: &PageId, kind: BlockKind) -> Option<BlockId> {
        let id = self.apply(|doc| {
            let pi = doc.page_index(page_id)?;
            let mut block = Block::new(kind);
            // Block ids stay unique within the document.
            while doc.locate_block(&block.id).is_some() {
                block.id = BlockId::generate();
            }
            let id = block.id.clone();
            let page = &mut doc.pages[pi];
            page.blocks.push(block);
            page.renumber_blocks();
            Some(id)
        });
        if let Some(ref id) = id {
            debug!(page = %page_id, block = %id, "block added");
        }
        id
    }

    /// Merge properties into the block. Returns true if anything changed.
    pub fn update_block(&mut self, block_id: &BlockId, partial: &Properties) -> bool {
        // Check on the live value first so a no-op does not publish a new revision.
        let Some((pi, bi)) = self.current.locate_block(block_id) else {
            return false;
        };
        let mut probe = self.current.pages[pi].blocks[bi].clone();
        if !probe.merge_properties(partial) {
            return false;
        }

        self.apply(|doc| {
            doc.pages[pi].blocks[bi] = probe;
            Some(())
        })
        .is_some()
    }

    /// Remove the block. Returns true if it existed.
    pub fn delete_block(&mut self, block_id: &BlockId) -> bool {
        self.apply(|doc| {
            let (pi, bi) = doc.locate_block(block_id)?;
            let page = &mut doc.pages[pi];
            page.blocks.remove(bi);
            page.renumber_blocks();
            Some(())
        })
        .is_some()
    }

    /// Move a block within its page.
    ///
    /// `to` is clamped to the last position. A missing page, an out-of-range
    /// `from` or a move onto itself is a no-op.
    pub fn reorder_blocks(&mut self, page_id: &PageId, from: usize, to: usize) -> bool {
        self.apply(|doc| {
            let pi = doc.page_index(page_id)?;
            let page = &mut doc.pages[pi];
            move_item(&mut page.blocks, from, to)?;
            page.renumber_blocks();
            Some(())
        })
        .is_some()
    }

    /// Insert a copy of the block right after it, with a new id.
    pub fn duplicate_block(&mut self, block_id: &BlockId) -> Option<BlockId> {
        self.apply(|doc| {
            let (pi, bi) = doc.locate_block(block_id)?;
            let mut copy = doc.pages[pi].blocks[bi].clone();
            copy.id = BlockId::generate();
            let id = copy.id.clone();
            let page = &mut doc.pages[pi];
            page.blocks.insert(bi + 1, copy);
            page.renumber_blocks();
            Some(id)
        })
    }

    pub fn find_block(&self, block_id: &BlockId) -> Option<Block> {
        self.current.block(block_id).cloned()
    }

    // --- Page Operations ---

    pub fn add_page(&mut self, name: &str, kind: &str) -> PageId {
        let page = Page::new(name, kind);
        let id = page.id.clone();
        self.apply(|doc| {
            doc.pages.push(page);
            doc.renumber();
            Some(())
        });
        id
    }

    pub fn delete_page(&mut self, page_id: &PageId) -> bool {
        self.apply(|doc| {
            let pi = doc.page_index(page_id)?;
            doc.pages.remove(pi);
            doc.renumber();
            Some(())
        })
        .is_some()
    }

    /// Move a page, with the same clamping rules as `reorder_blocks`.
    pub fn reorder_pages(&mut self, from: usize, to: usize) -> bool {
        self.apply(|doc| {
            move_item(&mut doc.pages, from, to)?;
            doc.renumber();
            Some(())
        })
        .is_some()
    }
}

/// Move `items[from]` to `to` (clamped). `None` if nothing moves.
fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Option<()> {
    if from >= items.len() {
        return None;
    }
    let to = to.min(items.len() - 1);
    if from == to {
        return None;
    }
    let item = items.remove(from);
    items.insert(to, item);
    Some(())
}
