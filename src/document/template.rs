//! Starter funnels for new drafts.

use serde_json::json;

use super::kinds::BlockKind;
use super::model::{Block, Document, Page};
use super::Properties;
use crate::types::DocumentId;

fn block_with(kind: BlockKind, overrides: serde_json::Value) -> Block {
    let mut block = Block::new(kind);
    if let serde_json::Value::Object(map) = overrides {
        block.merge_properties(&map);
    }
    block
}

fn settings(value: serde_json::Value) -> Properties {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Properties::new(),
    }
}

/// A quiz funnel with intro, question, result and offer pages.
pub fn default_funnel(id: DocumentId) -> Document {
    let mut doc = Document::empty(id);
    doc.name = "Style quiz".to_string();
    doc.settings = settings(json!({
        "theme": {
            "primaryColor": "#8B5CF6",
            "secondaryColor": "#F3E8FF",
            "backgroundColor": "#FFFFFF",
            "textColor": "#1F2937",
            "fontFamily": "Inter",
        },
        "showProgressBar": true,
        "autoAdvance": false,
    }));

    let mut intro = Page::new("Intro", "intro");
    intro.settings = settings(json!({ "backgroundColor": "#ffffff", "padding": "2rem" }));
    intro.blocks.push(block_with(
        BlockKind::Heading,
        json!({ "content": "Discover your style", "level": 1 }),
    ));
    intro.blocks.push(block_with(BlockKind::Button, json!({ "text": "Start" })));

    let mut question = Page::new("Question 1", "question");
    question.blocks.push(block_with(
        BlockKind::QuizQuestion,
        json!({
            "question": "Which outfit feels most like you?",
            "options": [
                { "id": "classic", "text": "Classic", "points": 10 },
                { "id": "modern", "text": "Modern", "points": 15 },
                { "id": "casual", "text": "Casual", "points": 12 },
            ],
        }),
    ));

    let mut result = Page::new("Result", "result");
    result.blocks.push(block_with(
        BlockKind::Heading,
        json!({ "content": "Your style is..." }),
    ));
    result.blocks.push(block_with(BlockKind::Text, json!({ "content": "" })));

    let mut offer = Page::new("Offer", "offer");
    offer.blocks.push(block_with(BlockKind::Countdown, json!({})));
    offer.blocks.push(block_with(
        BlockKind::Pricing,
        json!({ "title": "Complete style guide", "price": 39, "originalPrice": 175 }),
    ));
    offer.blocks.push(block_with(BlockKind::Button, json!({ "text": "Get it now" })));

    doc.pages = vec![intro, question, result, offer];
    doc.renumber();
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_funnel_is_valid_and_ordered() {
        let doc = default_funnel(DocumentId::from("quiz"));
        assert!(doc.validate().is_ok());
        assert_eq!(doc.pages.len(), 4);
        for (i, page) in doc.pages.iter().enumerate() {
            assert_eq!(page.order, i as u32);
            for (j, block) in page.blocks.iter().enumerate() {
                assert_eq!(block.order, j as u32);
            }
        }
        assert_eq!(doc.pages[0].blocks[0].content(), Some("Discover your style"));
    }
}
