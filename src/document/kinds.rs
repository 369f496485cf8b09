//! Block kinds and their default properties.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use super::Properties;

/// Type tag of a block.
///
/// Known kinds get default properties when a block is created. Any other tag
/// is preserved verbatim in `Other`; only the rendering layer interprets it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockKind {
    Text,
    Heading,
    Image,
    Button,
    Spacer,
    Divider,
    Video,
    Testimonial,
    Pricing,
    Countdown,
    Faq,
    QuizQuestion,
    Form,
    Other(String),
}

impl BlockKind {
    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Heading => "heading",
            BlockKind::Image => "image",
            BlockKind::Button => "button",
            BlockKind::Spacer => "spacer",
            BlockKind::Divider => "divider",
            BlockKind::Video => "video",
            BlockKind::Testimonial => "testimonial",
            BlockKind::Pricing => "pricing",
            BlockKind::Countdown => "countdown",
            BlockKind::Faq => "faq",
            BlockKind::QuizQuestion => "quiz-question",
            BlockKind::Form => "form",
            BlockKind::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "text" => BlockKind::Text,
            "heading" => BlockKind::Heading,
            "image" => BlockKind::Image,
            "button" => BlockKind::Button,
            "spacer" => BlockKind::Spacer,
            "divider" => BlockKind::Divider,
            "video" => BlockKind::Video,
            "testimonial" => BlockKind::Testimonial,
            "pricing" => BlockKind::Pricing,
            "countdown" => BlockKind::Countdown,
            "faq" => BlockKind::Faq,
            "quiz-question" => BlockKind::QuizQuestion,
            "form" => BlockKind::Form,
            other => BlockKind::Other(other.to_string()),
        }
    }

    /// Properties a freshly added block of this kind starts with.
    pub fn default_properties(&self) -> Properties {
        let value = match self {
            BlockKind::Text => json!({
                "content": "New text",
                "alignment": "left",
            }),
            BlockKind::Heading => json!({
                "content": "New heading",
                "level": 2,
                "alignment": "center",
            }),
            BlockKind::Image => json!({
                "src": "",
                "alt": "",
                "width": "100%",
            }),
            BlockKind::Button => json!({
                "text": "Continue",
                "variant": "primary",
                "size": "large",
                "alignment": "center",
            }),
            BlockKind::Spacer => json!({ "height": 32 }),
            BlockKind::Divider => json!({ "thickness": 1, "color": "#E5E7EB" }),
            BlockKind::Video => json!({
                "url": "",
                "autoplay": false,
                "controls": true,
            }),
            BlockKind::Testimonial => json!({
                "content": "",
                "author": "",
                "rating": 5,
            }),
            BlockKind::Pricing => json!({
                "title": "Offer",
                "price": 0,
                "originalPrice": 0,
                "currency": "USD",
                "features": [],
            }),
            BlockKind::Countdown => json!({
                "durationSeconds": 900,
                "expiredText": "Offer expired",
            }),
            BlockKind::Faq => json!({ "items": [] }),
            BlockKind::QuizQuestion => json!({
                "question": "New question",
                "options": [],
                "multipleSelection": false,
                "requiredSelections": 1,
            }),
            BlockKind::Form => json!({
                "fields": [],
                "submitText": "Send",
            }),
            BlockKind::Other(_) => json!({}),
        };

        match value {
            serde_json::Value::Object(map) => map,
            _ => Properties::new(),
        }
    }
}

impl From<String> for BlockKind {
    fn from(tag: String) -> Self {
        BlockKind::parse(&tag)
    }
}

impl From<&str> for BlockKind {
    fn from(tag: &str) -> Self {
        BlockKind::parse(tag)
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Debug for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockKind({})", self.as_str())
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
