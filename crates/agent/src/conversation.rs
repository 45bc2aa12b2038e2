//! Keyword heuristics for routing free text and photo captions.

const PRICING_KEYWORDS: [&str; 4] = ["cost", "price", "calculate", "quote"];
const DOCUMENT_KEYWORDS: [&str; 4] = ["document", "invoice", "analyze", "check"];

pub const QUOTE_TIP: &str = "💡 Tip: Use /quote for detailed PDF quote!";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhotoIntent {
    /// Caption asks for a document review.
    DocumentReview,
    Snapshot,
}

pub fn classify_caption(caption: Option<&str>) -> PhotoIntent {
    let caption = normalize_text(caption.unwrap_or_default());
    if contains_any(&caption, &DOCUMENT_KEYWORDS) {
        PhotoIntent::DocumentReview
    } else {
        PhotoIntent::Snapshot
    }
}

pub fn mentions_pricing(text: &str) -> bool {
    contains_any(&normalize_text(text), &PRICING_KEYWORDS)
}

fn contains_any(normalized_text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| normalized_text.contains(keyword))
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase()
}
