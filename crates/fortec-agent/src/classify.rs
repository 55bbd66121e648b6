//! Image-request detection.
//!
//! A keyword heuristic, not a parser: the message is scanned for each phrase
//! in [`IMAGE_KEYWORDS`] in order, ASCII case-insensitively, and the first hit
//! decides. Longer phrases are listed before the shorter ones they contain.

/// Ordered trigger phrases. First match wins.
pub const IMAGE_KEYWORDS: &[&str] = &[
    "create an image of",
    "create an image",
    "create image of",
    "create image",
    "generate an image of",
    "generate an image",
    "generate image of",
    "generate image",
    "make an image of",
    "make an image",
    "make image",
    "picture of",
    "image of",
    "draw me",
    "draw",
    "show me",
    "sketch",
    "paint",
    "illustrate",
];

/// How an inbound message should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Chat,
    Image { prompt: String },
}

/// Decide between the chat and image paths for `text`.
pub fn route(text: &str) -> Route {
    match first_match(text) {
        Some((keyword, at)) => Route::Image {
            prompt: prompt_after(text, keyword, at),
        },
        None => Route::Chat,
    }
}

pub fn is_image_request(text: &str) -> bool {
    first_match(text).is_some()
}

/// Strip the first matching keyword and everything before it.
///
/// Falls back to the full text when nothing follows the keyword, or when no
/// keyword matches at all.
pub fn extract_prompt(text: &str) -> String {
    match first_match(text) {
        Some((keyword, at)) => prompt_after(text, keyword, at),
        None => text.to_string(),
    }
}

/// First keyword (in list order) found in `text`, with its byte offset.
///
/// ASCII lowercasing keeps byte offsets identical between `text` and the
/// lowered copy, so the offset is valid for slicing the original.
fn first_match(text: &str) -> Option<(&'static str, usize)> {
    let lowered = text.to_ascii_lowercase();
    IMAGE_KEYWORDS
        .iter()
        .find_map(|kw| lowered.find(kw).map(|at| (*kw, at)))
}

fn prompt_after(text: &str, keyword: &str, at: usize) -> String {
    let rest = text[at + keyword.len()..].trim();
    if rest.is_empty() {
        text.to_string()
    } else {
        rest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_image_requests() {
        assert!(is_image_request("please draw a cat"));
        assert!(is_image_request("Create Image of a castle"));
        assert!(is_image_request("SKETCH a bridge"));
    }

    #[test]
    fn plain_questions_are_chat() {
        assert!(!is_image_request("what is the capital of France"));
        assert_eq!(route("how are you?"), Route::Chat);
    }

    #[test]
    fn extracts_text_after_keyword() {
        assert_eq!(extract_prompt("draw a futuristic city"), "a futuristic city");
        assert_eq!(extract_prompt("Please DRAW   a red fox  "), "a red fox");
        assert_eq!(
            extract_prompt("can you create an image of a dragon"),
            "a dragon"
        );
    }

    #[test]
    fn keyword_without_trailing_text_keeps_full_message() {
        assert_eq!(extract_prompt("draw"), "draw");
        assert_eq!(extract_prompt("  sketch  "), "  sketch  ");
    }

    #[test]
    fn no_keyword_returns_original_text() {
        assert_eq!(extract_prompt("hello world"), "hello world");
    }

    #[test]
    fn first_listed_keyword_wins() {
        // "draw" precedes "sketch" in the list even though "sketch" comes
        // first in the message.
        assert_eq!(extract_prompt("sketch or draw a tree"), "a tree");
    }

    #[test]
    fn route_carries_prompt() {
        assert_eq!(
            route("draw a sunset"),
            Route::Image {
                prompt: "a sunset".to_string()
            }
        );
    }

    #[test]
    fn non_ascii_text_is_sliced_safely() {
        assert_eq!(extract_prompt("Ünïcödé draw ÄÖÜ"), "ÄÖÜ");
    }
}
