//! Message extraction from DOM change batches.
//!
//! The page observer reports each mutation's added nodes as `outerHTML` (or raw
//! text for text nodes). The extractor picks the chat platform from the page
//! URL, parses each added element as an HTML fragment, applies the platform's
//! CSS selectors beneath it, and keeps the first element text that looks like a
//! real user message.
//!
//! Extraction is pure: it reads the batch and returns strings, nothing else.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExtractionError;
use crate::model::{Message, MutationRecord};

/// Deepest node nesting the extractor will walk.
const MAX_DEPTH: usize = 256;

/// Messages must be shorter than this many characters.
const MAX_MESSAGE_CHARS: usize = 300;

/// Messages must be at least this many characters.
const MIN_MESSAGE_CHARS: usize = 3;

static CLOCK_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}[:.]\d{2}").expect("valid clock regex"));

static TIME_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s:apmAPM]+$").expect("valid time regex"));

/// One node added by a DOM mutation, as reported by the page observer.
///
/// Elements arrive as their `outerHTML`; text nodes as their raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AddedNode {
    Element { html: String },
    Text { text: String },
}

impl AddedNode {
    pub fn element(html: &str) -> Self {
        AddedNode::Element {
            html: html.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        AddedNode::Text {
            text: text.to_string(),
        }
    }
}

/// Chat platform, detected from the page host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    WhatsApp,
    Messenger,
    Telegram,
    Discord,
    Unspecified,
}

impl Platform {
    /// Detect the platform by host substring, in priority order.
    pub fn detect(page_url: &str) -> Self {
        let host = reqwest::Url::parse(page_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_lowercase))
            .unwrap_or_else(|| page_url.to_lowercase());

        if host.contains("whatsapp") {
            Platform::WhatsApp
        } else if host.contains("messenger") {
            Platform::Messenger
        } else if host.contains("telegram") {
            Platform::Telegram
        } else if host.contains("discord") {
            Platform::Discord
        } else {
            Platform::Unspecified
        }
    }

    /// Element selectors tried in order against a changed node.
    pub fn selectors(&self) -> &'static [&'static str] {
        match self {
            Platform::WhatsApp => &[
                "span.selectable-text",
                r#"[data-testid="msg-text"]"#,
                ".copyable-text span",
            ],
            Platform::Messenger => &[
                r#"[data-testid="message-container"] [dir="auto"]"#,
                r#"div[dir="auto"]"#,
                r#"span[dir="auto"]"#,
            ],
            Platform::Telegram => &[".text-content", ".message .text", ".bubble .message"],
            Platform::Discord => &[
                r#"[id^="message-content"]"#,
                r#"[class*="messageContent"]"#,
                ".markup",
            ],
            Platform::Unspecified => &[r#"[dir="auto"]"#, "p"],
        }
    }
}

/// Decide whether a piece of text looks like a real chat message.
///
/// Rejects empty, very short or very long text, timestamps, links, mentions,
/// and single-word fragments.
pub fn is_user_message(text: &str) -> bool {
    let text = text.trim();
    let chars = text.chars().count();

    if chars < MIN_MESSAGE_CHARS || chars >= MAX_MESSAGE_CHARS {
        return false;
    }
    if CLOCK_PREFIX.is_match(text) || TIME_LIKE.is_match(text) {
        return false;
    }
    if text.contains("http") || text.contains('@') {
        return false;
    }
    text.split_whitespace().count() >= 2
}

/// Extract candidate messages from one batch of mutation records.
///
/// Candidates are trimmed and deduplicated within the batch, in the order they
/// were found.
pub fn extract_messages(mutations: &[MutationRecord], page_url: &str) -> Vec<Message> {
    let platform = Platform::detect(page_url);
    let mut seen = HashSet::new();
    let mut messages = Vec::new();

    for record in mutations {
        for node in &record.added_nodes {
            let text = extract_text(node, platform);
            let text = text.trim();
            if !text.is_empty() && seen.insert(text.to_string()) {
                messages.push(text.to_string());
            }
        }
    }

    messages
}

/// Extract message text from a single changed node.
///
/// Failures are logged and yield an empty string.
pub fn extract_text(node: &AddedNode, platform: Platform) -> String {
    match try_extract_text(node, platform) {
        Ok(text) => text,
        Err(e) => {
            debug!(platform = ?platform, error = %e, "Message extraction failed");
            String::new()
        }
    }
}

fn try_extract_text(node: &AddedNode, platform: Platform) -> Result<String, ExtractionError> {
    let html = match node {
        AddedNode::Text { text } => return Ok(text.clone()),
        AddedNode::Element { html } => html,
    };

    let fragment = Html::parse_fragment(html);
    check_depth(&fragment)?;

    for raw in platform.selectors() {
        let selector = compile_selector(raw)?;
        for element in descendant_matches(&fragment, &selector) {
            let text = element.text().collect::<String>();
            if is_user_message(&text) {
                return Ok(text);
            }
        }
    }

    // Fallback is not filtered here; the buffer applies the filter on append.
    Ok(fragment.root_element().text().collect())
}

fn compile_selector(raw: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(raw).map_err(|e| ExtractionError::InvalidSelector(format!("{}: {}", raw, e)))
}

/// Elements matching `selector` strictly below the added node.
///
/// Like `querySelectorAll` on the added node, the node itself never matches
/// but may satisfy an ancestor part of a descendant chain.
fn descendant_matches<'a>(fragment: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    let added: Vec<_> = fragment
        .root_element()
        .children()
        .map(|child| child.id())
        .collect();

    fragment
        .select(selector)
        .filter(|element| !added.contains(&element.id()))
        .collect()
}

fn check_depth(fragment: &Html) -> Result<(), ExtractionError> {
    let too_deep = fragment
        .root_element()
        .descendants()
        .filter(|node| !node.has_children())
        .any(|leaf| leaf.ancestors().count() > MAX_DEPTH);

    if too_deep {
        Err(ExtractionError::TooDeep(MAX_DEPTH))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_user_message_accepts_conversation() {
        assert!(is_user_message("hi there"));
        assert!(is_user_message("  how are you  "));
        assert!(is_user_message("i am fine thanks"));
    }

    #[test]
    fn test_is_user_message_length_bounds() {
        assert!(!is_user_message(""));
        assert!(!is_user_message("   "));
        assert!(!is_user_message("ab"));
        assert!(is_user_message("a b"));
        assert!(!is_user_message(&"word ".repeat(61)));
        assert!(is_user_message(&format!("{} end", "x".repeat(295))));
        assert!(!is_user_message(&format!("{} end", "x".repeat(296))));
    }

    #[test]
    fn test_is_user_message_rejects_times() {
        assert!(!is_user_message("9:41 see you soon"));
        assert!(!is_user_message("12.30 lunch then"));
        assert!(!is_user_message("10:15 pm"));
        assert!(!is_user_message("3 45 PM"));
    }

    #[test]
    fn test_is_user_message_rejects_links_and_mentions() {
        assert!(!is_user_message("look at https://example.com now"));
        assert!(!is_user_message("check http stuff"));
        assert!(!is_user_message("ping @sam about it"));
        assert!(!is_user_message("mail me at a@b.c"));
    }

    #[test]
    fn test_is_user_message_rejects_single_token() {
        assert!(!is_user_message("hello"));
        assert!(!is_user_message("   whatever   "));
    }

    #[test]
    fn test_platform_detection_priority() {
        assert_eq!(
            Platform::detect("https://web.whatsapp.com/"),
            Platform::WhatsApp
        );
        assert_eq!(
            Platform::detect("https://www.messenger.com/t/123"),
            Platform::Messenger
        );
        assert_eq!(
            Platform::detect("https://web.telegram.org/k/"),
            Platform::Telegram
        );
        assert_eq!(
            Platform::detect("https://discord.com/channels/1/2"),
            Platform::Discord
        );
        assert_eq!(
            Platform::detect("https://example.org/chat"),
            Platform::Unspecified
        );
        // Path segments do not count, only the host
        assert_eq!(
            Platform::detect("https://example.org/whatsapp"),
            Platform::Unspecified
        );
    }

    #[test]
    fn test_every_platform_selector_compiles() {
        for platform in [
            Platform::WhatsApp,
            Platform::Messenger,
            Platform::Telegram,
            Platform::Discord,
            Platform::Unspecified,
        ] {
            for raw in platform.selectors() {
                assert!(compile_selector(raw).is_ok(), "{raw} should compile");
            }
        }
    }

    #[test]
    fn test_invalid_selector_is_extraction_error() {
        match compile_selector("span[") {
            Err(ExtractionError::InvalidSelector(message)) => assert!(message.starts_with("span[")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_descendant_matches_exclude_added_node() {
        let fragment = Html::parse_fragment(
            r#"<div class="bubble"><div class="message">hello from telegram</div></div>"#,
        );

        let chain = Selector::parse(".bubble .message").unwrap();
        let found = descendant_matches(&fragment, &chain);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text().collect::<String>(), "hello from telegram");

        let own = Selector::parse(".bubble").unwrap();
        assert!(descendant_matches(&fragment, &own).is_empty());
    }

    #[test]
    fn test_extract_prefers_first_passing_selector_match() {
        let node = AddedNode::element(
            r#"<div><span class="selectable-text">10:42</span><span class="selectable-text copyable">are you coming tonight</span></div>"#,
        );
        assert_eq!(
            extract_text(&node, Platform::WhatsApp),
            "are you coming tonight"
        );
    }

    #[test]
    fn test_extract_messenger_nested_dir_auto() {
        let node = AddedNode::element(
            r#"<div data-testid="message-container"><div><div dir="auto">did you see my text</div></div></div>"#,
        );
        assert_eq!(
            extract_text(&node, Platform::Messenger),
            "did you see my text"
        );
    }

    #[test]
    fn test_extract_falls_back_to_full_text_unfiltered() {
        let node = AddedNode::element("<div>ok<b>!</b></div>");
        assert_eq!(extract_text(&node, Platform::Discord), "ok!");
    }

    #[test]
    fn test_extract_discord_attribute_selectors() {
        let node = AddedNode::element(
            r#"<li><div id="message-content-1234">gg that was close</div></li>"#,
        );
        assert_eq!(extract_text(&node, Platform::Discord), "gg that was close");

        let node = AddedNode::element(
            r#"<li><div class="messageContent_abc12">rematch at nine</div></li>"#,
        );
        assert_eq!(extract_text(&node, Platform::Discord), "rematch at nine");
    }

    #[test]
    fn test_extract_text_node_is_its_own_text() {
        let node = AddedNode::text("a < b is fine by me");
        assert_eq!(extract_text(&node, Platform::Telegram), "a < b is fine by me");
    }

    #[test]
    fn test_extract_too_deep_degrades_to_empty() {
        let depth = MAX_DEPTH + 10;
        let html = format!(
            "{}deep message here{}",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        assert_eq!(extract_text(&AddedNode::element(&html), Platform::Unspecified), "");

        let shallow = format!("{}shallow message here{}", "<div>".repeat(10), "</div>".repeat(10));
        assert_eq!(
            extract_text(&AddedNode::element(&shallow), Platform::Unspecified),
            "shallow message here"
        );
    }

    #[test]
    fn test_extract_messages_dedupes_within_batch() {
        let node = AddedNode::element("<p> see you later </p>");
        let batch = vec![
            MutationRecord {
                added_nodes: vec![node.clone(), node.clone()],
            },
            MutationRecord {
                added_nodes: vec![node, AddedNode::text("   ")],
            },
        ];

        let messages = extract_messages(&batch, "https://chat.example.com");
        assert_eq!(messages, vec!["see you later".to_string()]);
    }

    #[test]
    fn test_added_node_json_shape() {
        let node: AddedNode = serde_json::from_value(serde_json::json!({
            "kind": "element",
            "html": "<span dir=\"auto\">hey you two</span>"
        }))
        .unwrap();
        assert_eq!(extract_text(&node, Platform::Unspecified), "hey you two");
    }
}
