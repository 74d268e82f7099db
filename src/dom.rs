use kuchiki::NodeRef;
use kuchiki::traits::*;
use tracing::warn;

use crate::translate::TranslationMap;

/// Class carried by every replacement marker.
pub const MARKER_CLASS: &str = "immersion-word";

pub const ATTR_ORIGINAL: &str = "data-original";
pub const ATTR_TRANSLATION: &str = "data-translation";
pub const ATTR_LANGUAGE: &str = "data-language";

/// Elements whose subtrees never take part in extraction or replacement.
const EXCLUDED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "textarea", "input", "select",
    "option", "button", "code", "pre", "kbd", "samp", "svg", "canvas",
    "iframe",
];

pub fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

/// Concatenated content of the text nodes replacement may touch; the
/// candidate extractor's input.
pub fn visible_text(root: &NodeRef) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        if let Some(text) = node.as_text() {
            if in_excluded_subtree(&node) {
                continue;
            }
            let content = text.borrow();
            if !content.trim().is_empty() {
                parts.push(content.trim().to_string());
            }
        }
    }
    parts.join(" ")
}

/// Replaces the first whole-word match of each translated word per text
/// node with a marker element carrying the original text, the translation
/// and the language. Returns the number of markers inserted.
///
/// The text-node set is collected per word before any mutation, so
/// substitutions made for one word do not feed the node list being walked
/// for it.
pub fn apply_replacements(root: &NodeRef, map: &TranslationMap, language: &str) -> usize {
    let mut count = 0usize;
    for (word, translation) in map {
        let needle = word.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }

        let text_nodes: Vec<NodeRef> = root
            .descendants()
            .filter(|node| node.as_text().is_some() && !in_excluded_subtree(node))
            .collect();

        for node in text_nodes {
            let Some(text) = node.as_text() else {
                continue;
            };
            let content = text.borrow().to_string();
            let Some((start, end)) = find_whole_word(&content, &needle) else {
                continue;
            };

            let original = content[start..end].to_string();
            let before = content[..start].to_string();
            let after = content[end..].to_string();
            let Some(marker) = build_marker(&original, translation, language) else {
                continue;
            };

            *text.borrow_mut() = before;
            node.insert_after(marker.clone());
            if !after.is_empty() {
                marker.insert_after(NodeRef::new_text(after));
            }
            count += 1;
        }
    }
    count
}

/// Replaces every marker under `root` with a text node holding its stored
/// original text. A no-op on roots that carry no markers.
pub fn remove_replacements(root: &NodeRef) -> usize {
    let markers: Vec<NodeRef> = match root.select(&format!("span.{}", MARKER_CLASS)) {
        Ok(selection) => selection.map(|marker| marker.as_node().clone()).collect(),
        Err(()) => return 0,
    };

    let mut count = 0usize;
    for marker in markers {
        let original = marker
            .as_element()
            .and_then(|element| element.attributes.borrow().get(ATTR_ORIGINAL).map(String::from));
        let Some(original) = original else {
            continue;
        };
        marker.insert_before(NodeRef::new_text(original));
        marker.detach();
        count += 1;
    }
    count
}

/// Reads the (original, translation) pair off a marker element.
pub fn marker_words(marker: &NodeRef) -> Option<(String, String)> {
    let element = marker.as_element()?;
    let attributes = element.attributes.borrow();
    let original = attributes.get(ATTR_ORIGINAL)?.to_string();
    let translation = attributes.get(ATTR_TRANSLATION)?.to_string();
    Some((original, translation))
}

/// Text of the nearest block-level ancestor, used as context for example
/// sentences. Truncated to keep prompts small.
pub fn surrounding_text(marker: &NodeRef) -> String {
    const CONTEXT_ELEMENTS: &[&str] = &[
        "p", "li", "blockquote", "td", "article", "section", "main", "body",
    ];
    const MAX_CONTEXT_CHARS: usize = 240;

    let block = marker.ancestors().find(|ancestor| {
        ancestor
            .as_element()
            .map(|element| CONTEXT_ELEMENTS.contains(&element.name.local.as_ref()))
            .unwrap_or(false)
    });
    let text = match block {
        Some(block) => block.text_contents(),
        None => return String::new(),
    };
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_CONTEXT_CHARS).collect()
}

fn in_excluded_subtree(node: &NodeRef) -> bool {
    node.ancestors().any(|ancestor| {
        let Some(element) = ancestor.as_element() else {
            return false;
        };
        if EXCLUDED_ELEMENTS.contains(&element.name.local.as_ref()) {
            return true;
        }
        let attributes = element.attributes.borrow();
        if attributes.get("hidden").is_some() || attributes.get("contenteditable").is_some() {
            return true;
        }
        attributes
            .get("class")
            .map(|class| class.split_whitespace().any(|name| name == MARKER_CLASS))
            .unwrap_or(false)
    })
}

/// Case-insensitive, boundary-delimited first match of `needle` (already
/// lowercase) in `haystack`. Returns byte offsets into `haystack`.
fn find_whole_word(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let haystack_chars: Vec<(usize, char)> = haystack.char_indices().collect();
    let needle_chars: Vec<char> = needle.chars().collect();
    if needle_chars.is_empty() || haystack_chars.len() < needle_chars.len() {
        return None;
    }

    for offset in 0..=(haystack_chars.len() - needle_chars.len()) {
        let matches = needle_chars.iter().enumerate().all(|(idx, needle_ch)| {
            chars_eq_ignore_case(haystack_chars[offset + idx].1, *needle_ch)
        });
        if !matches {
            continue;
        }

        let boundary_before =
            offset == 0 || !haystack_chars[offset - 1].1.is_alphabetic();
        let end_offset = offset + needle_chars.len();
        let boundary_after = end_offset >= haystack_chars.len()
            || !haystack_chars[end_offset].1.is_alphabetic();
        if !(boundary_before && boundary_after) {
            continue;
        }

        let start = haystack_chars[offset].0;
        let end = haystack_chars
            .get(end_offset)
            .map(|(idx, _)| *idx)
            .unwrap_or(haystack.len());
        return Some((start, end));
    }
    None
}

fn chars_eq_ignore_case(left: char, right: char) -> bool {
    left == right || left.to_lowercase().eq(right.to_lowercase())
}

fn build_marker(original: &str, translation: &str, language: &str) -> Option<NodeRef> {
    let html = format!(
        "<span class=\"{}\" {}=\"{}\" {}=\"{}\" {}=\"{}\">{}</span>",
        MARKER_CLASS,
        ATTR_ORIGINAL,
        escape_attr(original),
        ATTR_TRANSLATION,
        escape_attr(translation),
        ATTR_LANGUAGE,
        escape_attr(language),
        escape_text(translation),
    );
    let fragment = kuchiki::parse_html().one(html.as_str());
    let marker = match fragment.select_first(&format!("span.{}", MARKER_CLASS)) {
        Ok(marker) => marker.as_node().clone(),
        Err(()) => {
            warn!("failed to build replacement marker for '{}'", original);
            return None;
        }
    };
    marker.detach();
    Some(marker)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;")
}
