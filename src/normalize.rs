//! Message body normalization.
//!
//! Fingerprints and extraction prompts are both built from this output, so the
//! transformation must be deterministic: same input bytes, same output bytes,
//! on every run and every platform.

use std::sync::OnceLock;

use regex::Regex;

fn html_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)</?[a-z][a-z0-9]*(\s[^>]*)?/?>").expect("compile html tag regex")
    })
}

fn list_item_open_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)<\s*li\b[^>]*>").expect("compile li open regex"))
}

fn block_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)</?\s*(div|p|br|h[1-6]|li|tr|td|th)\b[^>]*/?>")
            .expect("compile block tag regex")
    })
}

fn any_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("compile tag strip regex"))
}

fn decimal_entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"&#(\d+);").expect("compile decimal entity regex"))
}

fn hex_entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"&#[xX]([0-9a-fA-F]+);").expect("compile hex entity regex"))
}

fn space_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]+").expect("compile space run regex"))
}

fn newline_padding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r" ?\n ?").expect("compile newline padding regex"))
}

fn blank_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{3,}").expect("compile blank run regex"))
}

/// Convert a raw message body (plain text or HTML) to clean plain text.
///
/// HTML handling: block-level tags become newlines, list items become bullet
/// lines, all remaining tags are stripped, and a fixed set of named entities
/// plus numeric decimal/hex escapes are decoded. Plain-text input only gets
/// the whitespace collapse. Never fails; empty input yields an empty string.
pub fn normalize_body(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }

    let text = if html_tag_pattern().is_match(body) {
        let with_bullets = list_item_open_pattern().replace_all(body, "\n\u{2022} ");
        let with_breaks = block_tag_pattern().replace_all(&with_bullets, "\n");
        let stripped = any_tag_pattern().replace_all(&with_breaks, "");
        decode_entities(&stripped)
    } else {
        body.to_string()
    };

    collapse_whitespace(&text)
}

/// Truncated single-line preview of normalized text, for the stored record.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().take(max_chars).collect()
}

fn decode_entities(text: &str) -> String {
    let decoded = decimal_entity_pattern().replace_all(text, |caps: &regex::Captures<'_>| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    let decoded = hex_entity_pattern().replace_all(&decoded, |caps: &regex::Captures<'_>| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    // &amp; last so "&amp;lt;" decodes to "&lt;", not "<".
    decoded
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let spaced = space_run_pattern().replace_all(&unified, " ");
    let tight = newline_padding_pattern().replace_all(&spaced, "\n");
    let bounded = blank_run_pattern().replace_all(&tight, "\n\n");
    bounded.trim().to_string()
}
