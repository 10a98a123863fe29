//! Sanitization of captured strings and validation of user prompts.
//!
//! Everything that leaves the page (element text, prompts) and everything
//! that comes back from the AI endpoint goes through [`sanitize`].

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub const MIN_PROMPT_CHARS: usize = 5;
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Case-insensitive substrings that reject a prompt outright.
pub const PROMPT_BLOCKLIST: &[&str] = &[
    "javascript:",
    "<script",
    "eval(",
    "document.cookie",
    "vbscript:",
    "data:text/html",
];

/// Inline handler properties checked by the listener heuristic.
pub const INLINE_HANDLER_PROPERTIES: &[&str] = &[
    "onclick",
    "ondblclick",
    "onmousedown",
    "onmouseup",
    "onmouseover",
    "onmouseout",
    "onmouseenter",
    "onmouseleave",
    "onmousemove",
    "onkeydown",
    "onkeyup",
    "onkeypress",
    "onfocus",
    "onblur",
    "onchange",
    "oninput",
    "onsubmit",
    "ontouchstart",
    "ontouchend",
    "oncontextmenu",
];

/// Handler attributes stripped by [`sanitize`] on top of
/// [`INLINE_HANDLER_PROPERTIES`].
pub const SCRIPT_HANDLER_ATTRIBUTES: &[&str] = &[
    "onerror",
    "onload",
    "onunload",
    "onbeforeunload",
    "onabort",
    "onauxclick",
    "onpointerdown",
    "onpointerup",
    "onpointerover",
    "onpointermove",
    "onwheel",
    "onscroll",
    "onresize",
    "onanimationstart",
    "onanimationend",
    "ontransitionend",
    "oncopy",
    "oncut",
    "onpaste",
    "ondrag",
    "ondrop",
    "onselect",
    "onreset",
    "oninvalid",
    "ontoggle",
    "onfocusin",
    "onfocusout",
];

lazy_static! {
    static ref SCRIPT_SCHEME: Regex = Regex::new(r"(?i)(javascript|vbscript)\s*:").unwrap();
    static ref INLINE_HANDLER: Regex = {
        let names: Vec<&str> = INLINE_HANDLER_PROPERTIES
            .iter()
            .chain(SCRIPT_HANDLER_ATTRIBUTES)
            .copied()
            .collect();
        Regex::new(&format!(r"(?i)\b(?:{})\s*=", names.join("|"))).unwrap()
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Prompt is empty")]
    Empty,
    #[error("Prompt is too short ({len} characters, minimum {min})")]
    TooShort { len: usize, min: usize },
    #[error("Prompt is too long ({len} characters, maximum {max})")]
    TooLong { len: usize, max: usize },
    #[error("Prompt contains a blocked pattern: {pattern}")]
    Suspicious { pattern: String },
}

/// Strips markup delimiters, script schemes, assignments to known event
/// handler attributes and control characters, then trims. Ordinary words
/// that start with `on` are left alone.
pub fn sanitize(input: &str) -> String {
    let without_markup: String = input
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let without_schemes = SCRIPT_SCHEME.replace_all(&without_markup, "");
    let without_handlers = INLINE_HANDLER.replace_all(&without_schemes, "");
    without_handlers.trim().to_string()
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

/// Sanitizes and then truncates, so the bound holds on the final string.
pub fn sanitize_bounded(input: &str, max: usize) -> String {
    truncate_chars(&sanitize(input), max)
}

pub fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    let trimmed = prompt.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(ValidationError::Empty);
    }
    if len < MIN_PROMPT_CHARS {
        return Err(ValidationError::TooShort {
            len,
            min: MIN_PROMPT_CHARS,
        });
    }
    if len > MAX_PROMPT_CHARS {
        return Err(ValidationError::TooLong {
            len,
            max: MAX_PROMPT_CHARS,
        });
    }

    let lowered = trimmed.to_lowercase();
    if let Some(pattern) = PROMPT_BLOCKLIST.iter().find(|p| lowered.contains(*p)) {
        return Err(ValidationError::Suspicious {
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_sanitize_keeps_newlines() {
        assert_eq!(sanitize("a\nb\u{0007}c"), "a\nbc");
    }
}
