//! Splits one model reply into the three site files.
//!
//! Precedence per section: explicit delimiter pair, then the first fenced
//! block tagged with the section's language, then empty. A start marker with
//! no matching end marker does not match and falls through to the fenced
//! block search.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ExtractedCode, RawModelResponse};

pub const HTML_START: &str = "<!-- HTML START -->";
pub const HTML_END: &str = "<!-- HTML END -->";
pub const CSS_START: &str = "/* CSS START */";
pub const CSS_END: &str = "/* CSS END */";
pub const JS_START: &str = "// JavaScript START";
pub const JS_END: &str = "// JavaScript END";

const FENCE: &str = "```";

// HTML is greedy: first start marker through the last end marker.
static HTML_DELIMITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!-- HTML START -->(.*)<!-- HTML END -->").expect("Invalid html delimiter regex"));
static CSS_DELIMITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\* CSS START \*/(.*?)/\* CSS END \*/").expect("Invalid css delimiter regex"));
static JS_DELIMITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)// JavaScript START(.*?)// JavaScript END").expect("Invalid js delimiter regex"));

static HTML_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```html\s*(.*?)\s*```").expect("Invalid html fence regex"));
static CSS_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```css\s*(.*?)\s*```").expect("Invalid css fence regex"));
static JS_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:javascript|js)\s*(.*?)\s*```").expect("Invalid js fence regex"));

static HTML_LEFTOVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```html\s*|\s*```").expect("Invalid html cleanup regex"));
static CSS_LEFTOVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```css\s*|\s*```").expect("Invalid css cleanup regex"));
static JS_LEFTOVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:javascript|js)\s*|\s*```").expect("Invalid js cleanup regex"));

pub fn extract(raw: &RawModelResponse) -> ExtractedCode {
    let text = raw.as_str();
    ExtractedCode {
        html: extract_section(text, &HTML_DELIMITED, &HTML_FENCED, &HTML_LEFTOVER),
        css: extract_section(text, &CSS_DELIMITED, &CSS_FENCED, &CSS_LEFTOVER),
        js: extract_section(text, &JS_DELIMITED, &JS_FENCED, &JS_LEFTOVER),
    }
}

fn extract_section(text: &str, delimited: &Regex, fenced: &Regex, leftover: &Regex) -> String {
    let found = first_group(delimited, text)
        .or_else(|| first_group(fenced, text))
        .unwrap_or_default();
    strip_fences(&found, leftover)
}

fn first_group(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Removing one fence can splice stray backticks into a new one, so repeat
/// until none are left.
fn strip_fences(content: &str, leftover: &Regex) -> String {
    let mut out = content.to_string();
    while out.contains(FENCE) {
        out = leftover.replace_all(&out, "").into_owned();
    }
    out
}
