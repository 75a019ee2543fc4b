//! Reduce raw HTML markup to a bounded excerpt for model prompts.
//!
//! This crate works on markup strings directly, without building a DOM. It is the
//! path used when only the serialized page (plus its title) reached the extractor.
//! The body region is located by its tag delimiters, noisy sub-regions are removed,
//! whitespace is collapsed, and oversized bodies keep their opening and closing
//! text with an elision marker in between.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// This enables or disables the eprintln! macro, effectively removing it from the code when the
// "debug_logs" feature is disabled.
#[cfg(feature = "debug_logs")]
#[macro_export]
macro_rules! debug_log {
        ($($arg:tt)*) => {
            eprintln!($($arg)*);
        };
    }
#[cfg(not(feature = "debug_logs"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// Default ceiling, in characters, for the cleaned body.
pub const DEFAULT_MAX_BODY_CHARS: usize = 8000;
/// Characters kept from the start of an oversized body.
pub const DEFAULT_HEAD_CHARS: usize = 4000;
/// Characters kept from the end of an oversized body.
pub const DEFAULT_TAIL_CHARS: usize = 4000;
/// Marker inserted where the middle of an oversized body was dropped.
pub const DEFAULT_ELISION: &str = "\n...\n";

/// Tags whose whole region (open tag, content, close tag) is dropped.
const STRIPPED_REGIONS: &[&str] = &["script", "style"];
/// Void tags dropped on their own.
const STRIPPED_TAGS: &[&str] = &["link", "meta"];

/// Truncation knobs for the markup excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Bodies longer than this many characters are cut down to head + tail.
    pub max_body_chars: usize,
    /// Characters kept from the start when cutting.
    pub head_chars: usize,
    /// Characters kept from the end when cutting.
    pub tail_chars: usize,
    /// Marker placed between head and tail.
    pub elision: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
            head_chars: DEFAULT_HEAD_CHARS,
            tail_chars: DEFAULT_TAIL_CHARS,
            elision: DEFAULT_ELISION.to_string(),
        }
    }
}

impl MarkupConfig {
    /// Checks that the head and tail fit inside the body ceiling.
    pub fn validate(&self) -> Result<(), MarkupConfigError> {
        let kept = self.head_chars.saturating_add(self.tail_chars);
        if kept > self.max_body_chars {
            return Err(MarkupConfigError::SplitExceedsCeiling {
                kept,
                max_body_chars: self.max_body_chars,
            });
        }
        Ok(())
    }
}

/// Rejected [`MarkupConfig`] values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupConfigError {
    /// `head_chars + tail_chars` is larger than `max_body_chars`.
    SplitExceedsCeiling {
        /// Sum of head and tail characters.
        kept: usize,
        /// Configured ceiling.
        max_body_chars: usize,
    },
}

impl fmt::Display for MarkupConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SplitExceedsCeiling {
                kept,
                max_body_chars,
            } => write!(
                f,
                "head + tail keep {kept} chars, more than the {max_body_chars}-char body ceiling"
            ),
        }
    }
}

impl std::error::Error for MarkupConfigError {}

/// Where the excerpt body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySource {
    /// The first `<body>` region of the document.
    Body,
    /// No body delimiter was found; the whole document was cleaned instead.
    Document,
}

/// Cleaned, bounded body text plus the title it will be sent with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkupExcerpt {
    pub title: String,
    pub body: String,
    pub source: BodySource,
    /// True when the middle of the body was elided.
    pub truncated: bool,
}

impl MarkupExcerpt {
    /// Renders the excerpt as title and body wrappers.
    pub fn render(&self) -> String {
        format!("{}\n{}", wrap("title", &self.title), wrap("body", &self.body))
    }
}

/// Builds the excerpt for `markup`, labelled with `title`.
///
/// # Example
///
/// ```
/// use markup_excerpt::{excerpt, MarkupConfig};
///
/// let html = "<html><body><h1>Grill  X</h1><script>track()</script></body></html>";
/// let excerpt = excerpt("Grill X | Shop", html, &MarkupConfig::default());
/// assert_eq!(excerpt.body, "<h1>Grill X</h1>");
/// assert!(!excerpt.truncated);
/// ```
pub fn excerpt(title: &str, markup: &str, config: &MarkupConfig) -> MarkupExcerpt {
    let (region, source) = match body_region(markup) {
        Some(region) => (region, BodySource::Body),
        None => {
            debug_log!("no body delimiter found; cleaning whole document");
            (markup, BodySource::Document)
        }
    };
    let cleaned = clean_markup(region);
    let total = cleaned.chars().count();
    let truncated = total > config.max_body_chars;
    let body = if truncated {
        // Unvalidated configs are clamped to the ceiling.
        let head = config.head_chars.min(config.max_body_chars);
        let tail = config.tail_chars.min(config.max_body_chars - head);
        debug_log!(
            "body has {} chars; keeping {} head + {} tail",
            total,
            head,
            tail
        );
        head_tail(&cleaned, head, tail, &config.elision)
    } else {
        cleaned
    };

    MarkupExcerpt {
        title: normalize_whitespace(title),
        body,
        source,
        truncated,
    }
}

/// Returns the inner markup of the first `<body>` element.
///
/// A missing `</body>` is tolerated: everything after the opening tag is returned.
pub fn body_region(markup: &str) -> Option<&str> {
    let open = body_open_re().find(markup)?;
    let rest = &markup[open.end()..];
    let inner = match body_close_re().find(rest) {
        Some(close) => &rest[..close.start()],
        None => rest,
    };
    Some(inner)
}

/// Text of the first `<title>` element, whitespace-collapsed.
pub fn document_title(markup: &str) -> Option<String> {
    title_re()
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_whitespace(m.as_str()))
        .filter(|title| !title.is_empty())
}

/// Removes script, style, link, meta and comment regions, then collapses whitespace.
pub fn clean_markup(markup: &str) -> String {
    let mut current = markup.to_string();
    for re in stripped_res() {
        current = re.replace_all(&current, "").into_owned();
    }
    normalize_whitespace(&current)
}

/// Keeps the first `head` and last `tail` characters of `text`, joined by `elision`.
///
/// Text that already fits in `head + tail` characters is returned unchanged.
pub fn head_tail(text: &str, head: usize, tail: usize, elision: &str) -> String {
    let total = text.chars().count();
    if total <= head.saturating_add(tail) {
        return text.to_string();
    }
    let head_end = char_offset(text, head);
    let tail_start = char_offset(text, total - tail);
    let mut out = String::with_capacity(head_end + elision.len() + (text.len() - tail_start));
    out.push_str(&text[..head_end]);
    out.push_str(elision);
    out.push_str(&text[tail_start..]);
    out
}

/// Wraps `content` in `<tag>` markers on their own lines.
pub fn wrap(tag: &str, content: &str) -> String {
    format!("<{tag}>\n{content}\n</{tag}>")
}

/// Collapses every whitespace run into a single space and trims both ends.
pub fn normalize_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

fn char_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

fn body_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<body\b[^>]*>").expect("valid body open pattern"))
}

fn body_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</body\s*>").expect("valid body close pattern"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid title pattern")
    })
}

fn stripped_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        let mut patterns: Vec<String> = STRIPPED_REGIONS
            .iter()
            .map(|tag| format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
            .collect();
        patterns.extend(
            STRIPPED_TAGS
                .iter()
                .map(|tag| format!(r"(?i)<{tag}\b[^>]*>")),
        );
        patterns.push(r"(?s)<!--.*?-->".to_string());
        patterns
            .iter()
            .map(|pattern| Regex::new(pattern).expect("valid strip pattern"))
            .collect()
    })
}
