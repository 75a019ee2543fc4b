//! Data-driven selector profiles for structural extraction.
//!
//! A profile maps each semantic role to an ordered group of CSS selectors and
//! carries the regex patterns used when selectors find too little. New site
//! profiles are plain JSON documents; nothing here branches on a site.

use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Semantic label attached to every excerpt fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Page title.
    Title,
    /// Breadcrumb trail.
    Breadcrumb,
    /// Main product name.
    ProductName,
    /// Price block.
    Price,
    /// Product description.
    Description,
    /// Specification table or list.
    Specification,
    /// Stock or availability statement.
    Availability,
    /// SKU or product code.
    Sku,
    /// Category label.
    Category,
    /// Text matched by a fallback pattern.
    FreeTextPatternMatch,
    /// Cleaned page body (markup-string extraction only).
    Body,
}

impl Role {
    /// Tag name used when the fragment is wrapped for the prompt.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Breadcrumb => "breadcrumb",
            Self::ProductName => "product-name",
            Self::Price => "price",
            Self::Description => "description",
            Self::Specification => "specification",
            Self::Availability => "availability",
            Self::Sku => "sku",
            Self::Category => "category",
            Self::FreeTextPatternMatch => "free-text-pattern-match",
            Self::Body => "body",
        }
    }
}

/// How many matches a selector group contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Take {
    /// Stop at the first usable match across the group's selectors.
    First,
    /// Keep every usable match, up to the given count.
    All(usize),
}

/// Ordered selector candidates for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorGroup {
    /// Role assigned to every match.
    pub role: Role,
    /// Match policy.
    pub take: Take,
    /// CSS selectors, tried in order.
    pub selectors: Vec<String>,
}

/// Regex applied to the page's visible text in the fallback pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Short label used in logs.
    pub name: String,
    /// Regex source.
    pub pattern: String,
    /// Match without regard to case.
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Complete extraction profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorProfile {
    /// Profile label used in logs.
    pub name: String,
    /// Selector groups, applied in order.
    pub groups: Vec<SelectorGroup>,
    /// Fallback patterns, applied in order.
    pub patterns: Vec<PatternRule>,
    /// Upper bound on fragments produced by the pattern pass.
    #[serde(default = "default_max_pattern_matches")]
    pub max_pattern_matches: usize,
}

fn default_max_pattern_matches() -> usize {
    24
}

fn group(role: Role, take: Take, selectors: &[&str]) -> SelectorGroup {
    SelectorGroup {
        role,
        take,
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
    }
}

fn rule(name: &str, pattern: &str, case_insensitive: bool) -> PatternRule {
    PatternRule {
        name: name.to_string(),
        pattern: pattern.to_string(),
        case_insensitive,
    }
}

impl Default for SelectorProfile {
    /// Generic storefront profile covering common class and microdata conventions.
    fn default() -> Self {
        Self {
            name: "generic-storefront".to_string(),
            groups: vec![
                group(
                    Role::Breadcrumb,
                    Take::First,
                    &[
                        "nav[aria-label*=\"breadcrumb\"]",
                        "[class*=\"breadcrumb\"]",
                        "[itemtype*=\"BreadcrumbList\"]",
                    ],
                ),
                group(
                    Role::ProductName,
                    Take::First,
                    &[
                        "h1[class*=\"product\"]",
                        "[class*=\"product-name\"]",
                        "[class*=\"product-title\"]",
                        "[itemprop=\"name\"]",
                        "[data-testid*=\"title\"]",
                        "h1",
                    ],
                ),
                group(
                    Role::Price,
                    Take::All(6),
                    &[
                        "[itemprop=\"price\"]",
                        "[data-testid*=\"price\"]",
                        "[class*=\"price\"]",
                        "[class*=\"cost\"]",
                    ],
                ),
                group(
                    Role::Description,
                    Take::First,
                    &[
                        "[itemprop=\"description\"]",
                        "[data-testid*=\"description\"]",
                        "[class*=\"description\"]",
                        "[class*=\"desc\"]",
                    ],
                ),
                group(
                    Role::Specification,
                    Take::All(3),
                    &[
                        "[class*=\"specification\"]",
                        "[class*=\"ficha\"]",
                        "table[class*=\"attributes\"]",
                        "[class*=\"spec\"]",
                    ],
                ),
                group(
                    Role::Availability,
                    Take::First,
                    &[
                        "[itemprop=\"availability\"]",
                        "[class*=\"availability\"]",
                        "[class*=\"stock\"]",
                        "[class*=\"inventory\"]",
                    ],
                ),
                group(
                    Role::Sku,
                    Take::First,
                    &["[itemprop=\"sku\"]", "[class*=\"sku\"]", "[data-sku]"],
                ),
                group(
                    Role::Category,
                    Take::First,
                    &["[itemprop=\"category\"]", "[class*=\"category\"]"],
                ),
            ],
            patterns: vec![
                rule("soles", r"S/\s?\d+(?:[.,]\d{3})*(?:[.,]\d{1,2})?", false),
                rule("euro-prefix", r"€\s?\d+(?:[.,]\d{3})*(?:[.,]\d{2})?", false),
                rule("euro-suffix", r"\d+(?:[.,]\d{3})*[.,]\d{2}\s?€", false),
                rule("dollar", r"\$\s?\d+(?:[.,]\d{3})*(?:[.,]\d{2})?", false),
                rule(
                    "dimensions",
                    r"\d+(?:[.,]\d+)?\s?x\s?\d+(?:[.,]\d+)?(?:\s?x\s?\d+(?:[.,]\d+)?)?\s?cm",
                    true,
                ),
                rule("capacity", r"capacidad:?\s*\d+(?:[.,]\d+)?\s?kg", true),
            ],
            max_pattern_matches: default_max_pattern_matches(),
        }
    }
}

impl SelectorProfile {
    /// Loads a profile from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ProfileError> {
        let raw = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ProfileError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Compiles selectors and patterns, skipping any that fail to parse.
    pub fn compile(&self) -> CompiledProfile {
        let groups = self
            .groups
            .iter()
            .map(|group| CompiledGroup {
                role: group.role,
                take: group.take,
                selectors: group
                    .selectors
                    .iter()
                    .filter_map(|raw| match Selector::parse(raw) {
                        Ok(selector) => Some(selector),
                        Err(err) => {
                            warn!(profile = %self.name, selector = %raw, error = %err, "skipping invalid selector");
                            None
                        }
                    })
                    .collect(),
            })
            .collect();

        let patterns = self
            .patterns
            .iter()
            .filter_map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(rule.case_insensitive)
                    .build()
                    .map_err(|err| {
                        warn!(profile = %self.name, pattern = %rule.name, error = %err, "skipping invalid pattern");
                    })
                    .ok()
                    .map(|regex| (rule.name.clone(), regex))
            })
            .collect();

        CompiledProfile {
            groups,
            patterns,
            max_pattern_matches: self.max_pattern_matches,
        }
    }
}

/// Failure to read a profile file.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The file could not be read.
    #[error("failed to read profile '{path}': {source}")]
    Io {
        /// Profile path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid profile document.
    #[error("failed to parse profile '{path}': {source}")]
    Parse {
        /// Profile path.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Selector group with parsed selectors.
#[derive(Debug, Clone)]
pub struct CompiledGroup {
    /// Role assigned to every match.
    pub role: Role,
    /// Match policy.
    pub take: Take,
    /// Selectors that parsed successfully.
    pub selectors: Vec<Selector>,
}

/// Profile ready for repeated extraction.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    /// Compiled selector groups.
    pub groups: Vec<CompiledGroup>,
    /// Named patterns that compiled successfully.
    pub patterns: Vec<(String, Regex)>,
    /// Upper bound on pattern fragments.
    pub max_pattern_matches: usize,
}
