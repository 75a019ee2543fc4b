//! Relevance extraction: reduce a product page to a bounded, role-tagged excerpt.

use clap::ValueEnum;
use ego_tree::{NodeId, NodeRef};
use markup_excerpt::{
    clean_markup, normalize_whitespace, MarkupConfig, MarkupConfigError, DEFAULT_ELISION,
};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

use crate::excerpt::{ExcerptDocument, FragmentSet};
use crate::profile::{CompiledGroup, CompiledProfile, Role, SelectorProfile, Take};
use crate::snapshot::PageSnapshot;

/// Default byte ceiling for structural excerpts.
pub const DEFAULT_MAX_EXCERPT_BYTES: usize = 12_000;
/// Selector text below this many characters triggers the pattern pass.
pub const DEFAULT_MIN_STRUCTURAL_CHARS: usize = 100;
/// Closing instruction appended to every structural excerpt.
pub const CLOSING_DIRECTIVE: &str = "IMPORTANTE: extrae únicamente los datos del producto PRINCIPAL de esta página. \
Ignora productos relacionados, recomendados, accesorios sugeridos y sus precios.";
/// Fragment bytes a structural ceiling must leave after the directive and elision.
pub const MIN_CONTENT_BYTES: usize = 64;

const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Which extraction strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractionMode {
    /// Parse the document and query it with the selector profile.
    Structural,
    /// Work on the raw markup string: body region, cleanup, head/tail cut.
    Markup,
}

/// Extraction tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Strategy to run.
    pub mode: ExtractionMode,
    /// Byte ceiling for the serialized structural excerpt.
    pub max_excerpt_bytes: usize,
    /// Minimum selector text before the pattern pass is skipped.
    pub min_structural_chars: usize,
    /// Marker placed where oversized structural excerpts were cut.
    pub elision: String,
    /// Settings for the markup-string strategy.
    pub markup: MarkupConfig,
    /// Selector groups and fallback patterns.
    pub profile: SelectorProfile,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Structural,
            max_excerpt_bytes: DEFAULT_MAX_EXCERPT_BYTES,
            min_structural_chars: DEFAULT_MIN_STRUCTURAL_CHARS,
            elision: DEFAULT_ELISION.to_string(),
            markup: MarkupConfig::default(),
            profile: SelectorProfile::default(),
        }
    }
}

impl ExtractionConfig {
    /// Smallest `max_excerpt_bytes` that still leaves room for fragments.
    pub fn min_excerpt_bytes(&self) -> usize {
        CLOSING_DIRECTIVE.len() + 1 + self.elision.len() + MIN_CONTENT_BYTES
    }

    /// Rejects bounds that cannot hold the directive plus some content.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_bytes = self.min_excerpt_bytes();
        if self.max_excerpt_bytes < min_bytes {
            return Err(ConfigError::CeilingTooSmall {
                max_bytes: self.max_excerpt_bytes,
                min_bytes,
            });
        }
        self.markup.validate()?;
        Ok(())
    }
}

/// Extraction settings that cannot produce a bounded excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The structural ceiling is used up by the directive and elision marker.
    #[error("excerpt ceiling of {max_bytes} bytes is below the {min_bytes}-byte minimum")]
    CeilingTooSmall {
        /// Configured ceiling.
        max_bytes: usize,
        /// Directive, separator, elision and minimum content.
        min_bytes: usize,
    },
    /// Markup-mode head and tail do not fit the body ceiling.
    #[error(transparent)]
    Markup(#[from] MarkupConfigError),
}

/// Stateless extraction service. Selectors are compiled once at construction.
#[derive(Clone)]
pub struct Extractor {
    config: ExtractionConfig,
    profile: CompiledProfile,
    body: Selector,
}

impl Extractor {
    /// Builds an extractor, dropping any selector or pattern that fails to compile.
    ///
    /// Fails when the configured bounds are too small to hold an excerpt.
    pub fn new(config: ExtractionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let profile = config.profile.compile();
        Ok(Self {
            config,
            profile,
            body: Selector::parse("body").expect("body selector"),
        })
    }

    /// Returns the underlying config reference.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Produces the excerpt for `snapshot`. Never fails; a page with nothing
    /// recognizable yields an excerpt holding only the title and directive.
    pub fn extract(&self, snapshot: &PageSnapshot) -> ExcerptDocument {
        let doc = match self.config.mode {
            ExtractionMode::Structural => self.extract_structural(snapshot),
            ExtractionMode::Markup => ExcerptDocument::from_markup(markup_excerpt::excerpt(
                &snapshot.title,
                &snapshot.raw_markup,
                &self.config.markup,
            )),
        };
        info!(
            url = %snapshot.url,
            mode = ?self.config.mode,
            fragments = doc.fragments().len(),
            bytes = doc.as_str().len(),
            truncated = doc.truncated(),
            "excerpt built"
        );
        doc
    }

    fn extract_structural(&self, snapshot: &PageSnapshot) -> ExcerptDocument {
        let document = Html::parse_document(&snapshot.raw_markup);
        let mut fragments = FragmentSet::new();

        let title = normalize_whitespace(&snapshot.title);
        fragments.push(Role::Title, title.clone(), title);

        for group in &self.profile.groups {
            collect_group(&document, group, &mut fragments);
        }

        let structural_chars = fragments.text_chars_excluding(&[Role::Title]);
        if structural_chars < self.config.min_structural_chars {
            debug!(
                structural_chars,
                threshold = self.config.min_structural_chars,
                "selectors found little text; scanning visible text for patterns"
            );
            let root = document
                .select(&self.body)
                .next()
                .unwrap_or_else(|| document.root_element());
            let text = visible_text(&root);
            collect_patterns(&text, &self.profile, &mut fragments);
        }

        ExcerptDocument::bounded(
            fragments.into_vec(),
            Some(CLOSING_DIRECTIVE),
            self.config.max_excerpt_bytes,
            &self.config.elision,
        )
    }
}

/// Builds the excerpt for `snapshot` with a one-off extractor.
pub fn build_excerpt(
    snapshot: &PageSnapshot,
    config: &ExtractionConfig,
) -> Result<ExcerptDocument, ConfigError> {
    Ok(Extractor::new(config.clone())?.extract(snapshot))
}

fn collect_group(document: &Html, group: &CompiledGroup, fragments: &mut FragmentSet) {
    let limit = match group.take {
        Take::First => 1,
        Take::All(limit) => limit,
    };
    if limit == 0 {
        return;
    }

    // Matches nested in, or wrapping, an element this group already took
    // would repeat its text.
    let mut taken: HashSet<NodeId> = HashSet::new();
    let mut kept = 0usize;
    for selector in &group.selectors {
        for element in document.select(selector) {
            if element.ancestors().any(|node| taken.contains(&node.id()))
                || element.descendants().any(|node| taken.contains(&node.id()))
            {
                continue;
            }
            let text = visible_text(&element);
            if text.is_empty() || fragments.contains(&text) {
                continue;
            }
            let content = clean_markup(&element.html());
            if fragments.push(group.role, content, text) {
                taken.insert(element.id());
                kept += 1;
                if kept >= limit {
                    return;
                }
            }
        }
    }
    if kept == 0 {
        debug!(role = group.role.tag(), "no selector matched");
    }
}

fn collect_patterns(text: &str, profile: &CompiledProfile, fragments: &mut FragmentSet) {
    let mut emitted = 0usize;
    for (name, regex) in &profile.patterns {
        for found in regex.find_iter(text) {
            if emitted >= profile.max_pattern_matches {
                debug!(limit = profile.max_pattern_matches, "pattern fragment limit reached");
                return;
            }
            let matched = normalize_whitespace(found.as_str());
            if fragments.push(Role::FreeTextPatternMatch, matched.clone(), matched) {
                debug!(pattern = %name, "pattern matched");
                emitted += 1;
            }
        }
    }
}

/// Visible text below `element`, with script-like subtrees skipped.
fn visible_text(element: &ElementRef<'_>) -> String {
    let mut buf = String::new();
    collect_visible(**element, &mut buf);
    normalize_whitespace(&buf)
}

fn collect_visible(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(text);
            out.push(' ');
        }
        Node::Element(element) if INVISIBLE_TAGS.contains(&element.name()) => {}
        _ => {
            for child in node.children() {
                collect_visible(child, out);
            }
        }
    }
}
