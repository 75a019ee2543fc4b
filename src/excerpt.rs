//! Role-tagged excerpt fragments and their bounded serialization.

use markup_excerpt::{wrap, MarkupExcerpt};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::profile::Role;

/// One labelled piece of the excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    /// Semantic role.
    pub role: Role,
    /// Payload sent to the model (cleaned outer markup, or plain text).
    pub content: String,
    /// Whitespace-collapsed visible text, used for deduplication.
    pub text: String,
}

/// Ordered fragments that never repeat the same visible text.
#[derive(Debug, Default)]
pub struct FragmentSet {
    fragments: Vec<Fragment>,
    seen: HashSet<String>,
}

impl FragmentSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment unless its text is blank or already present.
    ///
    /// Returns whether the fragment was kept.
    pub fn push(&mut self, role: Role, content: String, text: String) -> bool {
        let text = text.trim().to_string();
        if text.is_empty() || self.seen.contains(&text) {
            return false;
        }
        self.seen.insert(text.clone());
        self.fragments.push(Fragment {
            role,
            content,
            text,
        });
        true
    }

    /// Whether `text` (trimmed) is already present.
    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text.trim())
    }

    /// Number of kept fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// True when nothing was kept.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Total characters of visible text for fragments with any of `roles` excluded.
    pub fn text_chars_excluding(&self, excluded: &[Role]) -> usize {
        self.fragments
            .iter()
            .filter(|fragment| !excluded.contains(&fragment.role))
            .map(|fragment| fragment.text.chars().count())
            .sum()
    }

    /// Consumes the set, yielding fragments in insertion order.
    pub fn into_vec(self) -> Vec<Fragment> {
        self.fragments
    }
}

/// Extractor output: fragments plus their serialized, size-bounded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcerptDocument {
    fragments: Vec<Fragment>,
    rendered: String,
    truncated: bool,
}

impl ExcerptDocument {
    /// Serializes fragments and a trailing directive within `max_bytes`.
    ///
    /// When the wrapped fragments do not fit, the middle is dropped: the leading
    /// and trailing halves of the budget are kept around `elision`. The directive
    /// is appended whole unless it alone exceeds `max_bytes`, in which case it is
    /// cut and the fragments are left out. The rendered text never exceeds
    /// `max_bytes`.
    pub fn bounded(
        fragments: Vec<Fragment>,
        directive: Option<&str>,
        max_bytes: usize,
        elision: &str,
    ) -> Self {
        let body = fragments
            .iter()
            .map(|fragment| wrap(fragment.role.tag(), &fragment.content))
            .collect::<Vec<_>>()
            .join("\n");
        let (directive, directive_cut) = match directive {
            Some(d) if d.len() > max_bytes => (Some(&d[..floor_boundary(d, max_bytes)]), true),
            other => (other, false),
        };
        let directive_bytes = directive.map(|d| d.len() + 1).unwrap_or(0);
        let budget = max_bytes.saturating_sub(directive_bytes);
        let truncated = directive_cut || body.len() > budget;
        let mut rendered = if body.len() > budget {
            head_tail_bytes(&body, budget, elision)
        } else {
            body
        };
        if let Some(directive) = directive {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            rendered.push_str(directive);
        }

        Self {
            fragments,
            rendered,
            truncated,
        }
    }

    /// Builds a two-fragment document (title, body) from a markup excerpt.
    ///
    /// The body was already bounded by character count.
    pub fn from_markup(excerpt: MarkupExcerpt) -> Self {
        let rendered = excerpt.render();
        let mut fragments = Vec::with_capacity(2);
        if !excerpt.title.is_empty() {
            fragments.push(Fragment {
                role: Role::Title,
                text: excerpt.title.clone(),
                content: excerpt.title,
            });
        }
        fragments.push(Fragment {
            role: Role::Body,
            text: excerpt.body.clone(),
            content: excerpt.body,
        });

        Self {
            fragments,
            rendered,
            truncated: excerpt.truncated,
        }
    }

    /// Fragments in output order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Serialized excerpt, as embedded in the prompt.
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// True when part of the content was elided to respect the size bound.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Fragments carrying the given role.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter().filter(move |f| f.role == role)
    }
}

impl fmt::Display for ExcerptDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Keeps the head and tail of `text` so that the result fits in `budget` bytes.
fn head_tail_bytes(text: &str, budget: usize, elision: &str) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    if budget <= elision.len() {
        return text[..floor_boundary(text, budget)].to_string();
    }
    let room = budget - elision.len();
    let head_end = floor_boundary(text, room / 2);
    let tail_start = ceil_boundary(text, text.len() - (room - room / 2));
    let mut out = String::with_capacity(budget);
    out.push_str(&text[..head_end]);
    out.push_str(elision);
    out.push_str(&text[tail_start..]);
    out
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup_excerpt::BodySource;
    use pretty_assertions::assert_eq;

    fn fragment(role: Role, text: &str) -> Fragment {
        Fragment {
            role,
            content: text.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn fragment_set_drops_duplicates_and_blanks() {
        let mut set = FragmentSet::new();
        assert!(set.push(Role::Price, "<b>S/ 10</b>".into(), "S/ 10".into()));
        assert!(!set.push(Role::Price, "<i>S/ 10</i>".into(), " S/ 10 ".into()));
        assert!(!set.push(Role::Sku, "<span></span>".into(), "   ".into()));
        assert!(set.push(Role::Sku, "A1".into(), "A1".into()));
        assert_eq!(set.len(), 2);
        assert!(set.contains("S/ 10"));
        assert_eq!(set.text_chars_excluding(&[Role::Sku]), 5);
    }

    #[test]
    fn renders_wrapped_fragments_then_directive() {
        let doc = ExcerptDocument::bounded(
            vec![fragment(Role::ProductName, "Grill X"), fragment(Role::Price, "S/ 199")],
            Some("Ignore other products."),
            1024,
            "\n...\n",
        );
        assert_eq!(
            doc.as_str(),
            "<product-name>\nGrill X\n</product-name>\n<price>\nS/ 199\n</price>\nIgnore other products."
        );
        assert!(!doc.truncated());
    }

    #[test]
    fn oversized_documents_keep_head_and_tail() {
        let fragments = vec![
            fragment(Role::ProductName, "Grill X"),
            fragment(Role::Description, &"relleno ".repeat(500)),
            fragment(Role::Specification, "Peso 12 kg"),
        ];
        let directive = "Solo el producto principal.";
        let doc = ExcerptDocument::bounded(fragments, Some(directive), 400, "\n...\n");

        assert!(doc.truncated());
        assert!(doc.as_str().len() <= 400);
        assert!(doc.as_str().starts_with("<product-name>\nGrill X"));
        assert!(doc.as_str().contains("Peso 12 kg\n</specification>"));
        assert!(doc.as_str().ends_with(directive));
        assert!(doc.as_str().contains("\n...\n"));
    }

    #[test]
    fn ceiling_holds_when_directive_leaves_little_room() {
        let directive = "Extrae solo el producto principal de la pagina";
        assert_eq!(directive.len(), 46);
        let name = || vec![fragment(Role::ProductName, "Grill X")];

        let doc = ExcerptDocument::bounded(name(), Some(directive), 20, "\n...\n");
        assert!(doc.truncated());
        assert_eq!(doc.as_str(), &directive[..20]);

        let doc = ExcerptDocument::bounded(name(), Some(directive), 51, "\n...\n");
        assert!(doc.truncated());
        assert_eq!(doc.as_str().len(), 51);
        assert_eq!(doc.as_str(), format!("<pro\n{directive}"));

        let doc = ExcerptDocument::bounded(name(), Some(directive), 70, "\n...\n");
        assert!(doc.as_str().len() <= 70);
        assert!(doc.as_str().starts_with("<product-"));
        assert!(doc.as_str().contains("\n...\n"));
        assert!(doc.as_str().ends_with(directive));
    }

    #[test]
    fn byte_cut_never_splits_characters() {
        let text = "ññññññññññ";
        let cut = head_tail_bytes(text, 9, "|");
        assert!(cut.len() <= 9);
        assert_eq!(cut, "ññ|ññ");
    }

    #[test]
    fn markup_documents_keep_title_and_body() {
        let doc = ExcerptDocument::from_markup(MarkupExcerpt {
            title: "Grill X".to_string(),
            body: "<h1>Grill X</h1>".to_string(),
            source: BodySource::Body,
            truncated: false,
        });
        let roles: Vec<Role> = doc.fragments().iter().map(|f| f.role).collect();
        assert_eq!(roles, vec![Role::Title, Role::Body]);
        assert_eq!(doc.as_str(), "<title>\nGrill X\n</title>\n<body>\n<h1>Grill X</h1>\n</body>");
        assert_eq!(doc.by_role(Role::Body).count(), 1);
    }
}
