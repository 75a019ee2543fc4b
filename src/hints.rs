//! Best-effort product hints scraped for display, independent of the model.

use markup_excerpt::normalize_whitespace;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::sync::OnceLock;

/// Hint value when no price-looking text was found.
pub const PRICE_NOT_FOUND: &str = "Precio no encontrado";
/// Hint value when no description was found.
pub const DESCRIPTION_NOT_FOUND: &str = "Descripción no encontrada";
/// Hint value when no availability statement was found.
pub const AVAILABILITY_NOT_FOUND: &str = "Disponibilidad no especificada";
/// Alt text for images that carry none.
pub const DEFAULT_IMAGE_ALT: &str = "Producto";

const MAX_IMAGES: usize = 3;
const DESCRIPTION_CHARS: usize = 200;

/// Image candidate for the product gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImage {
    /// Absolute image URL.
    pub src: String,
    /// Alt text.
    pub alt: String,
}

/// Display hints gathered from the page. Missing values hold sentinel strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductHints {
    /// Product name, or the page title.
    pub name: String,
    /// First price-looking text.
    pub price: String,
    /// Meta description or a shortened description block.
    pub description: String,
    /// Up to three product images.
    pub images: Vec<ProductImage>,
    /// Stock statement.
    pub availability: String,
}

struct HintSelectors {
    name: Vec<Selector>,
    price: Vec<Selector>,
    description: Vec<Selector>,
    images: Vec<Selector>,
    availability: Vec<Selector>,
}

fn parse_all(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|raw| Selector::parse(raw).expect("valid hint selector"))
        .collect()
}

fn selectors() -> &'static HintSelectors {
    static SELECTORS: OnceLock<HintSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| HintSelectors {
        name: parse_all(&[
            "h1",
            "[data-testid*=\"title\"]",
            "[class*=\"title\"]",
            "[class*=\"product-name\"]",
            "[class*=\"product-title\"]",
            "h1[class*=\"product\"]",
            ".product-name",
            ".product-title",
        ]),
        price: parse_all(&[
            "[class*=\"price\"]",
            "[class*=\"cost\"]",
            "[data-testid*=\"price\"]",
            ".price",
            ".cost",
            "span[class*=\"price\"]",
        ]),
        description: parse_all(&[
            "[class*=\"description\"]",
            "[class*=\"desc\"]",
            "[data-testid*=\"description\"]",
            ".description",
            ".desc",
            "meta[name=\"description\"]",
        ]),
        images: parse_all(&[
            "img[class*=\"product\"]",
            "img[class*=\"main\"]",
            "img[alt*=\"product\"]",
            "img[alt*=\"main\"]",
            ".product-image img",
            ".main-image img",
        ]),
        availability: parse_all(&[
            "[class*=\"stock\"]",
            "[class*=\"availability\"]",
            "[class*=\"inventory\"]",
            ".stock",
            ".availability",
        ]),
    })
}

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[$€£¥]?\d+[.,]\d{2}|\d+[.,]\d{2}[$€£¥]?").expect("valid price pattern")
    })
}

/// Scrapes display hints from `markup`. Never fails; absent values use sentinels.
pub fn extract_hints(markup: &str, title: &str) -> ProductHints {
    let document = Html::parse_document(markup);
    let selectors = selectors();

    ProductHints {
        name: first_text(&document, &selectors.name).unwrap_or_else(|| title.to_string()),
        price: find_price(&document, &selectors.price),
        description: find_description(&document, &selectors.description),
        images: find_images(&document, &selectors.images),
        availability: first_text(&document, &selectors.availability)
            .unwrap_or_else(|| AVAILABILITY_NOT_FOUND.to_string()),
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .next()
            .map(|element| element_text(&element))
            .filter(|text| !text.is_empty())
    })
}

fn find_price(document: &Html, selectors: &[Selector]) -> String {
    selectors
        .iter()
        .flat_map(|selector| document.select(selector))
        .map(|element| element_text(&element))
        .find(|text| price_re().is_match(text))
        .unwrap_or_else(|| PRICE_NOT_FOUND.to_string())
}

fn find_description(document: &Html, selectors: &[Selector]) -> String {
    for selector in selectors {
        let Some(element) = document.select(selector).next() else {
            continue;
        };
        if element.value().name() == "meta" {
            return element
                .value()
                .attr("content")
                .map(normalize_whitespace)
                .unwrap_or_default();
        }
        let text = element_text(&element);
        if !text.is_empty() {
            let mut short: String = text.chars().take(DESCRIPTION_CHARS).collect();
            short.push_str("...");
            return short;
        }
    }
    DESCRIPTION_NOT_FOUND.to_string()
}

fn find_images(document: &Html, selectors: &[Selector]) -> Vec<ProductImage> {
    let mut images: Vec<ProductImage> = Vec::new();
    for element in selectors.iter().flat_map(|selector| document.select(selector)) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        if !src.starts_with("http") || images.iter().any(|image| image.src == src) {
            continue;
        }
        let alt = element
            .value()
            .attr("alt")
            .filter(|alt| !alt.is_empty())
            .unwrap_or(DEFAULT_IMAGE_ALT);
        images.push(ProductImage {
            src: src.to_string(),
            alt: alt.to_string(),
        });
        if images.len() == MAX_IMAGES {
            break;
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"
    <html>
      <head><meta name="description" content="Parrilla a carbón"></head>
      <body>
        <h1 class="product-title">  Parrilla   Grill X </h1>
        <div class="buy-box">
          <span class="price-label">Precio</span>
          <span class="price">S/ 199.00</span>
        </div>
        <div class="product-description">Parrilla de acero inoxidable con tapa.</div>
        <img class="product-img" src="https://cdn.test/a.jpg" alt="Grill X frontal">
        <img class="product-img" src="/relative.jpg">
        <img class="main-photo" src="https://cdn.test/b.jpg">
        <div class="product-image"><img src="https://cdn.test/a.jpg"></div>
        <img alt="main product" src="https://cdn.test/c.jpg">
        <img class="product-thumb" src="https://cdn.test/d.jpg">
        <p class="stock-status">Quedan 3 unidades</p>
      </body>
    </html>
    "#;

    #[test]
    fn extracts_all_hints() {
        let hints = extract_hints(PAGE, "Grill X | Tienda");

        assert_eq!(hints.name, "Parrilla Grill X");
        assert_eq!(hints.price, "S/ 199.00");
        assert_eq!(
            hints.description,
            "Parrilla de acero inoxidable con tapa...."
        );
        assert_eq!(hints.availability, "Quedan 3 unidades");
        assert_eq!(
            hints.images,
            vec![
                ProductImage {
                    src: "https://cdn.test/a.jpg".to_string(),
                    alt: "Grill X frontal".to_string(),
                },
                ProductImage {
                    src: "https://cdn.test/d.jpg".to_string(),
                    alt: DEFAULT_IMAGE_ALT.to_string(),
                },
                ProductImage {
                    src: "https://cdn.test/b.jpg".to_string(),
                    alt: DEFAULT_IMAGE_ALT.to_string(),
                },
            ]
        );
    }

    #[test]
    fn missing_hints_use_sentinels() {
        let hints = extract_hints("<html><body><p>Hola</p></body></html>", "Página");
        assert_eq!(hints.name, "Página");
        assert_eq!(hints.price, PRICE_NOT_FOUND);
        assert_eq!(hints.description, DESCRIPTION_NOT_FOUND);
        assert_eq!(hints.availability, AVAILABILITY_NOT_FOUND);
        assert!(hints.images.is_empty());
    }

    #[test]
    fn meta_description_is_used_when_no_block_matches() {
        let html = r#"<head><meta name="description" content=" Cortadora   eléctrica "></head><body></body>"#;
        assert_eq!(extract_hints(html, "").description, "Cortadora eléctrica");
    }
}
