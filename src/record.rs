//! Normalized product record returned to callers and stored in the cart.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON keys of [`ProductRecord`], in the order the prompt lists them.
pub const FIELD_NAMES: [&str; 9] = [
    "productName",
    "currentPrice",
    "originalPrice",
    "discounts",
    "category",
    "description",
    "specifications",
    "availability",
    "sku",
];

/// Sentinel used by the prompt and most record defaults for missing data.
pub const NOT_AVAILABLE: &str = "No disponible";
/// Default product name when the model did not name the product.
pub const DEFAULT_PRODUCT_NAME: &str = "Producto analizado por IA";
/// Default current price.
pub const DEFAULT_CURRENT_PRICE: &str = "No determinado";
/// Default category.
pub const DEFAULT_CATEGORY: &str = "Categoría no determinada";
/// Default description.
pub const DEFAULT_DESCRIPTION: &str = "Descripción no disponible";

/// Product data recovered from a model reply.
///
/// Every field is always populated: values the model omitted keep their sentinel
/// defaults, and keys outside [`FIELD_NAMES`] are never represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductRecord {
    /// Name of the main product on the page.
    pub product_name: String,
    /// Price currently charged.
    pub current_price: String,
    /// Struck-through list price, when shown.
    pub original_price: String,
    /// Discounts that apply to the main product, in page order.
    pub discounts: Vec<String>,
    /// Product category.
    pub category: String,
    /// Free-form description.
    pub description: String,
    /// Technical specifications.
    pub specifications: String,
    /// Stock or availability statement.
    pub availability: String,
    /// Seller SKU or product code.
    pub sku: String,
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self {
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
            current_price: DEFAULT_CURRENT_PRICE.to_string(),
            original_price: NOT_AVAILABLE.to_string(),
            discounts: Vec::new(),
            category: DEFAULT_CATEGORY.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            specifications: NOT_AVAILABLE.to_string(),
            availability: NOT_AVAILABLE.to_string(),
            sku: NOT_AVAILABLE.to_string(),
        }
    }
}

impl ProductRecord {
    /// Overlays the recognized keys of `fields` on top of the defaults.
    ///
    /// Values are coerced to the record's shape: scalars become strings, arrays and
    /// objects are flattened to readable text, and `null` or blank values keep the
    /// default. Unrecognized keys are ignored.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let mut record = Self::default();
        let text_slots: [(&str, &mut String); 8] = [
            ("productName", &mut record.product_name),
            ("currentPrice", &mut record.current_price),
            ("originalPrice", &mut record.original_price),
            ("category", &mut record.category),
            ("description", &mut record.description),
            ("specifications", &mut record.specifications),
            ("availability", &mut record.availability),
            ("sku", &mut record.sku),
        ];
        for (key, slot) in text_slots {
            if let Some(text) = fields.get(key).and_then(value_text) {
                *slot = text;
            }
        }
        if let Some(discounts) = fields.get("discounts").map(value_list) {
            record.discounts = discounts;
        }
        record
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(entries) => entries
            .iter()
            .filter_map(|(key, value)| value_text(value).map(|text| format!("{key}: {text}")))
            .collect::<Vec<_>>()
            .join("; "),
    };
    (!text.is_empty()).then_some(text)
}

fn value_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}
