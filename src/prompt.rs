//! Prompt template sent to the language model.

use crate::excerpt::ExcerptDocument;
use crate::record::{FIELD_NAMES, NOT_AVAILABLE};
use crate::snapshot::PageSnapshot;

/// Schema keys paired with the description shown to the model.
///
/// Keys appear in the same order as [`FIELD_NAMES`].
pub const FIELD_HINTS: [(&str, &str); 9] = [
    ("productName", "\"nombre completo del producto PRINCIPAL\""),
    ("currentPrice", "\"precio actual del producto PRINCIPAL\""),
    ("originalPrice", "\"precio tachado del producto PRINCIPAL si hay\""),
    ("discounts", "[\"descuentos específicos del producto PRINCIPAL\"]"),
    ("category", "\"categoría del producto PRINCIPAL\""),
    ("description", "\"descripción del producto PRINCIPAL\""),
    ("specifications", "\"especificaciones del producto PRINCIPAL\""),
    ("availability", "\"stock del producto PRINCIPAL\""),
    ("sku", "\"SKU del producto PRINCIPAL\""),
];

const INSTRUCTIONS: &str = "INSTRUCCIONES IMPORTANTES:
1. **NOMBRE DEL PRODUCTO**: extrae SOLO el nombre del producto PRINCIPAL que se muestra en la página
2. **PRECIOS DEL PRODUCTO PRINCIPAL**:
   - Precio actual/online
   - Precio regular/original (si está tachado)
   - Precios especiales (tarjetas, membresías)
   - Porcentajes de descuento
   NO incluyas precios de productos relacionados o similares
3. **CATEGORÍA**: la categoría del producto PRINCIPAL
4. **DESCRIPCIÓN**: descripción específica del producto PRINCIPAL
5. **ESPECIFICACIONES**: especificaciones técnicas del producto PRINCIPAL
6. **DISPONIBILIDAD**: stock disponible del producto PRINCIPAL
7. **SKU/CÓDIGO**: SKU del producto PRINCIPAL

REGLAS CRÍTICAS:
- Extrae SOLO información del PRODUCTO PRINCIPAL de la página
- NO confundas productos relacionados con descuentos
- Si hay productos relacionados o recomendados, IGNÓRALOS
- Busca en TODO el contenido proporcionado";

/// Renders the prompt for `snapshot` around an already-built excerpt.
///
/// The output is a pure function of its inputs.
pub fn build_prompt(snapshot: &PageSnapshot, excerpt: &ExcerptDocument) -> String {
    let mut prompt = String::with_capacity(excerpt.as_str().len() + 2048);
    prompt.push_str(
        "Analiza esta página web de e-commerce y extrae información DETALLADA y PRECISA \
         del producto PRINCIPAL de la página.\n\n",
    );
    prompt.push_str(&format!("URL: {}\n", snapshot.url));
    prompt.push_str(&format!("TÍTULO: {}\n\n", snapshot.title));
    prompt.push_str("CONTENIDO DE LA PÁGINA:\n");
    prompt.push_str(excerpt.as_str());
    prompt.push_str("\n\n");
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str(&format!(
        "\n- Si no encuentras algo, usa \"{NOT_AVAILABLE}\"; nunca inventes valores\n\n"
    ));
    prompt.push_str("RESPONDE SOLO CON UN OBJETO JSON:\n");
    prompt.push_str(&json_shape());
    prompt
}

fn json_shape() -> String {
    let lines: Vec<String> = FIELD_HINTS
        .iter()
        .map(|(key, hint)| format!("    \"{key}\": {hint}"))
        .collect();
    format!("{{\n{}\n}}", lines.join(",\n"))
}

/// Keys listed in the prompt, in order.
pub fn prompt_keys() -> impl Iterator<Item = &'static str> {
    debug_assert_eq!(FIELD_HINTS.len(), FIELD_NAMES.len());
    FIELD_HINTS.iter().map(|(key, _)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Role;
    use crate::excerpt::Fragment;
    use pretty_assertions::assert_eq;

    fn fixture() -> (PageSnapshot, ExcerptDocument) {
        let snapshot = PageSnapshot::from_markup(
            "https://shop.test/p/grill-x",
            Some("Grill X | Tienda"),
            "<html><body><h1>Grill X</h1></body></html>".to_string(),
        );
        let excerpt = ExcerptDocument::bounded(
            vec![Fragment {
                role: Role::ProductName,
                content: "<h1>Grill X</h1>".to_string(),
                text: "Grill X".to_string(),
            }],
            None,
            1024,
            "\n...\n",
        );
        (snapshot, excerpt)
    }

    #[test]
    fn prompt_keys_match_record_schema() {
        assert_eq!(prompt_keys().collect::<Vec<_>>(), FIELD_NAMES.to_vec());
    }

    #[test]
    fn json_shape_lists_keys_in_schema_order() {
        let (snapshot, excerpt) = fixture();
        let prompt = build_prompt(&snapshot, &excerpt);
        let positions: Vec<usize> = FIELD_NAMES
            .iter()
            .map(|key| prompt.find(&format!("\"{key}\":")).expect(key))
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn prompt_carries_page_context_and_rules() {
        let (snapshot, excerpt) = fixture();
        let prompt = build_prompt(&snapshot, &excerpt);
        assert!(prompt.contains("URL: https://shop.test/p/grill-x\n"));
        assert!(prompt.contains("TÍTULO: Grill X | Tienda\n"));
        assert!(prompt.contains("<product-name>\n<h1>Grill X</h1>\n</product-name>"));
        assert!(prompt.contains("usa \"No disponible\""));
        assert!(prompt.contains("productos relacionados"));
        assert!(prompt.trim_end().ends_with('}'));
    }

    #[test]
    fn prompt_is_stable_for_identical_inputs() {
        let (snapshot, excerpt) = fixture();
        assert_eq!(build_prompt(&snapshot, &excerpt), build_prompt(&snapshot, &excerpt));
    }
}
