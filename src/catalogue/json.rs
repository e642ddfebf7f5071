//! JSON decoding with readable diagnostics for catalogue responses.

use anyhow::Result;

/// Deserialize `body`, reporting the serde path, the type mismatch and a
/// snippet around the failing column when decoding fails.
pub fn decode_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let raw = inner.to_string();
        let suffix = format!(" at line {line} column {column}");
        let reason = describe_mismatch(raw.strip_suffix(&suffix).unwrap_or(&raw));
        let snippet = snippet_around(body, line, column, 24);

        let location = if path.is_empty() || path == "." {
            String::new()
        } else {
            format!("at path '{path}': ")
        };
        anyhow::anyhow!("{location}{reason} (line {line} col {column})\n{snippet}")
    })
}

/// Rephrase serde's "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(message: &str) -> String {
    if let Some(rest) = message.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    message.to_string()
}

fn snippet_around(body: &str, line: usize, column: usize, width: usize) -> String {
    let Some(target) = body.lines().nth(line.saturating_sub(1)) else {
        return "(no such line)".to_string();
    };
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    let chars: Vec<char> = target.chars().collect();
    let at = column.saturating_sub(1).min(chars.len());
    let start = at.saturating_sub(width / 2);
    let end = (at + width / 2).min(chars.len());
    let slice: String = chars[start..end].iter().collect();
    let marker = " ".repeat(at - start) + "^";

    format!("...{slice}...\n   {marker}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    #[allow(dead_code)]
    struct Product {
        title: String,
        price: f64,
    }

    #[test]
    fn mismatch_is_rephrased() {
        assert_eq!(
            describe_mismatch("invalid type: null, expected f64"),
            "expected f64, got null"
        );
        assert_eq!(describe_mismatch("EOF while parsing"), "EOF while parsing");
    }

    #[test]
    fn error_names_the_failing_path() {
        let body = r#"{"items": [{"title": "Beans", "price": 1.2}, {"title": "Rice", "price": null}]}"#;

        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Page {
            items: Vec<Product>,
        }

        let err = decode_with_context::<Page>(body).unwrap_err().to_string();
        assert!(err.contains("items[1].price"), "{err}");
        assert!(err.contains("expected f64, got null"), "{err}");
        assert!(err.contains('^'), "{err}");
    }

    #[test]
    fn snippet_survives_multibyte_text() {
        let body = r#"{"title": "Crème fraîche", "price": "£1"}"#;
        let err = decode_with_context::<Product>(body).unwrap_err().to_string();
        assert!(err.contains("price"), "{err}");
    }

    #[test]
    fn valid_body_decodes() {
        let product: Product = decode_with_context(r#"{"title": "Oats", "price": 0.95}"#).unwrap();
        assert_eq!(product.title, "Oats");
    }
}
