use crate::types::Properties;
use serde_json::Value;

pub const UNKNOWN_WARD: &str = "Unknown Ward";

// Exact-case keys, tried in order.
const LABEL_KEYS: [&str; 4] = ["name", "NAME", "id", "ID"];

/// Picks the display name for a ward from its properties.
///
/// Empty strings, `null`, `false` and zero are treated as missing so the
/// next key is tried.
pub fn derive_label(properties: &Properties) -> String {
    LABEL_KEYS
        .iter()
        .find_map(|key| properties.get(*key).and_then(label_text))
        .unwrap_or_else(|| UNKNOWN_WARD.to_string())
}

fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Null | Value::Bool(false) => None,
        _ => Some(display_text(value)),
    }
}

/// Text form of a property value as it appears in a popup: whole numbers
/// lose their fraction and arrays are joined with commas.
fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(display_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn uppercase_name_is_used() {
        assert_eq!(derive_label(&props(json!({"NAME": "Civil Lines"}))), "Civil Lines");
    }

    #[test]
    fn empty_properties_fall_back() {
        assert_eq!(derive_label(&props(json!({}))), UNKNOWN_WARD);
    }

    #[test]
    fn keys_are_tried_in_order() {
        let p = props(json!({"ID": "W-9", "id": "w-9", "NAME": "Upper", "name": "lower"}));
        assert_eq!(derive_label(&p), "lower");

        let p = props(json!({"ID": "W-9", "id": "w-9"}));
        assert_eq!(derive_label(&p), "w-9");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let p = props(json!({"Name": "Mixed", "nAmE": "Odd"}));
        assert_eq!(derive_label(&p), UNKNOWN_WARD);
    }

    #[test]
    fn empty_and_falsy_values_are_skipped() {
        let p = props(json!({"name": "", "NAME": null, "id": 0, "ID": 12}));
        assert_eq!(derive_label(&p), "12");
    }

    #[test]
    fn numeric_ids_render_as_text() {
        assert_eq!(derive_label(&props(json!({"id": 5}))), "5");
        assert_eq!(derive_label(&props(json!({"ID": 2.5}))), "2.5");
        assert_eq!(derive_label(&props(json!({"id": 5.0}))), "5");
        assert_eq!(derive_label(&props(json!({"id": -12.0}))), "-12");
    }

    #[test]
    fn arrays_join_with_commas() {
        assert_eq!(derive_label(&props(json!({"name": ["a", "b"]}))), "a,b");
        assert_eq!(derive_label(&props(json!({"name": [1.0, null, [2, "c"]]}))), "1,,2,c");
    }

    #[test]
    fn objects_use_the_generic_form() {
        assert_eq!(derive_label(&props(json!({"name": {"en": "Ward"}}))), "[object Object]");
    }

    #[test]
    fn derivation_is_repeatable() {
        let p = props(json!({"name": "Ward 5", "ID": 5}));
        assert_eq!(derive_label(&p), derive_label(&p));
    }
}
