use sha1::{Digest, Sha1};

use crate::dom::document::NodeId;
use crate::registry::field::{FieldOption, FieldType};

pub fn text_fingerprint(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic id for a field that carries no marker yet. Stable for a
/// static document, so repeated registrations agree.
pub fn provisional_field_id(document_url: &str, container_id: &str, node: NodeId) -> String {
    let digest = text_fingerprint(&format!("{}|{}|{}", document_url, container_id, node.0));
    format!("field-{}", &digest[..12])
}

/// Collapse whitespace and drop required-markers and trailing colons.
pub fn normalize_label(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_end_matches(|c: char| c == '*' || c == ':' || c.is_whitespace())
        .trim();

    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

const EMAIL: &str = "user@example.com";
const PASSWORD: &str = "TestPass123!";
const PHONE: &str = "555-0100";
const WEBSITE: &str = "https://example.com";
const NUMBER: &str = "42";
const DATE: &str = "2025-01-15";
const QUERY: &str = "test query";

/// Label keywords and the value they suggest. Checked in order, so
/// "username" is caught before the broader "name".
const LABEL_VALUES: &[(&[&str], &str)] = &[
    (&["email"], EMAIL),
    (&["password"], PASSWORD),
    (&["phone", "tel"], PHONE),
    (&["url", "website"], WEBSITE),
    (&["zip", "postal"], "90210"),
    (&["username", "user"], "testuser"),
    (&["name"], "Jane Doe"),
    (&["search", "query"], QUERY),
    (&["date", "birth"], DATE),
    (&["number", "amount", "quantity", "age"], NUMBER),
];

/// Plausible fill value from the label, falling back to the field type.
pub fn suggest_test_value(label: Option<&str>, field_type: FieldType, options: &[FieldOption]) -> Option<String> {
    match field_type {
        FieldType::Checkbox | FieldType::Radio | FieldType::Select => {
            return options
                .iter()
                .find(|o| !o.value.is_empty())
                .map(|o| o.value.clone());
        }
        FieldType::Button | FieldType::File | FieldType::Fieldset => return None,
        FieldType::Color => return Some("#336699".into()),
        _ => {}
    }

    let label = label.unwrap_or("").to_lowercase();
    let by_label = LABEL_VALUES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| label.contains(k)))
        .map(|(_, value)| *value);

    let value = by_label.unwrap_or(match field_type {
        FieldType::Email => EMAIL,
        FieldType::Password => PASSWORD,
        FieldType::Tel => PHONE,
        FieldType::Url => WEBSITE,
        FieldType::Number => NUMBER,
        FieldType::Date => DATE,
        FieldType::Search => QUERY,
        _ => "test",
    });
    Some(value.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_are_stable_and_short() {
        let a = provisional_field_id("https://a.test/", "form-0", NodeId(4));
        let b = provisional_field_id("https://a.test/", "form-0", NodeId(4));
        let c = provisional_field_id("https://a.test/", "form-1", NodeId(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), "field-".len() + 12);
    }

    #[test]
    fn labels_lose_required_markers() {
        assert_eq!(normalize_label("  Email\n address *: "), Some("Email address".into()));
        assert_eq!(normalize_label(" * "), None);
    }

    #[test]
    fn test_values_prefer_label_then_type() {
        assert_eq!(suggest_test_value(Some("Work email"), FieldType::Text, &[]).as_deref(), Some("user@example.com"));
        assert_eq!(suggest_test_value(None, FieldType::Tel, &[]).as_deref(), Some("555-0100"));
        assert_eq!(suggest_test_value(Some("Resume"), FieldType::File, &[]), None);
        let options = [FieldOption::new("", Some("Choose")), FieldOption::new("a", Some("A"))];
        assert_eq!(suggest_test_value(None, FieldType::Select, &options).as_deref(), Some("a"));
    }

    #[test]
    fn narrower_label_keywords_win() {
        assert_eq!(suggest_test_value(Some("Username"), FieldType::Text, &[]).as_deref(), Some("testuser"));
        assert_eq!(suggest_test_value(Some("Full name"), FieldType::Text, &[]).as_deref(), Some("Jane Doe"));
        assert_eq!(suggest_test_value(Some("Date of birth"), FieldType::Text, &[]).as_deref(), Some("2025-01-15"));
    }
}
