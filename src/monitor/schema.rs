use serde::Serialize;
use serde_json::{Map, Value};

use crate::registry::field::{FieldOption, FieldType, Validation};

// ============================================================================
// Best-effort normalization of form-schema payloads seen on the wire
// ============================================================================

const ENVELOPE_KEYS: &[&str] = &[
    "data",
    "result",
    "payload",
    "response",
    "body",
    "form",
    "schema",
    "definition",
    "formDefinition",
    "content",
];
const FIELD_KEYS: &[&str] = &[
    "fields",
    "formFields",
    "questions",
    "inputs",
    "elements",
    "controls",
    "components",
    "items",
];
const STEP_KEYS: &[&str] = &["steps", "pages", "sections", "stages", "screens"];
const TYPE_KEYS: &[&str] = &["type", "fieldType", "inputType", "kind", "component", "widget"];
const LABEL_KEYS: &[&str] = &["label", "title", "question", "text", "displayName", "placeholder"];
const NAME_KEYS: &[&str] = &["name", "key", "fieldName", "ref", "id"];
const ID_KEYS: &[&str] = &["id", "key", "ref", "uuid", "name"];
const OPTION_KEYS: &[&str] = &["options", "choices", "values", "enum"];
const MAX_ENVELOPE_DEPTH: usize = 4;
const MAX_STEP_DEPTH: usize = 3;

/// Field as described by an intercepted payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: Option<String>,
    pub options: Vec<FieldOption>,
    pub required: bool,
    pub validation: Validation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDescriptor {
    pub id: Option<String>,
    pub title: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

/// Draft field/step list extracted from a network response. A signal to
/// re-detect, never a source of truth over the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterceptedSchema {
    pub source_url: String,
    /// Top-level fields followed by every step's fields.
    pub fields: Vec<FieldDescriptor>,
    pub steps: Vec<StepDescriptor>,
}

impl InterceptedSchema {
    pub fn is_multi_step(&self) -> bool {
        self.steps.len() > 1
    }
}

/// Parse and normalize a raw response body. `None` when the body is not
/// JSON or no field/step structure can be found.
pub fn normalize_body(source_url: &str, body: &str) -> Option<InterceptedSchema> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => normalize_payload(source_url, &value),
        Err(e) => {
            tracing::debug!(url = %source_url, error = %e, "response body is not JSON");
            None
        }
    }
}

pub fn normalize_payload(source_url: &str, payload: &Value) -> Option<InterceptedSchema> {
    let root = unwrap_envelope(payload, 0);

    let steps = extract_steps(root, 0);
    let mut fields = extract_fields(root);
    for step in &steps {
        fields.extend(step.fields.iter().cloned());
    }

    if fields.is_empty() && steps.is_empty() {
        return None;
    }

    Some(InterceptedSchema {
        source_url: source_url.to_string(),
        fields,
        steps,
    })
}

/// Descend through common wrapper keys until a level carries fields or steps.
fn unwrap_envelope(value: &Value, depth: usize) -> &Value {
    let Value::Object(map) = value else {
        return value;
    };
    if depth >= MAX_ENVELOPE_DEPTH || has_structure(map) {
        return value;
    }

    ENVELOPE_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .find(|v| v.is_object() || v.is_array())
        .map(|inner| unwrap_envelope(inner, depth + 1))
        .unwrap_or(value)
}

fn has_structure(map: &Map<String, Value>) -> bool {
    FIELD_KEYS
        .iter()
        .chain(STEP_KEYS)
        .any(|k| map.get(*k).is_some_and(Value::is_array))
        || map.get("properties").is_some_and(Value::is_object)
}

fn extract_fields(value: &Value) -> Vec<FieldDescriptor> {
    match value {
        Value::Array(items) if items.iter().any(looks_like_field) => {
            items.iter().filter_map(field_from_value).collect()
        }
        Value::Object(map) => {
            if let Some(items) = FIELD_KEYS
                .iter()
                .filter_map(|k| map.get(*k))
                .find_map(Value::as_array)
            {
                return items.iter().filter_map(field_from_value).collect();
            }
            match map.get("properties") {
                Some(Value::Object(props)) => json_schema_fields(props, map.get("required")),
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

fn extract_steps(value: &Value, depth: usize) -> Vec<StepDescriptor> {
    if depth >= MAX_STEP_DEPTH {
        return Vec::new();
    }
    let Value::Object(map) = value else {
        return Vec::new();
    };

    let Some(items) = STEP_KEYS.iter().filter_map(|k| map.get(*k)).find_map(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|step| {
            let Value::Object(obj) = step else {
                return None;
            };
            let mut fields = extract_fields(step);
            for nested in extract_steps(step, depth + 1) {
                fields.extend(nested.fields);
            }
            Some(StepDescriptor {
                id: first_string(obj, ID_KEYS),
                title: first_string(obj, &["title", "name", "label", "heading"]),
                fields,
            })
        })
        .collect()
}

fn looks_like_field(value: &Value) -> bool {
    value.as_object().is_some_and(|o| {
        TYPE_KEYS.iter().any(|k| o.contains_key(*k))
            && (NAME_KEYS.iter().any(|k| o.contains_key(*k)) || LABEL_KEYS.iter().any(|k| o.contains_key(*k)))
    })
}

fn field_from_value(value: &Value) -> Option<FieldDescriptor> {
    let obj = value.as_object()?;

    let raw_type = first_string(obj, TYPE_KEYS);
    let field_type = match raw_type.as_deref() {
        Some(t) => map_vendor_type(t)?,
        None if obj.get("options").or_else(|| obj.get("choices")).is_some() => FieldType::Select,
        None => FieldType::Text,
    };

    let validation_obj = obj
        .get("validation")
        .or_else(|| obj.get("validations"))
        .and_then(Value::as_object);

    let required = bool_at(obj, "required")
        .or_else(|| bool_at(obj, "isRequired"))
        .or_else(|| validation_obj.and_then(|v| bool_at(v, "required")))
        .unwrap_or(false);

    let mut validation = Validation::default();
    for source in std::iter::once(obj).chain(validation_obj) {
        validation.min_length = validation.min_length.or_else(|| u32_at(source, &["minLength", "min_length", "minlength"]));
        validation.max_length = validation.max_length.or_else(|| u32_at(source, &["maxLength", "max_length", "maxlength"]));
        validation.pattern = validation.pattern.clone().or_else(|| first_string(source, &["pattern", "regex"]));
        validation.min = validation.min.clone().or_else(|| first_scalar(source, &["min", "minimum"]));
        validation.max = validation.max.clone().or_else(|| first_scalar(source, &["max", "maximum"]));
    }

    Some(FieldDescriptor {
        id: first_scalar(obj, ID_KEYS),
        name: first_string(obj, NAME_KEYS),
        field_type,
        label: first_string(obj, LABEL_KEYS),
        options: options_of(obj),
        required,
        validation,
    })
}

fn json_schema_fields(props: &Map<String, Value>, required: Option<&Value>) -> Vec<FieldDescriptor> {
    let required: Vec<&str> = required
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    props
        .iter()
        .filter_map(|(name, schema)| {
            let obj = schema.as_object()?;
            let json_type = first_string(obj, &["type"]).unwrap_or_else(|| "string".into());
            let field_type = match (json_type.as_str(), obj.get("format").and_then(Value::as_str)) {
                (_, Some(format)) if map_vendor_type(format).is_some_and(|t| t != FieldType::Text) => {
                    map_vendor_type(format)?
                }
                ("boolean", _) => FieldType::Checkbox,
                ("integer" | "number", _) => FieldType::Number,
                ("array", _) => FieldType::Checkbox,
                ("object", _) => return None,
                _ if obj.contains_key("enum") => FieldType::Select,
                _ => FieldType::Text,
            };
            Some(FieldDescriptor {
                id: Some(name.clone()),
                name: Some(name.clone()),
                field_type,
                label: first_string(obj, &["title", "description"]),
                options: options_of(obj),
                required: required.contains(&name.as_str()),
                validation: Validation {
                    min_length: u32_at(obj, &["minLength"]),
                    max_length: u32_at(obj, &["maxLength"]),
                    pattern: first_string(obj, &["pattern"]),
                    min: first_scalar(obj, &["minimum"]),
                    max: first_scalar(obj, &["maximum"]),
                    step: first_scalar(obj, &["multipleOf"]),
                },
            })
        })
        .collect()
}

/// Map a vendor type string onto the closed set. `None` drops the field
/// (hidden/computed fields and pure layout blocks).
pub fn map_vendor_type(raw: &str) -> Option<FieldType> {
    let t = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    let mapped = match t.as_str() {
        "hidden" | "calculated" | "computed" | "statement" | "html" | "divider" | "heading"
        | "paragraph_text" | "spacer" => return None,
        "short_text" | "text" | "string" | "input" | "textfield" | "text_field" | "single_line"
        | "singleline" | "name" | "first_name" | "last_name" | "address" => FieldType::Text,
        "long_text" | "textarea" | "paragraph" | "multiline" | "multi_line" | "comment" => FieldType::Textarea,
        "email" | "email_address" => FieldType::Email,
        "password" | "secret" => FieldType::Password,
        "phone" | "phone_number" | "phonenumber" | "tel" | "telephone" | "mobile" => FieldType::Tel,
        "url" | "uri" | "website" | "link" => FieldType::Url,
        "search" => FieldType::Search,
        "number" | "integer" | "numeric" | "decimal" | "currency" | "range" | "rating"
        | "opinion_scale" | "slider" | "nps" => FieldType::Number,
        "date" | "datetime" | "date_time" | "time" | "birthday" | "date_picker" | "datepicker" => FieldType::Date,
        "dropdown" | "select" | "picklist" | "combobox" | "enumeration" | "list" => FieldType::Select,
        "multiple_choice" | "radio" | "radio_group" | "radios" | "single_choice" | "yes_no" => FieldType::Radio,
        "checkbox" | "checkboxes" | "multi_select" | "multiselect" | "legal" | "boolean"
        | "booleancheckbox" | "consent" => FieldType::Checkbox,
        "file" | "file_upload" | "upload" | "attachment" | "image_upload" => FieldType::File,
        "color" | "colour" => FieldType::Color,
        "button" | "submit" => FieldType::Button,
        "group" | "fieldset" | "section_group" => FieldType::Fieldset,
        "richtext" | "rich_text" | "editor" | "wysiwyg" => FieldType::ContentEditable,
        _ => FieldType::Text,
    };
    Some(mapped)
}

fn options_of(obj: &Map<String, Value>) -> Vec<FieldOption> {
    let list = OPTION_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(Value::as_array)
        .or_else(|| {
            obj.get("properties")
                .and_then(|p| p.get("choices"))
                .and_then(Value::as_array)
        });

    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(FieldOption::new(s, Some(s))),
            Value::Number(n) => Some(FieldOption::new(&n.to_string(), None)),
            Value::Bool(b) => Some(FieldOption::new(&b.to_string(), None)),
            Value::Object(o) => {
                let label = first_string(o, &["label", "title", "text", "name"]);
                let value = first_scalar(o, &["value", "id", "ref", "key"]).or_else(|| label.clone())?;
                Some(FieldOption::new(&value, label.as_deref()))
            }
            _ => None,
        })
        .collect()
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strings or numbers, rendered as strings.
fn first_scalar(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn bool_at(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "1")),
        Value::Number(n) => Some(n.as_i64().is_some_and(|v| v != 0)),
        _ => None,
    }
}

fn u32_at(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
