use serde::{Deserialize, Serialize};

/// Durable marker written on the backing element once a field id is assigned.
pub const FIELD_MARKER_ATTR: &str = "data-form-field-id";

/// Closed set of field kinds the engine recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Password,
    Email,
    Tel,
    Url,
    Search,
    /// date, datetime-local, time, month, week
    Date,
    /// number, range
    Number,
    Color,
    File,
    Checkbox,
    Radio,
    Select,
    Textarea,
    Button,
    ContentEditable,
    Fieldset,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Password => "password",
            FieldType::Email => "email",
            FieldType::Tel => "tel",
            FieldType::Url => "url",
            FieldType::Search => "search",
            FieldType::Date => "date",
            FieldType::Number => "number",
            FieldType::Color => "color",
            FieldType::File => "file",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Select => "select",
            FieldType::Textarea => "textarea",
            FieldType::Button => "button",
            FieldType::ContentEditable => "contenteditable",
            FieldType::Fieldset => "fieldset",
        }
    }

    /// Map an `<input type>` value onto the closed set.
    pub fn from_input_type(input_type: Option<&str>) -> FieldType {
        match input_type.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("password") => FieldType::Password,
            Some("email") => FieldType::Email,
            Some("tel") => FieldType::Tel,
            Some("url") => FieldType::Url,
            Some("search") => FieldType::Search,
            Some("date" | "datetime-local" | "datetime" | "time" | "month" | "week") => FieldType::Date,
            Some("number" | "range") => FieldType::Number,
            Some("color") => FieldType::Color,
            Some("file") => FieldType::File,
            Some("checkbox") => FieldType::Checkbox,
            Some("radio") => FieldType::Radio,
            Some("button" | "submit" | "reset" | "image") => FieldType::Button,
            _ => FieldType::Text,
        }
    }

    /// Types that accept free text.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            FieldType::Text
                | FieldType::Password
                | FieldType::Email
                | FieldType::Tel
                | FieldType::Url
                | FieldType::Search
                | FieldType::Number
                | FieldType::Date
                | FieldType::Textarea
                | FieldType::ContentEditable
        )
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Radio | FieldType::Select)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

impl FieldOption {
    pub fn new(value: &str, label: Option<&str>) -> Self {
        Self {
            value: value.to_string(),
            label: label.map(str::to_string),
            selected: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl Validation {
    pub fn is_empty(&self) -> bool {
        *self == Validation::default()
    }
}

/// A logical, addressable input unit.
///
/// Fields returned by the registry are snapshots; editing `value` on a
/// returned copy does not change the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: Option<String>,
    pub name: Option<String>,
    /// The element's own `id` attribute.
    pub html_id: Option<String>,
    pub placeholder: Option<String>,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Validation::is_empty")]
    pub validation: Validation,
    pub value: Option<String>,
    pub test_value: Option<String>,
    /// Selectors expected to match exactly the backing element, best first.
    #[serde(default)]
    pub selectors: Vec<String>,
}

impl Field {
    pub fn new(id: &str, field_type: FieldType) -> Self {
        Self {
            id: id.to_string(),
            field_type,
            label: None,
            name: None,
            html_id: None,
            placeholder: None,
            options: Vec::new(),
            required: false,
            validation: Validation::default(),
            value: None,
            test_value: None,
            selectors: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_selector(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_types_fold_into_closed_set() {
        assert_eq!(FieldType::from_input_type(None), FieldType::Text);
        assert_eq!(FieldType::from_input_type(Some("EMAIL")), FieldType::Email);
        assert_eq!(FieldType::from_input_type(Some("datetime-local")), FieldType::Date);
        assert_eq!(FieldType::from_input_type(Some("range")), FieldType::Number);
        assert_eq!(FieldType::from_input_type(Some("something-new")), FieldType::Text);
    }

    #[test]
    fn field_type_serializes_snake_case() {
        let json = serde_json::to_string(&FieldType::ContentEditable).unwrap();
        assert_eq!(json, "\"content_editable\"");
    }
}
