//! Admin forms.
//!
//! A [`Form`] is an ordered list of [`FormField`] definitions. It validates
//! raw submitted strings (`application/x-www-form-urlencoded` or multipart
//! text parts) into [`CleanedData`], a JSON object keyed by field name, and
//! describes itself as JSON for the admin client.
//!
//! Forms are assembled at request time, so the same model can expose
//! different fields depending on the request (see the page admin).

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::ValidationError;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));

/// Validated form data keyed by field name.
pub type CleanedData = serde_json::Map<String, Value>;

/// The storage format for date-time values.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted input formats for date-time fields, tried in order.
const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// The placeholder label shown for an empty choice.
pub const BLANK_CHOICE_LABEL: &str = "---------";

/// A selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    /// The submitted value.
    pub value: String,
    /// The human-readable label.
    pub label: String,
}

impl Choice {
    /// Creates a choice.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// The "no selection" sentinel choice.
    pub fn blank() -> Self {
        Self::new("", BLANK_CHOICE_LABEL)
    }
}

/// The kind of a form field, controlling parsing and coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// A single-line string.
    Char {
        /// Maximum length in characters.
        max_length: Option<usize>,
    },
    /// A URL slug: letters, numbers, underscores or hyphens.
    Slug {
        /// Maximum length in characters.
        max_length: Option<usize>,
    },
    /// Free text.
    Text,
    /// A whole number.
    Integer,
    /// A checkbox. Absent means `false`.
    Boolean,
    /// A date and time.
    DateTime,
    /// One of a fixed set of values.
    Choice {
        /// The available options.
        choices: Vec<Choice>,
    },
    /// Displayed but never submitted.
    ReadOnly,
    /// A file input. Uploads arrive outside the form data and are checked by
    /// the view receiving them.
    File,
}

/// A single field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    /// The field name (submitted key).
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// The field kind.
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Whether an empty value is rejected.
    pub required: bool,
    /// Help text displayed alongside the field.
    pub help_text: String,
}

impl FormField {
    /// Creates a required field with a label derived from the name.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let label = capitalize(&name.replace('_', " "));
        Self {
            name,
            label,
            kind,
            required: true,
            help_text: String::new(),
        }
    }

    /// A single-line string field.
    pub fn char(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(
            name,
            FieldKind::Char {
                max_length: Some(max_length),
            },
        )
    }

    /// A slug field.
    pub fn slug(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(
            name,
            FieldKind::Slug {
                max_length: Some(max_length),
            },
        )
    }

    /// A free-text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// An integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// A checkbox field. Never required.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean).optional()
    }

    /// A date-time field.
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    /// A choice field.
    pub fn choice(name: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self::new(name, FieldKind::Choice { choices })
    }

    /// A file upload field.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::File)
    }

    /// A read-only display field.
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::ReadOnly).optional()
    }

    /// Marks the field as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Replaces the options of a choice field. No-op for other kinds.
    pub fn set_choices(&mut self, new_choices: Vec<Choice>) {
        if let FieldKind::Choice { choices } = &mut self.kind {
            *choices = new_choices;
        }
    }

    /// Returns the options of a choice field.
    pub fn choices(&self) -> &[Choice] {
        match &self.kind {
            FieldKind::Choice { choices } => choices,
            _ => &[],
        }
    }

    /// Validates and coerces a raw value.
    fn clean(&self, raw: Option<&str>) -> Result<Value, String> {
        if matches!(self.kind, FieldKind::Boolean) {
            let checked = raw.is_some_and(|v| {
                matches!(v.trim().to_lowercase().as_str(), "on" | "true" | "1" | "yes")
            });
            return Ok(Value::Bool(checked));
        }

        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            if self.required {
                return Err("This field is required.".to_string());
            }
            return Ok(Value::Null);
        }

        match &self.kind {
            FieldKind::Char { max_length } => {
                check_length(value, *max_length)?;
                Ok(Value::String(value.to_string()))
            }
            FieldKind::Slug { max_length } => {
                check_length(value, *max_length)?;
                if !SLUG_RE.is_match(value) {
                    return Err(
                        "Enter a valid 'slug' consisting of letters, numbers, underscores or hyphens."
                            .to_string(),
                    );
                }
                Ok(Value::String(value.to_string()))
            }
            FieldKind::Text => Ok(Value::String(value.to_string())),
            FieldKind::Integer => value
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "Enter a whole number.".to_string()),
            FieldKind::DateTime => parse_datetime(value)
                .map(|dt| Value::String(dt.format(DATETIME_FORMAT).to_string()))
                .ok_or_else(|| "Enter a valid date/time.".to_string()),
            FieldKind::Choice { choices } => {
                if choices.iter().any(|c| c.value == value) {
                    Ok(Value::String(value.to_string()))
                } else {
                    Err(
                        "Select a valid choice. That choice is not one of the available choices."
                            .to_string(),
                    )
                }
            }
            FieldKind::Boolean | FieldKind::ReadOnly | FieldKind::File => Ok(Value::Null),
        }
    }
}

/// An ordered collection of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Form {
    fields: Vec<FormField>,
}

impl Form {
    /// Creates a form from field definitions.
    pub const fn new(fields: Vec<FormField>) -> Self {
        Self { fields }
    }

    /// Appends fields, replacing any existing field with the same name.
    pub fn extend(&mut self, fields: impl IntoIterator<Item = FormField>) {
        for field in fields {
            if let Some(existing) = self.field_mut(&field.name) {
                *existing = field;
            } else {
                self.fields.push(field);
            }
        }
    }

    /// Returns the field definitions.
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Returns a field by name.
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns a mutable field by name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Validates submitted data.
    ///
    /// Read-only and file fields are skipped. On failure every field error is
    /// reported at once.
    pub fn clean(&self, data: &HashMap<String, String>) -> Result<CleanedData, ValidationError> {
        let mut cleaned = CleanedData::new();
        let mut errors = ValidationError::default();
        for field in &self.fields {
            if matches!(field.kind, FieldKind::ReadOnly | FieldKind::File) {
                continue;
            }
            match field.clean(data.get(&field.name).map(String::as_str)) {
                Ok(value) => {
                    cleaned.insert(field.name.clone(), value);
                }
                Err(message) => errors.push(field.name.clone(), message),
            }
        }
        if errors.is_empty() {
            Ok(cleaned)
        } else {
            errors.message = "Please correct the errors below.".to_string();
            Err(errors)
        }
    }
}

fn check_length(value: &str, max_length: Option<usize>) -> Result<(), String> {
    let len = value.chars().count();
    match max_length {
        Some(max) if len > max => Err(format!(
            "Ensure this value has at most {max} characters (it has {len})."
        )),
        _ => Ok(()),
    }
}

/// Parses a submitted date-time. A bare date means midnight.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_label_derived_from_name() {
        assert_eq!(FormField::text("meta_description").label, "Meta description");
    }

    #[test]
    fn test_required_field_missing() {
        let form = Form::new(vec![FormField::char("title", 100)]);
        let err = form.clean(&data(&[])).unwrap_err();
        assert_eq!(err.field_errors["title"], vec!["This field is required."]);
    }

    #[test]
    fn test_optional_field_empty_is_null() {
        let form = Form::new(vec![FormField::char("short_title", 100).optional()]);
        let cleaned = form.clean(&data(&[("short_title", "  ")])).unwrap();
        assert_eq!(cleaned["short_title"], Value::Null);
    }

    #[test]
    fn test_char_max_length() {
        let form = Form::new(vec![FormField::char("title", 3)]);
        let err = form.clean(&data(&[("title", "abcd")])).unwrap_err();
        assert_eq!(
            err.field_errors["title"],
            vec!["Ensure this value has at most 3 characters (it has 4)."]
        );
    }

    #[test]
    fn test_slug_validation() {
        let form = Form::new(vec![FormField::slug("url_title", 50)]);
        assert!(form.clean(&data(&[("url_title", "about-us_2")])).is_ok());
        assert!(form.clean(&data(&[("url_title", "about us")])).is_err());
    }

    #[test]
    fn test_slug_rejects_non_ascii_and_punctuation() {
        let form = Form::new(vec![FormField::slug("url_title", 50)]);
        for bad in ["café", "a/b", "news.html", "tag\n"] {
            assert!(form.clean(&data(&[("url_title", bad)])).is_err(), "{bad:?}");
        }
        assert!(form.clean(&data(&[("url_title", "---")])).is_ok());
    }

    #[test]
    fn test_boolean_field() {
        let form = Form::new(vec![FormField::boolean("is_online")]);
        assert_eq!(form.clean(&data(&[("is_online", "on")])).unwrap()["is_online"], true);
        assert_eq!(form.clean(&data(&[])).unwrap()["is_online"], false);
    }

    #[test]
    fn test_integer_field() {
        let form = Form::new(vec![FormField::integer("width")]);
        assert_eq!(form.clean(&data(&[("width", "640")])).unwrap()["width"], 640);
        assert!(form.clean(&data(&[("width", "wide")])).is_err());
    }

    #[test]
    fn test_datetime_field_formats() {
        let form = Form::new(vec![FormField::datetime("publication_date")]);
        for input in ["2024-05-01 10:30:00", "2024-05-01T10:30", "2024-05-01 10:30"] {
            let cleaned = form.clean(&data(&[("publication_date", input)])).unwrap();
            assert_eq!(cleaned["publication_date"], "2024-05-01 10:30:00");
        }
        let cleaned = form
            .clean(&data(&[("publication_date", "2024-05-01")]))
            .unwrap();
        assert_eq!(cleaned["publication_date"], "2024-05-01 00:00:00");
        assert!(form.clean(&data(&[("publication_date", "May 1st")])).is_err());
    }

    #[test]
    fn test_choice_field() {
        let form = Form::new(vec![FormField::choice(
            "parent",
            vec![Choice::new("1", "Home"), Choice::new("2", "Home › About")],
        )
        .optional()]);
        assert_eq!(form.clean(&data(&[("parent", "2")])).unwrap()["parent"], "2");
        assert_eq!(form.clean(&data(&[("parent", "")])).unwrap()["parent"], Value::Null);
        assert!(form.clean(&data(&[("parent", "9")])).is_err());
    }

    #[test]
    fn test_read_only_skipped() {
        let form = Form::new(vec![FormField::read_only("permalink")]);
        let cleaned = form.clean(&data(&[("permalink", "/r/1/1/")])).unwrap();
        assert!(!cleaned.contains_key("permalink"));
    }

    #[test]
    fn test_file_field_left_to_the_view() {
        let form = Form::new(vec![FormField::file("image")]);
        let cleaned = form.clean(&data(&[])).unwrap();
        assert!(cleaned.is_empty());
    }

    #[test]
    fn test_extend_replaces_same_name() {
        let mut form = Form::new(vec![FormField::text("content")]);
        form.extend(vec![FormField::char("content", 10), FormField::text("summary")]);
        assert_eq!(form.fields().len(), 2);
        assert_eq!(
            form.field("content").unwrap().kind,
            FieldKind::Char { max_length: Some(10) }
        );
    }

    #[test]
    fn test_set_choices() {
        let mut field = FormField::choice("parent", vec![]);
        field.set_choices(vec![Choice::blank()]);
        assert_eq!(field.choices(), &[Choice::blank()]);
    }

    #[test]
    fn test_schema_serialization() {
        let field = FormField::char("title", 100);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "char");
        assert_eq!(json["max_length"], 100);
        assert_eq!(json["required"], true);
    }
}
