/// Filter edit form: schema and validation
///
/// The form schema is an ordered list of field definitions. Validation drops
/// fields the schema doesn't know, applies each field's input filter and
/// default, then checks its rules. All errors are collected, not just the first.

use crate::filter::types::{coerce_int, FormData, ValidatedFilter};
use serde_json::Value;

/// Failure to build a form instance for a payload
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("form data must be an object, got {0}")]
    NotAnObject(&'static str),
}

/// A single validation problem
///
/// Field-level problems carry the field name; payload-level ones are plain text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{message}")]
    Field { field: String, message: String },
    #[error("{0}")]
    Message(String),
}

/// How raw input is normalised before rules run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFilter {
    /// Trimmed string
    Trim,
    /// Integer (numbers or numeric strings)
    Int,
    /// Lowercase URL-safe slug
    Slug,
    /// JSON object passed through untouched
    Object,
}

/// Definition of one form field
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub filter: InputFilter,
    pub required: bool,
    pub default: Option<Value>,
    /// Allowed integer values
    pub one_of: Option<&'static [i64]>,
    /// Minimum integer value
    pub min: Option<i64>,
    /// Maximum string length in characters
    pub max_length: Option<usize>,
}

impl FormField {
    fn new(name: &'static str, label: &'static str, filter: InputFilter) -> Self {
        Self {
            name,
            label,
            filter,
            required: false,
            default: None,
            one_of: None,
            min: None,
            max_length: None,
        }
    }
}

/// A form instance bound to the payload it was built for
#[derive(Debug, Clone)]
pub struct FilterForm {
    fields: Vec<FormField>,
}

impl FilterForm {
    /// Build the filter form for a submitted payload
    pub fn load(payload: &Value) -> Result<Self, FormError> {
        if !payload.is_object() {
            return Err(FormError::NotAnObject(json_kind(payload)));
        }

        let mut filter_id = FormField::new("filter_id", "ID", InputFilter::Int);
        filter_id.default = Some(Value::from(0));
        filter_id.min = Some(0);

        let mut title = FormField::new("title", "Title", InputFilter::Trim);
        title.required = true;
        title.max_length = Some(255);

        let mut alias = FormField::new("alias", "Alias", InputFilter::Slug);
        alias.default = Some(Value::from(""));
        alias.max_length = Some(255);

        let mut state = FormField::new("state", "Status", InputFilter::Int);
        state.default = Some(Value::from(1));
        state.one_of = Some(&[0, 1]);

        let mut access = FormField::new("access", "Access", InputFilter::Int);
        access.default = Some(Value::from(1));
        access.min = Some(1);

        let mut language = FormField::new("language", "Language", InputFilter::Trim);
        language.default = Some(Value::from("*"));

        let mut params = FormField::new("params", "Options", InputFilter::Object);
        params.default = Some(Value::Object(Default::default()));

        Ok(Self {
            fields: vec![filter_id, title, alias, state, access, language, params],
        })
    }

    /// Validate a payload against this form
    ///
    /// The returned filter has an empty selection; the caller merges it in.
    pub fn validate(&self, payload: &Value) -> Result<ValidatedFilter, Vec<ValidationError>> {
        let input = match payload.as_object() {
            Some(map) => map,
            None => {
                return Err(vec![ValidationError::Message(format!(
                    "Invalid form data: expected an object, got {}",
                    json_kind(payload)
                ))])
            }
        };

        let mut clean = FormData::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            match self.check_field(field, input.get(field.name)) {
                Ok(Some(value)) => {
                    clean.insert(field.name.to_string(), value);
                }
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidatedFilter {
            filter_id: clean.get("filter_id").and_then(Value::as_i64).unwrap_or(0),
            title: string_of(&clean, "title"),
            alias: string_of(&clean, "alias"),
            state: clean.get("state").and_then(Value::as_i64).unwrap_or(1),
            access: clean.get("access").and_then(Value::as_i64).unwrap_or(1),
            language: string_of(&clean, "language"),
            params: clean.remove("params").unwrap_or_else(|| Value::Object(Default::default())),
            data: Vec::new(),
        })
    }

    fn check_field(&self, field: &FormField, raw: Option<&Value>) -> Result<Option<Value>, ValidationError> {
        let raw = raw.filter(|v| !is_blank(v));

        let value = match raw {
            None => {
                if field.required {
                    return Err(ValidationError::Field {
                        field: field.name.to_string(),
                        message: format!("Field required: {}", field.label),
                    });
                }
                return Ok(field.default.clone());
            }
            Some(v) => apply_filter(field, v)?,
        };

        if field.required && is_blank(&value) {
            return Err(ValidationError::Field {
                field: field.name.to_string(),
                message: format!("Field required: {}", field.label),
            });
        }

        if let Some(n) = value.as_i64() {
            if let Some(allowed) = field.one_of {
                if !allowed.contains(&n) {
                    return Err(invalid(field));
                }
            }
            if let Some(min) = field.min {
                if n < min {
                    return Err(invalid(field));
                }
            }
        }

        if let (Some(max), Some(s)) = (field.max_length, value.as_str()) {
            if s.chars().count() > max {
                return Err(ValidationError::Field {
                    field: field.name.to_string(),
                    message: format!("{} is longer than {} characters", field.label, max),
                });
            }
        }

        Ok(Some(value))
    }
}

fn apply_filter(field: &FormField, raw: &Value) -> Result<Value, ValidationError> {
    match field.filter {
        InputFilter::Trim => match raw {
            Value::String(s) => Ok(Value::from(s.trim())),
            Value::Number(n) => Ok(Value::from(n.to_string())),
            _ => Err(invalid(field)),
        },
        InputFilter::Int => coerce_int(raw).map(Value::from).ok_or_else(|| invalid(field)),
        InputFilter::Slug => match raw {
            Value::String(s) => Ok(Value::from(slugify(s))),
            _ => Err(invalid(field)),
        },
        InputFilter::Object => match raw {
            Value::Object(_) => Ok(raw.clone()),
            _ => Err(ValidationError::Message(format!("Invalid field: {}", field.label))),
        },
    }
}

fn invalid(field: &FormField) -> ValidationError {
    ValidationError::Field {
        field: field.name.to_string(),
        message: format!("Invalid field: {}", field.label),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn string_of(map: &FormData, key: &str) -> String {
    map.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lowercase ASCII slug: runs of anything non-alphanumeric collapse to one dash
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
