/// Core filter type definitions
///
/// A filter is a named, stored selection of taxonomy node ids that narrows
/// search results. Rows live in SQLite; the selection and params are JSON columns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Submitted form data, keyed by field name
pub type FormData = Map<String, Value>;

/// A persisted search filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    /// Primary key (0 is never stored)
    pub filter_id: i64,
    /// Human-readable filter title
    pub title: String,
    /// URL-safe unique alias derived from the title when left empty
    pub alias: String,
    /// 1 published, 0 unpublished
    pub state: i64,
    /// View access level
    pub access: i64,
    /// Language tag, "*" for all
    pub language: String,
    pub created: String,
    pub created_by: String,
    pub modified: String,
    pub modified_by: String,
    /// User currently holding the edit lock, if any
    pub checked_out: Option<String>,
    pub checked_out_time: Option<String>,
    /// Number of taxonomy nodes in `data`
    pub map_count: i64,
    /// Selected taxonomy node ids
    pub data: Vec<i64>,
    /// Free-form filter parameters (date ranges, operators, ...)
    pub params: Value,
}

impl Filter {
    pub fn is_published(&self) -> bool {
        self.state == 1
    }

    /// Whether the edit lock is held by someone other than `user_id`
    pub fn is_checked_out_by_other(&self, user_id: &str) -> bool {
        matches!(&self.checked_out, Some(holder) if holder != user_id)
    }

    /// Render the row as the form map the edit screen displays
    pub fn to_form_data(&self) -> FormData {
        let mut form = FormData::new();
        form.insert("filter_id".into(), Value::from(self.filter_id));
        form.insert("title".into(), Value::from(self.title.clone()));
        form.insert("alias".into(), Value::from(self.alias.clone()));
        form.insert("state".into(), Value::from(self.state));
        form.insert("access".into(), Value::from(self.access));
        form.insert("language".into(), Value::from(self.language.clone()));
        form.insert("params".into(), self.params.clone());
        form.insert("data".into(), Value::from(self.data.clone()));
        form
    }
}

/// Filter data that passed form validation and is ready for the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedFilter {
    /// 0 for a new record
    pub filter_id: i64,
    pub title: String,
    pub alias: String,
    pub state: i64,
    pub access: i64,
    pub language: String,
    pub params: Value,
    /// Sanitized selection, merged in after validation
    pub data: Vec<i64>,
}

impl ValidatedFilter {
    pub fn is_new(&self) -> bool {
        self.filter_id == 0
    }

    /// Form map used when a validated payload is parked as a draft
    pub fn to_form_data(&self) -> FormData {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => FormData::new(),
        }
    }
}

/// Sanitize the submitted taxonomy selection
///
/// Values are coerced to integers (numbers or numeric strings), anything that
/// is not a positive integer is dropped, and duplicates keep their first position.
pub fn sanitize_selected_items(raw: &[Value]) -> Vec<i64> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(coerce_int)
        .filter(|id| *id > 0)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Integer coercion for loosely-typed form values
pub(crate) fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selection_drops_duplicates_and_zeros() {
        let raw = vec![json!(3), json!(3), json!(0), json!(5), json!(0)];
        assert_eq!(sanitize_selected_items(&raw), vec![3, 5]);
    }

    #[test]
    fn selection_coerces_strings_and_drops_garbage() {
        let raw = vec![json!("7"), json!("abc"), json!(-2), json!(null), json!("7"), json!(4.0)];
        assert_eq!(sanitize_selected_items(&raw), vec![7, 4]);
    }

    #[test]
    fn checked_out_by_other_ignores_own_lock() {
        let mut filter = Filter {
            filter_id: 1,
            title: "News".into(),
            alias: "news".into(),
            state: 1,
            access: 1,
            language: "*".into(),
            created: String::new(),
            created_by: "1".into(),
            modified: String::new(),
            modified_by: "1".into(),
            checked_out: Some("42".into()),
            checked_out_time: None,
            map_count: 0,
            data: vec![],
            params: json!({}),
        };
        assert!(!filter.is_checked_out_by_other("42"));
        assert!(filter.is_checked_out_by_other("7"));
        filter.checked_out = None;
        assert!(!filter.is_checked_out_by_other("7"));
    }
}
