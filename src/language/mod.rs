/// User-facing message catalogue
///
/// A fixed English catalogue keyed by language constants. Strings may carry
/// one `%s` / `%d` placeholder filled by `sprintf`.

use std::collections::HashMap;

const EN_GB: &[(&str, &str)] = &[
    ("JLIB_APPLICATION_SAVE_SUCCESS", "Item saved."),
    ("JLIB_APPLICATION_SUBMIT_SAVE_SUCCESS", "Item submitted."),
    ("JLIB_APPLICATION_ERROR_UNHELD_ID", "You are not permitted to use that link to directly access that page (#%d)."),
    ("JLIB_APPLICATION_ERROR_CHECKIN_FAILED", "Check-in failed with the following error: %s"),
    ("JLIB_APPLICATION_ERROR_CHECKOUT_FAILED", "Check-out failed with the following error: %s"),
    ("JLIB_APPLICATION_ERROR_SAVE_FAILED", "Save failed with the following error: %s"),
    ("JLIB_APPLICATION_ERROR_SAVE_NOT_PERMITTED", "Save not permitted."),
    ("JLIB_APPLICATION_ERROR_CREATE_RECORD_NOT_PERMITTED", "Create record not permitted."),
    ("JLIB_APPLICATION_ERROR_EDIT_NOT_PERMITTED", "Edit not permitted."),
    ("JINVALID_TOKEN", "The most recent request was denied because it had an invalid security token. Please refresh the page and try again."),
    ("COM_FINDER_SAVE_SUCCESS", "Filter saved."),
];

/// Message catalogue lookup
#[derive(Debug, Clone)]
pub struct Language {
    strings: HashMap<String, String>,
}

impl Default for Language {
    fn default() -> Self {
        Self::from_pairs(EN_GB.iter().copied())
    }
}

impl Language {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            strings: pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.strings.contains_key(key)
    }

    /// Translate a key, falling back to the key itself
    pub fn text(&self, key: &str) -> String {
        self.strings.get(key).cloned().unwrap_or_else(|| key.to_string())
    }

    /// Translate a key and substitute its first placeholder
    pub fn sprintf(&self, key: &str, arg: impl std::fmt::Display) -> String {
        let template = self.text(key);
        let arg = arg.to_string();
        match ["%s", "%d"].iter().filter_map(|p| template.find(p)).min() {
            Some(pos) => format!("{}{}{}", &template[..pos], arg, &template[pos + 2..]),
            None => template,
        }
    }
}
