/// Request-scoped inputs for controller actions
///
/// Everything the controller would otherwise read from ambient session or
/// request state is passed in explicitly through these types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Which application the request came from
///
/// Front-end ("site") submissions of new records get "submitted" wording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Client {
    #[default]
    Administrator,
    Site,
}

impl FromStr for Client {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" | "admin" => Ok(Client::Administrator),
            "site" => Ok(Client::Site),
            other => Err(format!("unknown client '{}'", other)),
        }
    }
}

/// Continuation mode requested with a save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Save and keep editing the same record
    Apply,
    /// Save a copy of the record as a new one, then keep editing the copy
    Save2Copy,
    /// Save and open a blank form
    Save2New,
    /// Save and close (return to the list)
    #[default]
    Save,
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apply" => Ok(Task::Apply),
            "save2copy" => Ok(Task::Save2Copy),
            "save2new" => Ok(Task::Save2New),
            "save" => Ok(Task::Save),
            other => Err(format!("unknown task '{}'", other)),
        }
    }
}

/// Who is asking, from which session
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: String,
    pub user_id: String,
    /// Anti-forgery token sent with the request
    pub token: Option<String>,
    pub client: Client,
}

/// A submitted filter form
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub ctx: RequestContext,
    pub task: Task,
    /// Record id from the URL (0 for a new record)
    pub record_id: i64,
    /// Raw form data as submitted
    pub form: Value,
    /// Raw taxonomy selection as submitted
    pub selected_items: Vec<Value>,
    /// Primary key field name, when not the table default
    pub key: Option<String>,
    /// URL variable carrying the id, when it differs from the key
    pub url_var: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_parsing_is_closed() {
        assert_eq!("save2copy".parse::<Task>(), Ok(Task::Save2Copy));
        assert_eq!("apply".parse::<Task>(), Ok(Task::Apply));
        assert!("publish".parse::<Task>().is_err());
        assert_eq!(Task::default(), Task::Save);
    }

    #[test]
    fn task_serde_names_match_form_values() {
        assert_eq!(serde_json::to_string(&Task::Save2New).unwrap(), "\"save2new\"");
        assert_eq!(serde_json::from_str::<Task>("\"save2copy\"").unwrap(), Task::Save2Copy);
    }
}
