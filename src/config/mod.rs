/// Configuration management for the filterdesk backend
///
/// Handles server binding, the filter database, edit-session lifetime and the
/// access lists consulted before a filter is created or edited.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Edit controller configuration (component naming, session lifetime)
    pub edit: EditConfig,
    /// Who may create and edit filters
    pub access: AccessConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Database configuration for filter storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (default: "sqlite://data/filters.db?mode=rwc")
    pub url: String,
}

/// Naming used to build context keys, redirect URLs and message keys
///
/// Mirrors the admin component the controller belongs to: with the defaults
/// the edit context is `com_finder.edit.filter` and the list view is `filters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditConfig {
    /// Component option (e.g., "com_finder")
    pub option: String,
    /// Edit context (e.g., "filter")
    pub context: String,
    /// Item view name used for edit redirects
    pub view_item: String,
    /// List view name used for close/deny redirects
    pub view_list: String,
    /// Prefix for component-specific language keys (e.g., "COM_FINDER")
    pub text_prefix: String,
    /// Seconds a held edit permit survives without being renewed
    pub session_lifetime_secs: i64,
}

impl EditConfig {
    /// Session key under which permits and drafts for this controller live
    pub fn context_key(&self) -> String {
        format!("{}.edit.{}", self.option, self.context)
    }
}

/// Access lists for filter creation and editing
///
/// Entries are user ids; "*" grants the permission to every identified user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Users allowed to create filters (core.create)
    pub creators: Vec<String>,
    /// Users allowed to edit existing filters (core.edit)
    pub editors: Vec<String>,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            option: "com_finder".to_string(),
            context: "filter".to_string(),
            view_item: "filter".to_string(),
            view_list: "filters".to_string(),
            text_prefix: "COM_FINDER".to_string(),
            session_lifetime_secs: std::env::var("FILTERDESK_SESSION_LIFETIME_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("FILTERDESK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("FILTERDESK_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            database: DatabaseConfig {
                url: std::env::var("FILTERDESK_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/filters.db?mode=rwc".to_string()),
            },
            edit: EditConfig::default(),
            access: AccessConfig {
                creators: list_from_env("FILTERDESK_CREATORS"),
                editors: list_from_env("FILTERDESK_EDITORS"),
            },
        }
    }
}

/// Comma-separated user list, "*" when the variable is unset
fn list_from_env(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_else(|_| "*".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
