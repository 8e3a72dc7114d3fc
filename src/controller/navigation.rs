/// Redirect targets and the user message queue
///
/// Every controller action ends by deciding where the browser goes next and
/// what it is told. `Navigator` collects both for one request.

use crate::config::EditConfig;
use serde::Serialize;

/// Message severity shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    Notice,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

/// Where the user is sent after an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "id", rename_all = "lowercase")]
pub enum RedirectTarget {
    /// The list view
    List,
    /// The edit screen, for an existing record or a blank one
    Item(Option<i64>),
}

impl RedirectTarget {
    /// Render as an admin URL, e.g. `index.php?option=com_finder&view=filter&layout=edit&filter_id=3`
    pub fn to_url(&self, config: &EditConfig, url_var: &str) -> String {
        match self {
            RedirectTarget::List => format!("index.php?option={}&view={}", config.option, config.view_list),
            RedirectTarget::Item(id) => {
                let mut url = format!("index.php?option={}&view={}&layout=edit", config.option, config.view_item);
                if let Some(id) = id.filter(|id| *id != 0) {
                    url.push_str(&format!("&{}={}", url_var, id));
                }
                url
            }
        }
    }
}

/// Redirect + message collector for one request
#[derive(Debug, Default)]
pub struct Navigator {
    redirect: Option<RedirectTarget>,
    messages: Vec<Message>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(&mut self, target: RedirectTarget) {
        self.redirect = Some(target);
    }

    pub fn enqueue(&mut self, kind: MessageKind, text: impl Into<String>) {
        self.messages.push(Message { kind, text: text.into() });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.enqueue(MessageKind::Error, text);
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn into_parts(self) -> (Option<RedirectTarget>, Vec<Message>) {
        (self.redirect, self.messages)
    }
}
