use crate::config::AccessConfig;
use crate::controller::traits::AccessPolicy;

/// Access policy backed by the configured creator/editor lists
#[derive(Debug, Clone)]
pub struct ConfigAccessPolicy {
    creators: Vec<String>,
    editors: Vec<String>,
}

impl ConfigAccessPolicy {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            creators: config.creators.clone(),
            editors: config.editors.clone(),
        }
    }
}

fn listed(list: &[String], user_id: &str) -> bool {
    !user_id.is_empty() && list.iter().any(|u| u == "*" || u == user_id)
}

impl AccessPolicy for ConfigAccessPolicy {
    fn can_create(&self, user_id: &str) -> bool {
        listed(&self.creators, user_id)
    }

    fn can_edit(&self, user_id: &str, _record_id: i64) -> bool {
        listed(&self.editors, user_id)
    }
}
