use serde::Deserialize;
use serde::Serialize;

use super::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Check {
    pub name: String,
    /// 0 OK, 1 warning, 2 critical, anything else unknown
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub output: String,
}

/// Last observed event for an entity at the time its monitor was refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Event {
    /// Unix seconds
    pub timestamp: i64,
    pub entity: Option<Entity>,
    pub check: Option<Check>,
}

impl Event {
    pub fn for_entity(
        entity: Entity,
        timestamp: i64,
    ) -> Self {
        Self {
            timestamp,
            entity: Some(entity),
            check: None,
        }
    }

    pub fn with_check(
        mut self,
        check: Check,
    ) -> Self {
        self.check = Some(check);
        self
    }
}
