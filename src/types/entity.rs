use serde::Deserialize;
use serde::Serialize;

/// A monitored resource, typically an agent or a proxy entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Entity {
    pub id: String,
    /// e.g. "agent", "proxy"
    pub class: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Unix seconds of the last keepalive seen for this entity
    #[serde(default)]
    pub last_seen: i64,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
            ..Default::default()
        }
    }
}
