//! Deterministic mapping from a monitored entity's name to its store key.

use crate::constants::KEY_SEPARATOR;
use crate::constants::MONITOR_PATH_PREFIX;

/// Builds fully-qualified monitor keys of the form `<namespace>/<name>`.
///
/// Immutable once constructed; every service holds its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamer {
    namespace: String,
}

impl Default for KeyNamer {
    fn default() -> Self {
        Self::new(MONITOR_PATH_PREFIX)
    }
}

impl KeyNamer {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        Self {
            namespace: namespace.trim_end_matches(KEY_SEPARATOR).to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn build(
        &self,
        name: &str,
    ) -> String {
        format!("{}{}{}", self.namespace, KEY_SEPARATOR, name)
    }

    /// Recover the entity name from a key built by this namer
    pub fn name_of<'a>(
        &self,
        key: &'a str,
    ) -> Option<&'a str> {
        key.strip_prefix(self.namespace.as_str())?.strip_prefix(KEY_SEPARATOR)
    }
}
