// -
// Key namespaces

/// Namespace every monitor key lives under
pub(crate) const MONITOR_PATH_PREFIX: &str = "monitors";

/// Separator between the namespace and the monitored entity's name
pub(crate) const KEY_SEPARATOR: char = '/';

// -
// Config

/// Environment variable prefix for configuration overrides
pub(crate) const CONFIG_ENV_PREFIX: &str = "MONITOR";
