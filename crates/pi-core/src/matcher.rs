//! Plugin name recognition.

/// Name prefixes that mark a file as a plugin binary.
pub const PLUGIN_PREFIXES: [&str; 2] = ["mackerel-plugin-", "check-"];

/// Whether `name` is a recognized plugin binary name.
///
/// Strict prefix test on the whole base name; case-sensitive.
pub fn looks_like_plugin(name: &str) -> bool {
    PLUGIN_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}
