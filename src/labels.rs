//! Routing label model
//!
//! Labels are flat `key=value` pairs attached to an orchestrator service. The
//! reverse proxy reads the ones under its own dotted namespace; this module
//! holds the types the compiler emits plus the naming helpers every other
//! component shares.

use std::collections::BTreeMap;

/// Substring identifying labels owned by this tool.
///
/// Matching is unanchored so keys written by older runs (including the
/// `traefikConfig.clearPassword.*` diagnostics) are cleaned up as well.
pub const MANAGED_MARKER: &str = "traefik";

/// Namespace for router blocks
pub const ROUTERS_NS: &str = "traefik.http.routers";
/// Namespace for middleware blocks
pub const MIDDLEWARES_NS: &str = "traefik.http.middlewares";
/// Namespace for service blocks
pub const SERVICES_NS: &str = "traefik.http.services";
/// Namespace for the clear-text password diagnostics
pub const CLEAR_PASSWORD_NS: &str = "traefikConfig.clearPassword";

/// Whether a label key belongs to the managed set
pub fn is_managed(key: &str) -> bool {
    key.contains(MANAGED_MARKER)
}

/// A single `key=value` label to add
///
/// The literal value and its double-quoted shell form are kept side by side.
/// Most labels derive the shell form with [`escape_double_quoted`]; values
/// that carry their own escaping (credential hashes) supply it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub key: String,
    pub value: String,
    shell_value: String,
}

impl LabelEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let shell_value = escape_double_quoted(&value);
        Self {
            key: key.into(),
            value,
            shell_value,
        }
    }

    /// Create a label whose shell form was produced by the caller
    pub fn with_shell_value(
        key: impl Into<String>,
        value: impl Into<String>,
        shell_value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            shell_value: shell_value.into(),
        }
    }

    /// Value as it must appear inside a double-quoted shell argument
    pub fn shell_value(&self) -> &str {
        &self.shell_value
    }

    /// `key=value` with the literal value
    pub fn literal(&self) -> String {
        format!("{}={}", self.key, self.value)
    }

    /// `key=value` escaped for a double-quoted shell word
    pub fn shell_literal(&self) -> String {
        format!("{}={}", escape_double_quoted(&self.key), self.shell_value)
    }
}

/// The full label mutation for one service: remove everything managed, then
/// add the freshly derived set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTransaction {
    /// Name the orchestrator knows the service by
    pub service_name: String,
    /// Keys to remove, sorted lexically
    pub remove_keys: Vec<String>,
    /// Labels to add, in emission order
    pub add_entries: Vec<LabelEntry>,
}

impl LabelTransaction {
    /// Look up the value of an added label
    pub fn added(&self, key: &str) -> Option<&str> {
        self.add_entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Whether any added key starts with the given prefix
    pub fn adds_prefix(&self, prefix: &str) -> bool {
        self.add_entries.iter().any(|e| e.key.starts_with(prefix))
    }
}

/// Collect the managed keys of a label map, sorted
pub fn managed_keys(labels: &BTreeMap<String, String>) -> Vec<String> {
    // BTreeMap iteration is already lexical
    labels.keys().filter(|k| is_managed(k)).cloned().collect()
}

/// Derive the key segment for a service name.
///
/// Only the first underscore becomes a hyphen: `my_web_app` yields
/// `my-web_app`. Existing deployments depend on these keys.
pub fn dashed_name(service_name: &str) -> String {
    service_name.replacen('_', "-", 1)
}

/// Build the router rule `Host(`a`)||Host(`b`)` for a host list.
///
/// An empty list yields an empty rule.
pub fn host_rule<S: AsRef<str>>(hosts: &[S]) -> String {
    hosts
        .iter()
        .map(|h| format!("Host(`{}`)", h.as_ref()))
        .collect::<Vec<_>>()
        .join("||")
}

/// Escape a value for use inside a double-quoted shell word
pub fn escape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '`' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reverse [`escape_double_quoted`]
pub fn unescape_double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '\\' | '"' | '`' | '$') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
