//! Basic-auth credential encoding
//!
//! Passwords are bcrypt-hashed into `user:hash` pairs. A bcrypt hash is full
//! of `$` separators, which a double-quoted shell argument would expand, so
//! each pair is kept in two textual forms: literal (compose listing) and
//! `\$`-escaped (generated shell command). Both are produced here once and
//! never derived from each other downstream.

use crate::error::{LabelError, Result};
use crate::labels::escape_double_quoted;
use tracing::debug;

/// One hashed basic-auth user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedCredential {
    pub user: String,
    /// Clear-text password as entered
    pub password: String,
    /// Literal bcrypt hash
    pub hash: String,
    shell_hash: String,
}

impl HashedCredential {
    /// `user:hash` with a literal hash
    pub fn pair(&self) -> String {
        format!("{}:{}", self.user, self.hash)
    }

    /// `user:hash` escaped for a double-quoted shell word
    pub fn shell_pair(&self) -> String {
        format!("{}:{}", escape_double_quoted(&self.user), self.shell_hash)
    }
}

/// The encoded user set for a single basic-auth middleware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedCredentials {
    pub entries: Vec<HashedCredential>,
}

impl EncodedCredentials {
    /// Comma-joined `user:hash` pairs with literal hashes
    pub fn combo_string(&self) -> String {
        self.entries
            .iter()
            .map(HashedCredential::pair)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Comma-joined `user:hash` pairs, shell-escaped
    pub fn shell_combo_string(&self) -> String {
        self.entries
            .iter()
            .map(HashedCredential::shell_pair)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `(user, password)` in entry order
    pub fn clear_pairs(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.user.as_str(), e.password.as_str()))
            .collect()
    }
}

/// Encode `user:password` lines with the library's default cost
pub fn encode<S: AsRef<str>>(lines: &[S]) -> Result<EncodedCredentials> {
    encode_with_cost(lines, bcrypt::DEFAULT_COST)
}

/// Encode `user:password` lines with an explicit bcrypt cost
pub fn encode_with_cost<S: AsRef<str>>(lines: &[S], cost: u32) -> Result<EncodedCredentials> {
    let mut entries = Vec::with_capacity(lines.len());

    for line in lines {
        let line = line.as_ref().trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (user, password) = line.split_once(':').ok_or_else(|| LabelError::Credential {
            entry: mask_entry(line),
            reason: "expected user:password".to_string(),
        })?;
        if user.is_empty() {
            return Err(LabelError::Credential {
                entry: mask_entry(line),
                reason: "empty user name".to_string(),
            });
        }
        // `,` separates pairs in the users label and `=` would move docker's
        // key/value split inside the clear-password label
        if let Some(c) = user.chars().find(|&c| c == ',' || c == '=') {
            return Err(LabelError::Credential {
                entry: mask_entry(line),
                reason: format!("user name must not contain '{}'", c),
            });
        }

        let hash = bcrypt::hash(password, cost).map_err(|e| LabelError::Credential {
            entry: mask_entry(line),
            reason: e.to_string(),
        })?;
        let shell_hash = escape_hash(&hash);

        debug!(user, "credential hashed");
        entries.push(HashedCredential {
            user: user.to_string(),
            password: password.to_string(),
            hash,
            shell_hash,
        });
    }

    Ok(EncodedCredentials { entries })
}

fn escape_hash(hash: &str) -> String {
    hash.replace('$', "\\$")
}

/// Keep the user part of an entry for error messages
fn mask_entry(line: &str) -> String {
    match line.split_once(':') {
        Some((user, _)) => format!("{}:***", user),
        None => line.to_string(),
    }
}
