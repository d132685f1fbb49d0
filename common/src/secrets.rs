// Secret handling: opaque credential values surfaced to child processes
// as environment variables, and kept out of every log line and record.

use crate::errors::ValidationError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Replacement written in place of a secret value wherever one would
/// otherwise appear in logs or captured output.
pub const REDACTED: &str = "***";

/// An opaque secret value. `Debug` and `Display` never reveal it; the raw
/// value is only reachable through [`SecretString::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value. Callers hand this to child process environments and
    /// nowhere else.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Named secrets available to job environments.
///
/// Values come from the parent process environment, optionally backfilled
/// from a `KEY=value` file (process environment wins). The store also keeps
/// the set of names jobs actually reference; only those values are scrubbed
/// by [`SecretStore::redact`], so unrelated environment noise stays out of
/// the scrub list.
pub struct SecretStore {
    values: HashMap<String, SecretString>,
    sensitive: HashSet<String>,
}

impl SecretStore {
    /// Capture the parent process environment as the lookup source
    pub fn from_process_env() -> Self {
        let values = std::env::vars()
            .map(|(k, v)| (k, SecretString::new(v)))
            .collect();
        Self {
            values,
            sensitive: HashSet::new(),
        }
    }

    /// Empty store, for tests and programmatic construction
    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
            sensitive: HashSet::new(),
        }
    }

    /// Backfill from a `KEY=value` env file. Existing entries are kept:
    /// the process environment takes precedence over the file.
    pub fn with_env_file(mut self, path: &Path) -> Result<Self, ValidationError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ValidationError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ValidationError::InvalidFieldValue {
                    field: format!("{}:{}", path.display(), lineno + 1),
                    reason: "expected KEY=value".to_string(),
                });
            };
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(ValidationError::InvalidFieldValue {
                    field: format!("{}:{}", path.display(), lineno + 1),
                    reason: "empty key".to_string(),
                });
            }
            self.values
                .entry(key)
                .or_insert_with(|| SecretString::new(value.trim()));
        }

        Ok(self)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: SecretString) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&SecretString> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Mark a name as sensitive so its value is scrubbed from output.
    /// The registry calls this for every name its job templates reference.
    pub fn mark_sensitive(&mut self, name: impl Into<String>) {
        self.sensitive.insert(name.into());
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.sensitive.contains(name)
    }

    /// Replace every sensitive value occurring in `text` with [`REDACTED`].
    /// Empty values are ignored; everything else is scrubbed regardless of
    /// length.
    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();
        for name in &self.sensitive {
            if let Some(value) = self.values.get(name) {
                if !value.is_empty() {
                    result = result.replace(value.expose(), REDACTED);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with(pairs: &[(&str, &str)]) -> SecretStore {
        let mut store = SecretStore::empty();
        for (k, v) in pairs {
            store.insert(*k, SecretString::new(*v));
            store.mark_sensitive(*k);
        }
        store
    }

    #[test]
    fn test_secret_string_debug_is_redacted() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_redact_removes_secret_values() {
        let store = store_with(&[("REDDIT_PASSWORD", "s3cret-pw")]);
        let line = "login failed for password s3cret-pw (retrying)";
        let redacted = store.redact(line);
        assert!(!redacted.contains("s3cret-pw"));
        assert!(redacted.contains(REDACTED));
    }

    #[test]
    fn test_redact_only_touches_sensitive_names() {
        let mut store = SecretStore::empty();
        store.insert("PATH", SecretString::new("/usr/bin"));
        store.insert("REDDIT_CLIENT_SECRET", SecretString::new("abc123"));
        store.mark_sensitive("REDDIT_CLIENT_SECRET");

        let redacted = store.redact("ran /usr/bin/foo with abc123");
        assert!(redacted.contains("/usr/bin/foo"));
        assert!(!redacted.contains("abc123"));
    }

    #[test]
    fn test_redact_ignores_empty_values() {
        let store = store_with(&[("EMPTY", "")]);
        assert_eq!(store.redact("nothing to see"), "nothing to see");
    }

    #[test]
    fn test_env_file_backfills_without_overriding() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "FROM_FILE=file-value").unwrap();
        writeln!(file, "SHARED=file-loses").unwrap();

        let mut store = SecretStore::empty();
        store.insert("SHARED", SecretString::new("env-wins"));
        let store = store.with_env_file(file.path()).unwrap();

        assert_eq!(store.get("FROM_FILE").unwrap().expose(), "file-value");
        assert_eq!(store.get("SHARED").unwrap().expose(), "env-wins");
    }

    #[test]
    fn test_env_file_rejects_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "no equals sign here").unwrap();

        let result = SecretStore::empty().with_env_file(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_env_file_missing_is_an_error() {
        let result =
            SecretStore::empty().with_env_file(Path::new("/nonexistent/secrets.env"));
        assert!(matches!(result, Err(ValidationError::ReadFailed { .. })));
    }
}
