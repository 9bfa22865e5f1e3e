//! WAQI token resolution.
//!
//! Order is fixed: the `WAQI_TOKEN` environment variable first, then a
//! secrets store keyed by the same name. Any secrets-store failure is
//! reported as `AqiError::Configuration`; the underlying cause only shows up
//! in the message text.
//!
//! Resolution does no caching of its own. `pipeline::Monitor` resolves once
//! and keeps the result for the rest of the process.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{AqiError, Credential, TOKEN_KEY};

// ---------------------------------------------------------------------------
// Secrets store
// ---------------------------------------------------------------------------

/// A platform secrets store that can be asked for a value by key.
pub trait SecretStore {
    /// Returns the secret for `key`, or a human-readable reason it could not
    /// be read (store unavailable, key missing, wrong type, ...).
    fn get(&self, key: &str) -> Result<String, String>;
}

/// Flat TOML secrets file, the layout used by `.streamlit/secrets.toml`:
///
/// ```toml
/// WAQI_TOKEN = "..."
/// ```
pub struct TomlSecretStore {
    path: PathBuf,
}

impl TomlSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TomlSecretStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretStore for TomlSecretStore {
    fn get(&self, key: &str) -> Result<String, String> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read {}: {}", self.path.display(), e))?;
        let table: toml::Table = text
            .parse()
            .map_err(|e| format!("cannot parse {}: {}", self.path.display(), e))?;
        match table.get(key) {
            Some(toml::Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(format!("{} in {} is not a string", key, self.path.display())),
            None => Err(format!("{} not present in {}", key, self.path.display())),
        }
    }
}

/// In-memory store, mainly for tests and embedding hosts that already hold
/// their secrets.
#[derive(Default)]
pub struct MemorySecretStore {
    values: HashMap<String, String>,
}

impl MemorySecretStore {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<String, String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| format!("{} not present", key))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolves the token with an injected environment lookup.
///
/// An empty environment value counts as absent. An empty secrets value is a
/// configuration error like a missing one.
pub fn resolve_with<E>(env: E, store: &dyn SecretStore) -> Result<Credential, AqiError>
where
    E: Fn(&str) -> Option<String>,
{
    if let Some(token) = env(TOKEN_KEY).filter(|t| !t.is_empty()) {
        return Ok(Credential::new(token));
    }
    match store.get(TOKEN_KEY) {
        Ok(token) if !token.is_empty() => Ok(Credential::new(token)),
        Ok(_) => Err(AqiError::Configuration(format!(
            "{} is empty in the secrets store",
            TOKEN_KEY
        ))),
        Err(reason) => Err(AqiError::Configuration(format!(
            "{} not found in environment variables or secrets store ({})",
            TOKEN_KEY, reason
        ))),
    }
}

/// Resolves the token from the process environment, then `store`.
pub fn resolve(store: &dyn SecretStore) -> Result<Credential, AqiError> {
    resolve_with(|key| std::env::var(key).ok(), store)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_with(token: &'static str) -> impl Fn(&str) -> Option<String> {
        move |key: &str| (key == TOKEN_KEY).then(|| token.to_string())
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_environment_wins_over_secrets_store() {
        let store = MemorySecretStore::default().with(TOKEN_KEY, "from-secrets");
        let cred = resolve_with(env_with("from-env"), &store).expect("env token present");
        assert_eq!(cred.token(), "from-env");
    }

    #[test]
    fn test_environment_token_returned_verbatim() {
        let store = MemorySecretStore::default();
        let cred = resolve_with(env_with("  a b c  "), &store).expect("env token present");
        assert_eq!(cred.token(), "  a b c  ");
    }

    #[test]
    fn test_falls_back_to_secrets_store() {
        let store = MemorySecretStore::default().with(TOKEN_KEY, "from-secrets");
        let cred = resolve_with(no_env, &store).expect("secrets token present");
        assert_eq!(cred.token(), "from-secrets");
    }

    #[test]
    fn test_empty_environment_value_counts_as_absent() {
        let store = MemorySecretStore::default().with(TOKEN_KEY, "from-secrets");
        let cred = resolve_with(env_with(""), &store).expect("secrets token present");
        assert_eq!(cred.token(), "from-secrets");
    }

    #[test]
    fn test_both_absent_is_configuration_error() {
        let store = MemorySecretStore::default();
        let result = resolve_with(no_env, &store);
        assert!(matches!(result, Err(AqiError::Configuration(_))), "got {:?}", result);
    }

    #[test]
    fn test_missing_secrets_file_is_configuration_error() {
        let store = TomlSecretStore::new("/nonexistent/secrets.toml");
        let result = resolve_with(no_env, &store);
        assert!(matches!(result, Err(AqiError::Configuration(_))), "got {:?}", result);
    }

    #[test]
    fn test_toml_secrets_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "OTHER = \"x\"\nWAQI_TOKEN = \"toml-token\"").expect("write secrets");
        let store = TomlSecretStore::new(file.path());
        let cred = resolve_with(no_env, &store).expect("token in secrets file");
        assert_eq!(cred.token(), "toml-token");
    }

    #[test]
    fn test_unparsable_or_mistyped_secrets_are_configuration_errors() {
        for contents in ["WAQI_TOKEN = ", "WAQI_TOKEN = 42", "WAQI_TOKEN = \"\""] {
            let mut file = tempfile::NamedTempFile::new().expect("temp file");
            write!(file, "{}", contents).expect("write secrets");
            let store = TomlSecretStore::new(file.path());
            let result = resolve_with(no_env, &store);
            assert!(
                matches!(result, Err(AqiError::Configuration(_))),
                "contents {:?} gave {:?}",
                contents,
                result
            );
        }
    }
}
