use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use openpackage_core::{CredentialStore, Credentials, Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Per-profile stored credentials, `~/.openpackage/credentials.json`.
///
/// This is the fallback store used when no OS keychain integration is
/// available on the current platform; it is not encrypted at rest, matching
/// the scope the `login`/`logout` commands need.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    profiles: BTreeMap<String, StoredCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StoredCredentials {
    ApiKey { api_key: String },
    Bearer { token: String },
}

pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<CredentialsFile> {
        if !self.path.is_file() {
            return Ok(CredentialsFile::default());
        }
        let raw = fs_err::read_to_string(&self.path).map_err(Error::Io)?;
        serde_json::from_str(&raw).map_err(|e| Error::Config(format!("invalid {:?}: {e}", self.path)))
    }

    fn write(&self, file: &CredentialsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent).map_err(Error::Io)?;
        }
        let raw = serde_json::to_string_pretty(file).expect("credentials file is always serializable");
        openpackage_core::write_atomic_str(&self.path, &raw)
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn get(&self, profile: &str) -> Result<Credentials> {
        let file = self.read()?;
        Ok(match file.profiles.get(profile) {
            Some(StoredCredentials::ApiKey { api_key }) => Credentials::ApiKey(api_key.clone()),
            Some(StoredCredentials::Bearer { token }) => Credentials::Bearer(token.clone()),
            None => Credentials::None,
        })
    }

    async fn set(&self, profile: &str, credentials: Credentials) -> Result<()> {
        let mut file = self.read()?;
        let stored = match credentials {
            Credentials::ApiKey(api_key) => StoredCredentials::ApiKey { api_key },
            Credentials::Bearer(token) => StoredCredentials::Bearer { token },
            Credentials::None => {
                file.profiles.remove(profile);
                return self.write(&file);
            }
        };
        file.profiles.insert(profile.to_string(), stored);
        self.write(&file)
    }

    async fn clear(&self, profile: &str) -> Result<()> {
        let mut file = self.read()?;
        file.profiles.remove(profile);
        self.write(&file)
    }
}

/// Reads a static, user-managed `credentials.ini` of the form:
///
/// ```ini
/// [default]
/// api_key = sk-...
///
/// [work]
/// api_key = sk-...
/// ```
///
/// This store is read-only: it exists for users who provision API keys out
/// of band (e.g. a secrets manager writing the file), so `set`/`clear`
/// report [`Error::Config`] rather than silently doing nothing.
pub struct IniApiKeyStore {
    path: PathBuf,
}

impl IniApiKeyStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn sections(&self) -> Result<BTreeMap<String, String>> {
        let mut sections = BTreeMap::new();
        if !self.path.is_file() {
            return Ok(sections);
        }
        let raw = fs_err::read_to_string(&self.path).map_err(Error::Io)?;
        let mut current: Option<String> = None;
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = Some(stripped.trim().to_string());
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "api_key" {
                    if let Some(section) = &current {
                        sections.insert(section.clone(), value.trim().to_string());
                    }
                }
            }
        }
        Ok(sections)
    }
}

#[async_trait]
impl CredentialStore for IniApiKeyStore {
    async fn get(&self, profile: &str) -> Result<Credentials> {
        let sections = self.sections()?;
        Ok(match sections.get(profile) {
            Some(key) => Credentials::ApiKey(key.clone()),
            None => Credentials::None,
        })
    }

    async fn set(&self, _profile: &str, _credentials: Credentials) -> Result<()> {
        Err(Error::Config(format!(
            "{:?} is a static, read-only credentials file; edit it directly",
            self.path
        )))
    }

    async fn clear(&self, _profile: &str) -> Result<()> {
        Err(Error::Config(format!(
            "{:?} is a static, read-only credentials file; edit it directly",
            self.path
        )))
    }
}

/// Wraps a resolved API key (e.g. from `--api-key` or `OPENPACKAGE_API_KEY`)
/// as a [`CredentialStore`] so callers don't need a second code path.
pub struct StaticApiKey(SecretString);

impl StaticApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }
}

#[async_trait]
impl CredentialStore for StaticApiKey {
    async fn get(&self, _profile: &str) -> Result<Credentials> {
        Ok(Credentials::ApiKey(self.0.expose_secret().to_string()))
    }

    async fn set(&self, _profile: &str, _credentials: Credentials) -> Result<()> {
        Ok(())
    }

    async fn clear(&self, _profile: &str) -> Result<()> {
        Ok(())
    }
}

/// Picks the store for a resolved CLI invocation: an explicit `--api-key`
/// wins outright, otherwise the JSON fallback store backs `login`/`logout`.
pub fn resolve_store(working_data_dir: &Path, api_key: Option<String>) -> Box<dyn CredentialStore> {
    match api_key {
        Some(key) => Box::new(StaticApiKey::new(key)),
        None => Box::new(JsonCredentialStore::new(working_data_dir.join("credentials.json"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_store_round_trips_an_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("credentials.json"));
        store.set("default", Credentials::ApiKey("sk-test".into())).await.unwrap();
        assert!(matches!(store.get("default").await.unwrap(), Credentials::ApiKey(k) if k == "sk-test"));
        store.clear("default").await.unwrap();
        assert!(matches!(store.get("default").await.unwrap(), Credentials::None));
    }

    #[tokio::test]
    async fn ini_store_reads_static_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.ini");
        fs_err::write(&path, "[default]\napi_key = sk-static\n\n[work]\napi_key = sk-work\n").unwrap();
        let store = IniApiKeyStore::new(path);
        assert!(matches!(store.get("work").await.unwrap(), Credentials::ApiKey(k) if k == "sk-work"));
        assert!(matches!(store.get("missing").await.unwrap(), Credentials::None));
    }

    #[tokio::test]
    async fn ini_store_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = IniApiKeyStore::new(dir.path().join("credentials.ini"));
        assert!(store.set("default", Credentials::ApiKey("x".into())).await.is_err());
    }
}
