use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use openpackage_core::{
    Credentials, CredentialStore, DownloadEntry, Error, Package, PullRequest, PullResponse, RegistryTransport,
    Result,
};

/// In-memory [`RegistryTransport`] double, grounded on the same "fake the
/// collaborator, not the network" approach as `fake_package`'s
/// `fake_metadata()`: tests register packages and downloadable bytes ahead of
/// time instead of standing up an HTTP server.
#[derive(Default)]
pub struct FakeTransport {
    packages: Mutex<BTreeMap<(String, String), Package>>,
    downloads: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a version of `name` as remotely available, downloadable at
    /// `download_url` with the given raw bytes (already in whatever archive
    /// format the caller's [`openpackage_core::ArchiveCodec`] expects).
    pub fn register(&self, name: &str, package: Package, download_url: &str, bytes: Vec<u8>) {
        let version = package.metadata.version.clone().unwrap_or_default();
        self.packages.lock().unwrap().insert((name.to_string(), version), package);
        self.downloads.lock().unwrap().insert(download_url.to_string(), bytes);
    }
}

#[async_trait]
impl RegistryTransport for FakeTransport {
    async fn metadata(&self, name: &str, version: &str, _creds: &Credentials) -> Result<openpackage_core::PackageManifest> {
        self.packages
            .lock()
            .unwrap()
            .get(&(name.to_string(), version.to_string()))
            .map(|p| p.metadata.clone())
            .ok_or_else(|| Error::RemoteNotFound(format!("{name}@{version}")))
    }

    async fn pull(&self, name: &str, version: &str, _req: &PullRequest, _creds: &Credentials) -> Result<PullResponse> {
        let packages = self.packages.lock().unwrap();
        let package = packages
            .get(&(name.to_string(), version.to_string()))
            .ok_or_else(|| Error::RemoteNotFound(format!("{name}@{version}")))?;
        let url = format!("fake://{name}@{version}");
        let size = self.downloads.lock().unwrap().get(&url).map(Vec::len).unwrap_or(0) as u64;
        Ok(PullResponse {
            package: package.metadata.clone(),
            version: version.to_string(),
            downloads: vec![DownloadEntry { name: name.to_string(), download_url: Some(url), include: None }],
            size,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.downloads
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::RemoteNotFound(url.to_string()))
    }

    async fn push(&self, tarball: &[u8], manifest_name: &str, _partial: bool, _creds: &Credentials) -> Result<()> {
        let url = format!("fake://pushed/{manifest_name}");
        self.downloads.lock().unwrap().insert(url, tarball.to_vec());
        Ok(())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<(String, String)> {
        Ok((format!("access-{refresh_token}"), refresh_token.to_string()))
    }

    async fn versions(&self, name: &str, _creds: &Credentials) -> Result<Vec<String>> {
        Ok(self
            .packages
            .lock()
            .unwrap()
            .keys()
            .filter(|(pkg_name, _)| pkg_name == name)
            .map(|(_, version)| version.clone())
            .collect())
    }
}

/// In-memory [`CredentialStore`] double.
#[derive(Default)]
pub struct FakeCredentialStore {
    state: Mutex<BTreeMap<String, Credentials>>,
}

impl FakeCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, profile: &str, credentials: Credentials) {
        self.state.lock().unwrap().insert(profile.to_string(), credentials);
    }
}

#[async_trait]
impl CredentialStore for FakeCredentialStore {
    async fn get(&self, profile: &str) -> Result<Credentials> {
        Ok(self.state.lock().unwrap().get(profile).cloned().unwrap_or(Credentials::None))
    }

    async fn set(&self, profile: &str, credentials: Credentials) -> Result<()> {
        self.state.lock().unwrap().insert(profile.to_string(), credentials);
        Ok(())
    }

    async fn clear(&self, profile: &str) -> Result<()> {
        self.state.lock().unwrap().remove(profile);
        Ok(())
    }
}
