use semver::Version;

use crate::error::{Error, Result};
use crate::name::PackageName;
use crate::protocol::{Credentials, RegistryTransport};
use crate::store::LocalRegistryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Default,
    LocalOnly,
    RemotePrimary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub version: Option<Version>,
    pub source: Option<ResolutionSource>,
    pub diagnostics: Vec<String>,
}

/// Resolves a version for `name` against `constraint`, preferring local
/// registry state and consulting the remote transport per `mode`.
pub async fn resolve(
    store: &LocalRegistryStore,
    transport: Option<&dyn RegistryTransport>,
    creds: &Credentials,
    name: &PackageName,
    constraint: &str,
    mode: ResolveMode,
    prefer_stable: bool,
) -> Result<Resolution> {
    let range = openpackage_version::VersionRange::parse(constraint)
        .map_err(|_| Error::InvalidRange(constraint.to_string()))?;
    let opts = openpackage_version::SelectOptions { prefer_stable };
    let mut diagnostics = Vec::new();

    let local_versions = local_versions(store, name)?;

    match mode {
        ResolveMode::LocalOnly => {
            let selection = openpackage_version::select_version(&local_versions, &range, opts);
            Ok(Resolution {
                source: selection.version.as_ref().map(|_| ResolutionSource::Local),
                version: selection.version,
                diagnostics,
            })
        }
        ResolveMode::RemotePrimary => {
            let transport = transport.ok_or_else(|| Error::RemoteUnknown("no transport configured".into()))?;
            let remote_versions = fetch_remote_versions(transport, creds, name).await?;
            let selection = openpackage_version::select_version(&remote_versions, &range, opts);
            match selection.version {
                Some(version) => Ok(Resolution { version: Some(version), source: Some(ResolutionSource::Remote), diagnostics }),
                None => Err(Error::RemoteNotFound(name.to_string())),
            }
        }
        ResolveMode::Default => {
            let local_selection = openpackage_version::select_version(&local_versions, &range, opts);
            if let Some(version) = local_selection.version {
                return Ok(Resolution { version: Some(version), source: Some(ResolutionSource::Local), diagnostics });
            }

            let Some(transport) = transport else {
                diagnostics.push("no remote transport configured; only local versions were considered".into());
                return Ok(Resolution { version: None, source: None, diagnostics });
            };

            let remote_result = fetch_remote_versions_with_retry(transport, creds, name).await;
            match remote_result {
                Ok(remote_versions) => {
                    let mut merged = local_versions.clone();
                    merged.extend(remote_versions);
                    merged.sort_unstable();
                    merged.dedup();
                    let selection = openpackage_version::select_version(&merged, &range, opts);
                    match selection.version {
                        Some(version) => {
                            let source = if merged.contains(&version) && !local_versions.contains(&version) {
                                ResolutionSource::Remote
                            } else {
                                ResolutionSource::Local
                            };
                            Ok(Resolution { version: Some(version), source: Some(source), diagnostics })
                        }
                        None => Ok(Resolution { version: None, source: None, diagnostics }),
                    }
                }
                Err(e @ (Error::RemoteNotFound(_) | Error::AccessDenied(_))) => {
                    diagnostics.push(e.to_string());
                    Ok(Resolution { version: None, source: None, diagnostics })
                }
                Err(e) => Err(e),
            }
        }
    }
}

fn local_versions(store: &LocalRegistryStore, name: &PackageName) -> Result<Vec<Version>> {
    Ok(store
        .list(name)?
        .into_iter()
        .filter(|v| !openpackage_version::is_unversioned(v))
        .filter_map(|v| Version::parse(&v).ok())
        .collect())
}

async fn fetch_remote_versions(
    transport: &dyn RegistryTransport,
    creds: &Credentials,
    name: &PackageName,
) -> Result<Vec<Version>> {
    let raw = transport.versions(&name.to_string(), creds).await?;
    Ok(raw.into_iter().filter_map(|v| Version::parse(&v).ok()).collect())
}

/// Remote version lookup is retried once on `network` failure.
/// `not-found`/`access-denied` are non-retryable.
async fn fetch_remote_versions_with_retry(
    transport: &dyn RegistryTransport,
    creds: &Credentials,
    name: &PackageName,
) -> Result<Vec<Version>> {
    match fetch_remote_versions(transport, creds, name).await {
        Ok(versions) => Ok(versions),
        Err(Error::Network(_)) => fetch_remote_versions(transport, creds, name).await,
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with(versions: &[&str]) -> (tempfile::TempDir, LocalRegistryStore, PackageName) {
        let dir = tempdir().unwrap();
        let store = LocalRegistryStore::new(dir.path());
        let name = PackageName::parse("tools").unwrap();
        for v in versions {
            let metadata = crate::manifest::PackageManifest {
                name: "tools".into(),
                version: Some((*v).into()),
                ..Default::default()
            };
            let pkg = crate::package::Package::new(metadata, vec![crate::package::PackageFile::text("rules/x.md", "hi")]).unwrap();
            store.save(&pkg, false).unwrap();
        }
        (dir, store, name)
    }

    #[tokio::test]
    async fn local_only_never_touches_transport() {
        let (_dir, store, name) = store_with(&["1.0.0", "2.0.0-alpha.1"]);
        let resolution = resolve(&store, None, &Credentials::None, &name, "*", ResolveMode::LocalOnly, false)
            .await
            .unwrap();
        assert_eq!(resolution.version, Some(Version::parse("2.0.0-alpha.1").unwrap()));
        assert_eq!(resolution.source, Some(ResolutionSource::Local));
    }

    #[tokio::test]
    async fn default_mode_prefers_local_when_it_satisfies() {
        let (_dir, store, name) = store_with(&["1.0.0"]);
        let resolution = resolve(&store, None, &Credentials::None, &name, "^1.0.0", ResolveMode::Default, false)
            .await
            .unwrap();
        assert_eq!(resolution.source, Some(ResolutionSource::Local));
    }

    #[tokio::test]
    async fn remote_primary_without_transport_is_an_error() {
        let (_dir, store, name) = store_with(&["1.0.0"]);
        let result = resolve(&store, None, &Credentials::None, &name, "*", ResolveMode::RemotePrimary, false).await;
        assert!(result.is_err());
    }
}
