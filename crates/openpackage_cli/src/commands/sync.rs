use anyhow::Context as _;
use openpackage_core::{check_integrity, parse_install_spec, ArchiveCodec, Package, PullRequest, ResolveMode};

use crate::args::ResolutionFlags;
use crate::context::Context;
use crate::transport_http::TarGzCodec;

fn require_transport(ctx: &Context) -> anyhow::Result<&crate::transport_http::HttpTransport> {
    ctx.transport
        .as_ref()
        .context("no `registry-url` is configured; run `openpackage configure` first")
}

/// `openpackage push <name[@version][/path]>`: uploads a locally saved
/// package (or a registry-path subset of it) to the remote registry.
pub async fn push(ctx: &Context, spec: &str, resolution: &ResolutionFlags) -> anyhow::Result<()> {
    let transport = require_transport(ctx)?;
    let parsed = parse_install_spec(spec).context("invalid package spec")?;
    let creds = ctx.credentials().await?;

    let version = match &parsed.version {
        Some(v) => v.clone(),
        None => {
            let resolution_result = openpackage_core::resolve(
                &ctx.store,
                None,
                &creds,
                &parsed.name,
                "*",
                ResolveMode::LocalOnly,
                resolution.stable,
            )
            .await?;
            let Some(version) = resolution_result.version else {
                anyhow::bail!("no local version of `{}` to push", parsed.name);
            };
            version.to_string()
        }
    };

    let package = ctx.store.load(&parsed.name, Some(&version))?;
    let package = match &parsed.registry_path {
        Some(path) => filter_package(&package, path)?,
        None => package,
    };
    let partial = parsed.registry_path.is_some() || package.metadata.is_partial();

    let codec = TarGzCodec;
    let tarball = codec.encode(&package.files)?;
    transport.push(&tarball, &parsed.name.to_string(), partial, &creds).await?;

    println!("pushed {}@{version}", parsed.name);
    Ok(())
}

/// `openpackage pull <name[@version][/path]>`: downloads a package (or a
/// registry-path subset) from the remote registry into the local store.
pub async fn pull(
    ctx: &Context,
    spec: &str,
    resolution: &ResolutionFlags,
    paths: Option<&[String]>,
) -> anyhow::Result<()> {
    let transport = require_transport(ctx)?;
    let parsed = parse_install_spec(spec).context("invalid package spec")?;
    let creds = ctx.credentials().await?;

    let requested_paths: Option<Vec<String>> =
        paths.map(<[String]>::to_vec).or_else(|| parsed.registry_path.clone().map(|p| vec![p]));

    let version = match &parsed.version {
        Some(v) => v.clone(),
        None => {
            let resolution_result = openpackage_core::resolve(
                &ctx.store,
                Some(transport as &dyn openpackage_core::RegistryTransport),
                &creds,
                &parsed.name,
                "*",
                ResolveMode::RemotePrimary,
                resolution.stable,
            )
            .await?;
            let Some(version) = resolution_result.version else {
                anyhow::bail!("no remote version of `{}` found", parsed.name);
            };
            version.to_string()
        }
    };

    let req = PullRequest {
        recursive: true,
        include_manifest: true,
        paths: requested_paths.clone(),
    };
    let response = transport.pull(&parsed.name.to_string(), &version, &req, &creds).await?;

    let codec = TarGzCodec;
    let mut files = Vec::new();
    let mut downloaded = Vec::new();
    for entry in &response.downloads {
        let Some(url) = &entry.download_url else { continue };
        let bytes = transport.fetch_bytes(url).await?;
        downloaded.extend_from_slice(&bytes);
        files.extend(codec.decode(&bytes)?);
    }
    let partial = requested_paths.is_some();
    check_integrity(&downloaded, response.size, partial).context("downloaded package failed its integrity check")?;

    let local = ctx.store.load(&parsed.name, Some(&version)).ok();
    let local_was_partial = local.as_ref().is_some_and(|p| p.metadata.is_partial());
    let requested = requested_paths.clone().unwrap_or_default();
    let merged = openpackage_core::merge_partial_pull(
        local.as_ref(),
        response.package,
        files,
        &requested,
        local_was_partial,
    )?;
    ctx.store.save(&merged, merged.metadata.is_partial())?;

    println!("pulled {}@{version}", parsed.name);
    Ok(())
}

fn filter_package(package: &Package, prefix: &str) -> anyhow::Result<Package> {
    let filtered: Vec<_> = package
        .content_files()
        .filter(|f| f.path == prefix || f.path.starts_with(&format!("{prefix}/")))
        .cloned()
        .collect();
    Ok(Package::new(package.metadata.clone(), filtered)?)
}
