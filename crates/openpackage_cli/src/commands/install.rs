use openpackage_core::{
    install_package, merge_files_map, parse_install_spec, ArchiveCodec, InstallOptions, Package,
    PackageIndex, PackageIndexRecord, PackageName, PullRequest, ResolveMode,
};

use crate::args::{ConflictArg, ResolutionFlags};
use crate::context::Context;
use crate::transport_http::TarGzCodec;
use crate::workspace::Workspace;

/// `openpackage install [spec]`: installs one package, or every dependency in
/// the workspace manifest when `spec` is omitted.
pub async fn install(
    ctx: &Context,
    spec: Option<&str>,
    resolution: &ResolutionFlags,
    conflicts: ConflictArg,
    paths: Option<&[String]>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let workspace = ctx.load_workspace()?;

    match spec {
        Some(raw) => {
            let parsed = parse_install_spec(raw)?;
            let paths: Option<Vec<String>> = paths
                .map(<[String]>::to_vec)
                .or_else(|| parsed.registry_path.clone().map(|p| vec![p]));
            install_one(ctx, &workspace, &parsed.name, parsed.version.as_deref(), resolution, conflicts, paths.as_deref(), dry_run)
                .await?;
        }
        None => {
            let deps = workspace.manifest.packages.clone();
            if deps.is_empty() {
                println!("no dependencies to install");
                return Ok(());
            }
            for dep in deps {
                let name = PackageName::parse(&dep.name)?;
                let dep_paths = if dep.files.is_empty() { None } else { Some(dep.files.clone()) };
                install_one(ctx, &workspace, &name, dep.version.as_deref(), resolution, conflicts, dep_paths.as_deref(), dry_run).await?;
            }
        }
    }
    Ok(())
}

async fn install_one(
    ctx: &Context,
    workspace: &Workspace,
    name: &PackageName,
    version_constraint: Option<&str>,
    resolution: &ResolutionFlags,
    conflicts: ConflictArg,
    paths: Option<&[String]>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let creds = ctx.credentials().await?;
    let mode = resolution.mode();
    let constraint = version_constraint.unwrap_or("*");

    let resolution_result = openpackage_core::resolve(
        &ctx.store,
        ctx.transport.as_ref().map(|t| t as &dyn openpackage_core::RegistryTransport),
        &creds,
        name,
        constraint,
        mode,
        resolution.stable,
    )
    .await?;

    let Some(version) = resolution_result.version else {
        anyhow::bail!("no version of `{name}` satisfies `{constraint}`: {}", resolution_result.diagnostics.join("; "));
    };
    let version = version.to_string();

    let package = match resolution_result.source {
        Some(openpackage_core::ResolutionSource::Remote) if !matches!(mode, ResolveMode::LocalOnly) => {
            fetch_and_cache(ctx, name, &version, paths, &creds).await?
        }
        _ => ctx.store.load(name, Some(&version))?,
    };

    let package = match paths {
        Some(requested) if !requested.is_empty() => filter_package(&package, requested)?,
        _ => package,
    };

    let options = InstallOptions { conflict_strategy: conflicts.into(), dry_run };
    let detected = workspace.detected_platforms();
    let plan = install_package(&package, &workspace.root, &detected, workspace.hash(), &options)?;

    if !dry_run {
        let index_path = workspace.root.join(openpackage_core::INDEX_FILE_NAME);
        let mut index = PackageIndex::load(&index_path)?;
        let mut record = plan.index_record.clone();
        if let Some(previous) = index.record(&name.to_string()) {
            record.files = merge_files_map(&previous.files, &plan.index_record.files, true);
        }
        index.set_record(name.to_string(), record);
        index.save(&index_path)?;
    }

    for change in &plan.changes {
        println!("{:?} {}", change.outcome, change.workspace_path);
    }
    println!("installed {name}@{version}");
    Ok(())
}

async fn fetch_and_cache(
    ctx: &Context,
    name: &PackageName,
    version: &str,
    paths: Option<&[String]>,
    creds: &openpackage_core::Credentials,
) -> anyhow::Result<Package> {
    let transport = ctx.transport.as_ref().expect("remote source implies a configured transport");
    let req = PullRequest {
        recursive: true,
        include_manifest: true,
        paths: paths.map(<[String]>::to_vec),
    };
    let response = transport.pull(&name.to_string(), version, &req, creds).await?;

    let mut files = Vec::new();
    for entry in &response.downloads {
        let Some(url) = &entry.download_url else { continue };
        let bytes = transport.fetch_bytes(url).await?;
        let codec = TarGzCodec;
        files.extend(codec.decode(&bytes)?);
    }

    let local = ctx.store.load(name, Some(version)).ok();
    let requested = paths.unwrap_or(&[]);
    let local_was_partial = local.as_ref().is_some_and(|p| p.metadata.is_partial());
    let merged = openpackage_core::merge_partial_pull(local.as_ref(), response.package, files, requested, local_was_partial)?;
    ctx.store.save(&merged, merged.metadata.is_partial())?;
    Ok(merged)
}

fn filter_package(package: &Package, requested: &[String]) -> anyhow::Result<Package> {
    let filtered: Vec<_> = package
        .content_files()
        .filter(|f| requested.iter().any(|p| f.path == *p || f.path.starts_with(&format!("{p}/"))))
        .cloned()
        .collect();
    Ok(Package::new(package.metadata.clone(), filtered)?)
}
