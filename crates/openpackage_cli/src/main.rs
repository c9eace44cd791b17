mod args;
mod commands;
mod config;
mod context;
mod credential_store;
mod log;
mod transport_http;
mod workspace;

use clap::Parser;
use tracing::error;

use crate::args::{CliArgs, Command};
use crate::context::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    log::init(args.verbosity());

    if let Err(e) = run(args).await {
        error!("{e:?}");
        eprintln!("error: {e:?}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let ctx = Context::new(&args)?;

    match args.command {
        Command::Init { name } => commands::init(&ctx, name)?,
        Command::Add { path_or_pkg } => commands::add(&ctx, &path_or_pkg)?,
        Command::Save { name } => commands::save(&ctx, name.as_deref())?,
        Command::Pack { name, force } => commands::pack(&ctx, name.as_deref(), force)?,
        Command::Install { spec, resolution, conflicts, paths, dry_run } => {
            commands::install(&ctx, spec.as_deref(), &resolution, conflicts, paths.as_deref(), dry_run).await?
        }
        Command::Uninstall { name } => commands::uninstall(&ctx, &name)?,
        Command::Status => commands::status(&ctx).await?,
        Command::List => commands::list(&ctx)?,
        Command::Show { name } => commands::show(&ctx, &name)?,
        Command::Duplicate { src, dst } => commands::duplicate(&ctx, &src, &dst)?,
        Command::Delete { spec } => commands::delete(&ctx, &spec)?,
        Command::Prune { name } => commands::prune(&ctx, name.as_deref())?,
        Command::Push { spec, resolution } => commands::push(&ctx, &spec, &resolution).await?,
        Command::Pull { spec, resolution, paths } => commands::pull(&ctx, &spec, &resolution, paths.as_deref()).await?,
        Command::Configure => commands::configure(&ctx).await?,
        Command::Login => commands::login(&ctx).await?,
        Command::Logout => commands::logout(&ctx).await?,
    }

    Ok(())
}
