use openpackage_core::Credentials;

use crate::config::Config;
use crate::context::Context;

/// `openpackage configure`: interactively edits the CLI's own config file.
pub async fn configure(ctx: &Context) -> anyhow::Result<()> {
    let path = Config::default_path()?;
    let mut config = ctx.config.clone();

    if let Some(url) = ctx.ui.prompt("registry URL").await? {
        config.registry_url = Some(url);
    }
    if let Some(timeout) = ctx.ui.prompt("API timeout in milliseconds").await? {
        config.api_timeout_ms = timeout.parse().ok().or(config.api_timeout_ms);
    }
    if let Some(profile) = ctx.ui.prompt("default profile").await? {
        config.profile = Some(profile);
    }

    config.save(&path)?;
    println!("saved {path:?}");
    Ok(())
}

/// `openpackage login`: prompts for an API key and stores it for the active profile.
pub async fn login(ctx: &Context) -> anyhow::Result<()> {
    let Some(api_key) = ctx.ui.prompt("API key").await? else {
        anyhow::bail!("no API key was provided");
    };
    ctx.credentials.set(&ctx.profile, Credentials::ApiKey(api_key)).await?;
    println!("stored credentials for profile `{}`", ctx.profile);
    Ok(())
}

/// `openpackage logout`: removes stored credentials for the active profile.
pub async fn logout(ctx: &Context) -> anyhow::Result<()> {
    ctx.credentials.clear(&ctx.profile).await?;
    println!("removed credentials for profile `{}`", ctx.profile);
    Ok(())
}
