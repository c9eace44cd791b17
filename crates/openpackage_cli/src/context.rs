use std::path::PathBuf;

use openpackage_core::{Credentials, CredentialStore, LocalRegistryStore, NonInteractive, UserInteraction};

use crate::args::CliArgs;
use crate::config::Config;
use crate::credential_store;
use crate::transport_http::HttpTransport;
use crate::workspace;

/// Everything a command façade needs, resolved once from CLI flags, env vars,
/// and the config file.
pub struct Context {
    pub config: Config,
    pub profile: String,
    pub store: LocalRegistryStore,
    pub credentials: Box<dyn CredentialStore>,
    pub ui: Box<dyn UserInteraction>,
    pub transport: Option<HttpTransport>,
    pub working_dir: Option<PathBuf>,
}

impl Context {
    pub fn new(args: &CliArgs) -> anyhow::Result<Self> {
        let config_path = Config::default_path()?;
        let config = Config::load(&config_path)?;
        let profile = config.resolved_profile(args.profile.as_deref());
        let data_dir = workspace::data_dir()?;
        let store = LocalRegistryStore::new(workspace::registry_root()?);
        let credentials = credential_store::resolve_store(&data_dir, args.api_key.clone());

        let transport = config
            .registry_url
            .as_deref()
            .map(url::Url::parse)
            .transpose()?
            .map(|base_url| HttpTransport::new(base_url, config.api_timeout()))
            .transpose()?;

        Ok(Self {
            config,
            profile,
            store,
            credentials,
            ui: Box::new(NonInteractive),
            transport,
            working_dir: args.working_dir.clone(),
        })
    }

    pub async fn credentials(&self) -> anyhow::Result<Credentials> {
        Ok(self.credentials.get(&self.profile).await?)
    }

    pub fn load_workspace(&self) -> anyhow::Result<workspace::Workspace> {
        workspace::load(self.working_dir.as_deref())
    }
}
