use std::path::PathBuf;

use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Parser, Subcommand, ValueEnum};

const MAIN_COLOR: AnsiColor = AnsiColor::Green;
const SECONDARY_COLOR: AnsiColor = AnsiColor::Cyan;
const HELP_STYLES: Styles = Styles::styled()
    .header(MAIN_COLOR.on_default().bold())
    .usage(MAIN_COLOR.on_default().bold())
    .placeholder(SECONDARY_COLOR.on_default())
    .literal(SECONDARY_COLOR.on_default());

/// Install, sync, and publish portable AI-agent configuration packages
/// across tools.
#[derive(Debug, Parser)]
#[command(version, author, styles = HELP_STYLES)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Profile to use, overriding `OPENPACKAGEPROFILE` and the config file.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// API key to use for this invocation, bypassing the credential store.
    #[arg(long, global = true, env = "OPENPACKAGE_API_KEY")]
    pub api_key: Option<String>,

    /// Workspace root, defaulting to the nearest ancestor with a `package.yml`.
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv).
    ///
    /// To change the log level without setting verbosity, use the
    /// `OPENPACKAGE_LOG` environment variable, e.g. `OPENPACKAGE_LOG=debug`.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CliArgs {
    pub fn verbosity(&self) -> tracing::level_filters::LevelFilter {
        use tracing::level_filters::LevelFilter;
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConflictArg {
    Ask,
    KeepBoth,
    Overwrite,
    Skip,
}

impl From<ConflictArg> for openpackage_core::ConflictStrategy {
    fn from(value: ConflictArg) -> Self {
        match value {
            ConflictArg::Ask => Self::Ask,
            ConflictArg::KeepBoth => Self::KeepBoth,
            ConflictArg::Overwrite => Self::Overwrite,
            ConflictArg::Skip => Self::Skip,
        }
    }
}

/// Resolution-mode flags shared by `install`/`push`/`pull`.
#[derive(Debug, clap::Args)]
pub struct ResolutionFlags {
    /// Resolve only against the local registry.
    #[arg(long, conflicts_with = "remote")]
    pub local: bool,

    /// Prefer the remote registry, requiring a transport to be configured.
    #[arg(long, conflicts_with = "local")]
    pub remote: bool,

    /// Exclude prerelease/WIP versions from resolution.
    #[arg(long)]
    pub stable: bool,
}

impl ResolutionFlags {
    pub fn mode(&self) -> openpackage_core::ResolveMode {
        if self.local {
            openpackage_core::ResolveMode::LocalOnly
        } else if self.remote {
            openpackage_core::ResolveMode::RemotePrimary
        } else {
            openpackage_core::ResolveMode::Default
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new workspace `package.yml` in the current directory.
    Init {
        /// Workspace package name; defaults to the directory name.
        name: Option<String>,
    },

    /// Register an existing directory or installed package as a workspace dependency.
    Add {
        /// A filesystem path to adopt, or `name[@version]` of an already-installed package.
        path_or_pkg: String,
    },

    /// Save the current workspace state as a work-in-progress version.
    Save {
        /// Package name; defaults to the workspace's own name.
        name: Option<String>,
    },

    /// Save the current workspace state as a stable, immutable version.
    Pack {
        /// Package name; defaults to the workspace's own name.
        name: Option<String>,
        /// Overwrite a version that was already packed.
        #[arg(long)]
        force: bool,
    },

    /// Install a package (or re-install every dependency with no argument).
    Install {
        /// `name[@version][/path]`; omit to re-install every dependency.
        spec: Option<String>,

        #[command(flatten)]
        resolution: ResolutionFlags,

        /// How to resolve file conflicts with existing workspace content.
        #[arg(long, value_enum, default_value = "overwrite")]
        conflicts: ConflictArg,

        /// Comma-separated registry paths to install, instead of the whole package.
        #[arg(long, value_delimiter = ',')]
        paths: Option<Vec<String>>,

        /// Compute the install plan without writing any files.
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove an installed package's materialised files and index entry.
    Uninstall { name: String },

    /// Show installed packages and whether they're up to date.
    Status,

    /// List every package in the local registry.
    List,

    /// Show a package's manifest and tracked files.
    Show { name: String },

    /// Copy a package under a new name in the local registry.
    Duplicate { src: String, dst: String },

    /// Delete a package (or one version of it) from the local registry.
    Delete {
        /// `name` or `name@version`.
        spec: String,
    },

    /// Delete stale work-in-progress versions.
    Prune {
        /// Restrict to one package; omit to prune the whole registry.
        name: Option<String>,
    },

    /// Upload a package (or part of one) to the remote registry.
    Push {
        spec: String,

        #[command(flatten)]
        resolution: ResolutionFlags,
    },

    /// Download a package (or part of one) from the remote registry.
    Pull {
        spec: String,

        #[command(flatten)]
        resolution: ResolutionFlags,

        /// Comma-separated registry paths to pull, instead of the whole package.
        #[arg(long, value_delimiter = ',')]
        paths: Option<Vec<String>>,
    },

    /// Interactively edit the CLI's own configuration file.
    Configure,

    /// Store credentials for the active profile.
    Login,

    /// Remove stored credentials for the active profile.
    Logout,
}
