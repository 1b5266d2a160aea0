//! CLI command implementations.

pub mod config;
pub mod inspect;
pub mod replay;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,

        /// Use the Node.js origin defaults for bypass cookies.
        #[arg(long)]
        nodejs: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    #[command(subcommand)]
    pub command: InspectCommand,
}

#[derive(Subcommand)]
pub enum InspectCommand {
    /// Print the versioned cache key for a URL.
    Key {
        /// Request URL.
        url: String,

        /// Cache version.
        #[arg(long, default_value = "0")]
        version: i64,
    },
    /// Parse an `x-HTML-Edge-Cache` response header value.
    Directive {
        /// Header value, e.g. "cache,bypass-cookies=wp-|shop_".
        value: String,
    },
    /// Check whether a cookie header bypasses the cache.
    Bypass {
        /// Request `Cookie` header.
        #[arg(long)]
        cookie: String,

        /// Comma-separated prefixes (default: configured bypass prefixes).
        #[arg(long, value_delimiter = ',')]
        prefixes: Option<Vec<String>>,
    },
}

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Scenario file (TOML).
    pub scenario: String,

    /// Stop at the first origin error instead of reporting it.
    #[arg(long)]
    pub fail_fast: bool,
}
