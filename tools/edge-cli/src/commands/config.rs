//! Configuration management commands.

use std::fs;

use anyhow::{bail, Context as _, Result};
use dialoguer::Confirm;
use edge_cache::{generate_default_config, EdgeCacheConfig};

use super::{ConfigArgs, ConfigCommand};
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force, nodejs } => init_config(force, nodejs, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let config = &ctx.config;
    ctx.output.info("");
    ctx.output.info("[cache]");
    ctx.output.kv("default_bypass_prefixes", &config.default_bypass_prefixes.join(", "));
    ctx.output.kv("advertised_support", &config.advertised_support);
    ctx.output.kv("version_key", &config.version_key);
    ctx.output.kv("version_param", &config.version_param);
    ctx.output.kv("storage_cache_control", &config.storage_cache_control);
    ctx.output.kv("skip_image_requests", &config.skip_image_requests.to_string());
    ctx.output.kv(
        "respect_upstream_edge_cache",
        &config.respect_upstream_edge_cache.to_string(),
    );

    ctx.output.info("");
    ctx.output.info("[liveness_header]");
    ctx.output.kv("enabled", &config.liveness_header.enabled.to_string());
    if let Some(header) = config.liveness() {
        ctx.output.kv(&header.name, &header.value);
    }

    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", config.logging.level.as_directive());
    ctx.output.kv(
        "format",
        &format!("{:?}", config.logging.format).to_lowercase(),
    );

    Ok(())
}

async fn init_config(force: bool, nodejs: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        if !ctx.output.is_interactive() {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                config_path.display()
            );
        }

        let overwrite = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", config_path.display()))
            .default(false)
            .interact()?;

        if !overwrite {
            ctx.output.warn("Config init cancelled");
            return Ok(());
        }
    }

    let defaults = if nodejs {
        EdgeCacheConfig::nodejs_defaults()
    } else {
        EdgeCacheConfig::default()
    };

    let content = generate_default_config(&defaults.default_bypass_prefixes);
    fs::write(&config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let Some(path) = &ctx.config_path else {
        bail!("No config file found. Run `edge-cache config init` to create one.");
    };

    let config = &ctx.config;
    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.display()))?;

    let mut warnings: Vec<String> = Vec::new();

    if config.default_bypass_prefixes.is_empty() {
        warnings.push(
            "default_bypass_prefixes is empty; logged-in users will be served cached pages"
                .to_string(),
        );
    }

    if config.liveness().is_none() {
        warnings.push("liveness_header is disabled".to_string());
    }

    if !config.advertised_support.starts_with("supports=") {
        warnings.push(format!(
            "advertised_support '{}' does not start with 'supports='",
            config.advertised_support
        ));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "file": path.display().to_string(),
            "valid": true,
            "warnings": warnings,
        }));
    } else if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }

    Ok(())
}
