//! Inspection commands.

use anyhow::{bail, Result};
use edge_cache::{matching_cookie, CacheKeyBuilder, CacheVersion, Directive};
use serde::Serialize;

use super::{InspectArgs, InspectCommand};
use crate::context::Context;

/// Run the inspect command.
pub async fn run(args: InspectArgs, ctx: &Context) -> Result<()> {
    match args.command {
        InspectCommand::Key { url, version } => inspect_key(&url, version, ctx),
        InspectCommand::Directive { value } => inspect_directive(&value, ctx),
        InspectCommand::Bypass { cookie, prefixes } => inspect_bypass(&cookie, prefixes, ctx),
    }
}

#[derive(Debug, Serialize)]
struct BypassVerdict {
    bypass: bool,
    matched: Option<String>,
    prefixes: Vec<String>,
}

fn inspect_key(url: &str, version: i64, ctx: &Context) -> Result<()> {
    if version < 0 {
        bail!("Version must be non-negative, got {}", version);
    }

    let key = CacheKeyBuilder::new()
        .with_param(ctx.config.version_param.clone())
        .build(url, CacheVersion::new(version));

    if ctx.output.is_json() {
        ctx.output.json(&key);
    } else {
        println!("{}", key);
    }

    Ok(())
}

fn inspect_directive(value: &str, ctx: &Context) -> Result<()> {
    let directive = Directive::parse_value(value);

    if ctx.output.is_json() {
        ctx.output.json(&directive);
        return Ok(());
    }

    ctx.output.header("Directive");
    ctx.output.kv("cache", &directive.cache.to_string());
    ctx.output.kv("purge", &directive.purge.to_string());
    if directive.bypass_cookies.is_empty() {
        ctx.output.kv("bypass_cookies", "(none, bypass nothing)");
    } else {
        ctx.output.kv("bypass_cookies", "");
        for prefix in &directive.bypass_cookies {
            ctx.output.list_item(prefix);
        }
    }

    Ok(())
}

fn inspect_bypass(cookie: &str, prefixes: Option<Vec<String>>, ctx: &Context) -> Result<()> {
    let verdict = bypass_verdict(
        cookie,
        prefixes.unwrap_or_else(|| ctx.config.default_bypass_prefixes.clone()),
    );

    if ctx.output.is_json() {
        ctx.output.json(&verdict);
        return Ok(());
    }

    match &verdict.matched {
        Some(cookie) => ctx.output.warn(&format!("Bypass: cookie '{}' matches", cookie)),
        None => ctx.output.success("Cacheable: no cookie matches"),
    }
    ctx.output.kv("prefixes", &verdict.prefixes.join(", "));

    Ok(())
}

fn bypass_verdict(cookie: &str, prefixes: Vec<String>) -> BypassVerdict {
    let prefixes: Vec<String> = prefixes
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    let matched = matching_cookie(cookie, &prefixes).map(str::to_string);

    BypassVerdict {
        bypass: matched.is_some(),
        matched,
        prefixes,
    }
}
