/*
[INPUT]:  Interactive user input via CLI
[OUTPUT]: Generated YAML configuration file
[POS]:    CLI initialization layer
[UPDATE]: When AppConfig schema changes
*/

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::path::PathBuf;

use sagespace_cli::config::{AppConfig, RetryConfig, default_config_path};

/// Write a configuration template, prompting for values unless `use_defaults`.
pub fn run_init(output: Option<PathBuf>, use_defaults: bool, force: bool) -> Result<PathBuf> {
    let output = match output.or_else(default_config_path) {
        Some(path) => path,
        None => bail!("could not determine a config directory; pass --output"),
    };

    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let config = if use_defaults {
        AppConfig::default()
    } else {
        prompt_config()?
    };

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let yaml = config.to_yaml()?;
    std::fs::write(&output, yaml)
        .with_context(|| format!("failed to write config to {}", output.display()))?;

    println!("\n{}", style("SUCCESS!").bold().green());
    println!(
        "Configuration written to: {}",
        style(output.display()).cyan()
    );
    Ok(output)
}

fn prompt_config() -> Result<AppConfig> {
    println!("{}", style("Welcome to SageSpace CLI setup").bold().cyan());
    println!(
        "{}",
        style("Leave a value empty to keep it unset (demo / guest mode).").dim()
    );

    let theme = ColorfulTheme::default();

    println!("\n{}", style("--- API ---").bold());
    let api_url = optional(
        Input::<String>::with_theme(&theme)
            .with_prompt("API base URL (e.g., https://api.sagespace.app/api)")
            .allow_empty(true)
            .interact_text()?,
    );

    println!("\n{}", style("--- Authentication ---").bold());
    let auth_url = optional(
        Input::<String>::with_theme(&theme)
            .with_prompt("Auth service URL")
            .allow_empty(true)
            .interact_text()?,
    );
    let auth_anon_key = match auth_url {
        Some(_) => optional(
            Input::<String>::with_theme(&theme)
                .with_prompt("Auth anon key")
                .interact_text()?,
        ),
        None => None,
    };
    let oauth_redirect_url = optional(
        Input::<String>::with_theme(&theme)
            .with_prompt("OAuth redirect URL")
            .allow_empty(true)
            .interact_text()?,
    );

    println!("\n{}", style("--- Retries ---").bold());
    let enabled = Confirm::with_theme(&theme)
        .with_prompt("Retry transient API failures?")
        .default(true)
        .interact()?;
    let max_retries: u32 = Input::with_theme(&theme)
        .with_prompt("Max retries")
        .default(3)
        .interact_text()?;

    Ok(AppConfig {
        api_url,
        auth_url,
        auth_anon_key,
        oauth_redirect_url,
        retry: RetryConfig {
            enabled,
            max_retries,
            ..RetryConfig::default()
        },
        ..AppConfig::default()
    })
}

fn optional(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
