// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use scangate_core::domain::config::ScangateConfig;

use crate::bootstrap::{load_config, validate_config};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (file + environment)
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a configuration file with default values
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./scangate.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<&Path>, in_memory: bool) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.as_deref().or(config_override), in_memory),
        ConfigCommand::Generate { output } => generate(&output),
    }
}

fn redact(value: &Option<String>) -> String {
    match value.as_deref() {
        None => "(not set)".to_string(),
        Some(v) if v.starts_with("env:") => v.to_string(),
        Some(_) => "********".to_string(),
    }
}

fn or_unset(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}

fn show(config_override: Option<&Path>, show_paths: bool) -> Result<()> {
    let config = load_config(config_override)?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. SCANGATE_CONFIG: {}",
            std::env::var("SCANGATE_CONFIG")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./scangate.yaml");
        println!();
    }

    println!("{}", "Server:".bold());
    println!("  Bind: {}:{}", config.server.host, config.server.port);
    println!("  Public URL: {}", config.server.public_url);
    println!();

    println!("{}", "Database:".bold());
    println!("  URL: {}", redact(&config.database.url));
    println!("  Max connections: {}", config.database.max_connections);
    println!();

    println!("{}", "Platform:".bold());
    println!("  API: {}", or_unset(&config.platform.api_url));
    println!("  UI: {}", or_unset(&config.platform.ui_url));
    println!();

    println!("{}", "Scan provider:".bold());
    println!("  API: {}", or_unset(&config.provider.api_url));
    println!("  API key: {}", redact(&config.provider.api_key));
    println!();

    println!("{}", "Report storage:".bold());
    println!("  Bucket: {}", or_unset(&config.storage.bucket));
    println!("  Region: {}", or_unset(&config.storage.region));
    if let Some(endpoint) = &config.storage.endpoint {
        println!("  Endpoint: {}", endpoint);
    }
    println!();

    println!("{}", "Reconciler:".bold());
    println!("  Interval: {:?}", config.reconciler.interval);
    println!("  Timeout: {:?}", config.reconciler.timeout);
    println!("  Success threshold: {}", config.reconciler.success_threshold);
    println!("  Max concurrency: {}", config.reconciler.max_concurrency);
    println!("  Overlap: {:?}", config.reconciler.overlap);
    println!();

    Ok(())
}

fn validate(config_path: Option<&Path>, in_memory: bool) -> Result<()> {
    println!("Validating configuration...");

    let config = load_config(config_path)?;
    validate_config(&config, in_memory)?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: &Path) -> Result<()> {
    let sample = serde_yaml::to_string(&ScangateConfig::default()).context("Failed to render configuration")?;
    std::fs::write(output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scangate.yaml");
        generate(&path).unwrap();

        let config = ScangateConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.reconciler.timeout, std::time::Duration::from_secs(50 * 60));
    }

    #[test]
    fn test_redact_hides_literal_secrets() {
        assert_eq!(redact(&Some("abc".into())), "********");
        assert_eq!(redact(&Some("env:DETECTIFY_API_KEY".into())), "env:DETECTIFY_API_KEY");
        assert_eq!(redact(&None), "(not set)");
    }
}
