
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};
use std::path::Path;

use super::{AzureConfig, Config, RetrievalConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Movie Chat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Azure OpenAI Configuration").bold().yellow());
    eprintln!("Configure the hosted deployments used for embeddings and chat.");
    eprintln!();

    configure_azure(&mut config.azure)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_endpoint_connection(&config.azure) {
        eprintln!("{}", style("✓ Endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the resource endpoint").yellow()
        );
        eprintln!("You can continue, but indexing and chat will fail until it is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Azure OpenAI Settings:").bold().yellow());
    eprintln!(
        "  Endpoint: {}",
        style(display_or_unset(&config.azure.endpoint)).cyan()
    );
    eprintln!("  API Key: {}", style(config.azure.masked_api_key()).cyan());
    eprintln!(
        "  Embedding Deployment: {}",
        style(&config.azure.embedding_deployment).cyan()
    );
    eprintln!(
        "  Chat Deployment: {}",
        style(&config.azure.chat_deployment).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.azure.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Index: {}", style(&config.retrieval.index_name).cyan());
    eprintln!("  Documents per question: {}", style(config.retrieval.k).cyan());

    eprintln!();
    eprintln!("{}", style("Dataset Filter:").bold().yellow());
    eprintln!("  Released after: {}", style(config.dataset.min_year).cyan());
    eprintln!(
        "  Origins: {}",
        style(config.dataset.origins.join(", ")).cyan()
    );
    eprintln!(
        "  Max plot tokens: {}",
        style(config.dataset.max_tokens).cyan()
    );

    eprintln!();
    eprintln!(
        "  Debug: {}",
        style(if config.chat.debug { "on" } else { "off" }).cyan()
    );
    eprintln!(
        "  Web UI: {}",
        style(format!("http://{}:{}", config.server.host, config.server.port)).cyan()
    );

    eprintln!();
    match config.resource_url() {
        Ok(url) => eprintln!("  Resource URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Resource URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn load_existing_config() -> Result<Config> {
    let config_dir = Config::config_dir().context("Failed to locate config directory")?;
    load_stored_config(&config_dir)
}

/// The saved file only; environment overrides must not end up in it
fn load_stored_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_azure(azure: &mut AzureConfig) -> Result<()> {
    let endpoint: String = Input::new()
        .with_prompt("Resource endpoint")
        .default(azure.endpoint.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let candidate = AzureConfig {
                endpoint: input.clone(),
                ..AzureConfig::default()
            };
            candidate
                .resource_url()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    let api_key = Password::new()
        .with_prompt("API key (leave empty to keep current / use API_KEY)")
        .allow_empty_password(true)
        .interact()?;

    let embedding_deployment: String = Input::new()
        .with_prompt("Embedding deployment")
        .default(azure.embedding_deployment.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Deployment name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chat_deployment: String = Input::new()
        .with_prompt("Chat deployment")
        .default(azure.chat_deployment.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Deployment name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Texts per embedding request")
        .default(azure.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    azure.set_endpoint(endpoint)?;
    if !api_key.trim().is_empty() {
        azure.set_api_key(api_key)?;
    }
    azure.set_embedding_deployment(embedding_deployment)?;
    azure.set_chat_deployment(chat_deployment)?;
    azure.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let k: usize = Input::new()
        .with_prompt("Documents retrieved per question")
        .default(retrieval.k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 100")
            }
        })
        .interact_text()?;

    retrieval.set_k(k)?;
    Ok(())
}

/// Any HTTP response means the endpoint is reachable; only transport failures count as down
fn test_endpoint_connection(azure: &AzureConfig) -> bool {
    let Ok(url) = azure.resource_url() else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) | Err(ureq::Error::StatusCode(_)) => true,
        Err(_) => false,
    }
}
