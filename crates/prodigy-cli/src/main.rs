mod render;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use prodigy_core::ConfigType;
use prodigy_widgets::{ButtonGroupsQuery, WidgetClient};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "prodigy-cli")]
#[command(about = "Prodigy widget agent command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the widget API and tracking URLs for an environment.
    Endpoints {
        #[arg(long, env = "PRODIGY_ENV", default_value = "production")]
        env: String,
    },
    /// Fetch raw button-group markup for a set of VINs.
    Buttons {
        #[arg(long = "type", value_parser = parse_config_type)]
        config_type: ConfigType,
        #[arg(long = "vin", required = true)]
        vins: Vec<String>,
    },
    /// Run the agent over an HTML page and print the resulting body.
    Render {
        #[arg(long)]
        page: PathBuf,
        /// Frame message delivered once the page has settled. Repeatable.
        #[arg(long = "message")]
        messages: Vec<String>,
        /// Upper bound on how long to wait for the agent to go idle.
        #[arg(long, default_value_t = 5_000)]
        settle_ms: u64,
    },
}

fn parse_config_type(raw: &str) -> Result<ConfigType, String> {
    ConfigType::from_marker(raw).ok_or_else(|| {
        format!(
            "unsupported config type '{raw}', expected one of: {}",
            ConfigType::supported()
        )
    })
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Endpoints { env }) => {
            init_tracing("info")?;
            let endpoints = prodigy_core::resolve_environment(&env);
            println!("api:      {}", endpoints.api_base);
            println!("tracking: {}", endpoints.tracking_base);
        }
        Some(Commands::Buttons { config_type, vins }) => {
            let config = prodigy_core::load_agent_config()?;
            init_tracing(&config.log_level)?;
            run_buttons(&config, config_type, vins).await?;
        }
        Some(Commands::Render {
            page,
            messages,
            settle_ms,
        }) => render::run(&page, &messages, settle_ms).await?,
        None => {
            init_tracing("info")?;
            println!("prodigy-cli: use --help to list commands");
        }
    }

    Ok(())
}

async fn run_buttons(
    config: &prodigy_core::AgentConfig,
    config_type: ConfigType,
    vins: Vec<String>,
) -> anyhow::Result<()> {
    let client = WidgetClient::from_config(config).context("failed to build widget client")?;
    let query = ButtonGroupsQuery {
        config_type,
        dealer_id: config.dealer_id.clone(),
        website_id: config.website_id.clone(),
        vehicle_ids: vins,
        deal_id: None,
        sales_person_name: config.sales_person_name.clone(),
        standalone_config: false,
        cache_bust: None,
    };
    let response = client.fetch_button_groups(&query).await?;

    if let Some(base_url) = &response.base_url {
        println!("baseUrl: {base_url}");
    }
    let mut groups: Vec<_> = response.button_groups.into_iter().collect();
    groups.sort();
    for (vin, markup) in &groups {
        println!("{vin}\t{markup}");
    }
    let missing: Vec<&str> = query
        .vehicle_ids
        .iter()
        .filter(|vin| !groups.iter().any(|(v, _)| v == *vin))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        tracing::warn!(missing = %missing.join(","), "no button group configured for some vins");
    }
    Ok(())
}
