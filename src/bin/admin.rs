//! ModelSwapper admin CLI.
//!
//! Operational tooling against a running server: status, model listing, and
//! the static tier policy table.

use clap::{Parser, Subcommand};
use colored::Colorize;
use model_swapper::api::types::ModelEntry;
use model_swapper::{SwapperStatus, TierPolicy, UserTier};

#[derive(Parser)]
#[command(name = "model-swapper-admin")]
#[command(about = "ModelSwapper admin CLI - inspect a running deployment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the running server
    #[arg(
        long,
        env = "MODEL_SWAPPER_URL",
        default_value = "http://localhost:3000"
    )]
    server_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show catalog size, breaker state, and today's spend
    Stats,

    /// List active system models with pricing
    Models,

    /// Print the static tier policy table
    Tiers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Stats => {
            let status: SwapperStatus = client
                .get(format!("{}/v1/status", cli.server_url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            println!("{}", "ModelSwapper status".bold());
            println!(
                "  catalog: {} providers, {} models, {} task types",
                status.catalog.providers, status.catalog.models, status.catalog.task_types
            );
            let breaker = if status.emergency_breaker_tripped {
                "TRIPPED".red().bold()
            } else {
                "ok".green()
            };
            println!(
                "  emergency breaker: {} (ceiling ${:.2})",
                breaker, status.emergency_daily_ceiling_usd
            );
            println!(
                "  today's system spend: ${:.4}",
                status.today_system_spend_usd
            );
        }
        Commands::Models => {
            let models: Vec<ModelEntry> = client
                .get(format!("{}/v1/models", cli.server_url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            println!("{}", "Active system models".bold());
            for model in models {
                println!(
                    "  {:<24} {:<12} ${:.5}/1k prompt  ${:.5}/1k completion  {}k window",
                    model.id.cyan(),
                    model.provider_kind.to_string(),
                    model.cost_per_1k_prompt,
                    model.cost_per_1k_completion,
                    model.context_window / 1000
                );
            }
        }
        Commands::Tiers => {
            println!("{}", "Tier policy table".bold());
            println!(
                "  {:<10} {:>10} {:>10} {:>8} {:>12} {:>10}",
                "tier", "daily $", "hourly $", "quota", "per-req $", "own keys"
            );
            for tier in UserTier::ALL {
                let policy = TierPolicy::for_tier(tier);
                println!(
                    "  {:<10} {:>10.2} {:>10.2} {:>8} {:>12.2} {:>10}",
                    tier.to_string().cyan(),
                    policy.daily_ceiling_usd,
                    policy.hourly_ceiling_usd,
                    policy.daily_request_quota,
                    policy.max_cost_per_request_usd,
                    if policy.allows_user_credentials {
                        "yes".green()
                    } else {
                        "no".normal()
                    }
                );
            }
        }
    }
    Ok(())
}
