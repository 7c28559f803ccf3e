//! Orgbill CLI — command-line client for the organization billing API.
//!
//! Set ORGBILL_API_URL (or API_URL) and optionally ORGBILL_API_KEY.

use anyhow::Context;
use clap::{Parser, Subcommand};
use orgbill_api_client::ApiClient;
use orgbill_cli::{format_epoch, init_tracing};
use orgbill_core::ClientConfig;
use orgbill_services::{QueryState, SubscriptionService};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "orgbill", about = "Organization billing subscription CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an organization's subscription and print it as JSON
    Get {
        /// Organization slug
        org_slug: String,
        /// Check billing-window invariants on the fetched record
        #[arg(long)]
        validate: bool,
    },
    /// Warm the cache for an organization, then read the cached entry
    Prefetch {
        /// Organization slug
        org_slug: String,
    },
    /// Print a short plan summary for an organization
    Plan {
        /// Organization slug
        org_slug: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;

    match cli.command {
        Commands::Get { org_slug, validate } => {
            let client = ApiClient::from_config(&config)?;
            let sub = client.get_org_subscription(&org_slug, None).await?;
            if validate {
                sub.validate()?;
            }
            print_json(&sub)?;
        }
        Commands::Prefetch { org_slug } => {
            let service = SubscriptionService::from_config(&config)?;
            let trigger = service.prefetch_org_subscription(Some(&org_slug));
            if let Some(task) = trigger.trigger() {
                task.await.context("Cache warming task failed")?;
            }

            match service.cached_org_subscription(&org_slug) {
                Some(sub) => print_json(&sub)?,
                None => {
                    let state = service.subscribe_org_subscription(&org_slug);
                    let state = state.borrow();
                    if let QueryState::Failed { error, .. } = &*state {
                        anyhow::bail!("Prefetch failed: {}", error);
                    }
                    anyhow::bail!("No cached subscription for '{}'", org_slug);
                }
            }
        }
        Commands::Plan { org_slug } => {
            let client = ApiClient::from_config(&config)?;
            let sub = client.get_org_subscription(&org_slug, None).await?;
            println!(
                "{}: {} (${}/month), current period {} to {}, next invoice {}",
                org_slug,
                sub.plan.name,
                sub.plan.price,
                format_epoch(sub.current_period_start),
                format_epoch(sub.current_period_end),
                format_epoch(sub.next_invoice_at),
            );
        }
    }

    Ok(())
}
