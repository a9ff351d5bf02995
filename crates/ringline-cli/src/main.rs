//! Ringline CLI - Place and inspect AI-driven phone calls
//!
//! Thin client over the Ringline HTTP API.

mod api;
mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use dialoguer::{Input, Password};

use api::{CallResponse, InitiateCallRequest, RinglineClient};
use config::Config;

#[derive(Parser)]
#[command(name = "ringline")]
#[command(about = "Ringline CLI - AI-driven outbound voice calls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Login and store API key
    Login {
        /// API key (will prompt if not provided)
        #[arg(short, long)]
        key: Option<String>,
        /// API base URL to store alongside the key
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Place, list and end calls
    Call {
        #[command(subcommand)]
        action: CallAction,
    },

    /// List origin numbers available to the gateway
    Numbers,

    /// Ask the server to generate a test line with its language provider
    CheckLlm,

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum AccountAction {
    /// Create an account and make it the default
    Create {
        /// Account name
        name: String,
        /// Starting credits (server default if omitted)
        #[arg(long)]
        credits: Option<i32>,
    },
    /// Show balance
    Show {
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Call analytics
    Stats {
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Set the default account
    Use {
        /// Account ID
        account_id: String,
    },
}

#[derive(Subcommand)]
enum CallAction {
    /// Place an outbound call
    Start {
        /// Destination number (will prompt if not provided)
        phone_number: Option<String>,
        /// What the agent should accomplish
        #[arg(short, long)]
        objective: Option<String>,
        /// Language model to use
        #[arg(long)]
        model: Option<String>,
        /// Voice to speak with
        #[arg(long)]
        voice: Option<String>,
        #[arg(short, long)]
        account: Option<String>,
    },
    /// List recent calls
    List {
        /// Max results
        #[arg(short, long, default_value = "20")]
        limit: i64,
        #[arg(short, long)]
        account: Option<String>,
    },
    /// List calls still in flight
    Active {
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Show a call with its transcript and events
    Show {
        call_id: String,
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Hang up a call
    End {
        call_id: String,
        #[arg(short, long)]
        account: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional .env with RINGLINE_* overrides
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login { key, base_url } => cmd_login(key, base_url).await,
        Commands::Account { action } => cmd_account(action).await,
        Commands::Call { action } => cmd_call(action).await,
        Commands::Numbers => cmd_numbers().await,
        Commands::CheckLlm => cmd_check_llm().await,
        Commands::Config => cmd_config(),
    }
}

// ============================================
// Command Implementations
// ============================================

async fn cmd_login(key: Option<String>, base_url: Option<String>) -> Result<()> {
    let mut config = Config::load_stored()?;
    if let Some(url) = base_url {
        config.base_url = url;
    }

    let api_key = match key {
        Some(k) => k,
        None => Password::new()
            .with_prompt("API Key")
            .interact()
            .context("Failed to read API key")?,
    };

    // Test connection and key
    let client = RinglineClient::new(&config.base_url, Some(&api_key));
    print!("Testing connection... ");

    match client.health().await {
        Ok(true) => {}
        _ => {
            println!("{}", "Failed".red());
            bail!("Could not reach Ringline API at {}", config.base_url);
        }
    }
    if let Err(e) = client.list_numbers().await {
        println!("{}", "Failed".red());
        bail!("API key was not accepted: {}", e);
    }
    println!("{}", "OK".green());

    config.set_api_key(api_key);
    config.save()?;

    println!("{} API key saved to {:?}", "✓".green(), Config::config_path()?);

    if config.default_account.is_none() {
        println!("\n{}", "Tip: Create an account to start calling:".yellow());
        println!("  ringline account create \"My Company\"");
    }

    Ok(())
}

fn client_for(config: &Config) -> RinglineClient {
    RinglineClient::new(&config.base_url, config.api_key.as_deref())
}

fn require_account(config: &Config, explicit: Option<&str>) -> Result<String> {
    config
        .account_id(explicit)
        .context("No account specified and no default account set. Use -a <ID> or 'ringline account use <ID>'.")
}

async fn cmd_account(action: AccountAction) -> Result<()> {
    let config = Config::load()?;
    let client = client_for(&config);

    match action {
        AccountAction::Create { name, credits } => {
            let account = client.create_account(&name, credits).await?;

            let mut stored = Config::load_stored()?;
            stored.default_account = Some(account.id.to_string());
            stored.save()?;

            println!(
                "{} Account {} created with {} credits (now default)",
                "✓".green(),
                account.name.cyan(),
                account.credits
            );
            println!("  {}", account.id.to_string().dimmed());
        }

        AccountAction::Show { account } => {
            let account_id = require_account(&config, account.as_deref())?;
            let account = client.get_account(&account_id).await?;

            println!("{}", account.name.cyan().bold());
            println!("  ID: {}", account.id.to_string().dimmed());
            println!("  Credits: {}", credits_colored(account.credits));
        }

        AccountAction::Stats { account } => {
            let account_id = require_account(&config, account.as_deref())?;
            let stats = client.get_stats(&account_id).await?;

            println!("{}", "Call stats:".bold());
            println!("  Total calls: {}", stats.total_calls);
            println!("  Active calls: {}", stats.active_calls);
            println!("  Success rate: {:.1}%", stats.success_rate);
            println!("  Credits used: {}", stats.credits_used);
        }

        AccountAction::Use { account_id } => {
            let account = client.get_account(&account_id).await?;

            let mut stored = Config::load_stored()?;
            stored.default_account = Some(account.id.to_string());
            stored.save()?;

            println!("{} Default account set to {}", "✓".green(), account.name.cyan());
        }
    }

    Ok(())
}

async fn cmd_call(action: CallAction) -> Result<()> {
    let config = Config::load()?;
    let client = client_for(&config);

    match action {
        CallAction::Start {
            phone_number,
            objective,
            model,
            voice,
            account,
        } => {
            let account_id = require_account(&config, account.as_deref())?;

            let phone_number = match phone_number {
                Some(n) => n,
                None => Input::new()
                    .with_prompt("Phone number")
                    .interact_text()
                    .context("Failed to read input")?,
            };

            let request = InitiateCallRequest {
                phone_number,
                objective,
                model,
                voice,
            };
            let call = client.initiate_call(&account_id, &request).await?;

            println!(
                "{} Calling {} [{}]",
                "✓".green(),
                call.phone_number.cyan(),
                status_colored(&call.status)
            );
            println!("  {}", call.id.to_string().dimmed());
            println!("  {}", truncate_string(&call.objective, 80).dimmed());
        }

        CallAction::List { limit, account } => {
            let account_id = require_account(&config, account.as_deref())?;
            let calls = client.list_calls(&account_id, limit).await?;
            print_calls(&calls, "No calls yet.");
        }

        CallAction::Active { account } => {
            let account_id = require_account(&config, account.as_deref())?;
            let calls = client.list_active_calls(&account_id).await?;
            print_calls(&calls, "No active calls.");
        }

        CallAction::Show { call_id, account } => {
            let account_id = require_account(&config, account.as_deref())?;
            let detail = client.get_call(&account_id, &call_id).await?;
            let call = &detail.call;

            println!(
                "{} {} [{}]",
                call.phone_number.cyan().bold(),
                call.id.to_string().dimmed(),
                status_colored(&call.status)
            );
            println!("  Objective: {}", call.objective);
            println!("  Started: {}", call.started_at.format("%Y-%m-%d %H:%M:%S"));
            if let Some(ended_at) = call.ended_at {
                println!("  Ended: {}", ended_at.format("%Y-%m-%d %H:%M:%S"));
            }
            println!(
                "  Duration: {}s, {} credits",
                call.duration_secs, call.credits_charged
            );

            if !call.conversation.is_empty() {
                println!("\n{}", "Transcript:".bold());
                for turn in &call.conversation {
                    let speaker = if turn.role == "assistant" {
                        "agent".cyan()
                    } else {
                        "callee".yellow()
                    };
                    let content = if turn.content.trim().is_empty() {
                        "(silence)".dimmed().to_string()
                    } else {
                        turn.content.clone()
                    };
                    println!("  {:>6}: {}", speaker, content);
                }
            }

            println!("\n{}", "Events:".bold());
            for event in &detail.events {
                println!(
                    "  {} {} {}",
                    event.created_at.format("%H:%M:%S").to_string().dimmed(),
                    event.kind.green(),
                    truncate_string(&event.data.to_string(), 60).dimmed()
                );
            }
        }

        CallAction::End { call_id, account } => {
            let account_id = require_account(&config, account.as_deref())?;
            let call = client.end_call(&account_id, &call_id).await?;

            println!(
                "{} Call to {} is {}",
                "✓".green(),
                call.phone_number.cyan(),
                status_colored(&call.status)
            );
        }
    }

    Ok(())
}

async fn cmd_numbers() -> Result<()> {
    let config = Config::load()?;
    let numbers = client_for(&config).list_numbers().await?;

    if numbers.is_empty() {
        println!("No origin numbers configured on the gateway.");
        return Ok(());
    }

    println!("{}", "Numbers:".bold());
    for number in numbers {
        println!(
            "  {} {}",
            number.phone_number.cyan(),
            number.friendly_name.dimmed()
        );
    }

    Ok(())
}

async fn cmd_check_llm() -> Result<()> {
    let config = Config::load()?;
    let check = client_for(&config).check_language_model().await?;

    println!(
        "{} {} ({}) answered in {}ms",
        "✓".green(),
        check.provider.bold(),
        check.model,
        check.latency_ms
    );
    println!("  {}", check.test_response.italic());
    println!(
        "  {} prompt + {} completion tokens, finish: {}",
        check.prompt_tokens,
        check.completion_tokens,
        check.finish_reason.as_deref().unwrap_or("-")
    );

    Ok(())
}

fn print_calls(calls: &[CallResponse], empty: &str) {
    if calls.is_empty() {
        println!("{}", empty);
        return;
    }

    println!("{}", "Calls:".bold());
    for call in calls {
        println!(
            "  {} {} [{}] {}s {}",
            call.id.to_string().dimmed(),
            call.phone_number.cyan(),
            status_colored(&call.status),
            call.duration_secs,
            truncate_string(&call.objective, 40).dimmed()
        );
    }
}

fn status_colored(status: &str) -> ColoredString {
    match status {
        "completed" => status.green(),
        "initiated" | "ringing" | "in-progress" => status.yellow(),
        _ => status.red(),
    }
}

fn credits_colored(credits: i32) -> ColoredString {
    if credits >= 100 {
        credits.to_string().green()
    } else if credits >= 10 {
        credits.to_string().yellow()
    } else {
        credits.to_string().red()
    }
}

/// Truncate string safely for UTF-8 (by char count, not bytes)
fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

fn cmd_config() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "Configuration:".bold());
    println!("  Path: {:?}", Config::config_path()?);
    println!("  Base URL: {}", config.base_url);
    println!(
        "  API Key: {}",
        if config.api_key.is_some() {
            "Set".green()
        } else {
            "Not set".red()
        }
    );
    println!(
        "  Default Account: {}",
        config.default_account.as_deref().unwrap_or("None").cyan()
    );

    Ok(())
}
