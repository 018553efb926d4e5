//! Mission Control CLI
//!
//! Connection checks, dashboard refresh and raw gateway calls from a terminal.

use clap::{Parser, Subcommand};
use console::style;
use mission_control::config::{config_path, save_config, validate_config, Config};
use mission_control::gateway::{DashboardSnapshot, GatewayClient};
use mission_control::{Error, Result, VERSION};
use secrecy::SecretString;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "mission-control",
    author = "Mission Control Contributors",
    version = VERSION,
    about = "Mission Control - operator console for your gateway",
    long_about = None
)]
struct Cli {
    /// Gateway URL (overrides config and environment)
    #[arg(long, global = true, env = "MISSION_CONTROL_GATEWAY_URL")]
    url: Option<String>,

    /// Gateway token (overrides config and environment)
    #[arg(long, global = true, env = "MISSION_CONTROL_GATEWAY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and call `status`
    Test,

    /// Fetch status, health, sessions, jobs and channels
    Refresh {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send one raw request and print its payload
    Call {
        /// Method name, e.g. `sessions.list`
        method: String,
        /// JSON parameters
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mission_control=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", style("✗").red(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::InitConfig { force } = cli.command {
        return init_config(force);
    }

    let config = load(cli.url, cli.token)?;

    match cli.command {
        Commands::Test => test_connection(&config).await,
        Commands::Refresh { json } => refresh(&config, json).await,
        Commands::Call { method, params } => call(&config, &method, &params).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

/// Load config and apply command-line overrides
fn load(url: Option<String>, token: Option<String>) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(url) = url {
        config.gateway.url = url;
    }
    if let Some(token) = token {
        config.gateway.token = SecretString::from(token);
    }

    let validation = validate_config(&config);
    for warning in &validation.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }
    if let Some(error) = validation.errors.first() {
        return Err(Error::Config(error.to_string()));
    }

    Ok(config)
}

/// Connect, run `f`, and close the client whatever happens
async fn with_client<'a, T, F, Fut>(client: &'a GatewayClient, f: F) -> Result<T>
where
    F: FnOnce(&'a GatewayClient) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    debug!("Connecting to {}", client.url());

    let result = match client.connect().await {
        Ok(()) => f(client).await,
        Err(e) => Err(e),
    };
    client.close().await;
    result
}

async fn test_connection(config: &Config) -> Result<()> {
    let client = GatewayClient::from_config(config)?;
    let result = with_client(&client, |client| async move {
        client.request("status", serde_json::json!({})).await
    })
    .await;

    match result {
        Ok(_) => {
            println!("{} Connection OK", style("✓").green());
            Ok(())
        }
        Err(e) => Err(Error::Transport(format!("Connection failed: {}", e))),
    }
}

async fn refresh(config: &Config, json: bool) -> Result<()> {
    let client = GatewayClient::from_config(config)?;
    let snapshot = with_client(&client, |client| async move { DashboardSnapshot::fetch(client).await })
        .await
        .map_err(|e| Error::Transport(format!("Live refresh failed: {}", e)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let health = &snapshot.health;
    println!("{}", style("Gateway").bold());
    println!("  status:   {}", health.status.as_str());
    println!("  uptime:   {}", health.uptime);
    println!("  sessions: {}", health.active_sessions);
    println!("  running:  {}", health.running_jobs);

    println!("{}", style(format!("Jobs ({})", snapshot.jobs.len())).bold());
    for job in &snapshot.jobs {
        println!("  {:<24} {:<10} {}", job.name, job.status.as_str(), job.started_at);
    }

    println!("{}", style(format!("Sessions ({})", snapshot.sessions.len())).bold());
    for session in &snapshot.sessions {
        println!("  {:<24} {:<8} {}", session.name, session.state.as_str(), session.model);
    }

    println!("{}", style(format!("Channels ({})", snapshot.channels.len())).bold());
    for channel in &snapshot.channels {
        let state = if channel.enabled { style("enabled").green() } else { style("disabled").dim() };
        println!("  {:<24} {:<10} {}", channel.name, channel.channel_type, state);
    }

    Ok(())
}

async fn call(config: &Config, method: &str, params: &str) -> Result<()> {
    let params: serde_json::Value = serde_json::from_str(params)
        .map_err(|e| Error::InvalidInput(format!("--params is not valid JSON: {}", e)))?;

    let client = GatewayClient::from_config(config)?;
    let payload = with_client(&client, |client| async move { client.request(method, params).await }).await?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = config_path();
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    save_config(&Config::default(), &path)?;
    println!("{} Wrote {}", style("✓").green(), path.display());
    println!("  Set gateway.url there, and MISSION_CONTROL_GATEWAY_TOKEN in your environment.");
    Ok(())
}
