//! Thin runner around the funnelcheck library: connects to a WebDriver
//! endpoint and pushes the configured number of synthetic accounts through
//! the signup-to-subscription funnel.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use funnelcheck::engine::webdriver::WebDriverProvider;
use funnelcheck::{FunnelConfig, FunnelRunner, IterationOutcome};

#[derive(Parser, Debug)]
#[command(name = "funnelcheck", version, about = "End-to-end signup funnel checker")]
struct Args {
    /// WebDriver endpoint to attach to (e.g. a running chromedriver)
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Number of synthetic accounts to run through the funnel
    #[arg(long, env = "ACCOUNT_COUNT")]
    accounts: Option<u32>,

    /// JSON config file overriding the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the staging deployment URL
    #[arg(long)]
    base_url: Option<String>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,
}

/// Chrome session preferences: notifications blocked, normal page-load
/// strategy, a fixed window size.
fn capabilities(headless: bool) -> serde_json::Map<String, Value> {
    let mut args = vec!["--window-size=1920,1080".to_string()];
    if headless {
        args.push("--headless=new".to_string());
    }

    let mut caps = serde_json::Map::new();
    caps.insert("pageLoadStrategy".to_string(), json!("normal"));
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "prefs": {
                "profile.default_content_setting_values.notifications": 2
            }
        }),
    );
    caps
}

fn load_config(args: &Args) -> anyhow::Result<FunnelConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => FunnelConfig::default(),
    };
    if let Some(accounts) = args.accounts {
        config.iterations = accounts;
    }
    if let Some(base_url) = args.base_url.clone() {
        config.base_url = base_url;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!(
        url = %config.base_url,
        iterations = config.iterations,
        "starting funnel check"
    );

    let provider = WebDriverProvider::new(args.webdriver_url, capabilities(args.headless));
    let runner = FunnelRunner::new(config);
    let reports = runner.run_all(&provider).await?;

    let mut aborted = 0usize;
    for report in &reports {
        match report.outcome {
            IterationOutcome::Completed => {
                info!(
                    iteration = report.iteration,
                    email = %report.email,
                    "iteration completed"
                );
            }
            IterationOutcome::Aborted => {
                aborted += 1;
                error!(
                    iteration = report.iteration,
                    email = %report.email,
                    error = report.error.as_deref().unwrap_or("unknown error"),
                    "iteration aborted"
                );
            }
        }
    }

    if aborted > 0 {
        anyhow::bail!("{aborted} of {} iterations aborted", reports.len());
    }
    Ok(())
}
