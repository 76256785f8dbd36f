use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use deepreport_core::{ConfigLoader, ResearchAgent};
use std::fs;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "deepreport",
    version,
    about = "Iterative research agent with citation resolution"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a topic and write the resolved report.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to research.
    #[arg(long)]
    topic: String,

    /// Configuration file (defaults to DEEPREPORT_CONFIG or ./config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to save the report (defaults to research_report_<id>.md).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the unresolved report with inline citation markers instead.
    #[arg(long)]
    raw: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config.clone())?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(topic = %args.topic, "starting research run");

    let agent = ResearchAgent::from_config(&config)?;
    let report = agent.run(&args.topic).await?;

    if args.raw {
        println!("{}", report.raw_report);
    } else {
        println!("{}", report.resolved_report);
    }

    save_report(&args, &report.topic, &report.resolved_report);
    Ok(())
}

/// A failed save is logged, not fatal: the report was already printed.
fn save_report(args: &RunArgs, topic: &str, resolved: &str) {
    let path = args.output.clone().unwrap_or_else(|| {
        let id = Uuid::new_v4().simple().to_string();
        PathBuf::from(format!("research_report_{}.md", &id[..8]))
    });

    let contents = format!(
        "Research topic: {topic}\nGenerated: {}\n\n{resolved}\n",
        Utc::now().to_rfc3339()
    );

    match fs::write(&path, contents) {
        Ok(()) => info!(path = %path.display(), "report saved"),
        Err(err) => error!(path = %path.display(), error = %err, "failed to save report"),
    }
}
