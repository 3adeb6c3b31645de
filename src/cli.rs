use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::analytics::TrendMode;
use crate::config::{Config, ConfigOverrides};
use crate::output::{print_summary, HtmlRenderer, PhaseProgress};
use crate::server::{self, AppState};
use crate::service::{DashboardRequest, DashboardService};

#[derive(Parser)]
#[command(name = "repopulse")]
#[command(author, version, about = "OSS repository trend dashboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (toml, json or yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard over HTTP
    Serve {
        #[arg(long, env = "HOST")]
        host: Option<String>,

        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Build one dashboard view and print it
    Report(ReportArgs),
}

#[derive(Args)]
struct ReportArgs {
    /// Lookback window in days (7, 14 or 30)
    #[arg(short, long)]
    window: Option<u32>,

    /// trending, balanced or broad
    #[arg(short, long, default_value = "trending")]
    mode: String,

    /// Skip the contributor network
    #[arg(long, default_value_t = false)]
    no_network: bool,

    /// Drop cached search results and payloads before building
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Print the payload as JSON instead of tables
    #[arg(long, default_value_t = false)]
    json: bool,

    #[arg(short, long, default_value_t = false)]
    pretty: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        config.apply_overrides(&self.overrides);
        config.validate()?;
        Ok(config)
    }

    async fn execute_serve(&self, host: Option<&str>, port: Option<u16>) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(host) = host {
            config.server.host = host.to_string();
        }
        if let Some(port) = port {
            config.server.port = port;
        }

        let service =
            DashboardService::from_config(&config).context("Failed to set up dashboard service")?;
        let state = Arc::new(AppState {
            service,
            renderer: Box::new(HtmlRenderer),
        });

        server::serve(state, &config.server.host, config.server.port).await
    }

    async fn execute_report(&self, args: &ReportArgs) -> Result<()> {
        let config = self.load_config()?;
        let default_window = config.dashboard.default_window_days;
        let request = DashboardRequest {
            window_days: server::resolve_window(
                args.window.map(|w| w.to_string()).as_deref(),
                default_window,
            ),
            mode: TrendMode::from_param(Some(&args.mode)),
            include_network: !args.no_network,
        };

        info!(
            "Building report for {}d / {} / network={}",
            request.window_days, request.mode, request.include_network
        );

        let service =
            DashboardService::from_config(&config).context("Failed to set up dashboard service")?;
        if args.no_cache {
            service.cache().clear();
        }

        let progress = PhaseProgress::start("Dashboard", "Querying GitHub search and BigQuery");
        let payload = service.load(&request).await;
        progress.finish("Dashboard ready");

        if !args.json {
            print_summary(&payload);
            return Ok(());
        }

        let json_output = if args.pretty {
            serde_json::to_string_pretty(payload.as_ref())?
        } else {
            serde_json::to_string(payload.as_ref())?
        };

        if let Some(output_path) = &args.output {
            std::fs::write(output_path, json_output)?;
            info!("Dashboard written to: {}", output_path.display());
        } else {
            println!("{json_output}");
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Serve { host, port } => self.execute_serve(host.as_deref(), *port).await,
            Commands::Report(args) => self.execute_report(args).await,
        }
    }
}
