mod api;
mod capture;
mod watch;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use formcheck_core::{
    Activity, AnalysisRequest, AnalysisResult, Analyzer, GeminiConfig, GeminiGateway,
    InferenceError, PostureAnalyzer, logging,
};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::api::ApiClient;
use crate::capture::FrameDirectory;

#[derive(Debug, Parser)]
#[command(name = "formcheck", version, about = "Posture feedback for squats and desk sitting")]
struct Cli {
    /// formcheck API server to send captures to
    #[arg(long, global = true, env = "FORMCHECK_API_URL")]
    api_url: Option<Url>,

    /// Call Gemini directly when no API server is configured
    #[arg(long, global = true, env = "GOOGLE_GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Gemini model for direct calls
    #[arg(long, global = true, env = "GEMINI_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze the newest frame in a directory on a fixed interval
    Watch {
        /// Directory a frame grabber keeps writing stills to
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        activity: Activity,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Analyze one image or video file
    Analyze {
        file: PathBuf,
        #[arg(long)]
        activity: Activity,
    },
}

/// Where analysis requests go.
enum Backend {
    Remote(ApiClient),
    Direct(GeminiGateway),
}

impl Backend {
    fn from_cli(cli: &Cli) -> Result<Self> {
        if let Some(url) = &cli.api_url {
            let client = ApiClient::new(url.as_str()).context("Failed to create API client")?;
            info!(target: "formcheck", "Sending captures to {}", client.base_url());
            return Ok(Backend::Remote(client));
        }

        let Some(key) = cli.gemini_api_key.clone().filter(|k| !k.trim().is_empty()) else {
            bail!("Set --api-url (FORMCHECK_API_URL) or GOOGLE_GEMINI_API_KEY");
        };
        let mut config = GeminiConfig::new(key);
        if let Some(model) = &cli.model {
            config.model = model.clone();
        }
        let gateway = GeminiGateway::new(config).context("Failed to create Gemini client")?;
        info!(target: "formcheck", "Calling {} directly", gateway.endpoint());
        Ok(Backend::Direct(gateway))
    }
}

impl PostureAnalyzer for Backend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferenceError> {
        match self {
            Backend::Remote(client) => client.analyze(request).await,
            Backend::Direct(gateway) => gateway.analyze(request).await,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init("info");

    let cli = Cli::parse();
    let backend = Backend::from_cli(&cli)?;
    if let Backend::Remote(client) = &backend {
        if let Err(e) = client.health().await {
            error!(target: "formcheck", "API server health check failed: {}", e);
        }
    }
    let analyzer = Arc::new(Analyzer::new(backend));

    match cli.command {
        Command::Watch {
            frames,
            activity,
            interval_secs,
        } => {
            if interval_secs == 0 {
                bail!("--interval-secs must be at least 1");
            }
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(target: "formcheck", "Failed to listen for Ctrl-C: {}", e);
                }
            };
            watch::run(
                analyzer,
                FrameDirectory::new(frames),
                activity,
                Duration::from_secs(interval_secs),
                shutdown,
            )
            .await;
        }
        Command::Analyze { file, activity } => {
            let mode = capture::upload_mode(&file)?;
            let result = analyzer
                .analyze_now(activity.as_str(), mode, || capture::read_upload(&file))
                .await;
            match result {
                Ok(result) => println!("{}", watch::render(&result)),
                Err(err) => {
                    error!(target: "formcheck", "Analysis of {} failed: {}", file.display(), err);
                    bail!(err.user_message());
                }
            }
        }
    }

    Ok(())
}
