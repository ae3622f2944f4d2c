use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use intake::llm_interaction::GatewayConfig;
use intake::session::{SendOutcome, SessionController};
use intake::speech::SpeechCapabilities;
use intake::{chat, web_server};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API key for the chat-completion provider.
    #[arg(long, global = true, env = "INTAKE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, global = true, env = "INTAKE_BASE_URL")]
    base_url: Option<String>,

    /// Model identifier sent with every request.
    #[arg(long, global = true, env = "INTAKE_MODEL")]
    model: Option<String>,

    /// Program used to read questions aloud (the text is appended as the last argument).
    #[arg(long, global = true, env = "INTAKE_TTS_COMMAND")]
    tts_command: Option<String>,

    /// Program that prints one transcribed utterance per line.
    #[arg(long, global = true, env = "INTAKE_STT_COMMAND")]
    stt_command: Option<String>,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the intake web UI.
    Serve {
        #[arg(long, default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
        #[arg(long, help = "Load templates from this directory and reload them on change.")]
        templates_dir: Option<PathBuf>,
        #[arg(long, default_value = "static", help = "Directory served under /static.")]
        static_dir: PathBuf,
    },
    /// Run the intake conversation in the terminal.
    Chat,
}

impl Cli {
    fn gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        config
    }

    fn speech(&self) -> SpeechCapabilities {
        SpeechCapabilities::from_commands(self.stt_command.as_deref(), self.tts_command.as_deref())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,intake=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    info!("Intake starting with command: {:?}", cli.command);

    let config = cli.gateway_config();
    let speech = cli.speech();
    info!(model = %config.model, base_url = %config.base_url, ?speech, "Gateway configured");
    let controller = SessionController::new(config, speech);

    match cli.command {
        Commands::Serve { port, templates_dir, static_dir } => {
            let web_config = web_server::WebConfig { port, templates_dir, static_dir };

            let handshake = controller.clone();
            tokio::spawn(async move {
                if let SendOutcome::Failed(message) = handshake.start().await {
                    error!("Initial handshake failed: {}", message);
                }
            });

            let web_controller = controller.clone();
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(web_config, web_controller).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            controller.stop_voice_input();
            controller.stop_speaking();
            info!("Shutdown complete.");
        }
        Commands::Chat => {
            chat::run_chat(controller).await.context("Chat session failed")?;
        }
    }

    Ok(())
}
