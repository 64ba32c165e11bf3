//! skyclock CLI entry point

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use skyclock::agent::{AgentLoop, DecisionRegistry, DecisionSource};
use skyclock::config::Config;
use skyclock::tools::ToolRunner;
use skyclock::ui;

#[derive(Parser)]
#[command(name = "skyclock")]
#[command(about = "🌤️ skyclock - weather and time assistant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.skyclock/config.json
    Init,

    /// Chat with the assistant
    Chat {
        /// Message to send (omit for an interactive session)
        #[arg(short, long)]
        message: Option<String>,

        /// Decision source override: auto, model or heuristic
        #[arg(short, long)]
        decision: Option<String>,
    },

    /// Serve the HTTP endpoint
    Serve {
        /// Listen address (defaults to the config's `bind`)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let path = skyclock::config::init()?;
            ui::print_success(&format!("Config ready at {:?}", path));
            ui::print_step(
                "Set API_OPEN_WEATHER (and optionally AWS_BEARER_TOKEN_BEDROCK) in .env or the config file.",
            );
        }

        Commands::Chat { message, decision } => {
            let mut config = skyclock::config::load()?;
            if let Some(decision) = decision {
                config.decision = decision;
            }
            let agent = build_agent(&config)?;
            let mut channel = skyclock::adapters::cli::CliChannel::new(agent);

            if let Some(msg) = message {
                // Single message mode
                match channel.run_once(&msg).await {
                    Ok(outcome) => {
                        for call in &outcome.invocations {
                            ui::print_tool_use(&call.name, &call.input);
                        }
                        ui::print_model_response(&outcome.response);
                    }
                    Err(e) => {
                        ui::print_error(e.kind(), &e.to_string());
                        std::process::exit(1);
                    }
                }
            } else {
                install_ctrlc_handler();
                ui::print_header(DecisionRegistry::selected(&config)?, &config.default_timezone);
                channel.run_interactive().await?;
                ui::print_footer();
            }
        }

        Commands::Serve { bind } => {
            use skyclock::adapters::http::{HttpChannel, SessionStore};
            use skyclock::adapters::Channel;

            let config = skyclock::config::load()?;
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            let agent = build_agent(&config)?;

            let sessions = SessionStore::from_config(&config);
            let channel = Arc::new(HttpChannel::new(&bind, agent, sessions));
            let stopper = channel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutting down");
                    stopper.stop().await.ok();
                }
            });

            println!("🌤️ Serving skyclock on http://{}", bind);
            channel.start().await?;
        }

        Commands::Status => {
            let config = skyclock::config::load()?;
            println!("🌤️ skyclock Status\n");
            println!("Config: {:?}", skyclock::config::config_path());
            let mark = |set: bool| if set { "✓" } else { "not set" };
            println!("OpenWeather API key: {}", mark(config.openweather_key().is_some()));
            println!("Model service key: {}", mark(config.bedrock_key().is_some()));

            match DecisionRegistry::selected(&config) {
                Ok(source) => println!("Decision source: {}", source),
                Err(e) => println!("Decision source: {}", e),
            }
            println!("Model: {} ({})", config.model, config.region);
            println!("Default timezone: {}", config.default_timezone);
            println!("Max recursions: {}", config.max_recursions);
            println!("Tools: {}", ToolRunner::new_with_defaults(&config)?.tool_names().join(", "));

            use skyclock::adapters::ChannelRegistry;
            for name in ChannelRegistry::available() {
                println!("Channel {}: {}", name, ChannelRegistry::description(name));
            }
        }
    }

    Ok(())
}

fn build_agent(config: &Config) -> skyclock::Result<AgentLoop<Box<dyn DecisionSource>>> {
    let runner = ToolRunner::new_with_defaults(config)?;
    let source = DecisionRegistry::create(config, &runner.definitions())?;
    tracing::info!("Using decision source: {}", source.name());
    Ok(AgentLoop::new(source, Arc::new(runner), config.max_recursions))
}

/// Ctrl+C once warns, twice within three seconds exits.
fn install_ctrlc_handler() {
    let exit_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let r = exit_flag.clone();

    ctrlc::set_handler(move || {
        if r.load(std::sync::atomic::Ordering::SeqCst) {
            ui::print_footer();
            std::process::exit(0);
        } else {
            ui::print_warning("Press Ctrl+C again to exit");
            r.store(true, std::sync::atomic::Ordering::SeqCst);

            let r2 = r.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_secs(3));
                r2.store(false, std::sync::atomic::Ordering::SeqCst);
            });
        }
    })
    .ok();
}
