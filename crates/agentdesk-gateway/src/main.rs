//! Agentdesk - multi-agent front desk over WebSocket or the terminal

use agentdesk_agent::{LlmReasoner, Reasoner, RouterConfig};
use agentdesk_core::{AuthConfig, AuthMode, BindMode, DeskConfig};
use agentdesk_demos::{build_desk, DeskKind};
use agentdesk_gateway::{chat::run_chat, start_gateway};
use agentdesk_llm::AnthropicProvider;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "agentdesk",
    about = "Agentdesk - multi-agent intent routing and handoff"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DeskArgs {
    /// Which demo desk to run: medical or shopper
    #[arg(short, long)]
    desk: DeskKind,
    /// Configuration file (missing file means defaults)
    #[arg(short, long, default_value = "agentdesk.toml")]
    config: PathBuf,
    /// Reset the shopper store to the test customers and orders
    #[arg(long)]
    seed_orders: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the WebSocket gateway
    Serve {
        #[command(flatten)]
        desk: DeskArgs,
        #[arg(short, long)]
        port: Option<u16>,
        /// loopback or lan
        #[arg(short, long)]
        bind: Option<String>,
        #[arg(short, long)]
        token: Option<String>,
        #[arg(long)]
        no_auth: bool,
    },
    /// Talk to a desk in the terminal
    Chat {
        #[command(flatten)]
        desk: DeskArgs,
        /// Session name (default: terminal)
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Show version
    Version,
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<DeskConfig> {
    let config = DeskConfig::load(path)?.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn reasoner(config: &DeskConfig) -> anyhow::Result<Arc<dyn Reasoner>> {
    let mut provider = AnthropicProvider::new(config.api_key()?);
    if let Some(url) = &config.llm.base_url {
        info!("Using custom API URL: {}", url);
        provider = provider.with_base_url(url.clone());
    }
    Ok(Arc::new(LlmReasoner::from_config(Arc::new(provider), &config.llm)))
}

async fn open_desk(args: &DeskArgs, config: &DeskConfig) -> anyhow::Result<agentdesk_agent::Desk> {
    let desk = build_desk(
        args.desk,
        RouterConfig::from(config),
        reasoner(config)?,
        args.seed_orders,
    )
    .await?;
    Ok(desk)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            desk: desk_args,
            port,
            bind,
            token,
            no_auth,
        } => {
            init_tracing("agentdesk=info,tower_http=info");

            let mut config = load_config(&desk_args.config)?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = BindMode::parse(&bind);
            }
            if no_auth {
                config.gateway.auth = AuthConfig {
                    mode: AuthMode::None,
                    token: None,
                };
            } else if token.is_some() {
                config.gateway.auth = AuthConfig {
                    mode: AuthMode::Token,
                    token,
                };
            }

            let desk = open_desk(&desk_args, &config).await?;
            start_gateway(desk, &config.gateway).await?;
        }

        Commands::Chat {
            desk: desk_args,
            session,
        } => {
            init_tracing("agentdesk=warn");
            let config = load_config(&desk_args.config)?;
            let desk = open_desk(&desk_args, &config).await?;
            run_chat(desk, session).await?;
        }

        Commands::Version => {
            println!("agentdesk v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
