use clap::{Parser, Subcommand};
use sdforge_app::{App, Config};
use tracing_subscriber::EnvFilter;

/// SDForge: Stable Diffusion tool server and Discord front-end.
#[derive(Parser)]
#[command(name = "sdforge", version, about)]
struct Cli {
    /// Emit logs as JSON instead of human-readable text.
    #[arg(long)]
    json_logs: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available entrypoints (§12 "binary wiring").
#[derive(Subcommand)]
enum Command {
    /// Run the MCP tool server over stdio and the generation queue.
    Serve,
    /// Run the Discord front-end against the same wired components.
    Discord,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if let Err(err) = run(cli.command).await {
        tracing::error!(error = %err, "sdforge exited with an error");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sdforge=info,warn"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run(command: Command) -> Result<(), sdforge_types::SdForgeError> {
    let config = Config::from_env()?;
    let app = App::build(&config).await?;

    match command {
        Command::Serve => {
            tracing::info!("starting MCP tool server over stdio");
            let server = sdforge_mcp::McpServer::new(app.tool_registry(), "sdforge", env!("CARGO_PKG_VERSION"));
            wait_for_shutdown(server.serve_stdio()).await
        }
        Command::Discord => {
            let token = config.discord_token.ok_or_else(|| {
                sdforge_types::SdForgeError::Configuration("DISCORD_TOKEN is required for the discord subcommand".to_string())
            })?;
            tracing::info!("starting discord front-end");
            sdforge_discord::run(&token, app.chat)
                .await
                .map_err(|err| sdforge_types::SdForgeError::Transport { component: "discord".to_string(), message: err.to_string() })
        }
    }
}

async fn wait_for_shutdown(
    serving: impl std::future::Future<Output = Result<(), sdforge_mcp::McpError>>,
) -> Result<(), sdforge_types::SdForgeError> {
    tokio::select! {
        result = serving => result.map_err(|err| sdforge_types::SdForgeError::Transport {
            component: "mcp".to_string(),
            message: err.to_string(),
        }),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            Ok(())
        }
    }
}
