use clap::{Parser, Subcommand};
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;

use telegram_webhook::config::{AppState, Config};
use telegram_webhook::telegram::ApiClient;
use telegram_webhook::{logger, server};

mod handlers;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "telegram-webhook", version, about = "Webhook router for the Telegram Bot API")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the webhook server (default)
    Serve,
    /// Register the webhook URL with Telegram
    SetWebhook {
        /// Full URL; defaults to webhook.public_url + webhook.path
        #[arg(long)]
        url: Option<String>,
    },
    /// Remove the registered webhook
    DeleteWebhook {
        #[arg(long)]
        drop_pending_updates: bool,
    },
    /// Show the current webhook registration
    WebhookInfo,
    /// Show the bot account
    GetMe,
    /// Call any Bot API method with JSON parameters
    Call {
        method: String,
        #[arg(default_value = "{}")]
        params: String,
    },
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    logger::init(&cfg.logging)?;

    // Build the Tokio runtime, sizing worker threads from configuration
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cli.command.unwrap_or(Command::Serve), cfg))
}

async fn async_main(command: Command, cfg: Config) -> Result<(), BoxError> {
    let output: Value = match command {
        Command::Serve => return serve(cfg).await,
        Command::SetWebhook { url } => {
            let url = url
                .or_else(|| cfg.webhook_url())
                .ok_or("no webhook URL: pass --url or set webhook.public_url")?;
            let ok = api_client(&cfg)?
                .set_webhook(&url, cfg.webhook.secret_token.as_deref())
                .await?;
            serde_json::json!({ "url": url, "ok": ok })
        }
        Command::DeleteWebhook {
            drop_pending_updates,
        } => {
            let ok = api_client(&cfg)?
                .delete_webhook(drop_pending_updates)
                .await?;
            serde_json::json!({ "ok": ok })
        }
        Command::WebhookInfo => api_client(&cfg)?.get_webhook_info().await?,
        Command::GetMe => serde_json::to_value(api_client(&cfg)?.get_me().await?)?,
        Command::Call { method, params } => {
            let params: Value = serde_json::from_str(&params)?;
            api_client(&cfg)?.call(&method, params).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn api_client(cfg: &Config) -> Result<ApiClient, BoxError> {
    Ok(ApiClient::from_config(&cfg.telegram)?)
}

async fn serve(cfg: Config) -> Result<(), BoxError> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;

    let router = handlers::build_router(&cfg);
    let state = Arc::new(AppState::new(cfg, router)?);

    logger::log_server_start(&addr, &state.config);
    server::start_signal_handler(Arc::clone(&state.shutdown))?;
    server::start_server_loop(listener, state).await?;
    Ok(())
}
