mod completion;
mod config;
mod extractor;
mod menu;

use std::path::PathBuf;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use completion::Client;
use config::{Config, Secrets};
use extractor::Extractor;

struct BotState {
    config: Config,
    llm: Client,
    extractor: Extractor,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "показать меню режимов")]
    Start,
}

#[tokio::main]
async fn main() {
    // Secrets first: without them there is nothing to start.
    let secrets = match Secrets::from_env() {
        Ok(secrets) => secrets,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let config_path = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => Some(path),
        None => {
            let default = PathBuf::from("grubian.json");
            default.exists().then_some(default)
        }
    };

    let config = match Config::load(config_path.as_ref(), secrets) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("grubian.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting grubian...");
    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file, using defaults"),
    }
    info!("Model: {}", config.model);

    let bot = Bot::new(&config.telegram_bot_token);

    let state = Arc::new(BotState {
        llm: Client::new(&config),
        extractor: Extractor::new(config.extractor.clone()),
        config,
    });

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            let keyboard =
                menu::start_keyboard(&state.config.menu, &state.config.input_placeholder);
            bot.send_message(msg.chat.id, state.config.greeting.as_str())
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    // Mode buttons are cosmetic, they only acknowledge.
    if let Some(ack) = menu::acknowledgement(&state.config.menu, text) {
        bot.send_message(msg.chat.id, ack).await?;
        return Ok(());
    }

    let user = match msg.from {
        Some(ref u) => u,
        None => return Ok(()),
    };
    let username = user.username.as_deref().unwrap_or(&user.first_name);

    let time = msg.date.with_timezone(&chrono::Local).format("%H:%M");
    let preview: String = text.chars().take(100).collect();
    info!("📨 Message from {username} ({}) at {time}: \"{preview}\"", user.id);

    let reply = match state.llm.complete(text).await {
        Ok(raw) => state.extractor.extract(&raw),
        Err(e) => {
            warn!("Completion failed: {e}");
            e.user_text(&state.config.replies)
        }
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
