use dotenvy::dotenv;
use gdz_bot_rs::bot::handlers::{self, Command};
use gdz_bot_rs::bot::state::ModeStore;
use gdz_bot_rs::config::Settings;
use gdz_bot_rs::health;
use gdz_bot_rs::llm::store::{InMemoryKeyStore, KeyStore};
use gdz_bot_rs::llm::Solver;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data from log output
struct RedactionPatterns {
    bot_url_token: Regex,
    bot_token: Regex,
    gemini_key: Regex,
}

impl RedactionPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bot_url_token: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)")?,
            bot_token: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            gemini_key: Regex::new(r"AIza[0-9A-Za-z_-]{35}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .bot_url_token
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .bot_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .gemini_key
            .replace_all(&output, "[GEMINI_KEY]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting GDZ Solver Bot...");

    let settings = init_settings();

    if settings.gemini_keys().is_empty() {
        error!("GEMINI_API_KEYS is empty; configure at least one key.");
        std::process::exit(1);
    }

    tokio::spawn(health::serve(settings.health_port));

    let keys: Arc<dyn KeyStore> = Arc::new(InMemoryKeyStore::new());
    let solver = Arc::new(Solver::new(&settings, keys.clone()));
    info!(
        "Solver initialized with {} shared key(s).",
        solver.pool().len()
    );

    let bot = Bot::new(settings.telegram_token.clone());
    let modes = Arc::new(ModeStore::new());

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![solver, keys, modes])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Exactly one branch fires per update; branches are checked in order.
fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_mode_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| {
                            msg.text().is_some_and(handlers::is_api_key_message)
                        })
                        .endpoint(handle_api_key),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| msg.photo().is_some())
                        .endpoint(handle_photo),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_text),
                ),
        )
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_mode_callback(
    bot: Bot,
    q: CallbackQuery,
    modes: Arc<ModeStore>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_mode_callback(bot, q, modes).await {
        error!("Mode callback handler error: {}", e);
    }
    respond(())
}

async fn handle_api_key(
    bot: Bot,
    msg: Message,
    keys: Arc<dyn KeyStore>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_api_key(bot, msg, keys).await {
        error!("API key handler error: {}", e);
    }
    respond(())
}

async fn handle_photo(
    bot: Bot,
    msg: Message,
    solver: Arc<Solver>,
    modes: Arc<ModeStore>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_photo(bot, msg, solver, modes).await {
        error!("Photo handler error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    solver: Arc<Solver>,
    modes: Arc<ModeStore>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(bot, msg, solver, modes).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}
