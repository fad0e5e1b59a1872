use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use palaver::agent::Agent;
use palaver::continuation::{merge_continuations, tag_continuation};
use palaver::models::message::Message;
use palaver::models::request::Request;
use palaver::providers::factory::{get_client, ProviderType};
use palaver::storage::filesystem::FilesystemStorage;
use palaver::storage::memory::MemoryStorage;
use palaver::text_editor::TextEditorTool;
use palaver::tool::ToolDefinition;
use palaver::transport::{CachingTransport, FileCache, ReqwestTransport, RetryTransport, Transport};

mod configuration;
mod error;
mod session;

use configuration::{Overrides, Settings};
use session::{load_conversation, persist_conversation, session_path};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Prompt to send to the model
    prompt: String,

    /// Provider to use, overriding the configured one
    #[arg(short, long)]
    provider: Option<ProviderType>,

    /// Model code, e.g. claude-sonnet-4-5-20250929
    #[arg(short, long)]
    model: Option<String>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Directory the text editor tool may read and write. Without it the editor works in memory.
    #[arg(long)]
    sandbox: Option<PathBuf>,

    /// Output tags to close and continue when the model runs out of tokens
    #[arg(long, value_delimiter = ',')]
    continue_tags: Vec<String>,

    /// Session name or file to resume and save the conversation to
    #[arg(short, long)]
    session: Option<String>,

    /// Cache successful provider responses in this directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Configuration file, defaults to ./palaver.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = Settings::load(Overrides {
        config_file: cli.config.clone(),
        provider: cli.provider,
        model: cli.model.clone(),
        max_tokens: cli.max_tokens,
        temperature: cli.temperature,
    })?;
    let model = settings.model();
    let max_tokens = settings.agent.max_tokens;
    let temperature = settings.agent.temperature;
    let provider_config = settings.provider.into_config()?;

    let retrying = RetryTransport::new(ReqwestTransport::new()?);
    let transport: Arc<dyn Transport> = match &cli.cache_dir {
        Some(dir) => Arc::new(CachingTransport::new(retrying, FileCache::new(dir))),
        None => Arc::new(retrying),
    };
    let client = get_client(provider_config, transport);

    let editor: Arc<dyn ToolDefinition> = match &cli.sandbox {
        Some(dir) => {
            let dir = std::env::current_dir()?.join(dir);
            Arc::new(TextEditorTool::new(FilesystemStorage::new(&dir)?))
        }
        None => Arc::new(TextEditorTool::new(MemoryStorage::new())),
    };

    let session_file = cli.session.as_deref().map(session_path).transpose()?;
    let history = match &session_file {
        Some(file) => load_conversation(file)?,
        None => Default::default(),
    };
    let conversation = history.with_message(Message::user().with_text(cli.prompt));

    let mut request = Request::new(model, conversation)
        .with_max_tokens(max_tokens)
        .with_temperature(temperature)
        .with_tool(editor);
    if !cli.continue_tags.is_empty() {
        request = request.with_continuation(tag_continuation(cli.continue_tags));
    }

    let agent = Agent::new(client);
    let response = agent.run(request).await?;

    match response.last_text() {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", style("(the model returned no text)").yellow()),
    }

    let usage = response.usage();
    eprintln!(
        "{}",
        style(format!(
            "{} in / {} out tokens, ${:.4}, {} ms",
            usage.input_tokens,
            usage.output_tokens,
            usage.total_cost(),
            usage.time_ms
        ))
        .dim()
    );

    if let Some(file) = session_file {
        persist_conversation(&file, &merge_continuations(response.conversation()))?;
        eprintln!(
            "{}",
            style(format!("Session saved to {}", file.display())).dim()
        );
    }

    Ok(())
}
