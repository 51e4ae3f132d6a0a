/*!
 * Catalog Console CLI
 *
 * Line-oriented chat against a catalog backend, plus offline helpers for
 * spell correction, intent resolution and workspace analysis.
 */

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use catalog_console::config::{init_tracing, ConsoleConfig};
use catalog_console::conversation::{ConversationSession, Sender};
use catalog_console::voice::{ChannelRecognizer, SpeechEvent, VoiceSession};
use catalog_console::{
    analyze, format_report, CatalogBackend, CommandPipeline, HttpCatalogBackend, InMemoryBackend,
    IntentCatalog, IntentResolver, Page, PageContext, PageKind, ParameterExtractor, SpellCorrector,
    WorkspaceStats,
};

#[derive(Parser)]
#[command(name = "catalog_console")]
#[command(about = "Conversational admin console for a data catalog", long_about = None)]
struct Cli {
    /// YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the console, one command per line
    Chat {
        /// Page whose commands are available
        #[arg(short, long, default_value = "catalogs")]
        page: PageKind,

        /// Catalog currently open
        #[arg(long)]
        catalog: Option<String>,

        /// Schema currently open
        #[arg(long)]
        schema: Option<String>,

        /// YAML file replacing the page's intents
        #[arg(long)]
        intents: Option<PathBuf>,

        /// Treat each line as a finalized speech transcript
        #[arg(long)]
        voice: bool,

        /// Run against an in-memory backend instead of the REST API
        #[arg(long)]
        offline: bool,
    },

    /// Analyze a workspace statistics snapshot
    Analyze {
        /// JSON statistics file
        #[arg(short, long)]
        stats: PathBuf,

        /// Emit insights as JSON instead of the chat report
        #[arg(short, long)]
        json: bool,
    },

    /// Spell-correct a command against a page vocabulary
    Correct {
        text: String,

        #[arg(short, long, default_value = "catalogs")]
        page: PageKind,
    },

    /// Resolve a command to an intent and its parameters
    Resolve {
        text: String,

        #[arg(short, long, default_value = "catalogs")]
        page: PageKind,

        /// Catalog currently open
        #[arg(long)]
        catalog: Option<String>,

        /// Keyword matching without correction, as for speech
        #[arg(long)]
        voice: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConsoleConfig::load(cli.config.as_deref()).context("loading config")?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Chat {
            page,
            catalog,
            schema,
            intents,
            voice,
            offline,
        } => {
            if catalog.is_none() && page == PageKind::Tables {
                bail!("the tables page needs --catalog");
            }
            let context = PageContext { catalog, schema };
            let backend: Arc<dyn CatalogBackend> = if offline {
                Arc::new(InMemoryBackend::new())
            } else {
                Arc::new(HttpCatalogBackend::from_config(&config)?)
            };
            let page = load_page(page, intents.as_deref())?;
            let greeting = config.greeting.clone().unwrap_or_else(|| page.greeting.clone());
            let mut pipeline = CommandPipeline::new(page, context, backend)
                .with_threshold(config.correction_threshold)
                .with_session(ConversationSession::with_history_limit(&greeting, config.history_limit));
            if voice {
                chat_voice(&mut pipeline).await
            } else {
                chat_text(&mut pipeline).await
            }
        }
        Commands::Analyze { stats, json } => {
            let content = std::fs::read_to_string(&stats)
                .with_context(|| format!("reading {}", stats.display()))?;
            let stats: WorkspaceStats =
                serde_json::from_str(&content).context("parsing workspace statistics")?;
            let insights = analyze(&stats);
            if json {
                println!("{}", serde_json::to_string_pretty(&insights)?);
            } else {
                println!("{}", format_report(&insights));
            }
            Ok(())
        }
        Commands::Correct { text, page } => {
            let page = Page::build(page)?;
            let corrector = SpellCorrector::with_threshold(&page.vocabulary, config.correction_threshold);
            println!("{}", corrector.correct(&text));
            Ok(())
        }
        Commands::Resolve {
            text,
            page,
            catalog,
            voice,
        } => {
            let page = Page::build(page)?;
            let context = PageContext {
                catalog,
                schema: None,
            };
            let text = if voice {
                text.trim().to_lowercase()
            } else {
                SpellCorrector::with_threshold(&page.vocabulary, config.correction_threshold).correct(&text)
            };
            let resolver = IntentResolver::new(&page.catalog);
            let intent = if voice {
                resolver.resolve_keywords(&text)
            } else {
                resolver.resolve_phrase(&text)
            };
            let Some(intent) = intent else {
                bail!("no intent matches '{}'", text);
            };
            let params = ParameterExtractor::new(&page.rules, &context).extract(intent, &text);
            let out = serde_json::json!({
                "intent": intent.id,
                "text": text,
                "params": params,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Commands::Version => {
            println!("catalog_console v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_page(kind: PageKind, intents: Option<&Path>) -> Result<Page> {
    let page = Page::build(kind)?;
    match intents {
        Some(path) => {
            let catalog = IntentCatalog::load(path)
                .map_err(|e| anyhow::anyhow!("loading intents from {}: {}", path.display(), e))?;
            Ok(page.with_catalog(catalog))
        }
        None => Ok(page),
    }
}

/// Print messages appended since `from`, return the new length
fn print_since(pipeline: &CommandPipeline, from: usize) -> usize {
    let messages = pipeline.session().messages();
    // a reset shrinks the log back to the seed
    let from = if from > messages.len() { 0 } else { from };
    for message in &messages[from..] {
        match message.sender {
            Sender::User => println!("you> {}", message.text),
            Sender::Bot => println!("bot> {}", message.text),
        }
    }
    messages.len()
}

async fn chat_text(pipeline: &mut CommandPipeline) -> Result<()> {
    let mut seen = print_since(pipeline, 0);
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        pipeline.submit_text(&line).await;
        seen = print_since(pipeline, seen);
    }
    Ok(())
}

async fn chat_voice(pipeline: &mut CommandPipeline) -> Result<()> {
    let (recognizer, feed) = ChannelRecognizer::new();
    let mut voice = VoiceSession::new(Box::new(recognizer));
    voice.start()?;
    let mut seen = print_since(pipeline, 0);

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "exit" | "quit" => break,
            "" => continue,
            _ => {}
        }
        let event = match line.trim().strip_prefix("error:") {
            Some(code) => SpeechEvent::Error(code.trim().to_string()),
            None => SpeechEvent::Final(line),
        };
        if !feed.send(event).await {
            break;
        }
        match voice.next_transcript().await {
            Some(Ok(transcript)) => {
                pipeline.submit_voice(&transcript).await;
            }
            Some(Err(error)) => {
                pipeline.speech_error(error);
            }
            None => break,
        }
        seen = print_since(pipeline, seen);
    }
    voice.stop();
    Ok(())
}
