//! catalog_console - conversational command pipeline for a data-catalog admin console
//!
//! Modules:
//! - autocorrect: Fuzzy spell correction against a page vocabulary
//! - intents: Intent definitions, parameter specs and the parameter bag
//! - resolver: Phrase, keyword and selection based intent resolution
//! - extractor: Declarative parameter extraction rules and page defaults
//! - validation: Required-parameter checks before dispatch
//! - dispatcher: Intent to remote operation mapping and reply synthesis
//! - conversation: Message log, bounded command history, busy flag
//! - insights: Workspace statistics analysis and report formatting
//! - backend: Remote catalog operations as an async trait
//! - http_backend: REST client implementing the remote operations
//! - memory_backend: In-process backend for offline use and tests
//! - voice: Speech recognition events and voice sessions
//! - pipeline: Command entry points tying the stages together
//! - pages: Workspace, catalogs and tables page definitions
//! - config: Console configuration and tracing setup
//! - error: Command error taxonomy

pub mod autocorrect;
pub mod intents;
pub mod resolver;
pub mod extractor;
pub mod validation;
pub mod dispatcher;
pub mod conversation;
pub mod insights;
pub mod backend;
pub mod http_backend;
pub mod memory_backend;
pub mod voice;
pub mod pipeline;
pub mod pages;
pub mod config;
pub mod error;

// Re-export key types for convenience
pub use autocorrect::{SpellCorrector, Suggestion};

pub use intents::{Intent, IntentCatalog, ParamSpec, ParameterBag};

pub use resolver::{IntentResolver, ResolveMode};

pub use extractor::{Capture, ExtractionRule, ExtractionTable, PageContext, ParameterExtractor};

pub use validation::validate;

pub use dispatcher::{Action, DispatchOutcome, Dispatcher};

pub use conversation::{ConversationSession, HistoryEntry, Message, Sender};

pub use insights::{analyze, format_report, Insight, Severity, WorkspaceStats};

pub use backend::{BackendError, CatalogBackend, ColumnSpec, Group, SecurableType, TableSpec, User};

pub use http_backend::HttpCatalogBackend;

pub use memory_backend::InMemoryBackend;

pub use voice::{ChannelRecognizer, SpeechEvent, SpeechFeed, SpeechRecognizer, VoiceSession};

pub use pipeline::{CommandPipeline, PipelineOutcome};

pub use pages::{Page, PageKind};

pub use config::{ConfigError, ConsoleConfig};

pub use error::{CommandError, ErrorKind};
