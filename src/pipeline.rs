//! Command pipeline
//!
//! One [`CommandPipeline`] per page. Typed text goes through spell
//! correction, phrase resolution, extraction, validation and dispatch.
//! Voice transcripts skip correction and resolve by keyword. The dropdown
//! path selects an intent by id and fills the bag one value at a time.
//!
//! None of the entry points return an error: every failure ends up as a bot
//! message in the session and is reported back as a [`PipelineOutcome`].

use std::sync::Arc;
use tracing::{debug, info};

use crate::autocorrect::SpellCorrector;
use crate::backend::CatalogBackend;
use crate::conversation::ConversationSession;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::CommandError;
use crate::extractor::{PageContext, ParameterExtractor};
use crate::intents::{Intent, ParameterBag};
use crate::pages::Page;
use crate::resolver::{normalize, IntentResolver, ResolveMode};
use crate::validation::validate;
use crate::voice::VoiceSession;

const BUSY_NOTICE: &str = "Please wait for the current command to finish.";

/// What one submission turned into
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineOutcome {
    /// The command reached the dispatcher
    Dispatched(DispatchOutcome),
    /// Stopped before dispatch; the bot message carries the error text
    Rejected(CommandError),
    /// Intent list shown
    Help,
    /// Session reset
    Cleared,
    /// Dropped because another command was in flight
    Busy,
    /// Blank input, nothing happened
    Ignored,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            PipelineOutcome::Dispatched(outcome) => outcome.is_success(),
            PipelineOutcome::Rejected(_) | PipelineOutcome::Busy => false,
            _ => true,
        }
    }
}

pub struct CommandPipeline {
    page: Page,
    context: PageContext,
    session: ConversationSession,
    corrector: SpellCorrector,
    dispatcher: Dispatcher,
}

impl CommandPipeline {
    pub fn new(page: Page, context: PageContext, backend: Arc<dyn CatalogBackend>) -> Self {
        let session = ConversationSession::new(&page.greeting);
        let corrector = SpellCorrector::new(page.vocabulary.iter());
        Self {
            page,
            context,
            session,
            corrector,
            dispatcher: Dispatcher::new(backend),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.corrector = SpellCorrector::with_threshold(self.page.vocabulary.iter(), threshold);
        self
    }

    /// Replace the session, e.g. to change the seed message or history size
    pub fn with_session(mut self, session: ConversationSession) -> Self {
        self.session = session;
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn set_context(&mut self, context: PageContext) {
        self.context = context;
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ConversationSession {
        &mut self.session
    }

    pub fn corrector(&self) -> &SpellCorrector {
        &self.corrector
    }

    pub fn corrector_mut(&mut self) -> &mut SpellCorrector {
        &mut self.corrector
    }

    pub fn backend(&self) -> &Arc<dyn CatalogBackend> {
        self.dispatcher.backend()
    }

    /// Free-text entry
    pub async fn submit_text(&mut self, input: &str) -> PipelineOutcome {
        let input = input.trim();
        if input.is_empty() {
            return PipelineOutcome::Ignored;
        }
        if let Some(outcome) = self.builtin(input) {
            return outcome;
        }
        if self.session.is_busy() {
            return self.busy();
        }

        let corrected = self.corrector.correct(input);
        if corrected != input {
            debug!(from = %input, to = %corrected, "corrected input");
        }
        self.run(input, &corrected, ResolveMode::Phrase).await
    }

    /// Finalized speech transcript; never spell-corrected
    pub async fn submit_voice(&mut self, transcript: &str) -> PipelineOutcome {
        let transcript = transcript.trim().to_lowercase();
        if transcript.is_empty() {
            return PipelineOutcome::Ignored;
        }
        if self.session.is_busy() {
            return self.busy();
        }
        self.run(&transcript, &transcript, ResolveMode::Keyword).await
    }

    /// Surface a recognizer failure in the conversation
    pub fn speech_error(&mut self, error: CommandError) -> PipelineOutcome {
        self.session.append_bot(error.to_string());
        PipelineOutcome::Rejected(error)
    }

    /// Dropdown selection; page defaults pre-fill the bag
    pub fn select_intent(&mut self, intent_id: &str) -> Result<&Intent, CommandError> {
        let Some(intent) = IntentResolver::new(&self.page.catalog).resolve_selection(intent_id) else {
            return Err(CommandError::UnrecognizedIntent);
        };
        self.session.select_intent(&intent.id);
        for spec in &intent.parameters {
            if !self.session.params().contains(&spec.name) {
                if let Some(value) = self.context.default_for(&spec.name) {
                    self.session.params_mut().set(&spec.name, value);
                }
            }
        }
        Ok(intent)
    }

    pub fn set_param(&mut self, name: &str, value: &str) {
        self.session.params_mut().set(name, value);
    }

    /// Validate and dispatch whatever has been selected and filled in
    pub async fn submit_selection(&mut self) -> PipelineOutcome {
        if self.session.is_busy() {
            return self.busy();
        }
        let intent = match self
            .session
            .selected_intent()
            .and_then(|id| self.page.catalog.get(id))
        {
            Some(intent) => intent.clone(),
            None => return self.reject(CommandError::UnrecognizedIntent),
        };
        let bag = self.session.params().clone();
        self.validate_and_dispatch(&intent, bag).await
    }

    /// Feed finalized transcripts from `voice` until it stops
    pub async fn run_voice(&mut self, voice: &mut VoiceSession) -> Vec<PipelineOutcome> {
        let mut outcomes = Vec::new();
        while let Some(next) = voice.next_transcript().await {
            let outcome = match next {
                Ok(transcript) => self.submit_voice(&transcript).await,
                Err(error) => self.speech_error(error),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Bullet list of what this page understands
    pub fn help_text(&self) -> String {
        let mut text = String::from("Here's what I can do on this page:");
        for intent in self.page.catalog.iter() {
            text.push_str("\n- ");
            text.push_str(&intent.usage());
        }
        text
    }

    fn builtin(&mut self, input: &str) -> Option<PipelineOutcome> {
        match normalize(input).as_str() {
            "help" | "what can you do" | "what can you do?" => {
                self.session.append_user(input);
                let help = self.help_text();
                self.session.append_bot(help);
                Some(PipelineOutcome::Help)
            }
            "clear" => {
                self.session.reset();
                info!(page = %self.page.kind, "session cleared");
                Some(PipelineOutcome::Cleared)
            }
            _ => None,
        }
    }

    async fn run(&mut self, raw: &str, text: &str, mode: ResolveMode) -> PipelineOutcome {
        let intent = match IntentResolver::new(&self.page.catalog).resolve(text, mode) {
            Some(intent) => intent.clone(),
            None => {
                self.session.append_user(raw);
                return self.reject(CommandError::UnrecognizedIntent);
            }
        };

        let bag = ParameterExtractor::new(&self.page.rules, &self.context).extract(&intent, text);
        self.session.select_intent(&intent.id);
        self.session.set_params(bag.clone());
        if !validate(&intent, &bag).is_empty() {
            // the dispatcher echoes commands it runs; rejected ones are echoed here
            self.session.append_user(raw);
        }
        self.validate_and_dispatch(&intent, bag).await
    }

    async fn validate_and_dispatch(&mut self, intent: &Intent, bag: ParameterBag) -> PipelineOutcome {
        let missing = validate(intent, &bag);
        if !missing.is_empty() {
            info!(intent = %intent.id, missing = ?missing, "missing parameters");
            // selection and bag stay put so the values can be supplied
            return self.reject(CommandError::MissingParameters(missing));
        }
        let outcome = self.dispatcher.dispatch(&mut self.session, intent, bag).await;
        PipelineOutcome::Dispatched(outcome)
    }

    fn reject(&mut self, error: CommandError) -> PipelineOutcome {
        debug!(kind = ?error.kind(), "rejected before dispatch");
        self.session.append_bot(error.to_string());
        PipelineOutcome::Rejected(error)
    }

    fn busy(&mut self) -> PipelineOutcome {
        self.session.append_bot(BUSY_NOTICE);
        PipelineOutcome::Busy
    }
}
