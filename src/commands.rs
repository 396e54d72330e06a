use anyhow::Result;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error};

use crate::backend::TranslationBackend;
use crate::catalog::CatalogService;
use crate::config::BotConfig;
use crate::conversation::Conversation;
use crate::messages::Messages;
use crate::workflow::{TranslationRequest, TranslationWorkflow};

pub const MAX_PHRASE_LENGTH: usize = 500;

/// A command parsed upstream by a natural-language layer. Regex matches on
/// raw chat text arrive through [`Dispatcher::dispatch`] instead.
#[derive(Debug, Clone)]
pub enum CommandEvent {
    Help,
    ListLanguages,
    TranslatePhrase {
        target_language: Option<String>,
        phrase: Option<String>,
        source_language: Option<String>,
    },
}

/// Routes chat text and parsed command events to the translation workflow,
/// the language listing, and the help text.
pub struct Dispatcher {
    bot_name: String,
    catalog: Arc<CatalogService>,
    backend: Arc<dyn TranslationBackend>,
    conversation: Arc<dyn Conversation>,
    messages: Messages,
    confidence_threshold: f64,
    help_pattern: Regex,
    list_pattern: Regex,
    phrase_pattern: Regex,
}

impl Dispatcher {
    pub fn new(
        bot_name: impl Into<String>,
        catalog: Arc<CatalogService>,
        backend: Arc<dyn TranslationBackend>,
        conversation: Arc<dyn Conversation>,
        messages: Messages,
        config: &BotConfig,
    ) -> Result<Self> {
        Ok(Self {
            bot_name: bot_name.into(),
            catalog,
            backend,
            conversation,
            messages,
            confidence_threshold: config.confidence_threshold,
            help_pattern: Regex::new(r"(?i)translates?\s+help")?,
            list_pattern: Regex::new(r"(?i)translate\s+list\s+languages")?,
            phrase_pattern: Regex::new(r"(?i)translate\s+phrase\s+(\S+)\s+(.*)")?,
        })
    }

    /// Routes one raw chat line. Returns `false` when nothing matched.
    pub async fn dispatch(&self, text: &str) -> bool {
        if let Some(captures) = self.phrase_pattern.captures(text) {
            debug!("translate.phrase pattern match");
            let target = captures
                .get(1)
                .map(|group| group.as_str().to_string())
                .unwrap_or_default();
            let phrase = captures
                .get(2)
                .map(|group| group.as_str().to_string())
                .unwrap_or_default();
            self.translate_phrase(target, phrase, None).await;
            return true;
        }
        if self.list_pattern.is_match(text) {
            debug!("translate.list pattern match");
            self.translate_list().await;
            return true;
        }
        if self.help_pattern.is_match(text) {
            debug!("translate.help pattern match");
            self.help();
            return true;
        }
        false
    }

    pub async fn handle_event(&self, event: CommandEvent) {
        match event {
            CommandEvent::Help => self.help(),
            CommandEvent::ListLanguages => self.translate_list().await,
            CommandEvent::TranslatePhrase {
                target_language,
                phrase,
                source_language,
            } => {
                if target_language.is_none() {
                    error!("no target language in the parsed command");
                    self.conversation
                        .emit(self.messages.get("translate.parse.problem.target"));
                }
                if phrase.is_none() {
                    error!("no phrase in the parsed command");
                    self.conversation
                        .emit(self.messages.get("translate.parse.problem.phrase"));
                }
                if let (Some(target), Some(phrase)) = (target_language, phrase) {
                    self.translate_phrase(target, phrase, source_language).await;
                }
            }
        }
    }

    fn help(&self) {
        self.conversation.emit(format!("\n{}", self.help_text()));
    }

    pub fn help_text(&self) -> String {
        format!(
            "{name} translate phrase [language] [phrase] - {phrase}\n{name} translate list languages - {list}\n",
            name = self.bot_name,
            phrase = self.messages.get("help.translate.phrase"),
            list = self.messages.get("help.translate.list"),
        )
    }

    async fn translate_list(&self) {
        let catalog = match self.catalog.load().await {
            Ok(catalog) => catalog,
            Err(load_error) => return self.startup_failed(load_error),
        };
        let header = self.messages.get("translate.supported.languages");
        self.conversation.emit(catalog.supported_matrix(&header));
        if let Err(activity_error) = self.conversation.emit_activity("activity.translate.list") {
            debug!("failed to emit activity: {:#}", activity_error);
        }
    }

    async fn translate_phrase(
        &self,
        target_language: String,
        phrase: String,
        source_language: Option<String>,
    ) {
        let catalog = match self.catalog.load().await {
            Ok(catalog) => catalog,
            Err(load_error) => return self.startup_failed(load_error),
        };
        debug!(
            "the target language is '{}' and the phrase is '{}'",
            target_language, phrase
        );
        if target_language.is_empty()
            || phrase.is_empty()
            || phrase.chars().count() > MAX_PHRASE_LENGTH
        {
            self.conversation.emit(format!(
                "{} translate phrase <language> <phrase> - {}\n",
                self.bot_name,
                self.messages.get("help.translate.phrase")
            ));
            return;
        }

        let workflow = TranslationWorkflow::new(
            catalog,
            self.backend.as_ref(),
            self.conversation.as_ref(),
            &self.messages,
            self.confidence_threshold,
        );
        let mut request = TranslationRequest::new(target_language, phrase);
        request.source_language = source_language;
        workflow.run(request).await;
    }

    fn startup_failed(&self, load_error: anyhow::Error) {
        error!("catalog startup failed: {:#}", load_error);
        let text = load_error.to_string();
        self.conversation.emit(
            self.messages
                .render("translate.startup.fail", &[("error", text.as_str())]),
        );
    }
}
