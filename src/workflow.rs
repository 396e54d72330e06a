use anyhow::{Result, anyhow};
use std::sync::Arc;
use tracing::{debug, error};

use crate::backend::{DetectedLanguage, TranslationBackend};
use crate::catalog::Catalog;
use crate::conversation::Conversation;
use crate::disambiguate;
use crate::messages::Messages;

/// One translation command in flight. Built per user command and discarded
/// once the response is emitted.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub target_language: String,
    pub phrase: String,
    pub source_language: Option<String>,
    pub target_code: Option<String>,
    pub source_code: Option<String>,
}

impl TranslationRequest {
    pub fn new(target_language: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            phrase: phrase.into(),
            source_language: None,
            target_code: None,
            source_code: None,
        }
    }
}

/// Resolve target, resolve source, translate, emit. Each step either returns
/// the updated request or fails with the message that should reach the user.
pub struct TranslationWorkflow<'a> {
    catalog: Arc<Catalog>,
    backend: &'a dyn TranslationBackend,
    conversation: &'a dyn Conversation,
    messages: &'a Messages,
    confidence_threshold: f64,
}

impl<'a> TranslationWorkflow<'a> {
    pub fn new(
        catalog: Arc<Catalog>,
        backend: &'a dyn TranslationBackend,
        conversation: &'a dyn Conversation,
        messages: &'a Messages,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            catalog,
            backend,
            conversation,
            messages,
            confidence_threshold,
        }
    }

    pub async fn run(&self, request: TranslationRequest) {
        debug!(
            "starting translation of '{}' to '{}'",
            request.phrase, request.target_language
        );
        match self.execute(request).await {
            Ok(response) => {
                self.conversation.emit(response);
                if let Err(activity_error) =
                    self.conversation.emit_activity("activity.translate.phrase")
                {
                    debug!("failed to emit activity: {:#}", activity_error);
                }
            }
            Err(workflow_error) => {
                error!("translation failed: {:?}", workflow_error);
                self.conversation.emit(workflow_error.to_string());
            }
        }
    }

    async fn execute(&self, request: TranslationRequest) -> Result<String> {
        let request = self.resolve_target(request).await?;
        let request = self.resolve_source(request).await?;
        self.translate(request).await
    }

    async fn resolve_target(&self, mut request: TranslationRequest) -> Result<TranslationRequest> {
        request.target_code = self.catalog.code_for_name(&request.target_language);

        if let Some(code) = request.target_code.clone() {
            if let Some(name) = self.catalog.name_for_code(&code) {
                request.target_language = name;
            }
            if self.catalog.is_target(&code) {
                return Ok(request);
            }
        } else {
            debug!("target language '{}' not found", request.target_language);
        }

        let mut all_targets: Vec<String> = self
            .catalog
            .target_codes()
            .iter()
            .filter_map(|code| self.catalog.name_for_code(code))
            .collect();
        all_targets.sort();
        let prompt = self.messages.render(
            "translate.target.invalid",
            &[("language", request.target_language.as_str())],
        );
        let code =
            disambiguate::choose_language(self.conversation, &self.catalog, &all_targets, &prompt)
                .await
                .map_err(|selection_error| {
                    debug!("target selection failed: {:#}", selection_error);
                    self.unknown_selection_error("translate.target.unknown.error")
                })?;

        if let Some(name) = self.catalog.name_for_code(&code) {
            request.target_language = name;
        }
        request.target_code = Some(code);
        self.conversation.emit(self.messages.render(
            "translate.target.success",
            &[("language", request.target_language.as_str())],
        ));
        Ok(request)
    }

    async fn resolve_source(&self, mut request: TranslationRequest) -> Result<TranslationRequest> {
        let target_code = request
            .target_code
            .clone()
            .ok_or_else(|| anyhow!("the target language is not resolved"))?;
        let valid_codes = self.catalog.valid_source_codes(&target_code);
        let mut valid_names: Vec<String> = valid_codes
            .iter()
            .filter_map(|code| self.catalog.name_for_code(code))
            .collect();
        valid_names.sort();

        if let Some(supplied) = request.source_language.clone() {
            if let Some(code) = self.catalog.code_for_name(&supplied)
                && valid_codes.contains(&code)
            {
                request.source_language = self.catalog.name_for_code(&code);
                request.source_code = Some(code);
                return Ok(request);
            }
            debug!("supplied source language '{}' is not usable here", supplied);
        }

        let candidates = match self.backend.identify(&request.phrase).await {
            Ok(detections) => self.confident_candidates(&detections, &valid_codes),
            Err(identify_error) => {
                error!("language detection failed: {:#}", identify_error);
                return self
                    .prompt_for_source(request, valid_names, "translate.source.invalid")
                    .await;
            }
        };

        match candidates.len() {
            1 => {
                let name = candidates.into_iter().next().unwrap_or_default();
                debug!("detection found one language: {}", name);
                request.source_code = self.catalog.code_for_name(&name);
                request.source_language = Some(name);
                Ok(request)
            }
            0 => {
                self.prompt_for_source(request, valid_names, "translate.source.invalid")
                    .await
            }
            _ => {
                debug!("detection found several languages: {:?}", candidates);
                self.prompt_for_source(request, candidates, "translate.source.lowconfidence")
                    .await
            }
        }
    }

    async fn prompt_for_source(
        &self,
        mut request: TranslationRequest,
        choices: Vec<String>,
        message_key: &str,
    ) -> Result<TranslationRequest> {
        let prompt = self.messages.get(message_key);
        let code =
            disambiguate::choose_language(self.conversation, &self.catalog, &choices, &prompt)
                .await
                .map_err(|selection_error| {
                    debug!("source selection failed: {:#}", selection_error);
                    self.unknown_selection_error("translate.source.unknown.error")
                })?;

        let name = self.catalog.name_for_code(&code);
        if let Some(name) = &name {
            self.conversation.emit(
                self.messages
                    .render("translate.source.success", &[("language", name.as_str())]),
            );
        }
        request.source_language = name;
        request.source_code = Some(code);
        Ok(request)
    }

    /// Keeps detections whose code is a valid source for the target, or
    /// English above the confidence threshold. With several survivors, any
    /// entry after the first is dropped when its confidence falls below the
    /// threshold; the first entry is never checked.
    fn confident_candidates(
        &self,
        detections: &[DetectedLanguage],
        valid_codes: &[String],
    ) -> Vec<String> {
        let plausible: Vec<&DetectedLanguage> = detections
            .iter()
            .filter(|entry| {
                valid_codes.contains(&entry.language)
                    || (entry.language == "en" && entry.confidence > self.confidence_threshold)
            })
            .collect();

        if plausible.is_empty() {
            return Vec::new();
        }
        if plausible.len() == 1 {
            return self
                .catalog
                .name_for_code(&plausible[0].language)
                .into_iter()
                .collect();
        }

        debug!("candidate languages: {:?}", plausible);
        let mut result = Vec::new();
        let mut previous: Option<&DetectedLanguage> = None;
        for entry in plausible {
            let keep = previous.is_none() || entry.confidence >= self.confidence_threshold;
            if keep && let Some(name) = self.catalog.name_for_code(&entry.language) {
                result.push(name);
            }
            previous = Some(entry);
        }
        result
    }

    async fn translate(&self, request: TranslationRequest) -> Result<String> {
        let source_code = request
            .source_code
            .clone()
            .ok_or_else(|| anyhow!("the source language is not resolved"))?;
        let target_code = request
            .target_code
            .clone()
            .ok_or_else(|| anyhow!("the target language is not resolved"))?;
        let source_name = request
            .source_language
            .clone()
            .or_else(|| self.catalog.name_for_code(&source_code))
            .unwrap_or_else(|| source_code.clone());
        let target_name = self
            .catalog
            .name_for_code(&target_code)
            .unwrap_or_else(|| request.target_language.clone());

        self.conversation.emit(self.messages.render(
            "translate.phrase.info",
            &[
                ("source", source_name.as_str()),
                ("target", target_name.as_str()),
            ],
        ));

        if source_code == target_code {
            debug!("the source language is the same as the target language");
            return Ok(self.messages.render(
                "translate.phrase.output",
                &[
                    ("language", target_name.as_str()),
                    ("translation", request.phrase.as_str()),
                    ("suffix", " :)"),
                ],
            ));
        }

        let model_id = self
            .catalog
            .model_id(&source_code, &target_code)
            .ok_or_else(|| anyhow!("{}", self.messages.get("translate.phrase.error")))?;
        let translated = match self.backend.translate(model_id, &request.phrase).await {
            Ok(translated) => translated,
            Err(translate_error) => {
                error!("the translation call failed: {:?}", translate_error);
                return Err(anyhow!("{}", self.messages.get("translate.phrase.error")));
            }
        };
        Ok(self.messages.render(
            "translate.phrase.output",
            &[
                ("language", target_name.as_str()),
                ("translation", translated.as_str()),
                ("suffix", ""),
            ],
        ))
    }

    fn unknown_selection_error(&self, message_key: &str) -> anyhow::Error {
        let header = self.messages.get("translate.supported.languages");
        anyhow!(
            "{}  {}",
            self.messages.get(message_key),
            self.catalog.supported_matrix(&header)
        )
    }
}
