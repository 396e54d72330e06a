use anyhow::{Result, anyhow};
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::backend::{
    BackendFuture, DetectedLanguage, IdentifiableLanguage, TranslationBackend, TranslationModel,
};
use crate::catalog::Catalog;
use crate::conversation::{Conversation, ReplyFuture};

pub(crate) fn fixture_languages() -> Vec<IdentifiableLanguage> {
    [
        ("ar", "Arabic"),
        ("en", "English"),
        ("es", "Spanish"),
        ("fr", "French"),
        ("pt", "Portuguese"),
        ("ht", "Haitian Creole"),
    ]
    .into_iter()
    .map(|(language, name)| IdentifiableLanguage {
        language: language.to_string(),
        name: name.to_string(),
    })
    .collect()
}

pub(crate) fn fixture_models() -> Vec<TranslationModel> {
    let mut models: Vec<TranslationModel> = [
        ("ar-en-conversational", "ar", "en"),
        ("en-ar-conversational", "en", "ar"),
        ("en-es-conversational", "en", "es"),
        ("en-fr-conversational", "en", "fr"),
        ("en-pt-conversational", "en", "pt"),
        ("es-en-conversational", "es", "en"),
        ("fr-en-conversational", "fr", "en"),
        ("pt-en-conversational", "pt", "en"),
    ]
    .into_iter()
    .map(|(model_id, source, target)| TranslationModel {
        model_id: model_id.to_string(),
        source: source.to_string(),
        target: target.to_string(),
        domain: "conversational".to_string(),
        status: "available".to_string(),
    })
    .collect();
    models.push(TranslationModel {
        model_id: "fr-es-news".to_string(),
        source: "fr".to_string(),
        target: "es".to_string(),
        domain: "news".to_string(),
        status: "available".to_string(),
    });
    models
}

pub(crate) fn fixture_catalog() -> Catalog {
    Catalog::build(fixture_languages(), fixture_models())
}

pub(crate) fn detection(language: &str, confidence: f64) -> DetectedLanguage {
    DetectedLanguage {
        language: language.to_string(),
        confidence,
    }
}

/// Scripted stand-in for the hosted translation service.
pub(crate) struct StubBackend {
    catalog_fetches: AtomicUsize,
    fail_catalog: AtomicBool,
    fail_identify: AtomicBool,
    fail_translate: AtomicBool,
    detections: Mutex<Vec<DetectedLanguage>>,
    translations: Mutex<HashMap<String, String>>,
    translate_calls: Mutex<Vec<String>>,
}

impl StubBackend {
    pub(crate) fn new() -> Self {
        let mut translations = HashMap::new();
        translations.insert("en-es-conversational".to_string(), "Hola".to_string());
        translations.insert(
            "es-en-conversational".to_string(),
            "How are you?".to_string(),
        );
        Self {
            catalog_fetches: AtomicUsize::new(0),
            fail_catalog: AtomicBool::new(false),
            fail_identify: AtomicBool::new(false),
            fail_translate: AtomicBool::new(false),
            detections: Mutex::new(vec![detection("en", 0.75)]),
            translations: Mutex::new(translations),
            translate_calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_catalog(self) -> Self {
        self.fail_catalog.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_identify(self) -> Self {
        self.fail_identify.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_translate(self) -> Self {
        self.fail_translate.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_detections(self, detections: &[(&str, f64)]) -> Self {
        *self.detections.lock().unwrap() = detections
            .iter()
            .map(|(language, confidence)| detection(language, *confidence))
            .collect();
        self
    }

    pub(crate) fn heal(&self) {
        self.fail_catalog.store(false, Ordering::SeqCst);
    }

    pub(crate) fn catalog_fetches(&self) -> usize {
        self.catalog_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn translate_calls(&self) -> Vec<String> {
        self.translate_calls.lock().unwrap().clone()
    }
}

impl TranslationBackend for StubBackend {
    fn identifiable_languages(&self) -> BackendFuture<'_, Vec<IdentifiableLanguage>> {
        self.catalog_fetches.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_catalog.load(Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                return Err(anyhow!("the language service is unreachable"));
            }
            Ok(fixture_languages())
        })
    }

    fn models(&self) -> BackendFuture<'_, Vec<TranslationModel>> {
        Box::pin(async move { Ok(fixture_models()) })
    }

    fn identify(&self, _text: &str) -> BackendFuture<'_, Vec<DetectedLanguage>> {
        let fail = self.fail_identify.load(Ordering::SeqCst);
        let detections = self.detections.lock().unwrap().clone();
        Box::pin(async move {
            if fail {
                return Err(anyhow!("language detection is unavailable"));
            }
            Ok(detections)
        })
    }

    fn translate(&self, model_id: &str, _text: &str) -> BackendFuture<'_, String> {
        self.translate_calls
            .lock()
            .unwrap()
            .push(model_id.to_string());
        let fail = self.fail_translate.load(Ordering::SeqCst);
        let translated = self.translations.lock().unwrap().get(model_id).cloned();
        Box::pin(async move {
            if fail {
                return Err(anyhow!("the translation call failed"));
            }
            translated.ok_or_else(|| anyhow!("no translation scripted for this model"))
        })
    }
}

/// Scripted stand-in for the conversational framework: queued replies,
/// recorded emissions.
pub(crate) struct ScriptedConversation {
    replies: Mutex<VecDeque<String>>,
    emitted: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    activities: Mutex<Vec<String>>,
}

impl ScriptedConversation {
    pub(crate) fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
            emitted: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            activities: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn emitted(&self) -> Vec<String> {
        self.emitted.lock().unwrap().clone()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn activities(&self) -> Vec<String> {
        self.activities.lock().unwrap().clone()
    }
}

impl Conversation for ScriptedConversation {
    fn emit(&self, message: String) {
        self.emitted.lock().unwrap().push(message);
    }

    fn ask(&self, prompt: String, pattern: Regex) -> ReplyFuture<'_> {
        self.prompts.lock().unwrap().push(prompt);
        let reply = self.replies.lock().unwrap().pop_front();
        Box::pin(async move {
            let reply = reply.ok_or_else(|| anyhow!("timed out waiting for a reply"))?;
            if pattern.is_match(&reply) {
                Ok(reply)
            } else {
                Err(anyhow!("the reply did not match the expected pattern"))
            }
        })
    }

    fn emit_activity(&self, activity_id: &str) -> Result<()> {
        self.activities.lock().unwrap().push(activity_id.to_string());
        Ok(())
    }
}
