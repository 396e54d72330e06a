use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use translate_bot::backend::{
    BackendFuture, DetectedLanguage, IdentifiableLanguage, TranslationBackend, TranslationModel,
};
use translate_bot::conversation::ReplyFuture;
use translate_bot::{BotConfig, CatalogService, Conversation, Dispatcher, Messages};

/// A chat room double: bot output is collected, user replies arrive through a
/// real channel so the prompt/reply wait machinery is exercised end to end.
struct ChatRoom {
    outgoing: Mutex<Vec<String>>,
    incoming: tokio::sync::Mutex<mpsc::Receiver<String>>,
    reply_timeout: Duration,
}

impl ChatRoom {
    fn new(reply_timeout: Duration) -> (Arc<Self>, mpsc::Sender<String>) {
        let (sender, receiver) = mpsc::channel(8);
        let room = Arc::new(Self {
            outgoing: Mutex::new(Vec::new()),
            incoming: tokio::sync::Mutex::new(receiver),
            reply_timeout,
        });
        (room, sender)
    }

    fn messages(&self) -> Vec<String> {
        self.outgoing.lock().unwrap().clone()
    }
}

impl Conversation for ChatRoom {
    fn emit(&self, message: String) {
        self.outgoing.lock().unwrap().push(message);
    }

    fn ask(&self, prompt: String, pattern: Regex) -> ReplyFuture<'_> {
        Box::pin(async move {
            self.emit(prompt);
            let mut incoming = self.incoming.lock().await;
            loop {
                let line = timeout(self.reply_timeout, incoming.recv())
                    .await
                    .map_err(|_| anyhow!("timed out waiting for a reply"))?
                    .ok_or_else(|| anyhow!("the room closed"))?;
                if pattern.is_match(&line) {
                    return Ok(line);
                }
            }
        })
    }

    fn emit_activity(&self, _activity_id: &str) -> Result<()> {
        Ok(())
    }
}

struct FakeService {
    detections: Vec<DetectedLanguage>,
}

impl FakeService {
    fn new(detections: &[(&str, f64)]) -> Self {
        Self {
            detections: detections
                .iter()
                .map(|(language, confidence)| DetectedLanguage {
                    language: language.to_string(),
                    confidence: *confidence,
                })
                .collect(),
        }
    }
}

impl TranslationBackend for FakeService {
    fn identifiable_languages(&self) -> BackendFuture<'_, Vec<IdentifiableLanguage>> {
        Box::pin(async move {
            Ok([
                ("ar", "Arabic"),
                ("en", "English"),
                ("es", "Spanish"),
                ("fr", "French"),
                ("pt", "Portuguese"),
            ]
            .into_iter()
            .map(|(language, name)| IdentifiableLanguage {
                language: language.to_string(),
                name: name.to_string(),
            })
            .collect())
        })
    }

    fn models(&self) -> BackendFuture<'_, Vec<TranslationModel>> {
        Box::pin(async move {
            Ok([
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
            .collect())
        })
    }

    fn identify(&self, _text: &str) -> BackendFuture<'_, Vec<DetectedLanguage>> {
        let detections = self.detections.clone();
        Box::pin(async move { Ok(detections) })
    }

    fn translate(&self, model_id: &str, _text: &str) -> BackendFuture<'_, String> {
        let translated = match model_id {
            "en-es-conversational" => Some("Hola".to_string()),
            "es-en-conversational" => Some("How are you?".to_string()),
            _ => None,
        };
        Box::pin(async move {
            translated.ok_or_else(|| anyhow!("no model behind this id"))
        })
    }
}

fn config() -> BotConfig {
    BotConfig {
        api_url: "https://translation.test/api/v2".to_string(),
        username: "user".to_string(),
        password: "secret".to_string(),
        confidence_threshold: 0.10,
        reply_timeout: Duration::from_secs(1),
    }
}

fn bot(room: Arc<ChatRoom>, service: FakeService) -> Dispatcher {
    let backend: Arc<dyn TranslationBackend> = Arc::new(service);
    let catalog = Arc::new(CatalogService::new(backend.clone()));
    Dispatcher::new(
        "hubot",
        catalog,
        backend,
        room,
        Messages::load().unwrap(),
        &config(),
    )
    .unwrap()
}

#[tokio::test]
async fn an_unknown_target_is_disambiguated_and_translated() {
    let (room, user) = ChatRoom::new(Duration::from_secs(1));
    let bot = bot(room.clone(), FakeService::new(&[("en", 0.75)]));

    user.send("5".to_string()).await.unwrap();
    assert!(bot.dispatch("translate phrase foobar hello").await);

    let messages = room.messages();
    assert!(messages[0].contains("I do not know how to translate to foobar."));
    assert!(messages[0].contains("5. Spanish"));
    assert_eq!(messages[1], "Ok, I will translate to Spanish.");
    assert_eq!(messages[2], "Translating from English to Spanish.");
    assert_eq!(messages[3], "The Spanish translation is: Hola");
}

#[tokio::test]
async fn an_ambiguous_detection_is_disambiguated_and_translated() {
    let (room, user) = ChatRoom::new(Duration::from_secs(1));
    let bot = bot(
        room.clone(),
        FakeService::new(&[("es", 0.50), ("pt", 0.25), ("ar", 0.001)]),
    );

    user.send("1".to_string()).await.unwrap();
    assert!(bot.dispatch("translate phrase english como estas").await);

    let messages = room.messages();
    assert!(messages[0].contains("1. Spanish\n2. Portuguese\n3. None of the above"));
    assert_eq!(messages[1], "Ok, I will translate from Spanish.");
    assert_eq!(messages[2], "Translating from Spanish to English.");
    assert_eq!(messages[3], "The English translation is: How are you?");
}

#[tokio::test]
async fn a_silent_user_gets_the_supported_language_matrix() {
    let (room, _user) = ChatRoom::new(Duration::from_millis(20));
    let bot = bot(room.clone(), FakeService::new(&[("en", 0.75)]));

    assert!(bot.dispatch("translate phrase foobar hello").await);

    let messages = room.messages();
    let last = messages.last().expect("an error message");
    assert!(last.starts_with("I still do not know which language to translate to."));
    assert!(last.contains("Arabic -> English"));
}

#[tokio::test]
async fn the_language_listing_works_end_to_end() {
    let (room, _user) = ChatRoom::new(Duration::from_secs(1));
    let bot = bot(room.clone(), FakeService::new(&[("en", 0.75)]));

    assert!(bot.dispatch("translate list languages").await);

    let messages = room.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("I can translate between the following languages:"));
    assert!(messages[0].contains("English -> Arabic, French, Portuguese, Spanish"));
}
