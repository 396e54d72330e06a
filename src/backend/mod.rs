use anyhow::Result;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

mod retry;
mod watson;

pub use watson::WatsonClient;

/// A language the backend can identify from raw text.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentifiableLanguage {
    pub language: String,
    pub name: String,
}

/// A translation model offered by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationModel {
    pub model_id: String,
    pub source: String,
    pub target: String,
    pub domain: String,
    pub status: String,
}

/// One entry of a language-detection result.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedLanguage {
    pub language: String,
    pub confidence: f64,
}

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The hosted translation service, reduced to the four operations the bot
/// consumes. Object-safe so command handlers and tests can share one seam.
pub trait TranslationBackend: Send + Sync {
    fn identifiable_languages(&self) -> BackendFuture<'_, Vec<IdentifiableLanguage>>;
    fn models(&self) -> BackendFuture<'_, Vec<TranslationModel>>;
    fn identify(&self, text: &str) -> BackendFuture<'_, Vec<DetectedLanguage>>;

    /// Translates `text` with the given model. Errors when the response is
    /// missing the expected translated-text field.
    fn translate(&self, model_id: &str, text: &str) -> BackendFuture<'_, String>;
}
