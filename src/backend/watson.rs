use anyhow::{Context, Result, anyhow};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;

use super::retry::{RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff};
use super::{
    BackendFuture, DetectedLanguage, IdentifiableLanguage, TranslationBackend, TranslationModel,
};
use crate::config::BotConfig;

/// HTTP client for the hosted translation service (Watson Language Translator
/// v2 wire format): basic-auth credentials, JSON responses.
#[derive(Debug, Clone)]
pub struct WatsonClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl WatsonClient {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            http: reqwest::Client::new(),
        }
    }

    async fn execute(&self, request: reqwest::RequestBuilder, operation: &str) -> Result<String> {
        let mut attempt = 0usize;
        let mut delay = RATE_LIMIT_BASE_DELAY;
        loop {
            attempt += 1;
            let prepared = request
                .try_clone()
                .ok_or_else(|| anyhow!("{} request cannot be retried", operation))?
                .basic_auth(&self.username, Some(&self.password));
            let response = prepared
                .send()
                .await
                .with_context(|| format!("{} request failed", operation))?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return Ok(text);
            }
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                delay = wait_with_backoff(operation, attempt, delay, retry_after).await;
                continue;
            }
            return Err(anyhow!(
                "{} failed ({}): {}",
                operation,
                status,
                extract_error(&text).unwrap_or(text)
            ));
        }
    }
}

impl TranslationBackend for WatsonClient {
    fn identifiable_languages(&self) -> BackendFuture<'_, Vec<IdentifiableLanguage>> {
        Box::pin(async move {
            let url = format!("{}/identifiable_languages", self.base_url);
            let body = self
                .execute(self.http.get(&url), "identifiable languages")
                .await?;
            let payload: IdentifiableLanguagesResponse = serde_json::from_str(&body)
                .with_context(|| "failed to parse the identifiable languages response")?;
            Ok(payload.languages)
        })
    }

    fn models(&self) -> BackendFuture<'_, Vec<TranslationModel>> {
        Box::pin(async move {
            let url = format!("{}/models", self.base_url);
            let body = self.execute(self.http.get(&url), "models").await?;
            let payload: ModelsResponse = serde_json::from_str(&body)
                .with_context(|| "failed to parse the models response")?;
            Ok(payload.models)
        })
    }

    fn identify(&self, text: &str) -> BackendFuture<'_, Vec<DetectedLanguage>> {
        let text = text.to_string();
        Box::pin(async move {
            let url = format!("{}/identify", self.base_url);
            let request = self
                .http
                .post(&url)
                .header(CONTENT_TYPE, "text/plain")
                .body(text);
            let body = self.execute(request, "identify").await?;
            let payload: IdentifyResponse = serde_json::from_str(&body)
                .with_context(|| "failed to parse the identify response")?;
            Ok(payload.languages)
        })
    }

    fn translate(&self, model_id: &str, text: &str) -> BackendFuture<'_, String> {
        let payload = json!({ "model_id": model_id, "text": text });
        Box::pin(async move {
            let url = format!("{}/translate", self.base_url);
            let body = self
                .execute(self.http.post(&url).json(&payload), "translate")
                .await?;
            let parsed: TranslateResponse = serde_json::from_str(&body)
                .with_context(|| "failed to parse the translate response")?;
            parsed
                .translations
                .into_iter()
                .next()
                .and_then(|entry| entry.translation)
                .ok_or_else(|| anyhow!("translate response is missing the translated text"))
        })
    }
}

fn extract_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error_message: Option<String>,
        error: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error_message
        .or(parsed.error)
        .filter(|message| !message.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct IdentifiableLanguagesResponse {
    languages: Vec<IdentifiableLanguage>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<TranslationModel>,
}

#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    languages: Vec<DetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslationEntry>,
}

#[derive(Debug, Deserialize)]
struct TranslationEntry {
    translation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identifiable_languages() {
        let body = r#"{"languages":[{"language":"es","name":"Spanish"},{"language":"ht","name":"Haitian Creole"}]}"#;
        let payload: IdentifiableLanguagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(payload.languages.len(), 2);
        assert_eq!(payload.languages[1].language, "ht");
        assert_eq!(payload.languages[1].name, "Haitian Creole");
    }

    #[test]
    fn parses_models() {
        let body = r#"{"models":[{"model_id":"en-es-conversational","source":"en","target":"es","domain":"conversational","status":"available"}]}"#;
        let payload: ModelsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(payload.models[0].model_id, "en-es-conversational");
        assert_eq!(payload.models[0].status, "available");
    }

    #[test]
    fn translate_entry_tolerates_a_missing_field() {
        let body = r#"{"translations":[{}]}"#;
        let parsed: TranslateResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.translations[0].translation.is_none());
    }

    #[test]
    fn extracts_service_error_messages() {
        assert_eq!(
            extract_error(r#"{"error_message":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(
            extract_error(r#"{"error":"Model not found"}"#).as_deref(),
            Some("Model not found")
        );
        assert_eq!(extract_error("not json"), None);
    }
}
