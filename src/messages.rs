use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tera::{Context as TeraContext, Tera};
use tracing::debug;

const EN_CATALOG: &str = include_str!("messages/en.toml");

/// Locale message catalog. Entries may contain `{{ placeholder }}` slots
/// filled in by [`Messages::render`].
#[derive(Debug, Clone)]
pub struct Messages {
    entries: HashMap<String, String>,
}

impl Messages {
    pub fn load() -> Result<Self> {
        let parsed: CatalogFile =
            toml::from_str(EN_CATALOG).with_context(|| "failed to parse the message catalog")?;
        Ok(Self {
            entries: parsed.messages,
        })
    }

    /// Looks up a message by key. Unknown keys fall back to the key itself so
    /// a missing entry never breaks a response.
    pub fn get(&self, key: &str) -> String {
        match self.entries.get(key) {
            Some(value) => value.clone(),
            None => {
                debug!("missing message catalog entry: {}", key);
                key.to_string()
            }
        }
    }

    pub fn render(&self, key: &str, args: &[(&str, &str)]) -> String {
        let template = self.get(key);
        let mut context = TeraContext::new();
        for (name, value) in args {
            context.insert(*name, value);
        }
        match Tera::one_off(&template, &context, false) {
            Ok(rendered) => rendered,
            Err(error) => {
                debug!("failed to render message '{}': {:#}", key, error);
                template
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    messages: HashMap<String, String>,
}
