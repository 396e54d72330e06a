use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error};

use crate::backend::{IdentifiableLanguage, TranslationBackend, TranslationModel};

/// The set of identifiable languages and available translation model pairs,
/// immutable once built. Models are filtered to available conversational
/// models; a source/target pair not present here cannot be translated.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    name_to_code: HashMap<String, String>,
    code_to_name: HashMap<String, String>,
    target_codes: Vec<String>,
    source_to_targets: BTreeMap<String, Vec<String>>,
    model_ids: HashMap<String, String>,
}

impl Catalog {
    pub(crate) fn build(languages: Vec<IdentifiableLanguage>, models: Vec<TranslationModel>) -> Self {
        let mut catalog = Catalog::default();
        for entry in languages {
            let hyphenated = entry.name.replace(' ', "-");
            let code = entry.language.to_lowercase();
            catalog
                .name_to_code
                .insert(hyphenated.to_lowercase(), code.clone());
            catalog.code_to_name.insert(code, hyphenated);
        }
        for model in models {
            if model.status != "available" || model.domain != "conversational" {
                continue;
            }
            let source = model.source.to_lowercase();
            let target = model.target.to_lowercase();
            if !catalog.target_codes.contains(&target) {
                catalog.target_codes.push(target.clone());
            }
            catalog
                .source_to_targets
                .entry(source.clone())
                .or_default()
                .push(target.clone());
            catalog
                .model_ids
                .insert(model_key(&source, &target), model.model_id);
        }
        catalog
    }

    /// Resolves a free-text language name (or code) to its canonical code.
    /// Case-insensitive; spaces and hyphens are interchangeable.
    pub fn code_for_name(&self, name: &str) -> Option<String> {
        let key = name.trim().replace(' ', "-").to_lowercase();
        if let Some(code) = self.name_to_code.get(&key) {
            return Some(code.clone());
        }
        self.code_to_name.contains_key(&key).then_some(key)
    }

    /// Inverse lookup: renders the stored hyphenated name with a capitalized
    /// first letter and spaces ("ht" -> "Haitian creole").
    pub fn name_for_code(&self, code: &str) -> Option<String> {
        let name = self.code_to_name.get(&code.trim().to_lowercase())?;
        Some(capitalize(&name.replace('-', " ")))
    }

    pub fn is_target(&self, code: &str) -> bool {
        self.target_codes.iter().any(|target| target == code)
    }

    pub fn target_codes(&self) -> &[String] {
        &self.target_codes
    }

    /// Source codes whose model set can translate into `target_code`.
    pub fn valid_source_codes(&self, target_code: &str) -> Vec<String> {
        self.source_to_targets
            .iter()
            .filter(|(_, targets)| targets.iter().any(|target| target == target_code))
            .map(|(source, _)| source.clone())
            .collect()
    }

    pub fn model_id(&self, source_code: &str, target_code: &str) -> Option<&str> {
        self.model_ids
            .get(&model_key(source_code, target_code))
            .map(String::as_str)
    }

    /// One line per source language: `Source -> Target1, Target2, ...` with
    /// the per-source target names sorted alphabetically.
    pub fn supported_matrix(&self, header: &str) -> String {
        let mut output = String::from(header);
        output.push('\n');
        for (source_code, target_codes) in &self.source_to_targets {
            let Some(source) = self.name_for_code(source_code) else {
                continue;
            };
            let mut targets: Vec<String> = target_codes
                .iter()
                .filter_map(|code| self.name_for_code(code))
                .collect();
            targets.sort();
            output.push_str(&source);
            output.push_str(" -> ");
            output.push_str(&targets.join(", "));
            output.push('\n');
        }
        output
    }

    pub fn language_codes(&self) -> impl Iterator<Item = &str> {
        self.code_to_name.keys().map(String::as_str)
    }
}

fn model_key(source: &str, target: &str) -> String {
    format!("{}-{}", source, target)
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

type LoadOutcome = Result<Arc<Catalog>, String>;

enum LoadState {
    Unloaded,
    Loading(Vec<oneshot::Sender<LoadOutcome>>),
    Loaded(Arc<Catalog>),
    Failed(String),
}

/// Owns the one-time catalog fetch. All concurrent callers of [`load`] share
/// a single outbound fetch; the result, success or failure, is cached for the
/// process lifetime.
///
/// [`load`]: CatalogService::load
pub struct CatalogService {
    backend: Arc<dyn TranslationBackend>,
    state: Mutex<LoadState>,
}

impl CatalogService {
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    pub async fn load(&self) -> Result<Arc<Catalog>> {
        let waiter = {
            let mut state = self.state.lock().await;
            match &mut *state {
                LoadState::Loaded(catalog) => return Ok(catalog.clone()),
                LoadState::Failed(message) => return Err(anyhow!("{}", message)),
                LoadState::Loading(waiters) => {
                    let (sender, receiver) = oneshot::channel();
                    waiters.push(sender);
                    Some(receiver)
                }
                LoadState::Unloaded => {
                    *state = LoadState::Loading(Vec::new());
                    None
                }
            }
        };

        if let Some(receiver) = waiter {
            return match receiver.await {
                Ok(Ok(catalog)) => Ok(catalog),
                Ok(Err(message)) => Err(anyhow!("{}", message)),
                Err(_) => Err(anyhow!("the catalog load was abandoned")),
            };
        }

        debug!("loading the language catalog");
        let outcome: LoadOutcome = match self.fetch().await {
            Ok(catalog) => {
                debug!("language catalog loaded");
                Ok(Arc::new(catalog))
            }
            Err(fetch_error) => {
                error!("failed to load the language catalog: {:?}", fetch_error);
                Err(format!("{:#}", fetch_error))
            }
        };

        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(
                &mut *state,
                match &outcome {
                    Ok(catalog) => LoadState::Loaded(catalog.clone()),
                    Err(message) => LoadState::Failed(message.clone()),
                },
            )
        };
        if let LoadState::Loading(waiters) = previous {
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        }

        outcome.map_err(|message| anyhow!("{}", message))
    }

    async fn fetch(&self) -> Result<Catalog> {
        let languages = self.backend.identifiable_languages().await?;
        let models = self.backend.models().await?;
        Ok(Catalog::build(languages, models))
    }
}
