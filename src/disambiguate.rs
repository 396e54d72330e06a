use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::conversation::Conversation;

const NONE_OF_THE_ABOVE: &str = "None of the above";

/// Presents a numbered list of candidate language names and resolves the
/// user's selection back to a language code. Choosing "None of the above",
/// an unmappable name, or a failed wait is an error; callers wrap it into
/// their own "unknown selection" message.
pub async fn choose_language(
    conversation: &dyn Conversation,
    catalog: &Catalog,
    candidates: &[String],
    prompt_message: &str,
) -> Result<String> {
    let mut choices = candidates.to_vec();
    choices.push(NONE_OF_THE_ABOVE.to_string());

    let mut listing = String::new();
    for (index, language) in choices.iter().enumerate() {
        listing.push_str(&format!("{}. {}\n", index + 1, language));
    }
    let prompt = format!("{}\n{}", prompt_message, listing);

    let pattern = selection_pattern(choices.len())?;
    debug!("selection pattern: {}", pattern);

    let reply = conversation.ask(prompt, pattern.clone()).await?;
    let selection = pattern
        .captures(&reply)
        .and_then(|captures| captures.get(1))
        .and_then(|group| group.as_str().parse::<usize>().ok())
        .ok_or_else(|| anyhow!("the reply did not contain a selection"))?;

    let selected = choices
        .get(selection.wrapping_sub(1))
        .ok_or_else(|| anyhow!("selection {} is out of range", selection))?;
    info!("selected {} as the language", selected);
    catalog
        .code_for_name(selected)
        .ok_or_else(|| anyhow!("no language was selected"))
}

/// `\b(1|2|...|N)\b`: any integer in `[1, N]` as a whole word.
fn selection_pattern(count: usize) -> Result<Regex> {
    let alternatives = (1..=count)
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b({})\b", alternatives))
        .with_context(|| "failed to build the selection pattern")
}
