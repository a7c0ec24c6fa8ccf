//! Grounding context and completion request assembly

use super::completion::CompletionRequest;
use super::history::ConversationTurn;
use super::profiles::ModelProfile;
use crate::models::RankedCandidate;
use crate::text::truncate_chars;

const CARD_DESCRIPTION_CHARS: usize = 300;
const EMPTY_CONTEXT: &str = "(no catalog entries matched this message)";

/// One candidate rendered for the model
pub fn format_card(candidate: &RankedCandidate) -> String {
    let item = &candidate.item;
    let english = item
        .title
        .display_english
        .as_deref()
        .or(item.title.english.as_deref())
        .unwrap_or("N/A");
    let romaji = item
        .title
        .display_romaji
        .as_deref()
        .or(item.title.romaji.as_deref())
        .unwrap_or("N/A");
    let episodes = item
        .episodes
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Title: {} / {}\nDescription: {}\nGenres: {}\nEpisodes: {}\nRelevance: {:.3}",
        english,
        romaji,
        truncate_chars(&item.description, CARD_DESCRIPTION_CHARS),
        item.genres.join(", "),
        episodes,
        candidate.score
    )
}

pub fn context_block(candidates: &[RankedCandidate]) -> String {
    candidates
        .iter()
        .map(format_card)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the completion request: instruction, prior turns, then the message with its context
pub fn build_request(
    profile: &ModelProfile,
    prior_turns: Vec<ConversationTurn>,
    message: &str,
    context: &str,
) -> CompletionRequest {
    let context = if context.is_empty() {
        EMPTY_CONTEXT
    } else {
        context
    };

    let mut turns = prior_turns;
    turns.push(ConversationTurn::user(format!(
        "{}\n\nCatalog context:\n{}",
        message, context
    )));

    CompletionRequest {
        model: profile.id.to_string(),
        system: profile.instruction.clone(),
        turns,
    }
}
