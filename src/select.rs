use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use tracing::{debug, warn};

use crate::model::{LanguageModel, ModelSession, SessionOptions, UserActivation, is_ready};
use crate::prompts;
use crate::settings::Difficulty;

/// Upper bound on how many candidates are offered to the model.
const MAX_PROMPT_CANDIDATES: usize = 200;

/// Chooses the words to replace: at most the difficulty's target count,
/// every one of them a member of `candidates`.
///
/// The model path is preferred; any failure there (unavailable model,
/// missing user gesture, unparseable reply, empty selection) routes to the
/// deterministic heuristic, which is the correctness backstop rather than a
/// degraded mode.
pub async fn select_words<M: LanguageModel>(
    model: &M,
    candidates: &[String],
    difficulty: Difficulty,
    language_code: &str,
    language_label: &str,
    activation: UserActivation,
) -> Vec<String> {
    let target = difficulty.target_count().min(candidates.len());
    if target == 0 {
        return Vec::new();
    }

    let model_words = model_selection(
        model,
        candidates,
        difficulty,
        language_code,
        language_label,
        activation,
        target,
    )
    .await;
    match model_words {
        Some(words) if !words.is_empty() => words,
        _ => {
            debug!("selecting {} words heuristically", target);
            heuristic_selection(candidates, difficulty, target)
        }
    }
}

async fn model_selection<M: LanguageModel>(
    model: &M,
    candidates: &[String],
    difficulty: Difficulty,
    language_code: &str,
    language_label: &str,
    activation: UserActivation,
    target: usize,
) -> Option<Vec<String>> {
    if !is_ready(model, activation).await {
        return None;
    }

    let offered: Vec<String> = candidates
        .iter()
        .take(MAX_PROMPT_CANDIDATES)
        .cloned()
        .collect();
    let prompt = match prompts::render_selection_prompt(difficulty, target, language_label, &offered)
    {
        Ok(prompt) => prompt,
        Err(err) => {
            warn!("failed to render selection prompt: {}", err);
            return None;
        }
    };

    let session = match model
        .create_session(SessionOptions {
            target_language: language_code.to_string(),
            activation,
        })
        .await
    {
        Ok(session) => session,
        Err(err) => {
            debug!("model session unavailable for selection: {}", err);
            return None;
        }
    };

    let reply = session.prompt(prompt).await;
    if let Err(err) = session.destroy().await {
        debug!("failed to release selection session: {}", err);
    }
    let reply = match reply {
        Ok(reply) => reply,
        Err(err) => {
            warn!("model selection failed: {}", err);
            return None;
        }
    };

    parse_selected_words(&reply, candidates, target)
}

/// Parses a JSON array out of the raw completion and keeps only words that
/// are actually candidates (case-insensitive). Returns None when nothing
/// usable is found.
fn parse_selected_words(reply: &str, candidates: &[String], target: usize) -> Option<Vec<String>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end <= start {
        return None;
    }
    let words: Vec<String> = match serde_json::from_str(&reply[start..=end]) {
        Ok(words) => words,
        Err(err) => {
            warn!("model selection reply was not a JSON string array: {}", err);
            return None;
        }
    };

    let known: HashMap<String, &String> = candidates
        .iter()
        .map(|word| (word.to_lowercase(), word))
        .collect();
    let mut selected = Vec::new();
    for word in words {
        let Some(candidate) = known.get(&word.trim().to_lowercase()) else {
            continue;
        };
        if !selected.contains(*candidate) {
            selected.push((*candidate).clone());
        }
        if selected.len() == target {
            break;
        }
    }

    if selected.is_empty() { None } else { Some(selected) }
}

/// Deterministic backstop: order candidates by difficulty policy and take
/// the first `target`.
fn heuristic_selection(
    candidates: &[String],
    difficulty: Difficulty,
    target: usize,
) -> Vec<String> {
    let mut pool: Vec<String> = candidates.to_vec();
    match difficulty {
        Difficulty::Beginner => {
            pool.sort_by(|a, b| a.chars().count().cmp(&b.chars().count()).then(a.cmp(b)));
        }
        Difficulty::Advanced => {
            pool.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        }
        Difficulty::Intermediate => {
            let state = RandomState::new();
            pool.sort_by_key(|word| state.hash_one(word.as_str()));
        }
    }
    pool.truncate(target);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Availability, ModelFuture, OfflineModel};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct ScriptedModel {
        availability: Availability,
        reply: String,
        prompts: Arc<AtomicUsize>,
    }

    impl ScriptedModel {
        fn new(availability: Availability, reply: &str) -> Self {
            Self {
                availability,
                reply: reply.to_string(),
                prompts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct ScriptedSession {
        reply: String,
        prompts: Arc<AtomicUsize>,
    }

    impl LanguageModel for ScriptedModel {
        type Session = ScriptedSession;

        fn availability(&self) -> ModelFuture<Availability> {
            let availability = self.availability;
            Box::pin(async move { Ok(availability) })
        }

        fn create_session(&self, _options: SessionOptions) -> ModelFuture<ScriptedSession> {
            let session = ScriptedSession {
                reply: self.reply.clone(),
                prompts: self.prompts.clone(),
            };
            Box::pin(async move { Ok(session) })
        }
    }

    impl ModelSession for ScriptedSession {
        fn prompt(&self, _input: String) -> ModelFuture<String> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.clone();
            Box::pin(async move { Ok(reply) })
        }

        fn translate(&self, word: String) -> ModelFuture<String> {
            Box::pin(async move { Ok(word) })
        }

        fn destroy(&self) -> ModelFuture<()> {
            Box::pin(async { Ok(()) })
        }
    }

    fn candidates(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    #[tokio::test]
    async fn model_selection_filters_to_candidates() {
        let model = ScriptedModel::new(
            Availability::Available,
            r#"Here you go: ["Mountain", "water", "unicorn", "water"]"#,
        );
        let pool = candidates(&["mountain", "water", "castle"]);
        let words = select_words(
            &model,
            &pool,
            Difficulty::Beginner,
            "es",
            "Spanish",
            UserActivation::Present,
        )
        .await;
        assert_eq!(words, vec!["mountain", "water"]);
        assert_eq!(model.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back_to_heuristic() {
        let model = ScriptedModel::new(Availability::Available, "no json here");
        let pool = candidates(&["ravine", "sun", "mountainside", "lake"]);
        let words = select_words(
            &model,
            &pool,
            Difficulty::Beginner,
            "es",
            "Spanish",
            UserActivation::Present,
        )
        .await;
        // Shortest-first ordering, clamped to the pool size.
        assert_eq!(words, vec!["sun", "lake", "ravine", "mountainside"]);
    }

    #[tokio::test]
    async fn unavailable_model_uses_heuristic() {
        let words = select_words(
            &OfflineModel,
            &candidates(&["glacier", "meadow", "waterfall"]),
            Difficulty::Advanced,
            "es",
            "Spanish",
            UserActivation::Present,
        )
        .await;
        // Longest-first for advanced.
        assert_eq!(words, vec!["waterfall", "glacier", "meadow"]);
    }

    #[tokio::test]
    async fn downloadable_without_gesture_uses_heuristic() {
        let model = ScriptedModel::new(Availability::Downloadable, r#"["glacier"]"#);
        let words = select_words(
            &model,
            &candidates(&["glacier", "meadow"]),
            Difficulty::Beginner,
            "es",
            "Spanish",
            UserActivation::Absent,
        )
        .await;
        assert_eq!(model.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(words, vec!["meadow", "glacier"]);
    }

    #[tokio::test]
    async fn selection_is_clamped_to_target_count() {
        let pool: Vec<String> = (0..100).map(|idx| format!("word{:03}", idx)).collect();
        let words = select_words(
            &OfflineModel,
            &pool,
            Difficulty::Intermediate,
            "es",
            "Spanish",
            UserActivation::Present,
        )
        .await;
        assert_eq!(words.len(), Difficulty::Intermediate.target_count());
        for word in &words {
            assert!(pool.contains(word));
        }
    }

    #[test]
    fn parse_rejects_empty_and_foreign_arrays() {
        let pool = candidates(&["mountain"]);
        assert!(parse_selected_words("[]", &pool, 5).is_none());
        assert!(parse_selected_words(r#"["unicorn"]"#, &pool, 5).is_none());
        assert!(parse_selected_words("no brackets", &pool, 5).is_none());
        assert!(parse_selected_words(r#"[1, 2, 3]"#, &pool, 5).is_none());
    }
}
