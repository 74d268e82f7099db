use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::model::{LanguageModel, ModelSession, SessionOptions, UserActivation, is_ready};

/// Word → translation pairs in selection order.
pub type TranslationMap = Vec<(String, String)>;

const GLOSSARY_JSON: &str = include_str!("glossary.json");

/// How many model translation calls run at once within a batch.
const TRANSLATION_CONCURRENCY: usize = 4;

/// Maps every chosen word to a target-language string. The output always
/// holds exactly one entry per input word, in input order; a word that
/// cannot be translated maps to itself.
pub async fn translate_words<M: LanguageModel>(
    model: &M,
    words: &[String],
    target_language: &str,
    activation: UserActivation,
) -> TranslationMap {
    if words.is_empty() {
        return Vec::new();
    }

    if let Some(map) = model_translations(model, words, target_language, activation).await {
        return map;
    }

    debug!("using built-in glossary for '{}'", target_language);
    glossary_translations(words, target_language)
}

async fn model_translations<M: LanguageModel>(
    model: &M,
    words: &[String],
    target_language: &str,
    activation: UserActivation,
) -> Option<TranslationMap> {
    if !is_ready(model, activation).await {
        return None;
    }

    let session = match model
        .create_session(SessionOptions {
            target_language: target_language.to_string(),
            activation,
        })
        .await
    {
        Ok(session) => session,
        Err(err) => {
            debug!("model session unavailable for translation: {}", err);
            return None;
        }
    };

    let session_ref = &session;
    let mut translated: HashMap<String, String> = stream::iter(words.iter().cloned())
        .map(|word| async move {
            let translation = match session_ref.translate(word.clone()).await {
                Ok(value) => {
                    let value = value.trim().to_string();
                    if value.is_empty() { word.clone() } else { value }
                }
                Err(err) => {
                    // Per-word failures keep the original word; the batch
                    // always completes.
                    warn!("translating '{}' failed: {}", word, err);
                    word.clone()
                }
            };
            (word, translation)
        })
        .buffer_unordered(TRANSLATION_CONCURRENCY)
        .collect()
        .await;

    if let Err(err) = session.destroy().await {
        debug!("failed to release translation session: {}", err);
    }

    Some(
        words
            .iter()
            .map(|word| {
                let translation = translated.remove(word).unwrap_or_else(|| word.clone());
                (word.clone(), translation)
            })
            .collect(),
    )
}

/// Static per-language fallback; words absent from the table map to
/// themselves.
fn glossary_translations(words: &[String], target_language: &str) -> TranslationMap {
    let table = glossary().get(&target_language.trim().to_lowercase());
    words
        .iter()
        .map(|word| {
            let translation = table
                .and_then(|entries| entries.get(word))
                .cloned()
                .unwrap_or_else(|| word.clone());
            (word.clone(), translation)
        })
        .collect()
}

fn glossary() -> &'static HashMap<String, HashMap<String, String>> {
    static GLOSSARY: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();
    GLOSSARY.get_or_init(|| {
        serde_json::from_str(GLOSSARY_JSON).unwrap_or_else(|err| {
            warn!("failed to parse built-in glossary: {}", err);
            HashMap::new()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Availability, ModelFuture, OfflineModel};

    #[derive(Clone)]
    struct UppercaseModel {
        fail_on: Option<String>,
    }

    struct UppercaseSession {
        fail_on: Option<String>,
    }

    impl LanguageModel for UppercaseModel {
        type Session = UppercaseSession;

        fn availability(&self) -> ModelFuture<Availability> {
            Box::pin(async { Ok(Availability::Available) })
        }

        fn create_session(&self, _options: SessionOptions) -> ModelFuture<UppercaseSession> {
            let session = UppercaseSession {
                fail_on: self.fail_on.clone(),
            };
            Box::pin(async move { Ok(session) })
        }
    }

    impl ModelSession for UppercaseSession {
        fn prompt(&self, input: String) -> ModelFuture<String> {
            Box::pin(async move { Ok(input) })
        }

        fn translate(&self, word: String) -> ModelFuture<String> {
            let fail_on = self.fail_on.clone();
            Box::pin(async move {
                if fail_on.as_deref() == Some(word.as_str()) {
                    return Err(anyhow::anyhow!("simulated failure"));
                }
                Ok(word.to_uppercase())
            })
        }

        fn destroy(&self) -> ModelFuture<()> {
            Box::pin(async { Ok(()) })
        }
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[tokio::test]
    async fn model_path_translates_every_word_in_order() {
        let model = UppercaseModel { fail_on: None };
        let map = translate_words(
            &model,
            &words(&["house", "water", "cold"]),
            "es",
            UserActivation::Present,
        )
        .await;
        assert_eq!(
            map,
            vec![
                ("house".to_string(), "HOUSE".to_string()),
                ("water".to_string(), "WATER".to_string()),
                ("cold".to_string(), "COLD".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn per_word_failure_keeps_the_original() {
        let model = UppercaseModel {
            fail_on: Some("water".to_string()),
        };
        let map = translate_words(
            &model,
            &words(&["house", "water"]),
            "es",
            UserActivation::Present,
        )
        .await;
        assert_eq!(
            map,
            vec![
                ("house".to_string(), "HOUSE".to_string()),
                ("water".to_string(), "water".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unavailable_model_uses_the_glossary() {
        let map = translate_words(
            &OfflineModel,
            &words(&["house", "water", "cold"]),
            "es",
            UserActivation::Present,
        )
        .await;
        assert_eq!(
            map,
            vec![
                ("house".to_string(), "casa".to_string()),
                ("water".to_string(), "agua".to_string()),
                ("cold".to_string(), "cold".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_language_maps_words_to_themselves() {
        let map = translate_words(
            &OfflineModel,
            &words(&["house"]),
            "xx",
            UserActivation::Present,
        )
        .await;
        assert_eq!(map, vec![("house".to_string(), "house".to_string())]);
    }

    #[tokio::test]
    async fn output_is_never_shorter_than_input() {
        let input = words(&["garden", "garden", "door"]);
        let map = translate_words(&OfflineModel, &input, "fr", UserActivation::Present).await;
        assert_eq!(map.len(), input.len());
        assert_eq!(map[0].1, "jardin");
        assert_eq!(map[2].1, "porte");
    }
}
