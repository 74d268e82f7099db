use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::retry::{RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff};
use super::{Availability, LanguageModel, ModelFuture, ModelSession, SessionOptions};
use crate::settings::ModelSettings;

const DEFAULT_MODEL: &str = "llama3";

/// OpenAI-compatible chat endpoint used for word selection, translation
/// and example sentences.
#[derive(Debug, Clone)]
pub struct RemoteModel {
    endpoint: String,
    key: Option<String>,
    model: String,
}

impl RemoteModel {
    pub fn new(endpoint: impl Into<String>, key: Option<String>, model: Option<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key,
            model: model
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn from_settings(settings: &ModelSettings) -> Option<Self> {
        let endpoint = settings.endpoint.as_ref()?;
        if endpoint.trim().is_empty() {
            return None;
        }
        Some(Self::new(
            endpoint.trim(),
            settings.key.clone(),
            settings.name.clone(),
        ))
    }
}

impl LanguageModel for RemoteModel {
    type Session = RemoteSession;

    fn availability(&self) -> ModelFuture<Availability> {
        let this = self.clone();
        Box::pin(async move {
            let client = reqwest::Client::new();
            let mut request = client.get(format!("{}/models", this.endpoint));
            if let Some(key) = this.key.as_ref() {
                request = request.bearer_auth(key);
            }
            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    tracing::debug!("model availability probe failed: {}", err);
                    return Ok(Availability::Unavailable);
                }
            };
            if !response.status().is_success() {
                return Ok(Availability::Unavailable);
            }
            let text = response.text().await.unwrap_or_default();
            Ok(parse_availability(&text, &this.model))
        })
    }

    fn create_session(&self, options: SessionOptions) -> ModelFuture<RemoteSession> {
        let this = self.clone();
        Box::pin(async move {
            let availability = this
                .availability()
                .await
                .unwrap_or(Availability::Unavailable);
            match availability {
                Availability::Available => {}
                Availability::Downloadable => {
                    if !options.activation.is_present() {
                        return Err(anyhow!("model download requires a user gesture"));
                    }
                }
                Availability::Unavailable => {
                    return Err(anyhow!("model endpoint is unavailable"));
                }
            }
            Ok(RemoteSession {
                endpoint: this.endpoint,
                key: this.key,
                model: this.model,
                target_language: options.target_language,
                client: reqwest::Client::new(),
            })
        })
    }
}

pub struct RemoteSession {
    endpoint: String,
    key: Option<String>,
    model: String,
    target_language: String,
    client: reqwest::Client,
}

impl RemoteSession {
    async fn chat(&self, system: Option<String>, user: String) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": user}));
        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        let mut attempt = 0usize;
        let mut delay = RATE_LIMIT_BASE_DELAY;
        loop {
            attempt += 1;
            let mut request = self.client.post(&url).json(&body);
            if let Some(key) = self.key.as_ref() {
                request = request.bearer_auth(key);
            }
            let response = request.send().await?;
            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_content(&text);
            }
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                delay = wait_with_backoff(attempt, delay, retry_after).await;
                continue;
            }
            return Err(anyhow!("model endpoint error ({}): {}", status, text));
        }
    }
}

impl ModelSession for RemoteSession {
    fn prompt(&self, input: String) -> ModelFuture<String> {
        let this = self.clone_parts();
        Box::pin(async move { this.chat(None, input).await })
    }

    fn translate(&self, word: String) -> ModelFuture<String> {
        let this = self.clone_parts();
        Box::pin(async move {
            let system = format!(
                "You translate single words into the language with ISO code '{}'. \
Reply with the translated word only, no punctuation or commentary.",
                this.target_language
            );
            let reply = this.chat(Some(system), word).await?;
            Ok(reply.trim().to_string())
        })
    }

    fn destroy(&self) -> ModelFuture<()> {
        // The HTTP backend holds no server-side session state.
        Box::pin(async { Ok(()) })
    }
}

impl RemoteSession {
    fn clone_parts(&self) -> RemoteSession {
        RemoteSession {
            endpoint: self.endpoint.clone(),
            key: self.key.clone(),
            model: self.model.clone(),
            target_language: self.target_language.clone(),
            client: self.client.clone(),
        }
    }
}

fn parse_availability(body: &str, model: &str) -> Availability {
    #[derive(Deserialize)]
    struct ModelList {
        #[serde(default)]
        data: Vec<ModelEntry>,
    }

    #[derive(Deserialize)]
    struct ModelEntry {
        id: String,
    }

    let Ok(parsed) = serde_json::from_str::<ModelList>(body) else {
        return Availability::Unavailable;
    };
    if parsed.data.iter().any(|entry| entry.id == model) {
        Availability::Available
    } else {
        // The endpoint answers but would have to pull the model first.
        Availability::Downloadable
    }
}

fn extract_content(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        content: Option<String>,
    }

    let parsed: ChatResponse =
        serde_json::from_str(body).with_context(|| "failed to parse model response JSON")?;
    let content = parsed
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .ok_or_else(|| anyhow!("model response contained no message content"))?;
    Ok(content)
}
