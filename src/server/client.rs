use serde_json::json;
use tracing::debug;

/// Liveness check against a running settings server.
pub async fn ping(base: &str) -> bool {
    let url = format!("{}/ping", base.trim_end_matches('/'));
    match reqwest::Client::new().get(url).send().await {
        Ok(response) => response.status().is_success(),
        Err(err) => {
            debug!("settings server ping failed: {}", err);
            false
        }
    }
}

/// Best-effort word log post; failures are diagnostics only.
pub async fn post_log_word(base: &str, original: &str, translated: &str) {
    let url = format!("{}/log-word", base.trim_end_matches('/'));
    let body = json!({
        "originalWord": original,
        "translatedWord": translated,
    });
    if let Err(err) = reqwest::Client::new().post(url).json(&body).send().await {
        debug!("failed to post word log: {}", err);
    }
}
