use anyhow::{Context, Result, anyhow};
use std::path::Path;

pub mod controller;
pub mod dom;
pub mod events;
pub mod extract;
pub mod languages;
pub mod logging;
pub mod model;
pub mod prompts;
pub mod select;
pub mod server;
pub mod settings;
pub mod speech;
pub mod translate;

use controller::PageController;
use model::{ModelImpl, UserActivation};
use settings::SettingsStore;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub lang: Option<String>,
    pub difficulty: Option<String>,
    pub input: Option<String>,
    pub revert: bool,
    pub serve: Option<String>,
    pub ping: Option<String>,
    pub model_endpoint: Option<String>,
    pub model_name: Option<String>,
    pub model_key: Option<String>,
    pub log_endpoint: Option<String>,
    pub settings_path: Option<String>,
    pub show_languages: bool,
    pub verbose: bool,
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let store = SettingsStore::open(config.settings_path.as_deref().map(Path::new))?;
    let registry = languages::LanguageRegistry::load()?;

    if config.show_languages {
        let lines = registry
            .all()
            .into_iter()
            .map(|(code, name)| format!("{}\t{}", code, name))
            .collect::<Vec<_>>();
        return Ok(lines.join("\n"));
    }

    if let Some(addr) = config.serve {
        server::run_server(store, addr).await?;
        return Ok(String::new());
    }

    if let Some(base) = config.ping {
        let alive = server::client::ping(&base).await;
        return Ok(if alive { "ok" } else { "unreachable" }.to_string());
    }

    let html = match config.input.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input page: {}", path))?,
        None => input.ok_or_else(|| anyhow!("no input page (pass --input or pipe HTML)"))?,
    };
    if html.trim().is_empty() {
        return Err(anyhow!("input page is empty"));
    }

    let document = dom::parse_document(&html);
    if config.revert {
        dom::remove_replacements(&document);
        return Ok(document.to_string());
    }

    let mut settings = store.get();
    if let Some(lang) = config.lang.as_deref() {
        let lang = lang.trim().to_lowercase();
        if !registry.is_supported(&lang) {
            return Err(anyhow!("unsupported target language '{}'", lang));
        }
        settings.target_language = lang;
    }
    if let Some(difficulty) = config.difficulty.as_deref() {
        settings.difficulty = difficulty.parse()?;
    }

    if !settings.is_enabled {
        tracing::info!("replacement is disabled; returning the page unchanged");
        return Ok(html);
    }

    let mut model_settings = store.model_settings();
    if let Some(endpoint) = config.model_endpoint {
        model_settings.endpoint = Some(endpoint);
    }
    if let Some(name) = config.model_name {
        model_settings.name = Some(name);
    }
    if let Some(key) = config.model_key {
        model_settings.key = Some(key);
    }
    let model = ModelImpl::from_settings(&model_settings);

    let (controller, _events) =
        PageController::new(document, model, settings, UserActivation::Present)?;
    let controller = match config.log_endpoint {
        Some(endpoint) => controller.with_log_endpoint(endpoint),
        None => controller,
    };
    controller.trigger().await;
    Ok(controller.document().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> Config {
        Config {
            settings_path: Some(dir.join("settings.toml").display().to_string()),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn processes_a_page_with_fallbacks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run(
            config_in(dir.path()),
            Some("<p>The house is big and the water is cold.</p>".to_string()),
        )
        .await
        .expect("run");
        assert!(output.contains("casa"), "output: {}", output);
        assert!(output.contains("data-original=\"house\""), "output: {}", output);
    }

    #[tokio::test]
    async fn revert_strips_markers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let processed = run(
            config_in(dir.path()),
            Some("<p>The house is big.</p>".to_string()),
        )
        .await
        .expect("run");

        let mut config = config_in(dir.path());
        config.revert = true;
        let reverted = run(config, Some(processed)).await.expect("revert");
        assert!(!reverted.contains("data-original"), "output: {}", reverted);
        assert!(reverted.contains("house"), "output: {}", reverted);
    }

    #[tokio::test]
    async fn disabled_settings_leave_the_page_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::open(Some(&dir.path().join("settings.toml"))).expect("store");
        store
            .update(&settings::SettingsPatch {
                is_enabled: Some(false),
                ..settings::SettingsPatch::default()
            })
            .expect("update");

        let html = "<p>The house is big.</p>".to_string();
        let output = run(config_in(dir.path()), Some(html.clone()))
            .await
            .expect("run");
        assert_eq!(output, html);
    }

    #[tokio::test]
    async fn unsupported_language_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        config.lang = Some("tlh".to_string());
        let err = run(config, Some("<p>house</p>".to_string()))
            .await
            .expect_err("error");
        assert!(err.to_string().contains("unsupported target language"));
    }

    #[tokio::test]
    async fn show_languages_lists_the_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        config.show_languages = true;
        let output = run(config, None).await.expect("run");
        assert!(output.lines().any(|line| line == "es\tSpanish"));
    }
}
