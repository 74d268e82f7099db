use anyhow::Result;
use kuchiki::NodeRef;
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dom;
use crate::events::PageEvent;
use crate::extract;
use crate::languages::LanguageRegistry;
use crate::model::{LanguageModel, ModelSession, SessionOptions, UserActivation, is_ready};
use crate::prompts;
use crate::select;
use crate::server::client;
use crate::settings::{SettingsPatch, UserSettings};
use crate::speech;
use crate::translate;

/// Quiet period required after the last page mutation before a new
/// replacement pass is considered.
const MUTATION_QUIET_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Processing,
    Processed,
}

/// Drives the replacement pipeline for one document: extraction, word
/// selection, translation and substitution, plus the interaction
/// side-channel. At most one pass runs at a time; triggers that arrive
/// while a pass is running are dropped, not queued.
pub struct PageController<M: LanguageModel> {
    document: NodeRef,
    model: M,
    registry: LanguageRegistry,
    settings: RefCell<UserSettings>,
    state: Cell<ControllerState>,
    activation: UserActivation,
    mutation_deadline: Cell<Option<Instant>>,
    events: mpsc::UnboundedSender<PageEvent>,
    log_endpoint: Option<String>,
}

impl<M: LanguageModel> PageController<M> {
    pub fn new(
        document: NodeRef,
        model: M,
        settings: UserSettings,
        activation: UserActivation,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PageEvent>)> {
        let registry = LanguageRegistry::load()?;
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            document,
            model,
            registry,
            settings: RefCell::new(settings),
            state: Cell::new(ControllerState::Idle),
            activation,
            mutation_deadline: Cell::new(None),
            events,
            log_endpoint: None,
        };
        Ok((controller, receiver))
    }

    /// Endpoint the best-effort word log is posted to.
    pub fn with_log_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.log_endpoint = Some(endpoint.into());
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state.get()
    }

    pub fn settings(&self) -> UserSettings {
        self.settings.borrow().clone()
    }

    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    /// Runs one replacement pass. Returns whether a pass actually ran: a
    /// trigger while disabled or while another pass is running is a no-op.
    pub async fn trigger(&self) -> bool {
        if !self.settings.borrow().is_enabled {
            debug!("replacement disabled; ignoring trigger");
            return false;
        }
        if self.state.get() == ControllerState::Processing {
            debug!("replacement pass already running; dropping trigger");
            return false;
        }
        if self.state.get() == ControllerState::Processed {
            dom::remove_replacements(&self.document);
        }

        self.state.set(ControllerState::Processing);
        match self.run_pipeline().await {
            Ok(count) => {
                info!("replaced {} words", count);
                self.state.set(ControllerState::Processed);
                true
            }
            Err(err) => {
                error!("replacement pass failed: {}", err);
                // Strip anything a partial pass may have left behind.
                dom::remove_replacements(&self.document);
                self.state.set(ControllerState::Idle);
                false
            }
        }
    }

    /// Applies a settings change. Disabling restores the page and goes
    /// idle; any other change on an enabled page re-runs the pipeline.
    pub async fn on_settings_changed(&self, patch: &SettingsPatch) {
        let merged = self.settings.borrow().merged(patch);
        *self.settings.borrow_mut() = merged.clone();

        if !merged.is_enabled {
            if self.state.get() == ControllerState::Processed {
                dom::remove_replacements(&self.document);
            }
            self.state.set(ControllerState::Idle);
            return;
        }
        self.trigger().await;
    }

    /// Records page-mutation activity. Mutations on an already processed
    /// page are ignored so the controller does not react to its own edits.
    pub fn notify_mutation(&self) {
        if self.state.get() == ControllerState::Processed {
            debug!("page already processed; ignoring mutation");
            return;
        }
        self.mutation_deadline
            .set(Some(Instant::now() + MUTATION_QUIET_PERIOD));
    }

    /// Waits for the mutation quiet period and runs the pipeline once it
    /// has passed. New activity while waiting resets the timer. Returns
    /// whether a pass ran.
    pub async fn flush_mutations(&self) -> bool {
        let mut fired = false;
        while let Some(deadline) = self.mutation_deadline.get() {
            tokio::time::sleep_until(deadline).await;
            if self.mutation_deadline.get() == Some(deadline) {
                self.mutation_deadline.set(None);
                fired = self.trigger().await;
            }
        }
        fired
    }

    async fn run_pipeline(&self) -> Result<usize> {
        let settings = self.settings.borrow().clone();
        let text = dom::visible_text(&self.document);
        let candidates = extract::candidate_words(&text);
        if candidates.is_empty() {
            debug!("no candidate words; nothing to do");
            return Ok(0);
        }

        let label = self.language_label(&settings.target_language);
        let chosen = select::select_words(
            &self.model,
            &candidates,
            settings.difficulty,
            &settings.target_language,
            &label,
            self.activation,
        )
        .await;
        if chosen.is_empty() {
            return Ok(0);
        }

        let map = translate::translate_words(
            &self.model,
            &chosen,
            &settings.target_language,
            self.activation,
        )
        .await;
        Ok(dom::apply_replacements(
            &self.document,
            &map,
            &settings.target_language,
        ))
    }

    /// Hover over a marker: publish a tooltip event with both words and
    /// the pointer position.
    pub fn hover_marker(&self, marker: &NodeRef, x: f64, y: f64) {
        let Some((original, translation)) = dom::marker_words(marker) else {
            return;
        };
        self.publish(PageEvent::TooltipShow {
            original,
            translation,
            x,
            y,
        });
    }

    pub fn hover_end(&self) {
        self.publish(PageEvent::TooltipHide);
    }

    /// Click on a marker: produce an example sentence (model-backed with a
    /// static fallback), pronounce the translation, and log the word.
    /// Speech and logging are fire-and-forget.
    pub async fn activate_marker(&self, marker: &NodeRef) -> Option<String> {
        let (original, translation) = dom::marker_words(marker)?;
        let settings = self.settings.borrow().clone();
        let context = dom::surrounding_text(marker);

        let example = self
            .example_sentence(&original, &translation, &settings, &context)
            .await;

        let spoken = translation.clone();
        let language = settings.target_language.clone();
        tokio::spawn(async move {
            if let Err(err) = speech::speak_word(&spoken, &language).await {
                warn!("speech synthesis failed: {}", err);
            }
        });

        if let Some(endpoint) = self.log_endpoint.clone() {
            let (logged_original, logged_translation) = (original.clone(), translation.clone());
            tokio::spawn(async move {
                client::post_log_word(&endpoint, &logged_original, &logged_translation).await;
            });
        }

        self.publish(PageEvent::WordActivated {
            original,
            translation,
            example: example.clone(),
        });
        Some(example)
    }

    async fn example_sentence(
        &self,
        original: &str,
        translation: &str,
        settings: &UserSettings,
        context: &str,
    ) -> String {
        let label = self.language_label(&settings.target_language);
        match self
            .model_example(original, translation, settings, &label, context)
            .await
        {
            Some(sentence) if !sentence.trim().is_empty() => sentence.trim().to_string(),
            _ => format!("\"{}\" is {} for \"{}\".", translation, label, original),
        }
    }

    async fn model_example(
        &self,
        original: &str,
        translation: &str,
        settings: &UserSettings,
        label: &str,
        context: &str,
    ) -> Option<String> {
        if !is_ready(&self.model, self.activation).await {
            return None;
        }
        let prompt = match prompts::render_example_prompt(original, translation, label, context) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!("failed to render example prompt: {}", err);
                return None;
            }
        };
        let session = match self
            .model
            .create_session(SessionOptions {
                target_language: settings.target_language.clone(),
                activation: self.activation,
            })
            .await
        {
            Ok(session) => session,
            Err(err) => {
                debug!("model session unavailable for example sentence: {}", err);
                return None;
            }
        };
        let reply = session.prompt(prompt).await;
        if let Err(err) = session.destroy().await {
            debug!("failed to release example session: {}", err);
        }
        match reply {
            Ok(sentence) => Some(sentence),
            Err(err) => {
                warn!("example sentence generation failed: {}", err);
                None
            }
        }
    }

    fn language_label(&self, code: &str) -> String {
        self.registry
            .language_name(code)
            .unwrap_or_else(|| code.to_string())
    }

    fn publish(&self, event: PageEvent) {
        // Nobody listening is fine; events are advisory.
        let _ = self.events.send(event);
    }
}
