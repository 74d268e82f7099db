use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::settings::ModelSettings;

mod remote;
mod retry;

pub use remote::{RemoteModel, RemoteSession};

pub type ModelFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// What the model boundary reports before a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Ready to serve prompts immediately.
    Available,
    /// Usable, but creating a session triggers a download that needs a
    /// user gesture.
    Downloadable,
    Unavailable,
}

/// Whether the current flow was started by a user gesture. Session creation
/// for a downloadable model is refused without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserActivation {
    Present,
    Absent,
}

impl UserActivation {
    pub fn is_present(&self) -> bool {
        matches!(self, UserActivation::Present)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub target_language: String,
    pub activation: UserActivation,
}

/// The external model boundary: an availability probe plus session creation.
/// Sessions must be released with `destroy` after use.
pub trait LanguageModel: Clone + Send + Sync + 'static {
    type Session: ModelSession;

    fn availability(&self) -> ModelFuture<Availability>;
    fn create_session(&self, options: SessionOptions) -> ModelFuture<Self::Session>;
}

pub trait ModelSession: Send + Sync + 'static {
    /// Free-form text completion. The caller owns parsing of the reply.
    fn prompt(&self, input: String) -> ModelFuture<String>;
    /// Translates a single word into the session's target language.
    fn translate(&self, word: String) -> ModelFuture<String>;
    /// Releases the session. Stateless backends may treat this as a no-op,
    /// but callers invoke it unconditionally.
    fn destroy(&self) -> ModelFuture<()>;
}

/// Returns whether a session may be created given the probed availability.
pub async fn is_ready<M: LanguageModel>(model: &M, activation: UserActivation) -> bool {
    let availability = model
        .availability()
        .await
        .unwrap_or(Availability::Unavailable);
    match availability {
        Availability::Available => true,
        Availability::Downloadable => activation.is_present(),
        Availability::Unavailable => false,
    }
}

/// Stand-in used when no model endpoint is configured; always unavailable,
/// so every pipeline runs on the deterministic fallbacks.
#[derive(Debug, Clone, Default)]
pub struct OfflineModel;

pub struct OfflineSession;

impl LanguageModel for OfflineModel {
    type Session = OfflineSession;

    fn availability(&self) -> ModelFuture<Availability> {
        Box::pin(async { Ok(Availability::Unavailable) })
    }

    fn create_session(&self, _options: SessionOptions) -> ModelFuture<OfflineSession> {
        Box::pin(async { Err(anyhow::anyhow!("no model endpoint configured")) })
    }
}

impl ModelSession for OfflineSession {
    fn prompt(&self, _input: String) -> ModelFuture<String> {
        Box::pin(async { Err(anyhow::anyhow!("no model endpoint configured")) })
    }

    fn translate(&self, _word: String) -> ModelFuture<String> {
        Box::pin(async { Err(anyhow::anyhow!("no model endpoint configured")) })
    }

    fn destroy(&self) -> ModelFuture<()> {
        Box::pin(async { Ok(()) })
    }
}

/// Concrete dispatch over the configured backends.
#[derive(Debug, Clone)]
pub enum ModelImpl {
    Remote(RemoteModel),
    Offline(OfflineModel),
}

pub enum SessionImpl {
    Remote(RemoteSession),
    Offline(OfflineSession),
}

impl ModelImpl {
    /// Builds the remote backend when an endpoint is configured, the offline
    /// stand-in otherwise.
    pub fn from_settings(settings: &ModelSettings) -> Self {
        match RemoteModel::from_settings(settings) {
            Some(remote) => ModelImpl::Remote(remote),
            None => ModelImpl::Offline(OfflineModel),
        }
    }
}

impl LanguageModel for ModelImpl {
    type Session = SessionImpl;

    fn availability(&self) -> ModelFuture<Availability> {
        match self {
            ModelImpl::Remote(model) => model.availability(),
            ModelImpl::Offline(model) => model.availability(),
        }
    }

    fn create_session(&self, options: SessionOptions) -> ModelFuture<SessionImpl> {
        match self {
            ModelImpl::Remote(model) => {
                let fut = model.create_session(options);
                Box::pin(async move { Ok(SessionImpl::Remote(fut.await?)) })
            }
            ModelImpl::Offline(model) => {
                let fut = model.create_session(options);
                Box::pin(async move { Ok(SessionImpl::Offline(fut.await?)) })
            }
        }
    }
}

impl ModelSession for SessionImpl {
    fn prompt(&self, input: String) -> ModelFuture<String> {
        match self {
            SessionImpl::Remote(session) => session.prompt(input),
            SessionImpl::Offline(session) => session.prompt(input),
        }
    }

    fn translate(&self, word: String) -> ModelFuture<String> {
        match self {
            SessionImpl::Remote(session) => session.translate(word),
            SessionImpl::Offline(session) => session.translate(word),
        }
    }

    fn destroy(&self) -> ModelFuture<()> {
        match self {
            SessionImpl::Remote(session) => session.destroy(),
            SessionImpl::Offline(session) => session.destroy(),
        }
    }
}
