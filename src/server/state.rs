use std::sync::Mutex;
use tokio::sync::broadcast;

use super::models::LogWordRequest;
use crate::settings::{SettingsStore, UserSettings};

/// How many logged words are kept for the recent-words listing.
const LOGGED_WORDS_CAP: usize = 200;

pub(crate) struct ServerState {
    pub(crate) store: SettingsStore,
    pub(crate) changes: broadcast::Sender<UserSettings>,
    pub(crate) logged_words: Mutex<Vec<LogWordRequest>>,
}

impl ServerState {
    pub(crate) fn new(store: SettingsStore) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            store,
            changes,
            logged_words: Mutex::new(Vec::new()),
        }
    }

    /// Fans a settings change out to every subscribed page context.
    pub(crate) fn broadcast(&self, settings: &UserSettings) {
        // No subscribers is fine; the broadcast is fire-and-forget.
        let _ = self.changes.send(settings.clone());
    }

    pub(crate) fn record_logged_word(&self, entry: LogWordRequest) {
        let Ok(mut words) = self.logged_words.lock() else {
            return;
        };
        words.push(entry);
        let len = words.len();
        if len > LOGGED_WORDS_CAP {
            words.drain(..len - LOGGED_WORDS_CAP);
        }
    }
}
