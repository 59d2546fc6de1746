//! Status and notification store.
//!
//! Holds the single status record shown to the user plus a one-slot
//! snackbar. Every change is broadcast so that views (the CLI, the SSE
//! endpoint) can follow along instead of polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Error field of the status record.
///
/// Either no error, a bare flag, or an error text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorFlag {
    #[default]
    None,
    Flag(bool),
    Text(String),
}

impl ErrorFlag {
    pub fn is_set(&self) -> bool {
        match self {
            ErrorFlag::None => false,
            ErrorFlag::Flag(set) => *set,
            ErrorFlag::Text(text) => !text.is_empty(),
        }
    }
}

/// Title and description of the status panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub title: String,
    pub description: String,
    /// Optional link, usually the block explorer page of the transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl StatusMessage {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// The status record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusState {
    /// Loading text; `None` or empty means idle
    pub is_loading: Option<String>,
    pub is_error: ErrorFlag,
    pub is_message: bool,
    pub message: StatusMessage,
}

impl StatusState {
    /// Whether something is in flight.
    pub fn is_loading(&self) -> bool {
        self.is_loading.as_deref().is_some_and(|text| !text.is_empty())
    }
}

/// Snackbar severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnackbarKind {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient notification. Only one is ever visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snackbar {
    #[serde(rename = "type")]
    pub kind: SnackbarKind,
    pub open: bool,
    pub message: String,
}

impl Default for Snackbar {
    fn default() -> Self {
        Self {
            kind: SnackbarKind::Success,
            open: false,
            message: String::new(),
        }
    }
}

/// Change notification sent to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StatusEvent {
    Status {
        state: StatusState,
        at: DateTime<Utc>,
    },
    Snackbar {
        snackbar: Snackbar,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    state: StatusState,
    snackbar: Snackbar,
}

/// Shared status store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<RwLock<Inner>>,
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusStore {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            sender,
        }
    }

    /// Current status record.
    pub fn snapshot(&self) -> StatusState {
        self.read().state.clone()
    }

    /// Current snackbar.
    pub fn snackbar(&self) -> Snackbar {
        self.read().snackbar.clone()
    }

    /// Replace the status record.
    pub fn set(&self, state: StatusState) {
        self.update(|current| *current = state);
    }

    /// Modify the status record in place.
    pub fn update(&self, f: impl FnOnce(&mut StatusState)) {
        let state = {
            let mut inner = self.write();
            f(&mut inner.state);
            inner.state.clone()
        };
        self.publish(StatusEvent::Status {
            state,
            at: Utc::now(),
        });
    }

    /// Atomically check that nothing is loading, then apply `f`.
    ///
    /// Returns `false` without touching the record when a job is in flight.
    pub fn begin(&self, f: impl FnOnce(&mut StatusState)) -> bool {
        let state = {
            let mut inner = self.write();
            if inner.state.is_loading() {
                return false;
            }
            f(&mut inner.state);
            inner.state.clone()
        };
        self.publish(StatusEvent::Status {
            state,
            at: Utc::now(),
        });
        true
    }

    /// Back to defaults.
    pub fn reset(&self) {
        self.set(StatusState::default());
    }

    /// Show a notification, replacing any visible one.
    pub fn show_snackbar(&self, kind: SnackbarKind, message: impl Into<String>) {
        self.set_snackbar(Snackbar {
            kind,
            open: true,
            message: message.into(),
        });
    }

    pub fn close_snackbar(&self) {
        let mut snackbar = self.snackbar();
        snackbar.open = false;
        self.set_snackbar(snackbar);
    }

    /// A new job may start.
    pub fn can_submit(&self) -> bool {
        !self.snapshot().is_loading()
    }

    /// Receiver for change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    fn set_snackbar(&self, snackbar: Snackbar) {
        self.write().snackbar = snackbar.clone();
        self.publish(StatusEvent::Snackbar {
            snackbar,
            at: Utc::now(),
        });
    }

    // A panic inside an update closure must not freeze the banner.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: StatusEvent) {
        log::trace!("status event: {:?}", event);
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_is_truthy_only_when_non_empty() {
        let mut state = StatusState::default();
        assert!(!state.is_loading());
        state.is_loading = Some(String::new());
        assert!(!state.is_loading());
        state.is_loading = Some("Submitting".into());
        assert!(state.is_loading());
    }

    #[test]
    fn test_error_flag() {
        assert!(!ErrorFlag::None.is_set());
        assert!(ErrorFlag::Flag(true).is_set());
        assert!(!ErrorFlag::Flag(false).is_set());
        assert!(ErrorFlag::Text("Web3 not available".into()).is_set());
    }

    #[test]
    fn test_snackbar_replaces_previous() {
        let store = StatusStore::new();
        store.show_snackbar(SnackbarKind::Success, "first");
        store.show_snackbar(SnackbarKind::Error, "second");

        let snackbar = store.snackbar();
        assert!(snackbar.open);
        assert_eq!(snackbar.kind, SnackbarKind::Error);
        assert_eq!(snackbar.message, "second");

        store.close_snackbar();
        assert!(!store.snackbar().open);
        assert_eq!(store.snackbar().message, "second");
    }

    #[test]
    fn test_begin_rejects_while_loading() {
        let store = StatusStore::new();
        assert!(store.begin(|s| s.is_loading = Some("job one".into())));
        assert!(!store.can_submit());
        assert!(!store.begin(|s| s.is_loading = Some("job two".into())));
        assert_eq!(store.snapshot().is_loading.as_deref(), Some("job one"));

        store.reset();
        assert!(store.can_submit());
    }

    #[test]
    fn test_store_survives_panicking_update() {
        let store = StatusStore::new();
        store.update(|s| s.is_loading = Some("Submitting".into()));

        let handle = store.clone();
        let result = std::thread::spawn(move || {
            handle.update(|_| panic!("update failed"));
        })
        .join();
        assert!(result.is_err());
        assert!(store.inner.is_poisoned());

        assert_eq!(store.snapshot().is_loading.as_deref(), Some("Submitting"));
        assert!(!store.begin(|s| s.is_loading = Some("again".into())));
        store.reset();
        assert!(store.can_submit());
        store.show_snackbar(SnackbarKind::Info, "still here");
        assert_eq!(store.snackbar().message, "still here");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_in_order() {
        let store = StatusStore::new();
        let mut rx = store.subscribe();

        store.update(|s| s.is_loading = Some("one".into()));
        store.show_snackbar(SnackbarKind::Info, "hello");
        store.update(|s| s.is_loading = None);

        match rx.recv().await.unwrap() {
            StatusEvent::Status { state, .. } => assert_eq!(state.is_loading.as_deref(), Some("one")),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            StatusEvent::Snackbar { snackbar, .. } => assert_eq!(snackbar.message, "hello"),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            StatusEvent::Status { state, .. } => assert!(!state.is_loading()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_status_json_shape() {
        let state = StatusState {
            is_loading: None,
            is_error: ErrorFlag::Text("Web3 not available".into()),
            is_message: true,
            message: StatusMessage::new("Web3 not available", "install a wallet"),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isError"], "Web3 not available");
        assert_eq!(json["isMessage"], true);
        assert!(json["message"].get("link").is_none());
    }
}
