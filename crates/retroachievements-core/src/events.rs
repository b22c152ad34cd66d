use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::BoxFuture;

/// Session lifecycle signals emitted by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    GameStart { session_id: String },
    GameEnd { session_id: String },
}

impl SessionEvent {
    pub fn game_start_key(session_id: &str) -> String {
        format!("<<GameStart{session_id}>>")
    }

    pub fn game_end_key(session_id: &str) -> String {
        format!("<<GameEnd{session_id}>>")
    }

    /// Key handlers subscribe to.
    pub fn key(&self) -> String {
        match self {
            SessionEvent::GameStart { session_id } => Self::game_start_key(session_id),
            SessionEvent::GameEnd { session_id } => Self::game_end_key(session_id),
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::GameStart { session_id } | SessionEvent::GameEnd { session_id } => {
                session_id
            }
        }
    }
}

type Handler = Arc<dyn Fn(SessionEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// String-keyed event dispatch. Handlers for a key run in subscription order.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `key`. Existing handlers are kept.
    pub fn subscribe<F, Fut>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(SessionEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: Handler =
            Arc::new(move |event| -> BoxFuture<'static, ()> { Box::pin(handler(event)) });
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(key.into())
            .or_default()
            .push(boxed);
    }

    /// Run every handler subscribed to the event's key. Returns how many ran.
    pub async fn emit(&self, event: SessionEvent) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&event.key())
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(event.clone()).await;
        }
        handlers.len()
    }

    pub fn handler_count(&self, key: &str) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .map_or(0, Vec::len)
    }
}
