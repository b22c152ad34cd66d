//! Collaborators supplied by the session-tracking host.
//!
//! The host owns the play session, the session log and the list of
//! notification plugins. The reporter only sees them through these traits.

use std::sync::Arc;

use crate::integrations::NotificationService;

/// Identifier plugin whose sessions carry RetroAchievements-compatible apps.
pub const SUPPORTED_IDENTIFIER: &str = "RetroarchIdentifierPlugin";

/// The application a session is tracking, and how the host recognised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserApp {
    /// Display name, used in report headers.
    pub app: String,
    /// Name of the host plugin that identified the app.
    pub identifier_plugin: String,
}

impl UserApp {
    pub fn new(app: impl Into<String>, identifier_plugin: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            identifier_plugin: identifier_plugin.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.identifier_plugin == SUPPORTED_IDENTIFIER
    }
}

/// One play session as seen by the host.
pub trait PlaySession: Send + Sync {
    /// Stable identifier, used for event keys and persisted state.
    fn id(&self) -> &str;

    fn user_app(&self) -> &UserApp;

    /// Append a status line to the session log.
    fn add_status_update(&self, text: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Application-wide state the reporter consults between cycles.
pub trait Host: Send + Sync {
    /// False once the host is shutting down.
    fn is_running(&self) -> bool;

    /// Id of the session the host currently considers active, if any.
    fn active_session_id(&self) -> Option<String>;

    /// Registered plugins able to forward status text.
    fn notification_services(&self) -> Vec<Arc<dyn NotificationService>>;
}
