use crate::BoxFuture;

/// Error returned by a notification service.
pub type NotifyError = Box<dyn std::error::Error + Send + Sync>;

/// Every notification-capable plugin implements this trait.
/// Report text may contain a `{user_name}` placeholder that the service is
/// expected to substitute with its own notion of the user's display name.
pub trait NotificationService: Send + Sync {
    /// Unique identifier (e.g. "discord").
    fn name(&self) -> &str;

    /// Deliver one status message.
    fn notify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), NotifyError>>;
}
