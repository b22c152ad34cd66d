pub mod discord;
pub mod traits;

pub use discord::DiscordNotifier;
pub use traits::{NotificationService, NotifyError};
