mod channel;
mod error;
mod format;
mod notifier;

pub use channel::{ChannelCredential, SocialChannel, TelegramChannel, DEFAULT_TELEGRAM_API_URL};
pub use error::NotifyError;
pub use format::{MessageFormatter, STARTUP_MESSAGE};
pub use notifier::{Notifier, Notify};
