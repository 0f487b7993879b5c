use async_trait::async_trait;
use stakewatch_storage::{KeyValueStorage, KeyValueStorageExt, StorageError};
use stakewatch_types::storage::SOCIAL_CHANNELS_KEY;
use stakewatch_types::ChatId;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::channel::{ChannelCredential, SocialChannel, TelegramChannel};
use crate::error::NotifyError;

/// Fan-out of formatted messages to every registered chat.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Attempts every channel; the first failure is returned after all were tried.
    async fn broadcast(&self, message: &str) -> Result<(), NotifyError>;

    fn register_channel(&self, channel: Arc<dyn SocialChannel>) -> Result<(), NotifyError>;

    fn unregister_channel(&self, chat_id: ChatId) -> Result<(), NotifyError>;
}

pub struct Notifier {
    channels: RwLock<Vec<Arc<dyn SocialChannel>>>,
    telegram_api_url: String,
}

impl Notifier {
    pub fn new(telegram_api_url: impl Into<String>) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            telegram_api_url: telegram_api_url.into(),
        }
    }

    /// Restores the channel list persisted under the social channels key.
    ///
    /// An absent or unreadable entry falls back to `fallback`, when given.
    pub fn load(
        store: &dyn KeyValueStorage,
        telegram_api_url: impl Into<String>,
        fallback: Option<ChannelCredential>,
    ) -> Result<Self, NotifyError> {
        let notifier = Self::new(telegram_api_url);

        let credentials = match store.get::<Vec<ChannelCredential>>(SOCIAL_CHANNELS_KEY) {
            Ok(credentials) => credentials,
            Err(e) => {
                match e {
                    StorageError::NotFound => debug!("no persisted channels"),
                    other => warn!(error = %other, "persisted channels unreadable"),
                }
                fallback.into_iter().collect()
            }
        };

        for credential in credentials {
            let chat_id = credential.chat_id();
            let channel = credential.into_channel(&notifier.telegram_api_url)?;
            if let Err(e) = notifier.register_channel(channel) {
                warn!(chat_id, error = %e, "skipping persisted channel");
            }
        }

        info!(channels = notifier.len(), "notifier ready");
        Ok(notifier)
    }

    pub fn register_telegram(&self, token: impl Into<String>, chat_id: ChatId) -> Result<(), NotifyError> {
        let channel = TelegramChannel::new(&self.telegram_api_url, token, chat_id)?;
        self.register_channel(Arc::new(channel))
    }

    pub fn channel_ids(&self) -> Vec<ChatId> {
        self.read().iter().map(|c| c.chat_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Writes the current channel list back to `store`.
    pub fn persist(&self, store: &dyn KeyValueStorage) -> Result<(), NotifyError> {
        let credentials: Vec<ChannelCredential> = self.read().iter().map(|c| c.credential()).collect();
        store.set(SOCIAL_CHANNELS_KEY, &credentials)?;
        store.flush()?;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn SocialChannel>>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notify for Notifier {
    async fn broadcast(&self, message: &str) -> Result<(), NotifyError> {
        // No lock is held across sends.
        let channels: Vec<Arc<dyn SocialChannel>> = self.read().clone();

        let mut first_error = None;
        for channel in channels {
            if let Err(e) = channel.send_message(message).await {
                warn!(chat_id = channel.chat_id(), error = %e, "bot send message error");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn register_channel(&self, channel: Arc<dyn SocialChannel>) -> Result<(), NotifyError> {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let chat_id = channel.chat_id();
        if channels.iter().any(|c| c.chat_id() == chat_id) {
            return Err(NotifyError::AlreadyRegistered(chat_id));
        }
        channels.push(channel);
        info!(chat_id, "channel registered");
        Ok(())
    }

    fn unregister_channel(&self, chat_id: ChatId) -> Result<(), NotifyError> {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let index = channels
            .iter()
            .position(|c| c.chat_id() == chat_id)
            .ok_or(NotifyError::NotFound(chat_id))?;
        channels.remove(index);
        info!(chat_id, "channel unregistered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakewatch_storage::InMemoryStorage;
    use std::sync::Mutex;

    struct MockChannel {
        chat_id: ChatId,
        fail: bool,
        sent: Mutex<Vec<String>>,
    }

    impl MockChannel {
        fn new(chat_id: ChatId, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                chat_id,
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SocialChannel for MockChannel {
        fn chat_id(&self) -> ChatId {
            self.chat_id
        }

        fn credential(&self) -> ChannelCredential {
            ChannelCredential::Telegram {
                token: format!("token-{}", self.chat_id),
                chat_id: self.chat_id,
            }
        }

        async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(NotifyError::Telegram {
                    code: 403,
                    description: format!("bot kicked from {}", self.chat_id),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_channel() {
        let notifier = Notifier::new("http://telegram.invalid");
        let first = MockChannel::new(1, false);
        let second = MockChannel::new(2, false);
        notifier.register_channel(first.clone()).unwrap();
        notifier.register_channel(second.clone()).unwrap();

        notifier.broadcast("hello").await.unwrap();
        assert_eq!(first.sent(), vec!["hello"]);
        assert_eq!(second.sent(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_broadcast_returns_first_error_but_tries_all() {
        let notifier = Notifier::new("http://telegram.invalid");
        let failing = MockChannel::new(1, true);
        let also_failing = MockChannel::new(2, true);
        let healthy = MockChannel::new(3, false);
        notifier.register_channel(failing.clone()).unwrap();
        notifier.register_channel(also_failing.clone()).unwrap();
        notifier.register_channel(healthy.clone()).unwrap();

        let result = notifier.broadcast("hello").await;
        assert!(matches!(result, Err(NotifyError::Telegram { ref description, .. }) if description.ends_with(" 1")));
        assert_eq!(also_failing.sent().len(), 1);
        assert_eq!(healthy.sent().len(), 1);
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let notifier = Notifier::new("http://telegram.invalid");
        notifier.register_channel(MockChannel::new(5, false)).unwrap();
        assert!(matches!(
            notifier.register_channel(MockChannel::new(5, false)),
            Err(NotifyError::AlreadyRegistered(5))
        ));
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn test_unregister_unknown_is_not_found() {
        let notifier = Notifier::new("http://telegram.invalid");
        notifier.register_channel(MockChannel::new(5, false)).unwrap();

        assert!(matches!(notifier.unregister_channel(6), Err(NotifyError::NotFound(6))));
        notifier.unregister_channel(5).unwrap();
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_load_falls_back_when_absent() {
        let store = InMemoryStorage::new();
        let fallback = ChannelCredential::Telegram {
            token: "t".to_string(),
            chat_id: -1001,
        };
        let notifier = Notifier::load(&store, "http://telegram.invalid", Some(fallback)).unwrap();
        assert_eq!(notifier.channel_ids(), vec![-1001]);
    }

    #[test]
    fn test_load_falls_back_when_unreadable() {
        let store = InMemoryStorage::new();
        store.set_raw(SOCIAL_CHANNELS_KEY, vec![0xff, 0x00]).unwrap();
        let notifier = Notifier::load(&store, "http://telegram.invalid", None).unwrap();
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_persist_then_load() {
        let store = InMemoryStorage::new();
        let notifier = Notifier::new("http://telegram.invalid");
        notifier.register_telegram("a", 10).unwrap();
        notifier.register_telegram("b", 20).unwrap();
        notifier.persist(&store).unwrap();

        let fallback = ChannelCredential::Telegram {
            token: "ignored".to_string(),
            chat_id: 99,
        };
        let restored = Notifier::load(&store, "http://telegram.invalid", Some(fallback)).unwrap();
        assert_eq!(restored.channel_ids(), vec![10, 20]);
    }
}
