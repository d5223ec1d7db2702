//! Subscription bookkeeping for restoration after reconnect

use cody_types::{Feed, MessageType, StreamMessage};
use std::collections::{BTreeMap, BTreeSet};

/// Tracks which symbols are subscribed on which feed
///
/// Outbound Add/Remove frames are applied after they were written. On
/// every new connection the session replays one subscribe frame per
/// feed that still has symbols.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionManager {
    active: BTreeMap<Feed, BTreeSet<String>>,
}

impl SubscriptionManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the effect of an outbound frame; heartbeats are ignored
    pub fn apply(&mut self, message: &StreamMessage) {
        let Some(feed) = message.msg_type.feed() else {
            return;
        };

        if message.msg_type.is_subscribe() {
            self.active
                .entry(feed)
                .or_default()
                .extend(message.symbols.iter().cloned());
        } else if message.msg_type.is_unsubscribe() {
            if let Some(symbols) = self.active.get_mut(&feed) {
                for symbol in &message.symbols {
                    symbols.remove(symbol);
                }
                if symbols.is_empty() {
                    self.active.remove(&feed);
                }
            }
        }
    }

    /// Subscribe frames that rebuild the current state under `token`
    pub fn restoration_messages(&self, token: &str) -> Vec<StreamMessage> {
        self.active
            .iter()
            .filter(|(_, symbols)| !symbols.is_empty())
            .map(|(feed, symbols)| StreamMessage::subscribe(token, *feed, symbols.iter().cloned()))
            .collect()
    }

    /// Symbols subscribed on `feed`, sorted
    pub fn symbols(&self, feed: Feed) -> Vec<String> {
        self.active
            .get(&feed)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Total (feed, symbol) pairs
    pub fn count(&self) -> usize {
        self.active.values().map(BTreeSet::len).sum()
    }

    /// Check if nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Check if `symbol` is subscribed on `feed`
    pub fn contains(&self, feed: Feed, symbol: &str) -> bool {
        self.active
            .get(&feed)
            .is_some_and(|symbols| symbols.contains(symbol))
    }

    /// Forget all subscriptions
    pub fn clear(&mut self) {
        self.active.clear();
    }
}

impl Extend<StreamMessage> for SubscriptionManager {
    fn extend<I: IntoIterator<Item = StreamMessage>>(&mut self, iter: I) {
        for message in iter {
            self.apply(&message);
        }
    }
}

/// Check if a frame type changes subscription state
pub fn affects_subscriptions(msg_type: MessageType) -> bool {
    msg_type.is_subscribe() || msg_type.is_unsubscribe()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let mut subs = SubscriptionManager::new();
        subs.apply(&StreamMessage::subscribe("t", Feed::T, ["GARAN", "THYAO"]));
        subs.apply(&StreamMessage::subscribe("t", Feed::D, ["AKBNK"]));
        assert_eq!(subs.count(), 3);

        subs.apply(&StreamMessage::unsubscribe("t", Feed::T, ["GARAN"]));
        assert_eq!(subs.symbols(Feed::T), vec!["THYAO".to_string()]);
        assert!(!subs.contains(Feed::T, "GARAN"));

        subs.apply(&StreamMessage::unsubscribe("t", Feed::D, ["AKBNK"]));
        assert!(subs.symbols(Feed::D).is_empty());
        assert_eq!(subs.count(), 1);
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut subs = SubscriptionManager::new();
        subs.apply(&StreamMessage::subscribe("t", Feed::Y, ["GARAN"]));
        subs.apply(&StreamMessage::subscribe("t", Feed::Y, ["GARAN"]));
        assert_eq!(subs.count(), 1);
    }

    #[test]
    fn test_heartbeat_ignored() {
        let mut subs = SubscriptionManager::new();
        subs.apply(&StreamMessage::heartbeat("t"));
        assert!(subs.is_empty());
        assert!(!affects_subscriptions(MessageType::Heartbeat));
        assert!(affects_subscriptions(MessageType::RemoveY));
    }

    #[test]
    fn test_restoration_uses_new_token() {
        let mut subs = SubscriptionManager::new();
        subs.extend([
            StreamMessage::subscribe("old", Feed::D, ["THYAO", "AKBNK"]),
            StreamMessage::subscribe("old", Feed::T, ["GARAN"]),
        ]);

        let restored = subs.restoration_messages("new");
        assert_eq!(
            restored,
            vec![
                StreamMessage::subscribe("new", Feed::T, ["GARAN"]),
                StreamMessage::subscribe("new", Feed::D, ["AKBNK", "THYAO"]),
            ]
        );

        subs.clear();
        assert!(subs.restoration_messages("new").is_empty());
    }
}
