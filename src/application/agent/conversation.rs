use crate::types::ChatMessage;

/// Leading messages that truncation never drops (system/task framing).
pub const PINNED_MESSAGES: usize = 2;
pub const DEFAULT_MAX_MESSAGES: usize = 40;

/// Ordered message history owned by a single agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Owned copy handed to background writers.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    /// Drops the middle of the history once it exceeds `max_messages`.
    ///
    /// Keeps the first [`PINNED_MESSAGES`] entries and the most recent
    /// `max_messages - PINNED_MESSAGES - 1`, leaving one slot for the model
    /// reply that follows. Returns how many messages were removed.
    pub fn truncate(&mut self, max_messages: usize) -> usize {
        if self.messages.len() <= max_messages {
            return 0;
        }
        let pinned = PINNED_MESSAGES.min(max_messages);
        let tail = max_messages.saturating_sub(pinned + 1);
        let cut_end = self.messages.len() - tail;
        self.messages.drain(pinned..cut_end).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> Conversation {
        Conversation::from_messages(
            (0..count)
                .map(|n| ChatMessage::user(format!("message {n}")))
                .collect(),
        )
    }

    fn labels(conversation: &Conversation) -> Vec<String> {
        conversation.messages().iter().map(ChatMessage::render).collect()
    }

    #[test]
    fn keeps_pinned_head_and_recent_tail() {
        let mut conversation = numbered(15);
        let removed = conversation.truncate(10);

        let mut expected = vec!["message 0".to_string(), "message 1".to_string()];
        expected.extend((8..15).map(|n| format!("message {n}")));
        assert_eq!(labels(&conversation), expected);
        assert_eq!(removed, 6);
    }

    #[test]
    fn within_bound_is_untouched() {
        let mut conversation = numbered(10);
        assert_eq!(conversation.truncate(10), 0);
        assert_eq!(conversation.len(), 10);
    }

    #[test]
    fn tiny_bounds_keep_only_the_pinned_head() {
        let mut conversation = numbered(6);
        conversation.truncate(2);
        assert_eq!(labels(&conversation), vec!["message 0", "message 1"]);

        let mut conversation = numbered(6);
        conversation.truncate(1);
        assert_eq!(labels(&conversation), vec!["message 0"]);
    }
}
