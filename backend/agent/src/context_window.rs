//! History trimming for memory-aware stages.

use concierge_core::{Message, Role};

pub struct ContextWindow {
    pub messages: Vec<Message>,
    /// Messages left out of the window.
    pub dropped: usize,
}

impl ContextWindow {
    /// Keep the last `max_messages` messages of `history`.
    ///
    /// The window never opens on an assistant message, so the model always
    /// sees a turn from its start.
    pub fn build(history: &[Message], max_messages: usize) -> Self {
        let mut start = history.len().saturating_sub(max_messages);
        while start < history.len() && history[start].role == Role::Assistant {
            start += 1;
        }

        Self {
            messages: history[start..].to_vec(),
            dropped: start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(turns: usize) -> Vec<Message> {
        (0..turns)
            .flat_map(|i| [Message::user(format!("q{i}")), Message::assistant(format!("a{i}"))])
            .collect()
    }

    #[test]
    fn test_short_history_is_kept_whole() {
        let window = ContextWindow::build(&history(2), 10);
        assert_eq!(window.messages.len(), 4);
        assert_eq!(window.dropped, 0);
    }

    #[test]
    fn test_window_starts_on_user_message() {
        let window = ContextWindow::build(&history(5), 5);
        assert_eq!(window.messages.len(), 4);
        assert_eq!(window.messages[0], Message::user("q3"));
        assert_eq!(window.dropped, 6);
    }

    #[test]
    fn test_zero_window_is_empty() {
        let window = ContextWindow::build(&history(3), 0);
        assert!(window.messages.is_empty());
        assert_eq!(window.dropped, 6);
    }
}
