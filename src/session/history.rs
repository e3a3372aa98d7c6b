//! Conversation history held by a session.

use crate::store::{Role, StoredMessage};

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Entry {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<StoredMessage> for Entry {
    fn from(row: StoredMessage) -> Self {
        Self {
            role: row.role,
            content: row.content,
        }
    }
}

/// Ordered history; insertion order is conversation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<Entry>,
}

impl History {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// History built from stored rows, keeping their order.
    pub fn from_rows(rows: impl IntoIterator<Item = StoredMessage>) -> Self {
        Self {
            entries: rows.into_iter().map(Entry::from).collect(),
        }
    }

    /// Append one entry.
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Append a user input and the reply to it.
    pub fn push_exchange(&mut self, input: impl Into<String>, response: impl Into<String>) {
        self.entries.push(Entry::user(input));
        self.entries.push(Entry::assistant(response));
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Iterate over entries, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_exchange_order() {
        let mut history = History::new();
        history.push_exchange("hi", "שלום");
        history.push_exchange("again", "שוב");

        let roles: Vec<Role> = history.iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(history.entries()[3].content, "שוב");

        history.clear();
        assert!(history.is_empty());
    }
}
