//! Rolling buffer of recently typed characters and suffix matching

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace};

use super::table::{HotstringEntry, PatternTable};
use crate::keyboard::BACKSPACE;

/// Which entry wins when several patterns end the buffer at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// The entry inserted first into the table
    #[default]
    FirstInserted,
    /// The longest matching pattern
    Longest,
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::FirstInserted => write!(f, "first"),
            MatchPolicy::Longest => write!(f, "longest"),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first-inserted" => Ok(MatchPolicy::FirstInserted),
            "longest" => Ok(MatchPolicy::Longest),
            other => Err(format!(
                "unknown match policy {other:?} (expected \"first\" or \"longest\")"
            )),
        }
    }
}

/// Bounded history of the most recently typed characters
#[derive(Debug, Clone)]
pub struct RollingMatchBuffer {
    chars: VecDeque<char>,
    capacity: usize,
}

impl RollingMatchBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            chars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Apply one typed character
    ///
    /// Backspace removes the newest character (nothing if empty), any
    /// other character is appended and the oldest is evicted past capacity.
    pub fn push(&mut self, ch: char) {
        if ch == BACKSPACE {
            self.chars.pop_back();
            return;
        }
        if self.capacity == 0 {
            return;
        }
        if self.chars.len() == self.capacity {
            self.chars.pop_front();
        }
        self.chars.push_back(ch);
    }

    pub fn clear(&mut self) {
        self.chars.clear();
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffer contents, oldest character first
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }
}

/// A pattern that fired and the text that replaces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub pattern: String,
    /// Characters to erase
    pub pattern_len: usize,
    /// Replacement text, not yet line-ending normalized
    pub text: String,
}

/// Pattern table plus the rolling buffer it is matched against
#[derive(Debug)]
pub struct Matcher {
    table: PatternTable,
    buffer: RollingMatchBuffer,
    policy: MatchPolicy,
}

impl Matcher {
    /// Create a matcher whose buffer holds the longest pattern in `table`
    pub fn new(table: PatternTable, policy: MatchPolicy) -> Self {
        let buffer = RollingMatchBuffer::new(table.max_pattern_len());
        Self {
            table,
            buffer,
            policy,
        }
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &RollingMatchBuffer {
        &self.buffer
    }

    /// Feed one typed character; returns the expansion if a pattern fired
    ///
    /// A match clears the whole buffer.
    pub fn feed(&mut self, ch: char) -> Option<Expansion> {
        self.buffer.push(ch);
        let typed = self.buffer.as_string();

        let entry = self.find(&typed)?;
        let expansion = Expansion {
            pattern: entry.pattern().to_string(),
            pattern_len: entry.len(),
            text: entry.action().expansion(),
        };
        debug!(
            pattern = %expansion.pattern,
            erase = expansion.pattern_len,
            expansion_len = expansion.text.chars().count(),
            "hotstring matched"
        );
        self.buffer.clear();
        Some(expansion)
    }

    fn find(&self, typed: &str) -> Option<&HotstringEntry> {
        let mut matching = self.table.iter().filter(|e| typed.ends_with(e.pattern()));
        let found = match self.policy {
            MatchPolicy::FirstInserted => matching.next(),
            MatchPolicy::Longest => matching.max_by_key(|e| e.len()),
        };
        if found.is_none() {
            trace!(buffered = self.buffer.len(), "no hotstring match");
        }
        found
    }
}
