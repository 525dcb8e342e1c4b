//! Named resource locks with at-most-one-writer semantics (§3, §4.3).

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use super::ids::Id;

/// Who may hold a lock: an agent, or the coordinator itself acting directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    Agent(Id),
    Coordinator,
}

/// State of a single named mutex.
#[derive(Debug, Clone)]
pub struct LockState {
    pub holder: Option<Holder>,
    pub since: Option<DateTime<Utc>>,
    /// Reentrant acquisition count for the current holder.
    pub depth: u32,
    pub waiters: VecDeque<Holder>,
}

impl Default for LockState {
    fn default() -> Self {
        Self {
            holder: None,
            since: None,
            depth: 0,
            waiters: VecDeque::new(),
        }
    }
}

impl LockState {
    /// Try to acquire immediately. Re-entrant: the current holder may
    /// re-acquire without queuing. Returns `true` on success.
    pub fn try_acquire(&mut self, by: Holder) -> bool {
        match self.holder {
            None => {
                self.holder = Some(by);
                self.since = Some(Utc::now());
                self.depth = 1;
                true
            }
            Some(h) if h == by => {
                self.depth += 1;
                true
            }
            Some(_) => false,
        }
    }

    /// Enqueue a blocking waiter; returns its position (0 = next to wake).
    pub fn enqueue(&mut self, by: Holder) -> usize {
        self.waiters.push_back(by);
        self.waiters.len() - 1
    }

    /// Release one level of re-entrant holding. Releasing a lock you don't
    /// hold is a no-op (§4.3). Returns the next holder to wake, if the lock
    /// was fully released and a waiter was queued.
    pub fn release(&mut self, by: Holder) -> Option<Holder> {
        match self.holder {
            Some(h) if h == by => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    self.holder = None;
                    self.since = None;
                    if let Some(next) = self.waiters.pop_front() {
                        self.holder = Some(next);
                        self.since = Some(Utc::now());
                        self.depth = 1;
                        return Some(next);
                    }
                }
                None
            }
            _ => None, // no-op: not the holder
        }
    }
}
