//! Sequential daily token counter.
//!
//! Tokens are handed out at registration, strictly increasing within a
//! day, and reset to zero by the daily driver. Seeded from the store at
//! startup so a mid-day restart does not reissue numbers.

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct TokenCounter {
    last_issued: AtomicI64,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume counting after `last_issued` (e.g. the day's max token
    /// recovered from the store).
    pub fn starting_at(last_issued: i64) -> Self {
        Self {
            last_issued: AtomicI64::new(last_issued),
        }
    }

    /// Atomically allocate the next token.
    pub fn next_token(&self) -> i64 {
        self.last_issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last token issued (0 when fresh).
    pub fn last_issued(&self) -> i64 {
        self.last_issued.load(Ordering::SeqCst)
    }

    /// Daily reset: the next token issued will be 1.
    pub fn reset(&self) {
        self.last_issued.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_sequential_from_one() {
        let counter = TokenCounter::new();
        assert_eq!(counter.next_token(), 1);
        assert_eq!(counter.next_token(), 2);
        assert_eq!(counter.last_issued(), 2);
    }

    #[test]
    fn starting_at_resumes() {
        let counter = TokenCounter::starting_at(41);
        assert_eq!(counter.next_token(), 42);
    }

    #[test]
    fn reset_restarts_numbering() {
        let counter = TokenCounter::starting_at(17);
        counter.reset();
        assert_eq!(counter.next_token(), 1);
    }

    #[test]
    fn concurrent_allocation_never_duplicates() {
        use std::sync::Arc;
        use std::thread;

        let counter = Arc::new(TokenCounter::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                (0..100).map(|_| counter.next_token()).collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800, "duplicate tokens issued");
        assert_eq!(counter.last_issued(), 800);
    }
}
