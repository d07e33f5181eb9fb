// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Live Operator Probe
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-thread count of constructed but not yet dropped operators.
//!
//! Every operator embeds a [`LiveToken`]; tests compare [`live_operators`]
//! before and after a create/drop sequence.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static LIVE: Cell<usize> = const { Cell::new(0) };
}

/// Number of live operators on the calling thread.
pub fn live_operators() -> usize {
    LIVE.with(Cell::get)
}

/// Counted marker. Not `Send`: the count is thread-local.
#[derive(Debug)]
pub struct LiveToken {
    _not_send: PhantomData<*const ()>,
}

impl LiveToken {
    pub fn new() -> Self {
        LIVE.with(|n| n.set(n.get() + 1));
        LiveToken {
            _not_send: PhantomData,
        }
    }
}

impl Default for LiveToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LiveToken {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        LIVE.with(|n| n.set(n.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_counts_and_releases() {
        let base = live_operators();
        let a = LiveToken::new();
        let b = a.clone();
        assert_eq!(live_operators(), base + 2);
        drop(a);
        assert_eq!(live_operators(), base + 1);
        drop(b);
        assert_eq!(live_operators(), base);
    }
}
