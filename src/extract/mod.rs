//! Heuristic extraction of filename identity from forwarded message text.
//!
//! Both extractors are ordered chains of independent strategies; the first
//! one that yields a value wins.

pub mod date;
pub mod metadata;

use tracing::trace;

/// One named step in a heuristic chain.
pub struct Strategy<'a, T> {
    /// Short label, reported by `inspect` and in trace logs.
    pub name: &'static str,
    run: Box<dyn Fn() -> Option<T> + 'a>,
}

impl<'a, T> Strategy<'a, T> {
    /// Wrap a closure as a named strategy.
    pub fn new(name: &'static str, run: impl Fn() -> Option<T> + 'a) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }
}

/// Evaluate strategies in order and return the first hit with its name.
pub fn first_match<T>(strategies: &[Strategy<'_, T>]) -> Option<(&'static str, T)> {
    strategies.iter().find_map(|s| {
        let hit = (s.run)()?;
        trace!(strategy = s.name, "Heuristic matched");
        Some((s.name, hit))
    })
}
