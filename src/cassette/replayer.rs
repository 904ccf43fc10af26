//! Serves recorded exchanges back in order.

use std::collections::{HashMap, VecDeque};

use super::format::{CallKind, Cassette, Exchange};

/// Replays a cassette, one queue per provider operation.
#[derive(Debug)]
pub struct CassetteReplayer {
    name: String,
    queues: HashMap<CallKind, VecDeque<Exchange>>,
}

impl CassetteReplayer {
    /// Index a loaded cassette by operation.
    #[must_use]
    pub fn new(cassette: Cassette) -> Self {
        let mut queues: HashMap<CallKind, VecDeque<Exchange>> = HashMap::new();
        let mut exchanges = cassette.exchanges;
        exchanges.sort_by_key(|e| e.seq);
        for exchange in exchanges {
            queues.entry(exchange.method).or_default().push_back(exchange);
        }
        Self { name: cassette.name, queues }
    }

    /// Take the next recorded exchange for `method`.
    ///
    /// # Errors
    ///
    /// Returns an error once the cassette has nothing left for `method`.
    pub fn next_exchange(&mut self, method: CallKind) -> Result<Exchange, String> {
        self.queues.get_mut(&method).and_then(VecDeque::pop_front).ok_or_else(|| {
            format!("cassette '{}' has no more {method:?} exchanges", self.name)
        })
    }

    /// Exchanges not yet served.
    #[cfg(test)]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
