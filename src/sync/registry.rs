use alloy_primitives::Address;
use std::collections::HashSet;

/// Append-only set of every user address ever discovered.
///
/// Insertion order is preserved so a full refresh walks users in a
/// reproducible order; nothing is ever removed.
#[derive(Debug, Default)]
pub struct UserRegistry {
    ordered: Vec<Address>,
    seen: HashSet<Address>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: a duplicate leaves the registry untouched.
    pub fn add(&mut self, address: Address) {
        if self.seen.insert(address) {
            self.ordered.push(address);
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.seen.contains(address)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// First-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.ordered.iter()
    }
}
