use std::sync::atomic::{AtomicI32, Ordering};

/// Monotonic request/order id source. The broker announces the first usable
/// id after connecting; [`IdGenerator::set_next`] re-seeds from it.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicI32,
}

impl IdGenerator {
    pub fn new(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    pub fn next_id(&self) -> i32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Never moves backwards: ids already handed out stay unique.
    pub fn set_next(&self, id: i32) {
        let prev = self.next.fetch_max(id, Ordering::SeqCst);
        tracing::debug!(requested = id, next = prev.max(id), "id generator seeded");
    }

    pub fn peek(&self) -> i32 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_reseedable() {
        let ids = IdGenerator::default();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);

        ids.set_next(100);
        assert_eq!(ids.next_id(), 100);

        ids.set_next(50);
        assert_eq!(ids.next_id(), 101);
    }
}
