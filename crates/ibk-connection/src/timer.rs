use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Single-slot one-shot delayed action, polled by its owner.
///
/// There is no thread behind it: the owner calls [`DeferredTimer::poll`] on
/// every tick and runs whatever action comes back. Arming replaces any
/// pending action.
#[derive(Debug)]
pub struct DeferredTimer<A> {
    slot: Mutex<Option<Armed<A>>>,
}

#[derive(Debug)]
struct Armed<A> {
    fire_at: Instant,
    action: A,
}

impl<A> Default for DeferredTimer<A> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<A> DeferredTimer<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. A zero delay does not arm anything: the action is
    /// handed straight back for the caller to run now.
    pub fn start(&self, delay: Duration, action: A) -> Option<A> {
        self.start_at(Instant::now(), delay, action)
    }

    pub fn start_at(&self, now: Instant, delay: Duration, action: A) -> Option<A> {
        let mut slot = self.slot.lock();
        if delay.is_zero() {
            *slot = None;
            return Some(action);
        }
        *slot = Some(Armed {
            fire_at: now + delay,
            action,
        });
        None
    }

    pub fn reset(&self) {
        *self.slot.lock() = None;
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.slot.lock().as_ref().map(|a| a.fire_at)
    }

    /// Take the action if its deadline has passed. Disarms on fire.
    pub fn poll(&self, now: Instant) -> Option<A> {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(armed) if now >= armed.fire_at => slot.take().map(|a| a.action),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_returns_action_immediately() {
        let timer = DeferredTimer::new();
        assert_eq!(timer.start(Duration::ZERO, "go"), Some("go"));
        assert!(!timer.is_armed());
    }

    #[test]
    fn fires_once_after_deadline() {
        let timer = DeferredTimer::new();
        let t0 = Instant::now();
        assert_eq!(timer.start_at(t0, Duration::from_millis(50), 7), None);
        assert!(timer.is_armed());
        assert_eq!(timer.deadline(), Some(t0 + Duration::from_millis(50)));

        assert_eq!(timer.poll(t0 + Duration::from_millis(49)), None);
        assert_eq!(timer.poll(t0 + Duration::from_millis(50)), Some(7));
        assert!(!timer.is_armed());
        assert_eq!(timer.poll(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn reset_disarms_and_rearm_replaces() {
        let timer = DeferredTimer::new();
        let t0 = Instant::now();
        timer.start_at(t0, Duration::from_millis(10), 1);
        timer.reset();
        assert_eq!(timer.poll(t0 + Duration::from_secs(1)), None);

        timer.start_at(t0, Duration::from_millis(10), 1);
        timer.start_at(t0, Duration::from_millis(20), 2);
        assert_eq!(timer.poll(t0 + Duration::from_millis(15)), None);
        assert_eq!(timer.poll(t0 + Duration::from_millis(20)), Some(2));
    }
}
