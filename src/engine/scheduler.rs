// Timed callback scheduler driven by the simulation tick

/// Handle to a scheduled entry. Stale ids are tolerated by `cancel`.
pub type CallbackId = u64;

#[derive(Debug)]
struct Entry<T> {
    id: CallbackId,
    fire_at: f64,
    payload: T,
}

/// Schedules a payload to be delivered after a delay in simulation time.
///
/// The scheduler never runs game logic itself: `advance` returns the due
/// payloads in deadline order and the simulation root applies them. This
/// keeps the "captured context" of a deferred effect an explicit value
/// instead of an aliased closure, so cancellation by id is always safe.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: f64,
    next_id: CallbackId,
    entries: Vec<Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_id: 1,
            entries: Vec::new(),
        }
    }

    /// Schedule `payload` to fire no earlier than `delay` seconds from now.
    pub fn schedule(&mut self, delay: f32, payload: T) -> CallbackId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            fire_at: self.now + delay.max(0.0) as f64,
            payload,
        });
        id
    }

    /// Cancel a pending entry. Cancelling an already-fired or unknown id is
    /// a no-op; returns whether anything was removed.
    pub fn cancel(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Advance simulation time and pop every entry that became due, in
    /// deadline order. Each entry is delivered at most once.
    pub fn advance(&mut self, delta: f32) -> Vec<(CallbackId, T)> {
        self.now += delta.max(0.0) as f64;
        let now = self.now;

        let mut due: Vec<Entry<T>> = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].fire_at <= now {
                due.push(self.entries.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| {
            a.fire_at
                .partial_cmp(&b.fire_at)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        due.into_iter().map(|e| (e.id, e.payload)).collect()
    }

    /// Number of entries that have not fired yet.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries remain. Map transitions wait on this instead of
    /// spin-waiting on a helper thread.
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seconds until the last pending entry fires, if any.
    pub fn time_until_idle(&self) -> Option<f32> {
        self.entries
            .iter()
            .map(|e| (e.fire_at - self.now).max(0.0) as f32)
            .fold(None, |acc, t| Some(acc.map_or(t, |m: f32| m.max(t))))
    }

    /// Current simulation time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_no_earlier_than_delay() {
        let mut sched: Scheduler<&str> = Scheduler::new();
        sched.schedule(0.5, "a");

        assert!(sched.advance(0.49).is_empty());
        let due = sched.advance(0.02);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, "a");
    }

    #[test]
    fn test_fires_at_most_once() {
        let mut sched: Scheduler<&str> = Scheduler::new();
        sched.schedule(0.1, "a");
        assert_eq!(sched.advance(0.2).len(), 1);
        assert!(sched.advance(10.0).is_empty());
    }

    #[test]
    fn test_deadline_order() {
        let mut sched: Scheduler<u32> = Scheduler::new();
        sched.schedule(0.3, 3);
        sched.schedule(0.1, 1);
        sched.schedule(0.2, 2);

        let due: Vec<u32> = sched.advance(1.0).into_iter().map(|(_, p)| p).collect();
        assert_eq!(due, vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_before_fire() {
        let mut sched: Scheduler<&str> = Scheduler::new();
        let id = sched.schedule(0.1, "a");
        assert!(sched.cancel(id));
        assert!(sched.advance(1.0).is_empty());
    }

    #[test]
    fn test_cancel_stale_id_is_noop() {
        let mut sched: Scheduler<&str> = Scheduler::new();
        let id = sched.schedule(0.1, "a");
        sched.advance(0.2);
        assert!(!sched.cancel(id));
        assert!(!sched.cancel(9999));
    }

    #[test]
    fn test_idle_tracking() {
        let mut sched: Scheduler<&str> = Scheduler::new();
        assert!(sched.is_idle());

        sched.schedule(0.5, "a");
        sched.schedule(1.5, "b");
        assert_eq!(sched.pending(), 2);

        let remaining = sched.time_until_idle().unwrap();
        assert!((remaining - 1.5).abs() < 1e-5);

        sched.advance(remaining);
        assert!(sched.is_idle());
    }

    #[test]
    fn test_same_deadline_preserves_schedule_order() {
        let mut sched: Scheduler<u32> = Scheduler::new();
        sched.schedule(0.1, 1);
        sched.schedule(0.1, 2);
        let due: Vec<u32> = sched.advance(0.2).into_iter().map(|(_, p)| p).collect();
        assert_eq!(due, vec![1, 2]);
    }
}
