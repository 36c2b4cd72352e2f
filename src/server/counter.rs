//! Gated server-side registration tallies

use crate::common::lock;

use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Point-in-time copy of the four counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    pub registrations: u64,
    pub updates: u64,
    pub deregistrations: u64,
    pub security_lookups: u64,
}

impl CounterSnapshot {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("nb update : {}", self.updates),
            format!("nb reg : {}", self.registrations),
            format!("nb dereg : {}", self.deregistrations),
            format!("nb psk access : {}", self.security_lookups),
        ]
    }
}

/// Counters that only move while counting is enabled
#[derive(Debug, Default)]
pub struct ServerCounters {
    enabled: AtomicBool,
    toggle: Mutex<()>,
    registrations: AtomicU64,
    updates: AtomicU64,
    deregistrations: AtomicU64,
    security_lookups: AtomicU64,
}

impl ServerCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Reset and start counting. No-op while already counting.
    pub fn enable(&self) -> bool {
        let _toggle = lock(&self.toggle);
        if self.is_enabled() {
            return false;
        }
        self.reset();
        self.enabled.store(true, Ordering::Release);
        true
    }

    /// Stop counting; the current values are kept until the next reset
    pub fn disable(&self) -> bool {
        let _toggle = lock(&self.toggle);
        self.enabled.swap(false, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.registrations.store(0, Ordering::Relaxed);
        self.updates.store(0, Ordering::Relaxed);
        self.deregistrations.store(0, Ordering::Relaxed);
        self.security_lookups.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deregistrations: self.deregistrations.load(Ordering::Relaxed),
            security_lookups: self.security_lookups.load(Ordering::Relaxed),
        }
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.is_enabled() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_registration(&self) {
        self.bump(&self.registrations);
    }

    pub fn record_update(&self) {
        self.bump(&self.updates);
    }

    pub fn record_deregistration(&self) {
        self.bump(&self.deregistrations);
    }

    pub fn record_security_lookup(&self) {
        self.bump(&self.security_lookups);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_disabled_counters_do_not_move() {
        let counters = ServerCounters::new();
        counters.record_registration();
        counters.record_security_lookup();
        assert_eq!(counters.snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn test_toggle_off_then_on_resets() {
        let counters = ServerCounters::new();
        assert!(counters.enable());
        counters.record_registration();
        counters.record_update();
        counters.record_deregistration();
        counters.record_security_lookup();
        assert_eq!(
            counters.snapshot(),
            CounterSnapshot {
                registrations: 1,
                updates: 1,
                deregistrations: 1,
                security_lookups: 1,
            }
        );

        assert!(counters.disable());
        counters.record_registration();
        assert_eq!(counters.snapshot().registrations, 1);

        assert!(counters.enable());
        assert_eq!(counters.snapshot(), CounterSnapshot::default());
        counters.record_registration();
        assert_eq!(counters.snapshot().registrations, 1);
    }

    #[test]
    fn test_toggling_is_idempotent() {
        let counters = ServerCounters::new();
        assert!(counters.enable());
        counters.record_update();
        assert!(!counters.enable());
        assert_eq!(counters.snapshot().updates, 1);

        assert!(counters.disable());
        assert!(!counters.disable());
        assert!(!counters.is_enabled());
    }

    #[test]
    fn test_concurrent_events_while_toggling() {
        let counters = Arc::new(ServerCounters::new());
        counters.enable();

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record_registration();
                    }
                })
            })
            .collect();
        let toggler = {
            let counters = Arc::clone(&counters);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    counters.disable();
                    counters.enable();
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        toggler.join().unwrap();

        assert!(counters.is_enabled());
        assert!(counters.snapshot().registrations <= 4000);
    }

    #[test]
    fn test_snapshot_lines() {
        let snapshot = CounterSnapshot {
            registrations: 10,
            updates: 0,
            deregistrations: 9,
            security_lookups: 10,
        };
        assert_eq!(
            snapshot.lines(),
            vec![
                "nb update : 0",
                "nb reg : 10",
                "nb dereg : 9",
                "nb psk access : 10"
            ]
        );
    }
}
