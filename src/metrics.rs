//! Placeholder metrics surface.
//!
//! No metrics crate is wired up; call sites use this the same way the
//! offramp/onramp workers did, as a drop-in that keeps instrumentation
//! call sites looking the way they would with a real backend attached.

pub fn counter(_name: &str, _labels: &str) -> Counter {
    Counter
}

pub struct Counter;

impl Counter {
    pub fn increment(&self, _count: u64) {}
}
