use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::util::format_count;

const REPORT_INTERVAL: u64 = 0x1000;

/// Wedge counters shared by every render task. Purely informational.
#[derive(Debug)]
pub struct DrawProgress {
    total: AtomicU64,
    per_ring: Vec<AtomicU64>,
}

impl DrawProgress {
    pub fn new(rings: u32) -> Self {
        Self {
            total: AtomicU64::new(0),
            per_ring: (0..rings).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn record(&self, ring: u32) {
        if let Some(counter) = self.per_ring.get(ring as usize) {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let drawn = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        if drawn % REPORT_INTERVAL == 0 {
            debug!(drawn = %format_count(drawn), "drawing");
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn ring_counts(&self) -> Vec<u64> {
        self.per_ring
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .collect()
    }

    pub fn report(&self) {
        for (ring, count) in self.ring_counts().into_iter().enumerate() {
            if count > 0 {
                info!("ring {ring} -> {count}");
            }
        }
        info!(drawn = self.total(), "render finished");
    }
}
