//! 8-bit sample histograms and percentile lookup.
//!
//! Zero samples are nodata (the merge fills gaps with 0), so they are never
//! counted. Percentiles use linear interpolation between the two nearest
//! ranks.

use rayon::prelude::*;

/// Pixels per rayon work item when scanning an interleaved RGB buffer.
pub(super) const CHUNK_PIXELS: usize = 16 * 1024;

/// Counts of non-zero 8-bit sample values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: [u64; 256],
    total: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            counts: [0; 256],
            total: 0,
        }
    }
}

impl Histogram {
    /// Count one sample. Zero is ignored.
    #[inline]
    pub fn add(&mut self, value: u8) {
        if value > 0 {
            self.counts[value as usize] += 1;
            self.total += 1;
        }
    }

    /// Number of counted (non-zero) samples.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: &Histogram) {
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += b;
        }
        self.total += other.total;
    }

    /// Value of the `rank`-th smallest counted sample (0-based).
    fn value_at_rank(&self, rank: u64) -> u8 {
        let mut seen = 0u64;
        for (value, &count) in self.counts.iter().enumerate() {
            seen += count;
            if seen > rank {
                return value as u8;
            }
        }
        255
    }

    /// The `p`-th percentile (0–100) of the counted samples.
    ///
    /// Returns `None` when no non-zero sample was counted.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let rank = p.clamp(0.0, 100.0) / 100.0 * (self.total - 1) as f64;
        let lower = rank.floor();
        let lo = self.value_at_rank(lower as u64) as f64;
        let hi = self.value_at_rank(rank.ceil() as u64) as f64;
        Some(lo + (hi - lo) * (rank - lower))
    }
}

/// Per-channel histograms of an interleaved RGB buffer.
pub fn channel_histograms(rgb: &[u8]) -> [Histogram; 3] {
    rgb.par_chunks(CHUNK_PIXELS * 3)
        .fold(
            || [Histogram::default(), Histogram::default(), Histogram::default()],
            |mut acc, chunk| {
                for px in chunk.chunks_exact(3) {
                    acc[0].add(px[0]);
                    acc[1].add(px[1]);
                    acc[2].add(px[2]);
                }
                acc
            },
        )
        .reduce(
            || [Histogram::default(), Histogram::default(), Histogram::default()],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    x.merge(y);
                }
                a
            },
        )
}

/// One histogram over every channel's samples.
pub fn combined(channels: &[Histogram; 3]) -> Histogram {
    let mut all = Histogram::default();
    for h in channels {
        all.merge(h);
    }
    all
}
