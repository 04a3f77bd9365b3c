/// Summary of the current play session, recomputed from the sample
/// sequence on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub average_ms: u64,
    pub best_ms: u64,
    pub count: usize,
}

impl SessionSummary {
    pub const EMPTY: SessionSummary = SessionSummary {
        average_ms: 0,
        best_ms: 0,
        count: 0,
    };
}

/// Accumulates one latency sample per successfully resolved round.
/// Insertion order is completion order; discarded when the game view exits.
#[derive(Debug, Default)]
pub struct SessionStats {
    samples: Vec<u64>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self { samples: Vec::new() }
    }

    pub fn append(&mut self, latency_ms: u64) {
        self.samples.push(latency_ms);
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Average is the mean rounded half-to-nearest; an empty session yields
    /// all zeros rather than an error so display code needs no null branch.
    pub fn summary(&self) -> SessionSummary {
        if self.samples.is_empty() {
            return SessionSummary::EMPTY;
        }

        let sum: u64 = self.samples.iter().sum();
        let average_ms = (sum as f64 / self.samples.len() as f64).round() as u64;
        let best_ms = *self.samples.iter().min().unwrap_or(&0);

        SessionSummary {
            average_ms,
            best_ms,
            count: self.samples.len(),
        }
    }
}
