use crate::SnapshotTerminal;

/// What the sink receives on every tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSnapshot {
    /// Always within `0..=100`.
    pub percentage: f64,
    pub message: Option<String>,
    pub eta_seconds: Option<u64>,
    pub smoothed_rate: f64,
    pub max_rate: f64,
    pub current_units: Option<u64>,
    pub total_units: Option<u64>,
    pub terminal: SnapshotTerminal,
}

impl ProgressSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.terminal != SnapshotTerminal::None
    }
}
