/// Boundary, in characters added by one edit step, at which an edit stops
/// being incremental typing and counts as a bulk paste. The emitting client
/// uses the same value to decide when to send `large_paste`.
pub const PASTE_THRESHOLD_CHARS: i64 = 50;

/// Tunables for the metrics fold.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Edits adding `1..paste_threshold_chars` characters are linear typing;
    /// `paste_threshold_chars` or more is paste-like.
    pub paste_threshold_chars: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            paste_threshold_chars: PASTE_THRESHOLD_CHARS,
        }
    }
}
