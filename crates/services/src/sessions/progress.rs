/// Snapshot of where a session stands, for renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    /// Zero-based index of the question on screen, if any.
    pub current_index: Option<usize>,
    /// Seconds left on the current question; `None` when untimed or idle.
    pub time_remaining: Option<u32>,
    pub is_complete: bool,
}
