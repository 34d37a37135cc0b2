/// Faults [`crate::MuxManager`] can raise.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MuxError {
    /// The caller-supplied `build_carrier` future failed.
    #[error("failed to build carrier: {0}")]
    Build(String),
    /// [`crate::MuxManager::release`] / `::get` was given a stale handle —
    /// its entry was already retired and reused by a different carrier.
    #[error("stale mux handle")]
    StaleHandle,
}
