use xhttp_core::RollRange;

/// Tunables for a [`crate::MuxManager`] (spec §4.5 table).
///
/// Each `Some(range)` knob is rolled once per created entry; `None` means
/// that cap is not enforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuxConfig {
    /// Max distinct carriers. Below this, `get` always creates a new one
    /// instead of reusing. `None` means no cap on connection count.
    pub max_connections: Option<RollRange<usize>>,
    /// Per-carrier in-flight request cap; at this, the entry is excluded
    /// from selection (but not retired).
    pub max_concurrency: Option<RollRange<u64>>,
    /// How many times an entry may be handed out by `get` before it
    /// retires.
    pub max_reuse_times: Option<RollRange<i32>>,
    /// Absolute lifetime from creation before an entry retires.
    pub max_lifetime_ms: Option<RollRange<u64>>,
    /// Total requests that may complete on a carrier before it retires.
    pub max_request_times: Option<RollRange<u64>>,
}
