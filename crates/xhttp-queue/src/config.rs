/// Tunables for an [`crate::UploadQueue`].
#[derive(Debug, Clone, Copy)]
pub struct UploadQueueConfig {
    /// Maximum number of buffered-but-not-yet-consumed packets before the
    /// queue enters a fatal error state.
    pub max_buffered_posts: usize,
}

impl Default for UploadQueueConfig {
    fn default() -> Self {
        Self {
            max_buffered_posts: 30,
        }
    }
}
