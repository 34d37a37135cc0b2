use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use xhttp_core::SessionId;
use xhttp_queue::UploadQueue;

/// A live server-side tunnel session (spec §3).
pub struct HttpSession {
    /// Identity the session was created under.
    pub id: SessionId,
    /// The reassembly buffer the POST handlers push into and the adopted
    /// download GET reads out of.
    pub upload_queue: Arc<UploadQueue>,
    connected_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl HttpSession {
    pub(crate) fn new(id: SessionId, upload_queue: Arc<UploadQueue>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id,
                upload_queue,
                connected_tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Fires the one-shot "fully connected" event, cancelling the reaper.
    /// Idempotent: a second call is a no-op.
    pub fn mark_fully_connected(&self) {
        if let Some(tx) = self.connected_tx.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Whether [`Self::mark_fully_connected`] has already fired.
    #[must_use]
    pub fn is_fully_connected(&self) -> bool {
        self.connected_tx.lock().is_none()
    }
}
