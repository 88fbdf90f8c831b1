//! Frame fan-out.
//!
//! Runs on the capture task after a frame is finalized. Every session
//! whose mailbox is empty gets its own copy of the frame; sessions still
//! holding an unread frame are skipped, never overwritten.

use crate::registry::SessionRegistry;
use rctrx_protocol::PulseTrain;
use tracing::trace;

/// Deliver a finished frame, returning how many sessions accepted it.
pub(crate) async fn deliver(registry: &SessionRegistry, train: &PulseTrain) -> usize {
    // Snapshot first: mailbox locks are taken outside the registry's
    // shards so a slow reader can never stall an open/close.
    let sessions = registry.snapshot();
    let mut delivered = 0;
    for session in &sessions {
        if session.offer(train).await {
            delivered += 1;
        }
    }
    trace!(delivered, sessions = sessions.len(), "Frame broadcast");
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train(durations: &[u16]) -> PulseTrain {
        PulseTrain::from_durations(durations.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_skips_sessions_with_pending_frame() {
        let registry = SessionRegistry::new(8);
        let a = registry.open().unwrap();
        let b = registry.open().unwrap();

        assert_eq!(deliver(&registry, &train(&[100, 200, 300])).await, 2);

        // drain only A
        let mut buf = [0u8; 64];
        a.read(&mut buf).await.unwrap();

        // B still holds the first frame and is skipped
        assert_eq!(deliver(&registry, &train(&[400, 500, 600])).await, 1);

        // A got the second frame, B still serves the first
        let n = a.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"9001f4015802\n");
        let n = b.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"6400c8002c01\n");
    }

    #[tokio::test]
    async fn test_no_sessions_is_fine() {
        let registry = SessionRegistry::new(8);
        assert_eq!(deliver(&registry, &train(&[100])).await, 0);
    }
}
