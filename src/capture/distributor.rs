use crate::common::Frame;
use crate::error::WorkerError;
use crate::worker::ensure_running;
use image::DynamicImage;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Single-slot frame fan-out.
///
/// `publish` overwrites the slot and flags every registered consumer; nothing
/// is queued, so a consumer that falls behind only ever sees the newest frame.
/// Publishing never waits on consumers and registering never waits on the
/// producer.
#[derive(Debug)]
pub struct FrameDistributor {
    slot: watch::Sender<Option<Frame>>,
    sequence: AtomicU64,
}

impl FrameDistributor {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn register_consumer(&self) -> FrameSignal {
        FrameSignal {
            rx: self.slot.subscribe(),
        }
    }

    /// Wraps the image in a new [`Frame`], replaces the slot and signals every
    /// consumer. Returns the frame's sequence number.
    pub fn publish(&self, image: DynamicImage) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        // The replaced frame is dropped here unless a consumer still holds a clone.
        self.slot.send_replace(Some(Frame::new(sequence, image)));
        sequence
    }

    /// A clone of the newest frame, or `None` before the first publish and
    /// after [`FrameDistributor::close`].
    pub fn latest_frame(&self) -> Option<Frame> {
        self.slot.borrow().clone()
    }

    /// Marks capture as stopped: the slot is emptied and consumers are woken
    /// so they observe the gap.
    pub fn close(&self) {
        self.slot.send_replace(None);
    }

    pub fn consumer_count(&self) -> usize {
        self.slot.receiver_count()
    }
}

impl Default for FrameDistributor {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-consumer freshness flag handed out by [`FrameDistributor::register_consumer`].
#[derive(Debug, Clone)]
pub struct FrameSignal {
    rx: watch::Receiver<Option<Frame>>,
}

impl FrameSignal {
    /// Waits until something newer than the last frame taken through this
    /// signal has been published.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<(), WorkerError> {
        ensure_running(cancel)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            changed = self.rx.changed() => {
                changed.map_err(|_| WorkerError::Failed("frame distributor dropped".to_string()))?;
            }
        }
        ensure_running(cancel)
    }

    /// Waits for the next signal and returns the newest frame. `None` means
    /// capture has stopped or nothing was published; skip the tick.
    pub async fn next_frame(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Frame>, WorkerError> {
        self.wait(cancel).await?;
        Ok(self.latest())
    }

    /// Newest frame without waiting; also marks it as seen.
    pub fn latest(&mut self) -> Option<Frame> {
        self.rx.borrow_and_update().clone()
    }

    /// Treats whatever is in the slot now as already seen, so the next
    /// [`FrameSignal::wait`] only resolves on a later publish.
    pub fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }

    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    #[test]
    fn latest_frame_is_none_until_published() {
        let distributor = FrameDistributor::new();
        assert!(distributor.latest_frame().is_none());
        let seq = distributor.publish(image());
        assert_eq!(distributor.latest_frame().map(|f| f.sequence()), Some(seq));
    }

    #[test]
    fn close_empties_the_slot() {
        let distributor = FrameDistributor::new();
        distributor.publish(image());
        distributor.close();
        assert!(distributor.latest_frame().is_none());
    }

    #[tokio::test]
    async fn slow_consumer_sees_only_newest_frame() {
        let distributor = FrameDistributor::new();
        let mut signal = distributor.register_consumer();
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            distributor.publish(image());
        }

        let frame = signal.next_frame(&cancel).await.unwrap().unwrap();
        assert_eq!(frame.sequence(), 3);

        // No backlog: the three publishes collapsed into one signal.
        let second = tokio::time::timeout(Duration::from_millis(20), signal.wait(&cancel)).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn signalled_consumer_never_observes_stale_frame() {
        let distributor = Arc::new(FrameDistributor::new());
        let cancel = CancellationToken::new();
        let mut consumers: Vec<_> = (0..4).map(|_| distributor.register_consumer()).collect();

        let producer = {
            let distributor = distributor.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    distributor.publish(image());
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut last_seen = vec![0u64; consumers.len()];
        while !producer.is_finished() {
            for (signal, last) in consumers.iter_mut().zip(last_seen.iter_mut()) {
                if !signal.has_changed() {
                    continue;
                }
                let published_before = distributor.sequence.load(Ordering::Acquire);
                signal.wait(&cancel).await.unwrap();
                let frame = signal.latest().unwrap();
                assert!(frame.sequence() >= published_before);
                assert!(frame.sequence() > *last);
                *last = frame.sequence();
            }
            tokio::task::yield_now().await;
        }
        producer.await.unwrap();
    }

    #[test]
    fn marked_frame_no_longer_counts_as_fresh() {
        let distributor = FrameDistributor::new();
        let mut signal = distributor.register_consumer();
        distributor.publish(image());
        assert!(signal.has_changed());
        signal.mark_seen();
        assert!(!signal.has_changed());
        distributor.publish(image());
        assert!(signal.has_changed());
    }

    #[tokio::test]
    async fn close_wakes_consumers_with_gap() {
        let distributor = FrameDistributor::new();
        let mut signal = distributor.register_consumer();
        distributor.close();
        let frame = signal.next_frame(&CancellationToken::new()).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn cancelled_wait_returns_immediately() {
        let distributor = FrameDistributor::new();
        let mut signal = distributor.register_consumer();
        let cancel = CancellationToken::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { signal.wait(&cancel).await })
        };
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(WorkerError::Cancelled)));
    }
}
