//! Blocking adapters lifting synchronous components into the async runtime
//!
//! Every call on a wrapped component executes on the runtime's bounded
//! blocking worker pool via `tokio::task::spawn_blocking`, never on the
//! cooperative scheduler's thread. The inner component lives behind a mutex
//! that is locked inside the blocking closure, so calls on one instance are
//! serialized even when a caller abandons a suspension point mid-call: the
//! straggling closure finishes in the background, its result is discarded, and
//! the instance stays intact for `clean_up`. A call that panics poisons the
//! mutex and later calls report that as an error, but `clean_up` recovers the
//! guard so the component's release hook still runs.
//!
//! The pipeline applies these adapters when components are attached; from the
//! orchestrator's side a wrapped component is indistinguishable from a native
//! async one.

use crate::alert::{Alert, AsyncSubscriber, SyncSubscriber};
use crate::detect::{AsyncDetector, DetectionResult, SyncDetector};
use crate::error::{ComponentError, DetectorError, StreamError, SubscriberError};
use crate::video::{AsyncVideoStream, Frame, SyncVideoStream};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Lifts a [`SyncVideoStream`] into an [`AsyncVideoStream`].
pub struct BlockingStream {
    inner: Arc<Mutex<Box<dyn SyncVideoStream>>>,
}

impl BlockingStream {
    pub fn new(inner: Box<dyn SyncVideoStream>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Convenience wrapper for concrete stream values.
    pub fn wrap(inner: impl SyncVideoStream + 'static) -> Self {
        Self::new(Box::new(inner))
    }
}

#[async_trait]
impl AsyncVideoStream for BlockingStream {
    async fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut stream = inner
                .lock()
                .map_err(|e| StreamError::Other(anyhow::anyhow!("Failed to lock stream: {}", e)))?;
            stream.next_frame()
        })
        .await
        .map_err(|e| StreamError::Panic(e.to_string()))?
    }

    async fn clean_up(&mut self) -> Result<(), ComponentError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut stream = inner.lock().unwrap_or_else(PoisonError::into_inner);
            stream.clean_up()
        })
        .await
        .map_err(|e| ComponentError::Panic(e.to_string()))?
    }
}

/// Lifts a [`SyncDetector`] into an [`AsyncDetector`].
pub struct BlockingDetector {
    inner: Arc<Mutex<Box<dyn SyncDetector>>>,
}

impl BlockingDetector {
    pub fn new(inner: Box<dyn SyncDetector>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Convenience wrapper for concrete detector values.
    pub fn wrap(inner: impl SyncDetector + 'static) -> Self {
        Self::new(Box::new(inner))
    }
}

#[async_trait]
impl AsyncDetector for BlockingDetector {
    async fn detect(&mut self, frame: Arc<Frame>) -> Result<DetectionResult, DetectorError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut detector = inner.lock().map_err(|e| {
                DetectorError::Other(anyhow::anyhow!("Failed to lock detector: {}", e))
            })?;
            detector.detect(&frame)
        })
        .await
        .map_err(|e| DetectorError::Panic(e.to_string()))?
    }

    async fn clean_up(&mut self) -> Result<(), ComponentError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut detector = inner.lock().unwrap_or_else(PoisonError::into_inner);
            detector.clean_up()
        })
        .await
        .map_err(|e| ComponentError::Panic(e.to_string()))?
    }
}

/// Lifts a [`SyncSubscriber`] into an [`AsyncSubscriber`].
pub struct BlockingSubscriber {
    inner: Arc<Mutex<Box<dyn SyncSubscriber>>>,
}

impl BlockingSubscriber {
    pub fn new(inner: Box<dyn SyncSubscriber>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Convenience wrapper for concrete subscriber values.
    pub fn wrap(inner: impl SyncSubscriber + 'static) -> Self {
        Self::new(Box::new(inner))
    }
}

#[async_trait]
impl AsyncSubscriber for BlockingSubscriber {
    async fn notify(&mut self, alert: Arc<Alert>) -> Result<(), SubscriberError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut subscriber = inner.lock().map_err(|e| {
                SubscriberError::Other(anyhow::anyhow!("Failed to lock subscriber: {}", e))
            })?;
            subscriber.notify(&alert)
        })
        .await
        .map_err(|e| SubscriberError::Panic(e.to_string()))?
    }

    async fn clean_up(&mut self) -> Result<(), ComponentError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut subscriber = inner.lock().unwrap_or_else(PoisonError::into_inner);
            subscriber.clean_up()
        })
        .await
        .map_err(|e| ComponentError::Panic(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::PixelFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::ThreadId;
    use std::time::Duration;

    fn tiny_frame() -> Arc<Frame> {
        Arc::new(Frame::new(0.0, 2, 2, PixelFormat::Gray8, vec![0; 4]))
    }

    struct ThreadRecordingStream {
        seen: Arc<Mutex<Vec<ThreadId>>>,
    }

    impl SyncVideoStream for ThreadRecordingStream {
        fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
            self.seen
                .lock()
                .expect("test lock")
                .push(std::thread::current().id());
            Ok(Some(Frame::new(0.0, 1, 1, PixelFormat::Gray8, vec![0])))
        }

        fn clean_up(&mut self) -> Result<(), ComponentError> {
            Ok(())
        }
    }

    struct SlowCountingDetector {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl SyncDetector for SlowCountingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult, DetectorError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DetectionResult::empty())
        }

        fn clean_up(&mut self) -> Result<(), ComponentError> {
            Ok(())
        }
    }

    struct PanickingDetector {
        cleaned: Arc<AtomicUsize>,
    }

    impl SyncDetector for PanickingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult, DetectorError> {
            panic!("model blew up");
        }

        fn clean_up(&mut self) -> Result<(), ComponentError> {
            self.cleaned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlaggingSubscriber {
        cleaned: Arc<AtomicUsize>,
    }

    impl SyncSubscriber for FlaggingSubscriber {
        fn notify(&mut self, _alert: &Alert) -> Result<(), SubscriberError> {
            Ok(())
        }

        fn clean_up(&mut self) -> Result<(), ComponentError> {
            self.cleaned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    // The default test runtime is single-threaded, so the scheduler thread is
    // the test thread itself. A wrapped call must land elsewhere.
    #[tokio::test]
    async fn test_sync_call_runs_off_the_scheduler_thread() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut stream = BlockingStream::wrap(ThreadRecordingStream {
            seen: Arc::clone(&seen),
        });

        let frame = stream.next_frame().await.expect("frame");
        assert!(frame.is_some());

        let seen = seen.lock().expect("test lock");
        assert_eq!(seen.len(), 1);
        assert_ne!(seen[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn test_abandoned_call_never_overlaps_the_next_one() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut detector = BlockingDetector::wrap(SlowCountingDetector {
            in_flight: Arc::clone(&in_flight),
            max_in_flight: Arc::clone(&max_in_flight),
            calls: Arc::clone(&calls),
        });

        // Abandon the first call mid-flight, then immediately issue another.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(5), detector.detect(tiny_frame())).await;
        assert!(abandoned.is_err());

        detector.detect(tiny_frame()).await.expect("second call");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_component_panic_surfaces_as_error() {
        let mut detector = BlockingDetector::wrap(PanickingDetector {
            cleaned: Arc::new(AtomicUsize::new(0)),
        });

        let err = detector.detect(tiny_frame()).await.expect_err("panic");
        assert!(matches!(err, DetectorError::Panic(_)));
    }

    #[tokio::test]
    async fn test_clean_up_recovers_a_poisoned_component() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut detector = BlockingDetector::wrap(PanickingDetector {
            cleaned: Arc::clone(&cleaned),
        });

        detector.detect(tiny_frame()).await.expect_err("panic");

        // The panic poisoned the inner mutex; the release hook runs anyway.
        detector.clean_up().await.expect("clean up");
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clean_up_still_works_after_abandoned_call() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut detector = BlockingDetector::wrap(SlowCountingDetector {
            in_flight: Arc::clone(&in_flight),
            max_in_flight: Arc::clone(&max_in_flight),
            calls: Arc::clone(&calls),
        });

        let abandoned =
            tokio::time::timeout(Duration::from_millis(5), detector.detect(tiny_frame())).await;
        assert!(abandoned.is_err());

        detector.clean_up().await.expect("clean up");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscriber_clean_up_passes_through() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let mut subscriber = BlockingSubscriber::wrap(FlaggingSubscriber {
            cleaned: Arc::clone(&cleaned),
        });

        subscriber.clean_up().await.expect("clean up");
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }
}
