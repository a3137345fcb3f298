//! Periodic release/eviction task

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::remuxer::SharedRemuxer;
use crate::segment::{PlaybackClock, SegmentSink};

/// Drives [`Remuxer::tick`](super::Remuxer::tick) every `flush_interval`.
///
/// The task reads the playback position from the clock on each cycle and
/// stops by itself once the remuxer is closed. Dropping the handle aborts it.
#[derive(Debug)]
pub struct FlushTask {
    handle: JoinHandle<()>,
}

impl FlushTask {
    /// Spawn the task on the current tokio runtime
    pub fn spawn<S, C>(remuxer: &SharedRemuxer<S>, clock: C) -> Self
    where
        S: SegmentSink + Send + 'static,
        C: PlaybackClock,
    {
        let remuxer = Arc::clone(remuxer);

        let handle = tokio::spawn(async move {
            let period = remuxer.lock().await.config().flush_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let mut remuxer = remuxer.lock().await;
                if remuxer.is_closed() {
                    break;
                }
                remuxer.tick(clock.current_time());
            }

            tracing::debug!("Flush task stopped");
        });

        Self { handle }
    }

    /// Abort the task without closing the remuxer
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end, up to `timeout`. Returns whether it ended.
    pub async fn join(mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, &mut self.handle).await.is_ok()
    }
}

impl Drop for FlushTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::client::{Chunk, Remuxer};
    use crate::config::{RemuxConfig, TrackMode};
    use crate::media::h264::tests::{annex_b, IDR, NON_IDR, PPS, SPS_640X480};
    use crate::segment::Segment;

    #[derive(Debug, Default)]
    struct Recorder {
        segments: Vec<Segment>,
        releases: usize,
        evictions: Vec<f64>,
    }

    impl SegmentSink for Recorder {
        fn on_segment(&mut self, segment: Segment) {
            self.segments.push(segment);
        }

        fn on_release(&mut self) {
            self.releases += 1;
        }

        fn on_evict(&mut self, cutoff: f64) {
            self.evictions.push(cutoff);
        }
    }

    fn config() -> RemuxConfig {
        RemuxConfig::with_mode(TrackMode::Video)
            .flush_interval(Duration::from_millis(10))
            .eviction_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_task_releases_and_evicts() {
        let remuxer = Remuxer::new(config(), Recorder::default())
            .unwrap()
            .into_shared();
        remuxer
            .lock()
            .await
            .feed(
                Chunk::video(annex_b(&[SPS_640X480, PPS, IDR, NON_IDR, NON_IDR, IDR]))
                    .with_duration(400),
            )
            .unwrap();

        // Playback position in milliseconds, read as seconds by the clock
        let position = Arc::new(AtomicU64::new(5_000));
        let clock = {
            let position = Arc::clone(&position);
            move || position.load(Ordering::Relaxed) as f64 / 1000.0
        };
        let task = FlushTask::spawn(&remuxer, clock);

        tokio::time::sleep(Duration::from_millis(100)).await;
        {
            let guard = remuxer.lock().await;
            assert!(guard.sink().releases >= 2);
            assert_eq!(guard.sink().evictions.first(), Some(&0.3));
            assert_eq!(guard.sink().segments.len(), 2);
        }

        remuxer.lock().await.close();
        assert!(task.join(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_dropping_task_aborts_it() {
        let remuxer = Remuxer::new(config(), Recorder::default())
            .unwrap()
            .into_shared();
        let task = FlushTask::spawn(&remuxer, || 0.0_f64);
        drop(task);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(remuxer.lock().await.sink().releases, 0);
    }

    #[tokio::test]
    async fn test_stop() {
        let remuxer = Remuxer::new(config(), Recorder::default())
            .unwrap()
            .into_shared();
        let task = FlushTask::spawn(&remuxer, || 0.0_f64);
        task.stop();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(task.is_finished());
        assert!(!remuxer.lock().await.is_closed());
    }
}
