use std::thread;
use std::time::Duration;

use crate::models::config::CaptureConfiguration;
use crate::models::report::DrainStats;
use crate::processing::recycle_buffer::RecycleBuffer;
use crate::traits::encoder::FrameEncoder;

use super::notifier::{FrameEvent, FrameNotifier};
use super::pipeline::Pipeline;

/// Drain-loop tuning taken from [`CaptureConfiguration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSettings {
    pub frame_bytes: usize,
    pub poll_timeout: Duration,
    pub padding_frames: u32,
    pub padding_interval: Duration,
    pub flush_on_stop: bool,
}

impl From<&CaptureConfiguration> for DrainSettings {
    fn from(config: &CaptureConfiguration) -> Self {
        Self {
            frame_bytes: config.frame_bytes,
            poll_timeout: config.poll_timeout,
            padding_frames: config.padding_frames,
            padding_interval: config.padding_interval,
            flush_on_stop: config.flush_on_stop,
        }
    }
}

/// Consumer side of the pipeline.
///
/// Feeds queued frames to the encoder in capture order and recycles them.
/// If a whole session delivers nothing, a short run of silent frames is
/// encoded so a downstream muxer always sees at least one audio frame.
pub struct DrainWorker<E: FrameEncoder> {
    encoder: E,
    pipeline: Pipeline,
    notifier: FrameNotifier,
    settings: DrainSettings,
}

impl<E: FrameEncoder> DrainWorker<E> {
    pub fn new(encoder: E, pipeline: Pipeline, notifier: FrameNotifier, settings: DrainSettings) -> Self {
        Self {
            encoder,
            pipeline,
            notifier,
            settings,
        }
    }

    /// Drain until the session stops, then flush and pad as configured.
    /// Hands the encoder back together with the counters.
    pub fn run(mut self) -> (E, DrainStats) {
        let mut stats = DrainStats::default();

        while self.pipeline.flags.should_run() {
            match self.pipeline.queue.poll(self.settings.poll_timeout) {
                Some(buffer) => self.forward(buffer, &mut stats),
                None => stats.poll_timeouts += 1,
            }
        }

        if self.settings.flush_on_stop {
            let before = stats.frames_delivered;
            while let Some(buffer) = self.pipeline.queue.try_poll() {
                self.forward(buffer, &mut stats);
            }
            stats.frames_flushed = stats.frames_delivered - before;
            if stats.frames_flushed > 0 {
                log::debug!("flushed {} queued frames after stop", stats.frames_flushed);
            }
        }

        if stats.frames_delivered == 0 {
            self.pad(&mut stats);
        }
        (self.encoder, stats)
    }

    fn forward(&mut self, buffer: RecycleBuffer, stats: &mut DrainStats) {
        if buffer.is_empty() {
            stats.empty_buffers += 1;
        } else {
            self.deliver(buffer.data(), buffer.presentation_time_us(), false, stats);
            stats.frames_delivered += 1;
        }
        self.pipeline.pool.recycle(buffer);
    }

    fn deliver(&mut self, data: &[u8], pts_us: u64, padding: bool, stats: &mut DrainStats) {
        if let Err(e) = self.encoder.encode(data, pts_us) {
            stats.encode_errors += 1;
            if stats.encode_errors == 1 {
                log::warn!("encoder rejected frame at {}us: {}", pts_us, e);
            } else {
                log::trace!("encoder rejected frame at {}us: {}", pts_us, e);
            }
        }
        self.notifier.notify(&FrameEvent {
            pts_us,
            len: data.len(),
            padding,
        });
    }

    fn pad(&mut self, stats: &mut DrainStats) {
        let count = self.settings.padding_frames;
        if count == 0 {
            return;
        }
        log::warn!("no audio captured this session, encoding {} silent frames", count);

        let silence = vec![0u8; self.settings.frame_bytes];
        for i in 0..count {
            if i > 0 {
                thread::sleep(self.settings.padding_interval);
            }
            let pts_us = self.pipeline.pts.next_us();
            self.deliver(&silence, pts_us, true, stats);
            stats.padding_frames += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::{CaptureError, ListenerError};
    use crate::session::flags::SessionFlags;
    use crate::traits::clock::ManualClock;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(Vec<u8>, u64)>,
        reject_all: bool,
    }

    impl FrameEncoder for Recorder {
        fn encode(&mut self, data: &[u8], pts_us: u64) -> Result<(), CaptureError> {
            if self.reject_all {
                return Err(CaptureError::EncodingFailed("codec closed".into()));
            }
            self.frames.push((data.to_vec(), pts_us));
            Ok(())
        }
    }

    fn config() -> CaptureConfiguration {
        CaptureConfiguration {
            frame_bytes: 320,
            pool_initial: 0,
            pool_max: 100,
            poll_timeout: Duration::from_millis(5),
            padding_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn pipeline(config: &CaptureConfiguration, clock: Arc<ManualClock>) -> Pipeline {
        let flags = Arc::new(SessionFlags::new());
        flags.mark_capturing();
        Pipeline::new(config, clock, flags)
    }

    fn enqueue(pipeline: &Pipeline, len: usize, pts_us: u64) {
        let mut buffer = pipeline.pool.obtain(len).unwrap();
        buffer.fill_from(&vec![0x5A; len], pts_us);
        pipeline.queue.queue_frame(buffer).unwrap();
    }

    fn spawn(
        encoder: Recorder,
        pipeline: &Pipeline,
        notifier: FrameNotifier,
        config: &CaptureConfiguration,
    ) -> thread::JoinHandle<(Recorder, DrainStats)> {
        let worker = DrainWorker::new(encoder, pipeline.clone(), notifier, DrainSettings::from(config));
        thread::spawn(move || worker.run())
    }

    #[test]
    fn drains_three_frames_in_order_without_padding() {
        let config = config();
        let pipeline = pipeline(&config, Arc::new(ManualClock::new(0)));
        for pts in [0, 20_000, 40_000] {
            enqueue(&pipeline, 320, pts);
        }

        let handle = spawn(Recorder::default(), &pipeline, FrameNotifier::new(), &config);
        while !pipeline.queue.is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        pipeline.flags.request_stop();
        let (encoder, stats) = handle.join().unwrap();

        assert_eq!(stats.frames_delivered, 3);
        assert_eq!(stats.padding_frames, 0);
        let pts: Vec<u64> = encoder.frames.iter().map(|(_, pts)| *pts).collect();
        assert_eq!(pts, vec![0, 20_000, 40_000]);
        assert!(encoder.frames.iter().all(|(data, _)| data.len() == 320));
        assert_eq!(pipeline.pool.checked_out(), 0);
    }

    #[test]
    fn pads_exactly_five_frames_when_nothing_arrived() {
        let config = config();
        let clock = Arc::new(ManualClock::new(1_000));
        let pipeline = pipeline(&config, clock);
        pipeline.flags.request_stop();

        let (encoder, stats) =
            DrainWorker::new(Recorder::default(), pipeline.clone(), FrameNotifier::new(), DrainSettings::from(&config)).run();

        assert_eq!(stats.frames_delivered, 0);
        assert_eq!(stats.padding_frames, 5);
        assert_eq!(encoder.frames.len(), 5);
        assert!(encoder.frames.iter().all(|(data, _)| data.len() == 320 && data.iter().all(|&b| b == 0)));
        let pts: Vec<u64> = encoder.frames.iter().map(|(_, pts)| *pts).collect();
        assert!(pts.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(pts[0], 1_000);
    }

    #[test]
    fn empty_buffers_do_not_count_as_frames() {
        let config = config();
        let pipeline = pipeline(&config, Arc::new(ManualClock::new(0)));
        enqueue(&pipeline, 0, 10);
        enqueue(&pipeline, 0, 20);
        pipeline.flags.request_stop();

        let (encoder, stats) =
            DrainWorker::new(Recorder::default(), pipeline.clone(), FrameNotifier::new(), DrainSettings::from(&config)).run();

        assert_eq!(stats.empty_buffers, 2);
        assert_eq!(stats.padding_frames, 5);
        assert_eq!(encoder.frames.len(), 5);
        assert_eq!(pipeline.pool.checked_out(), 0);
    }

    #[test]
    fn flush_forwards_frames_left_after_stop() {
        let config = config();
        let pipeline = pipeline(&config, Arc::new(ManualClock::new(0)));
        pipeline.flags.request_stop();
        enqueue(&pipeline, 320, 5);
        enqueue(&pipeline, 320, 6);

        let (encoder, stats) =
            DrainWorker::new(Recorder::default(), pipeline.clone(), FrameNotifier::new(), DrainSettings::from(&config)).run();

        assert_eq!(stats.frames_flushed, 2);
        assert_eq!(stats.frames_delivered, 2);
        assert_eq!(stats.padding_frames, 0);
        assert_eq!(encoder.frames.len(), 2);
    }

    #[test]
    fn without_flush_leftovers_stay_queued_and_padding_runs() {
        let config = CaptureConfiguration {
            flush_on_stop: false,
            ..config()
        };
        let pipeline = pipeline(&config, Arc::new(ManualClock::new(0)));
        pipeline.flags.request_stop();
        enqueue(&pipeline, 320, 5);

        let (_, stats) =
            DrainWorker::new(Recorder::default(), pipeline.clone(), FrameNotifier::new(), DrainSettings::from(&config)).run();

        assert_eq!(stats.frames_delivered, 0);
        assert_eq!(stats.padding_frames, 5);
        assert_eq!(pipeline.queue.count(), 1);
    }

    #[test]
    fn encoder_errors_are_counted_not_fatal() {
        let config = config();
        let pipeline = pipeline(&config, Arc::new(ManualClock::new(0)));
        enqueue(&pipeline, 320, 1);
        enqueue(&pipeline, 320, 2);
        pipeline.flags.request_stop();

        let encoder = Recorder {
            reject_all: true,
            ..Default::default()
        };
        let (_, stats) =
            DrainWorker::new(encoder, pipeline.clone(), FrameNotifier::new(), DrainSettings::from(&config)).run();

        assert_eq!(stats.encode_errors, 2);
        assert_eq!(stats.frames_delivered, 2);
        assert_eq!(pipeline.pool.checked_out(), 0);
    }

    #[test]
    fn notifies_listeners_and_drops_failing_ones() {
        let config = config();
        let pipeline = pipeline(&config, Arc::new(ManualClock::new(0)));
        enqueue(&pipeline, 320, 1);
        enqueue(&pipeline, 320, 2);
        pipeline.flags.request_stop();

        let notifier = FrameNotifier::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        notifier.subscribe(move |event: &FrameEvent| {
            sink.lock().push(*event);
            Ok(())
        });
        notifier.subscribe(|_| Err(ListenerError::new("gone")));

        DrainWorker::new(Recorder::default(), pipeline, notifier.clone(), DrainSettings::from(&config)).run();

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].pts_us, 2);
        assert!(!events[0].padding);
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn padding_frames_are_flagged_for_listeners() {
        let config = CaptureConfiguration {
            padding_frames: 2,
            ..config()
        };
        let pipeline = pipeline(&config, Arc::new(ManualClock::new(0)));
        pipeline.flags.clear_capturing();

        let notifier = FrameNotifier::new();
        let padded = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&padded);
        notifier.subscribe(move |event: &FrameEvent| {
            if event.padding {
                *counter.lock() += 1;
            }
            Ok(())
        });

        let (_, stats) = DrainWorker::new(Recorder::default(), pipeline, notifier, DrainSettings::from(&config)).run();
        assert_eq!(stats.padding_frames, 2);
        assert_eq!(*padded.lock(), 2);
    }
}
