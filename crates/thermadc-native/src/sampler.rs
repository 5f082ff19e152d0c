//! Timed, buffered, averaged acquisition
//!
//! ```text
//! Init ──► Running ──► Closing ──► Terminated
//!  │          │ ▲         ▲
//!  │          └─┘ cycle   │ samp_num reached / interrupt / sink error /
//!  └──────────────────────┘ too many consecutive failures
//! ```
//!
//! Each cycle draws `samp_size` sub-samples round-robin across the configured
//! channels, averages them, stamps the record with the acquisition window's
//! midpoint and half-width, and buffers it. The buffer is handed to the sink
//! every `buff_size` records and once more on the way out, and is emptied
//! only after the sink accepts it.
//!
//! A failed ADC read aborts only its own cycle. A sink failure is fatal, but
//! the records still buffered are offered to the sink one last time.
//! The interrupt flag is polled between cycles and during the inter-cycle
//! delay, never inside a bus transaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thermadc_core::math::RunningStats;
use thermadc_embedded::AdcReader;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigResult, SamplerConfig};
use crate::record::{Metadata, Record};
use crate::sink::{RecordSink, SinkError, SinkResult};

/// Longest uninterrupted sleep; bounds how late an interrupt is noticed.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock time source and sleeper.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now(&mut self) -> f64;

    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&mut self) -> f64 {
        (**self).now()
    }

    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// [`Clock`] backed by the system time and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64())
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Recoverable per-cycle failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// A read on one channel failed; the cycle's partial record was dropped
    #[error("acquisition failed on channel {channel}: {message}")]
    Acquisition {
        /// Channel whose read failed
        channel: u8,
        /// ADC error text
        message: String,
    },
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The configured record count was reached
    Completed,
    /// The interrupt flag was raised
    Interrupted,
    /// The sink failed; already-flushed data is intact
    SinkFailed(SinkError),
    /// `max_consecutive_failures` cycles in a row were aborted
    TooManyFailures,
}

/// Result of a sampling run.
#[derive(Debug)]
pub struct SamplingOutcome {
    /// Fully completed records
    pub completed: u64,
    /// Cycles dropped because of a read failure
    pub aborted_cycles: u64,
    /// Termination trigger
    pub reason: StopReason,
}

impl SamplingOutcome {
    /// `true` unless the run ended on a sink failure or too many failed reads.
    pub fn is_clean(&self) -> bool {
        matches!(self.reason, StopReason::Completed | StopReason::Interrupted)
    }
}

// ============================================================================
// Sampling Loop
// ============================================================================

/// Acquisition state machine; owns the ADC and the sink for its lifetime.
pub struct SamplingLoop<A, S, C = SystemClock> {
    adc: A,
    sink: S,
    clock: C,
    config: SamplerConfig,
    interrupt: Arc<AtomicBool>,
    buffer: Vec<Record>,
}

impl<A: AdcReader, S: RecordSink> SamplingLoop<A, S, SystemClock> {
    /// Create a loop on the system clock.
    ///
    /// # Errors
    ///
    /// The config fails [`SamplerConfig::validate`] for this ADC.
    pub fn new(adc: A, sink: S, config: SamplerConfig) -> ConfigResult<Self> {
        Self::with_clock(adc, sink, config, SystemClock)
    }
}

impl<A: AdcReader, S: RecordSink, C: Clock> SamplingLoop<A, S, C> {
    /// Create a loop on a custom clock.
    ///
    /// # Errors
    ///
    /// The config fails [`SamplerConfig::validate`] for this ADC.
    pub fn with_clock(adc: A, sink: S, config: SamplerConfig, clock: C) -> ConfigResult<Self> {
        config.validate(adc.num_channels())?;
        Ok(Self {
            adc,
            sink,
            clock,
            buffer: Vec::with_capacity(config.buff_size),
            config,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned interrupt flag (e.g. set by a Ctrl-C handler).
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Run until a termination trigger, then close the sink.
    pub fn run(mut self) -> SamplingOutcome {
        // Init
        let t0 = self.clock.now();
        let metadata = Metadata::new(
            t0,
            self.adc.model(),
            self.adc.bit_resolution(),
            self.adc.reference_voltage(),
            &self.config,
        );
        info!("Starting acquisition with the following settings:");
        for (key, value) in metadata.entries() {
            info!("    {key} = {value}");
        }
        if let Err(e) = self.sink.write_header(&metadata) {
            error!("Failed to write header: {e}");
            return self.abandon(0, 0, e);
        }

        // Running
        let mut completed: u64 = 0;
        let mut aborted: u64 = 0;
        let mut consecutive: u32 = 0;

        let reason = loop {
            if self.interrupted() {
                break StopReason::Interrupted;
            }
            if self.config.samp_num.is_some_and(|n| completed >= n) {
                break StopReason::Completed;
            }

            match self.acquire(t0) {
                Ok(record) => {
                    consecutive = 0;
                    completed += 1;
                    self.buffer.push(record);
                    if self.buffer.len() >= self.config.buff_size {
                        debug!("{completed} samples collected, flushing buffer");
                        if let Err(e) = self.flush_buffer() {
                            error!("Sink failed, stopping: {e}");
                            return self.abandon(completed, aborted, e);
                        }
                    }
                }
                Err(e) => {
                    aborted += 1;
                    consecutive += 1;
                    warn!("Cycle aborted: {e}");
                    if self
                        .config
                        .max_consecutive_failures
                        .is_some_and(|max| consecutive >= max)
                    {
                        error!("{consecutive} consecutive cycles failed, stopping");
                        break StopReason::TooManyFailures;
                    }
                }
            }

            if self.config.samp_num.is_some_and(|n| completed >= n) {
                break StopReason::Completed;
            }
            self.pause();
        };

        // Closing
        let reason = match self.close() {
            Ok(()) => reason,
            Err(e) => {
                error!("Failed to close sink: {e}");
                StopReason::SinkFailed(e)
            }
        };
        info!("Sampling finished: {completed} samples ({aborted} aborted cycles), {reason:?}");
        SamplingOutcome { completed, aborted_cycles: aborted, reason }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// One cycle. Sub-samples are interleaved across channels.
    fn acquire(&mut self, t0: f64) -> Result<Record, SamplerError> {
        let mut stats = vec![RunningStats::new(); self.config.channels.len()];

        let t1 = self.clock.now();
        for _ in 0..self.config.samp_size {
            for (spec, acc) in self.config.channels.iter().zip(stats.iter_mut()) {
                let value = self.adc.read(spec.channel, spec.mode).map_err(|e| {
                    SamplerError::Acquisition {
                        channel: spec.channel,
                        message: e.to_string(),
                    }
                })?;
                acc.push(value);
            }
        }
        let t2 = self.clock.now();

        let t_samp = (t1 + t2) / 2.0 - t0;
        let t_err = (t2 - t1) / 2.0;
        Ok(Record::from_stats(t_samp, t_err, &stats, self.config.store_error))
    }

    /// Hand the buffered records to the sink; kept on failure.
    fn flush_buffer(&mut self) -> SinkResult<()> {
        if !self.buffer.is_empty() {
            self.sink.write_records(&self.buffer)?;
            self.buffer.clear();
        }
        self.sink.flush()
    }

    fn close(&mut self) -> SinkResult<()> {
        let flushed = self.flush_buffer();
        let closed = self.sink.close();
        flushed.and(closed)
    }

    /// Best-effort shutdown after a fatal sink error.
    fn abandon(mut self, completed: u64, aborted: u64, err: SinkError) -> SamplingOutcome {
        let pending = self.buffer.len();
        match self.flush_buffer() {
            Ok(()) if pending > 0 => info!("Final flush wrote {pending} buffered samples"),
            Ok(()) => {}
            Err(e) => warn!("Final flush failed, {} buffered samples lost: {e}", self.buffer.len()),
        }
        if let Err(e) = self.sink.close() {
            warn!("Failed to close sink: {e}");
        }
        info!("Sampling stopped: {completed} samples ({aborted} aborted cycles)");
        SamplingOutcome {
            completed,
            aborted_cycles: aborted,
            reason: StopReason::SinkFailed(err),
        }
    }

    /// Inter-cycle delay, sliced so an interrupt is noticed promptly.
    fn pause(&mut self) {
        let mut remaining =
            Duration::try_from_secs_f64(self.config.delay).unwrap_or(Duration::MAX);
        while !remaining.is_zero() && !self.interrupted() {
            let slice = remaining.min(SLEEP_SLICE);
            self.clock.sleep(slice);
            remaining -= slice;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use thermadc_core::types::{ChannelSpec, InputMode};
    use thermadc_core::RawSample;

    /// Clock that advances `step` seconds per `now()` call plus any sleep.
    struct ManualClock {
        now: f64,
        step: f64,
        slept: Duration,
    }

    impl ManualClock {
        fn new(step: f64) -> Self {
            Self { now: 1000.0, step, slept: Duration::ZERO }
        }
    }

    impl Clock for ManualClock {
        fn now(&mut self) -> f64 {
            let t = self.now;
            self.now += self.step;
            t
        }

        fn sleep(&mut self, duration: Duration) {
            self.slept += duration;
            self.now += duration.as_secs_f64();
        }
    }

    /// Returns `channel * 100 + read_index` counts and can fail or raise a
    /// flag on chosen reads.
    struct ScriptedAdc {
        reads: usize,
        fail_reads: Vec<usize>,
        interrupt_on: Option<(usize, Arc<AtomicBool>)>,
    }

    impl ScriptedAdc {
        fn new() -> Self {
            Self { reads: 0, fail_reads: Vec::new(), interrupt_on: None }
        }
    }

    impl AdcReader for ScriptedAdc {
        type Error = String;

        fn read_raw(&mut self, channel: u8, _mode: InputMode) -> Result<RawSample, String> {
            self.reads += 1;
            if let Some((n, flag)) = &self.interrupt_on {
                if *n == self.reads {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            if self.fail_reads.contains(&self.reads) {
                return Err("no response".to_string());
            }
            let value = u16::from(channel) * 100 + u16::try_from(self.reads).unwrap_or(0);
            Ok(RawSample::from_bits_truncate(value))
        }

        fn scale(&self) -> f64 {
            1.0
        }

        fn reference_voltage(&self) -> f64 {
            1023.0
        }

        fn model(&self) -> &'static str {
            "SCRIPTED"
        }

        fn bit_resolution(&self) -> u8 {
            10
        }

        fn num_channels(&self) -> u8 {
            8
        }
    }

    fn config(samp_size: u32, samp_num: Option<u64>, buff_size: usize) -> SamplerConfig {
        SamplerConfig {
            channels: vec![ChannelSpec::single_ended(0)],
            delay: 0.0,
            samp_size,
            samp_num,
            buff_size,
            store_error: false,
            max_consecutive_failures: None,
        }
    }

    #[test]
    fn test_four_records_in_two_batches() {
        let mut adc = ScriptedAdc::new();
        let mut sink = MemorySink::new();

        let outcome =
            SamplingLoop::with_clock(&mut adc, &mut sink, config(3, Some(4), 2), ManualClock::new(0.0))
                .unwrap()
                .run();

        assert_eq!(outcome.completed, 4);
        assert!(matches!(outcome.reason, StopReason::Completed));
        assert_eq!(sink.batches.len(), 2);
        assert!(sink.batches.iter().all(|b| b.len() == 2));
        assert!(sink.closed);
        assert_eq!(adc.reads, 12);
    }

    #[test]
    fn test_averages_round_robin_subsamples() {
        let mut adc = ScriptedAdc::new();
        let mut sink = MemorySink::new();
        let config = SamplerConfig {
            channels: vec![ChannelSpec::single_ended(0), ChannelSpec::single_ended(1)],
            store_error: true,
            ..config(2, Some(1), 1)
        };

        SamplingLoop::with_clock(&mut adc, &mut sink, config, ManualClock::new(0.0))
            .unwrap()
            .run();

        // Reads: ch0=1, ch1=102, ch0=3, ch1=104
        let record = sink.records().next().unwrap();
        assert_eq!(record.values, vec![2.0, 103.0]);
        assert_eq!(record.errors, Some(vec![1.0, 1.0]));
    }

    #[test]
    fn test_timestamps_are_window_midpoints() {
        let mut adc = ScriptedAdc::new();
        let mut sink = MemorySink::new();

        SamplingLoop::with_clock(&mut adc, &mut sink, config(1, Some(1), 1), ManualClock::new(0.5))
            .unwrap()
            .run();

        // t0 = 1000.0, t1 = 1000.5, t2 = 1001.0
        let record = sink.records().next().unwrap();
        assert_eq!(record.t_samp, 0.75);
        assert_eq!(record.t_err, 0.25);
        assert_eq!(sink.metadata.as_ref().unwrap().start_timestamp, 1000.0);
    }

    #[test]
    fn test_interrupt_flushes_buffered_records() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut adc = ScriptedAdc::new();
        // Raised during the third cycle's read
        adc.interrupt_on = Some((3, Arc::clone(&flag)));
        let mut sink = MemorySink::new();

        let outcome =
            SamplingLoop::with_clock(&mut adc, &mut sink, config(1, None, 10), ManualClock::new(0.0))
                .unwrap()
                .with_interrupt(Arc::clone(&flag))
                .run();

        assert!(matches!(outcome.reason, StopReason::Interrupted));
        assert_eq!(outcome.completed, 3);
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(sink.batches[0].len(), 3);
        assert!(sink.closed);
    }

    #[test]
    fn test_interrupt_cuts_long_delay_short() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut adc = ScriptedAdc::new();
        adc.interrupt_on = Some((1, Arc::clone(&flag)));
        let mut sink = MemorySink::new();
        let config = SamplerConfig { delay: 3600.0, ..config(1, None, 1) };
        let mut clock = ManualClock::new(0.0);

        let outcome = SamplingLoop::with_clock(&mut adc, &mut sink, config, &mut clock)
            .unwrap()
            .with_interrupt(flag)
            .run();

        assert_eq!(outcome.completed, 1);
        assert_eq!(clock.slept, Duration::ZERO);
        assert_eq!(sink.batches.len(), 1);
        assert!(sink.closed);
    }

    #[test]
    fn test_delay_between_cycles_only() {
        let mut adc = ScriptedAdc::new();
        let mut sink = MemorySink::new();
        let config = SamplerConfig { delay: 0.25, ..config(1, Some(3), 1) };
        let mut clock = ManualClock::new(0.0);

        SamplingLoop::with_clock(&mut adc, &mut sink, config, &mut clock)
            .unwrap()
            .run();

        assert_eq!(clock.slept, Duration::from_millis(500));
    }

    #[test]
    fn test_failed_read_aborts_only_its_cycle() {
        let mut adc = ScriptedAdc::new();
        // Second read belongs to the first cycle (samp_size 2)
        adc.fail_reads = vec![2];
        let mut sink = MemorySink::new();

        let outcome =
            SamplingLoop::with_clock(&mut adc, &mut sink, config(2, Some(2), 1), ManualClock::new(0.0))
                .unwrap()
                .run();

        assert_eq!(outcome.completed, 2);
        assert_eq!(outcome.aborted_cycles, 1);
        assert!(outcome.is_clean());
        // Aborted cycle produced nothing; reads 3..=6 produced two records
        let values: Vec<f64> = sink.records().map(|r| r.values[0]).collect();
        assert_eq!(values, vec![3.5, 5.5]);
    }

    #[test]
    fn test_too_many_consecutive_failures() {
        let mut adc = ScriptedAdc::new();
        adc.fail_reads = (1..=100).collect();
        let mut sink = MemorySink::new();
        let config = SamplerConfig {
            max_consecutive_failures: Some(3),
            ..config(1, None, 1)
        };

        let outcome = SamplingLoop::with_clock(&mut adc, &mut sink, config, ManualClock::new(0.0))
            .unwrap()
            .run();

        assert!(matches!(outcome.reason, StopReason::TooManyFailures));
        assert_eq!(outcome.completed, 0);
        assert_eq!(outcome.aborted_cycles, 3);
        assert!(sink.closed);
    }

    #[test]
    fn test_sink_failure_is_fatal() {
        let mut adc = ScriptedAdc::new();
        let mut sink = MemorySink { fail_on_batch: Some(2), ..MemorySink::default() };

        let outcome =
            SamplingLoop::with_clock(&mut adc, &mut sink, config(1, Some(10), 2), ManualClock::new(0.0))
                .unwrap()
                .run();

        assert!(matches!(outcome.reason, StopReason::SinkFailed(SinkError::Io(_))));
        assert_eq!(outcome.completed, 4);
        assert!(!outcome.is_clean());
        assert!(sink.closed);
        assert_eq!(adc.reads, 4);
        // The rejected batch was offered again before closing
        assert_eq!(sink.write_calls, 3);
        assert_eq!(sink.batches.len(), 2);
        let values: Vec<f64> = sink.records().map(|r| r.values[0]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_first_write_failure_keeps_buffered_records() {
        let mut adc = ScriptedAdc::new();
        let mut sink = MemorySink { fail_on_batch: Some(1), ..MemorySink::default() };

        let outcome =
            SamplingLoop::with_clock(&mut adc, &mut sink, config(1, Some(10), 2), ManualClock::new(0.0))
                .unwrap()
                .run();

        assert!(matches!(outcome.reason, StopReason::SinkFailed(_)));
        assert_eq!(outcome.completed, 2);
        assert_eq!(sink.write_calls, 2);
        assert_eq!(sink.records().count(), 2);
        assert!(sink.flushes >= 1);
        assert!(sink.closed);
    }

    /// Rejects every batch; everything else goes to the inner sink.
    struct RejectingSink<'a>(&'a mut MemorySink);

    impl RecordSink for RejectingSink<'_> {
        fn write_header(&mut self, metadata: &Metadata) -> SinkResult<()> {
            self.0.write_header(metadata)
        }

        fn write_records(&mut self, _records: &[Record]) -> SinkResult<()> {
            self.0.write_calls += 1;
            Err(SinkError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }

        fn flush(&mut self) -> SinkResult<()> {
            self.0.flush()
        }

        fn close(&mut self) -> SinkResult<()> {
            self.0.close()
        }
    }

    #[test]
    fn test_failed_final_flush_still_closes() {
        let mut adc = ScriptedAdc::new();
        let mut inner = MemorySink::new();

        let outcome = SamplingLoop::with_clock(
            &mut adc,
            RejectingSink(&mut inner),
            config(1, Some(10), 2),
            ManualClock::new(0.0),
        )
        .unwrap()
        .run();

        assert!(matches!(outcome.reason, StopReason::SinkFailed(_)));
        assert_eq!(outcome.completed, 2);
        assert_eq!(inner.write_calls, 2);
        assert!(inner.batches.is_empty());
        assert!(inner.closed);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SamplerConfig {
            channels: vec![ChannelSpec::single_ended(9)],
            ..config(1, None, 1)
        };
        let result = SamplingLoop::new(ScriptedAdc::new(), MemorySink::new(), config);
        assert!(result.is_err());
    }
}
