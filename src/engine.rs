// src/engine.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use log::{debug, error, info, warn};

use crate::analysis::Classifier;
use crate::drivers::{EmotionPipeline, RecordedBatch, SampleSource};
use crate::recorder::{SessionExporter, SnapshotWriter};
use crate::report::{HistoryReport, LiveReport};
use crate::types::*;

/// Granularity at which the sampler notices the stop flag while waiting.
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Default)]
pub struct EngineOptions {
    /// Stop after this many fetch cycles.
    pub max_cycles: Option<u64>,
    pub snapshot: Option<SnapshotWriter>,
    pub exporter: Option<SessionExporter>,
}

/// Starts the engine thread, the only writer of session state.
///
/// It consumes cycles and commands from `rx` until it is told to shut down,
/// reaches `max_cycles`, or every sender is gone. On exit it raises `stop`,
/// writes the session summary and sends `MonitorEvent::Stopped`.
pub fn spawn<C>(
    mut pipeline: EmotionPipeline<C>,
    options: EngineOptions,
    rx: Receiver<EngineInput>,
    tx: Sender<MonitorEvent>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<Result<()>>
where
    C: Classifier + Send + 'static,
{
    thread::spawn(move || {
        info!("⚙️ engine ready ({})", pipeline.classifier().describe());
        let handle = pipeline.snapshot_handle();
        let mut paused = false;
        let mut cycles: u64 = 0;

        let outcome = loop {
            let Ok(input) = rx.recv() else {
                debug!("all engine inputs closed");
                break Ok(());
            };
            match input {
                EngineInput::Command(cmd) => match cmd {
                    EngineCommand::Pause => {
                        paused = true;
                        tx.send(MonitorEvent::Paused(true)).ok();
                    }
                    EngineCommand::Resume => {
                        paused = false;
                        tx.send(MonitorEvent::Paused(false)).ok();
                    }
                    EngineCommand::Status => {
                        let report = LiveReport::from_snapshot(&handle.load());
                        tx.send(MonitorEvent::Status(report)).ok();
                    }
                    EngineCommand::History(limit) => {
                        let report = HistoryReport::from_snapshot(&handle.load(), limit);
                        tx.send(MonitorEvent::History(report)).ok();
                    }
                    EngineCommand::Shutdown => {
                        info!("🛑 shutdown requested");
                        break Ok(());
                    }
                },
                EngineInput::Cycle(samples) => {
                    cycles += 1;
                    if paused {
                        debug!("paused, dropping {} samples", samples.len());
                    } else if samples.is_empty() {
                        tx.send(MonitorEvent::CycleEmpty).ok();
                    } else {
                        match pipeline.ingest_cycle(samples) {
                            Ok(outcome) => {
                                tx.send(MonitorEvent::CycleSummary {
                                    accepted: outcome.accepted,
                                    rejected: outcome.rejected,
                                    discarded: outcome.discarded,
                                })
                                .ok();
                                for reason in outcome.skipped {
                                    tx.send(MonitorEvent::BatchSkipped(reason)).ok();
                                }
                                for RecordedBatch { result, counters } in outcome.batches {
                                    if let Some(writer) = &options.snapshot {
                                        if let Err(e) = writer.write(&result, pipeline.ledger().start_time(), &counters) {
                                            warn!("snapshot export failed: {e:#}");
                                        }
                                    }
                                    tx.send(MonitorEvent::BatchReady(result, counters)).ok();
                                }
                            }
                            Err(e) => {
                                error!("❌ pipeline stopped: {e}");
                                break Err(e.into());
                            }
                        }
                    }
                    if options.max_cycles.is_some_and(|max| cycles >= max) {
                        info!("reached {cycles} cycles, stopping");
                        break Ok(());
                    }
                }
            }
        };

        stop.store(true, Ordering::SeqCst);
        if let Some(exporter) = &options.exporter {
            if let Err(e) = exporter.export(pipeline.ledger(), Local::now().naive_local()) {
                warn!("session export failed: {e:#}");
            }
        }
        let stats = pipeline.filter_stats();
        info!(
            "session closed: {} batches, artifacts rejected {} of {} samples ({} forced through)",
            pipeline.ledger().counters().total_batches,
            stats.rejected,
            stats.inspected,
            stats.forced
        );
        tx.send(MonitorEvent::Stopped).ok();
        outcome
    })
}

/// Starts the producer thread polling `source` every `interval`.
///
/// Fetch errors become empty cycles. The thread ends when `stop` is raised or
/// the engine's receiver is dropped.
pub fn spawn_sampler<S>(
    mut source: S,
    interval: Duration,
    tx: Sender<EngineInput>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    S: SampleSource + Send + 'static,
{
    thread::spawn(move || {
        info!("📡 polling {} every {:?}", source.describe(), interval);
        while !stop.load(Ordering::SeqCst) {
            let started = Instant::now();
            let samples = match source.get_recent_samples() {
                Ok(samples) => samples,
                Err(e) => {
                    warn!("fetch failed: {e}");
                    Vec::new()
                }
            };
            if tx.send(EngineInput::Cycle(samples)).is_err() {
                break;
            }
            while !stop.load(Ordering::SeqCst) {
                let elapsed = started.elapsed();
                if elapsed >= interval {
                    break;
                }
                thread::sleep(STOP_POLL.min(interval - elapsed));
            }
        }
        debug!("sampler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use crate::analysis::classifier::Prediction;
    use crate::analysis::features::{FeatureLayout, FeatureVector, DEFAULT_LAYOUT};
    use crate::analysis::EmotionClassifier;
    use crate::drivers::pipeline::sample_at;
    use crate::drivers::{ManualSource, PipelineError, PipelineSettings, ViolationPolicy};

    /// Rejects every vector as the wrong shape.
    struct Misshapen;

    impl Classifier for Misshapen {
        fn predict(&self, features: &FeatureVector) -> Result<Prediction, PipelineError> {
            Err(PipelineError::FeatureShape {
                expected: features.len() + 1,
                actual: features.len(),
            })
        }

        fn layout(&self) -> &FeatureLayout {
            &DEFAULT_LAYOUT
        }
    }

    fn pipeline() -> EmotionPipeline<EmotionClassifier> {
        let model =
            EmotionClassifier::load(concat!(env!("CARGO_MANIFEST_DIR"), "/models/emotion_forest.json")).unwrap();
        EmotionPipeline::new(model, PipelineSettings::default())
    }

    fn cycle(start: i64) -> Vec<Sample> {
        (start..start + 10).map(|i| sample_at(i * 40, 0.42, 0.33, 0.25)).collect()
    }

    fn drain(rx: &Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        for event in rx.iter() {
            let done = matches!(event, MonitorEvent::Stopped);
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn batches(events: &[MonitorEvent]) -> usize {
        events.iter().filter(|e| matches!(e, MonitorEvent::BatchReady(..))).count()
    }

    #[test]
    fn commands_and_cycles_share_one_channel() {
        let (in_tx, in_rx) = mpsc::channel();
        let (ev_tx, ev_rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let engine = spawn(pipeline(), EngineOptions::default(), in_rx, ev_tx, stop.clone());
        in_tx.send(EngineInput::Command(EngineCommand::Status)).unwrap();
        in_tx.send(EngineInput::Cycle(cycle(0))).unwrap();
        in_tx.send(EngineInput::Cycle(Vec::new())).unwrap();
        in_tx.send(EngineInput::Command(EngineCommand::Pause)).unwrap();
        in_tx.send(EngineInput::Cycle(cycle(10))).unwrap();
        in_tx.send(EngineInput::Command(EngineCommand::Resume)).unwrap();
        in_tx.send(EngineInput::Cycle(cycle(20))).unwrap();
        in_tx.send(EngineInput::Command(EngineCommand::Status)).unwrap();
        in_tx.send(EngineInput::Command(EngineCommand::History(5))).unwrap();
        in_tx.send(EngineInput::Command(EngineCommand::Shutdown)).unwrap();
        let events = drain(&ev_rx);
        engine.join().unwrap().unwrap();
        assert!(stop.load(Ordering::SeqCst));
        assert_eq!(batches(&events), 2);
        assert!(matches!(events[0], MonitorEvent::Status(None)));
        assert!(events.iter().any(|e| matches!(e, MonitorEvent::CycleEmpty)));
        let status = events.iter().rev().find_map(|e| match e {
            MonitorEvent::Status(Some(report)) => Some(report.clone()),
            _ => None,
        });
        assert_eq!(status.unwrap().session_stats.total_batches, 2);
        let history = events.iter().find_map(|e| match e {
            MonitorEvent::History(report) => Some(report.prediction_history.len()),
            _ => None,
        });
        assert_eq!(history, Some(2));
    }

    #[test]
    fn sampler_feeds_engine_until_cycle_limit() {
        let (in_tx, in_rx) = mpsc::channel();
        let (ev_tx, ev_rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let options = EngineOptions {
            max_cycles: Some(3),
            ..EngineOptions::default()
        };
        let engine = spawn(pipeline(), options, in_rx, ev_tx, stop.clone());
        let source = ManualSource::new(vec![cycle(0), cycle(10), cycle(20)]);
        let sampler = spawn_sampler(source, Duration::from_millis(1), in_tx, stop);
        let events = drain(&ev_rx);
        engine.join().unwrap().unwrap();
        sampler.join().unwrap();
        assert_eq!(batches(&events), 3);
    }

    #[test]
    fn contract_violation_stops_engine_under_fail_policy() {
        let settings = PipelineSettings {
            on_contract_violation: ViolationPolicy::Fail,
            ..PipelineSettings::default()
        };
        let (in_tx, in_rx) = mpsc::channel();
        let (ev_tx, ev_rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let engine = spawn(
            EmotionPipeline::new(Misshapen, settings),
            EngineOptions::default(),
            in_rx,
            ev_tx,
            stop.clone(),
        );
        in_tx.send(EngineInput::Cycle(cycle(0))).unwrap();
        let events = drain(&ev_rx);
        let err = engine.join().unwrap().unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
        assert!(stop.load(Ordering::SeqCst));
        assert!(matches!(events.last(), Some(MonitorEvent::Stopped)));
        assert_eq!(batches(&events), 0);
    }

    #[test]
    fn contract_violation_is_skipped_under_skip_policy() {
        let settings = PipelineSettings {
            on_contract_violation: ViolationPolicy::Skip,
            ..PipelineSettings::default()
        };
        let (in_tx, in_rx) = mpsc::channel();
        let (ev_tx, ev_rx) = mpsc::channel();
        let options = EngineOptions {
            max_cycles: Some(2),
            ..EngineOptions::default()
        };
        let engine = spawn(
            EmotionPipeline::new(Misshapen, settings),
            options,
            in_rx,
            ev_tx,
            Arc::new(AtomicBool::new(false)),
        );
        in_tx.send(EngineInput::Cycle(cycle(0))).unwrap();
        in_tx.send(EngineInput::Cycle(cycle(10))).unwrap();
        let events = drain(&ev_rx);
        engine.join().unwrap().unwrap();
        let skipped = events.iter().filter(|e| matches!(e, MonitorEvent::BatchSkipped(_))).count();
        assert_eq!(skipped, 2);
    }

    #[test]
    fn exports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let (in_tx, in_rx) = mpsc::channel();
        let (ev_tx, ev_rx) = mpsc::channel();
        let options = EngineOptions {
            max_cycles: Some(1),
            snapshot: Some(SnapshotWriter::new(dir.path().join("latest.json"))),
            exporter: Some(SessionExporter::new(dir.path().join("sessions"))),
        };
        let engine = spawn(pipeline(), options, in_rx, ev_tx, Arc::new(AtomicBool::new(false)));
        in_tx.send(EngineInput::Cycle(cycle(0))).unwrap();
        drain(&ev_rx);
        engine.join().unwrap().unwrap();
        assert!(dir.path().join("latest.json").exists());
        let sessions: Vec<_> = std::fs::read_dir(dir.path().join("sessions")).unwrap().collect();
        assert_eq!(sessions.len(), 1);
    }
}
