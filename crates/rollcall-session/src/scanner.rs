//! Live attendance scanner.
//!
//! `Idle -> Armed` on [`AttendanceScanner::arm`], `Armed -> Scanning` while
//! [`AttendanceScanner::run`] loops, back to `Idle` when the loop ends. The
//! matcher snapshot taken at arm time is kept for the whole session unless
//! `refresh_on_change` is set.

use crate::config::ScannerSettings;
use crate::engine::EngineHandle;
use crate::error::SessionError;
use crate::events::{EventBus, FaceHit, SessionEvent, StatusLevel};
use rollcall_core::{AttendanceEntry, Clock, FaceMatcher};
use rollcall_store::{AttendanceLog, DescriptorStore};
use std::future::Future;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Armed,
    Scanning,
}

/// What one tick saw and wrote.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub hits: Vec<FaceHit>,
    /// Entries created by this tick (already-present people are not listed).
    pub marked: Vec<AttendanceEntry>,
}

struct Snapshot {
    matcher: FaceMatcher,
    revision: u64,
}

pub struct AttendanceScanner {
    students: DescriptorStore,
    log: AttendanceLog,
    clock: Arc<dyn Clock>,
    engine: EngineHandle,
    events: EventBus,
    settings: ScannerSettings,
    state: ScannerState,
    snapshot: Option<Snapshot>,
}

impl AttendanceScanner {
    pub fn new(
        students: DescriptorStore,
        log: AttendanceLog,
        clock: Arc<dyn Clock>,
        engine: EngineHandle,
        events: EventBus,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            students,
            log,
            clock,
            engine,
            events,
            settings,
            state: ScannerState::Idle,
            snapshot: None,
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    /// Build the matcher snapshot. Requires at least one registered student.
    pub fn arm(&mut self) -> Result<(), SessionError> {
        match self.build_snapshot() {
            Ok(snapshot) => {
                tracing::info!(
                    labels = snapshot.matcher.label_count(),
                    dims = ?snapshot.matcher.dimension(),
                    threshold = snapshot.matcher.threshold(),
                    "scanner armed"
                );
                self.snapshot = Some(snapshot);
                self.state = ScannerState::Armed;
                Ok(())
            }
            Err(e) => {
                self.events.status(StatusLevel::Error, e.to_string());
                Err(e)
            }
        }
    }

    /// Drop the snapshot and return to `Idle`.
    pub fn disarm(&mut self) {
        self.snapshot = None;
        self.state = ScannerState::Idle;
    }

    fn build_snapshot(&self) -> Result<Snapshot, SessionError> {
        let revision = self.students.revision();
        let loaded = self.students.load()?;
        if let Some(c) = &loaded.corruption {
            self.events.status(StatusLevel::Warning, c.to_string());
        }
        if loaded.items.is_empty() {
            return Err(SessionError::EmptyDatabase);
        }
        let matcher = FaceMatcher::from_records(&loaded.items, self.settings.matching.threshold)?
            .with_policy(self.settings.matching.policy);
        Ok(Snapshot { matcher, revision })
    }

    /// Run one detection pass over the current frame.
    ///
    /// A frame source that is not ready yields an empty report.
    pub async fn tick(&mut self) -> Result<ScanReport, SessionError> {
        if self.state == ScannerState::Idle {
            return Err(SessionError::NotArmed);
        }
        self.refresh_if_stale();

        let detections = match self.engine.detect_all().await {
            Ok(d) => d,
            Err(e) => match SessionError::from(e) {
                SessionError::CameraNotReady => return Ok(ScanReport::default()),
                other => return Err(other),
            },
        };

        let Some(snapshot) = &self.snapshot else {
            return Err(SessionError::NotArmed);
        };

        let mut report = ScanReport::default();
        let mut failed = None;
        for detection in detections {
            let best = match snapshot.matcher.find_best_match(&detection.embedding) {
                Ok(best) => best,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping detection");
                    continue;
                }
            };
            if let Some(label) = best.known_label() {
                match self.mark_attendance(label) {
                    Ok(Some(entry)) => report.marked.push(entry),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(label, error = %e, "failed to mark attendance");
                        failed.get_or_insert(e);
                    }
                }
            }
            report.hits.push(FaceHit {
                best,
                bbox: detection.bbox,
            });
        }

        if !report.hits.is_empty() {
            tracing::debug!(faces = report.hits.len(), marked = report.marked.len(), "tick");
        }
        self.events.emit(SessionEvent::Overlay(report.hits.clone()));
        match failed {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Mark `name` present today unless already marked.
    pub fn mark_attendance(&self, name: &str) -> Result<Option<AttendanceEntry>, SessionError> {
        let marked = self.log.mark(name, self.clock.now())?;
        if let Some(c) = &marked.corruption {
            self.events.status(StatusLevel::Warning, c.to_string());
        }
        if let Some(entry) = &marked.entry {
            self.events.emit(SessionEvent::AttendanceChanged(entry.clone()));
        }
        Ok(marked.entry)
    }

    fn refresh_if_stale(&mut self) {
        if !self.settings.refresh_on_change {
            return;
        }
        let current = self.students.revision();
        if self.snapshot.as_ref().is_some_and(|s| s.revision == current) {
            return;
        }
        match self.build_snapshot() {
            Ok(snapshot) => {
                tracing::info!(revision = current, "matcher snapshot refreshed");
                self.snapshot = Some(snapshot);
            }
            Err(e) => tracing::warn!(error = %e, "keeping previous matcher snapshot"),
        }
    }

    /// Tick on the configured interval until `shutdown` resolves or the frame
    /// source ends. Missed ticks are skipped, never queued.
    ///
    /// Camera access failures stop the loop and are returned. Other per-frame
    /// failures keep the loop going; those a retry will not clear are also
    /// published as an error status.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), SessionError>
    where
        F: Future<Output = ()>,
    {
        if self.state == ScannerState::Idle {
            return Err(SessionError::NotArmed);
        }
        self.state = ScannerState::Scanning;
        self.events.status(StatusLevel::Info, "Scanning for faces...");

        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(_) => {}
                        Err(SessionError::EndOfStream) => {
                            tracing::info!("frame source ended");
                            break Ok(());
                        }
                        Err(e @ (SessionError::CameraAccess(_) | SessionError::EngineUnavailable)) => {
                            self.events.status(StatusLevel::Error, format!("Error: {e}"));
                            break Err(e);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "scan tick failed");
                            if !e.is_retryable() {
                                self.events.status(StatusLevel::Error, format!("Error: {e}"));
                            }
                        }
                    }
                }
            }
        };

        self.disarm();
        tracing::info!("scanner stopped");
        outcome
    }
}
