//! Student enrollment with identity de-duplication.
//!
//! A registration is refused when the roll number is taken, when no face is
//! in view, or when the face already matches someone under the threshold.
//! Refusals never write to the store.

use crate::config::MatchSettings;
use crate::engine::EngineHandle;
use crate::error::SessionError;
use crate::events::{EventBus, SessionEvent, StatusLevel};
use crate::roster::Roster;
use rollcall_core::{FaceMatcher, StudentRecord};
use rollcall_store::DescriptorStore;

pub struct Registrar {
    roster: Roster,
    engine: EngineHandle,
    matching: MatchSettings,
}

impl Registrar {
    pub fn new(
        students: DescriptorStore,
        engine: EngineHandle,
        events: EventBus,
        matching: MatchSettings,
    ) -> Self {
        Self {
            roster: Roster::new(students, events),
            engine,
            matching,
        }
    }

    /// Capture one face from the live feed and enroll it as `name` / `roll`.
    ///
    /// Failures are also published as an error status.
    pub async fn register(&self, name: &str, roll: &str) -> Result<StudentRecord, SessionError> {
        match self.try_register(name.trim(), roll.trim()).await {
            Ok(record) => {
                self.roster.events().emit(SessionEvent::StudentsChanged);
                self.roster.events().status(
                    StatusLevel::Success,
                    format!("Registered {} successfully!", record.name),
                );
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(name, roll, error = %e, "registration refused");
                self.roster
                    .events()
                    .status(StatusLevel::Error, format!("Error: {e}"));
                Err(e)
            }
        }
    }

    async fn try_register(&self, name: &str, roll: &str) -> Result<StudentRecord, SessionError> {
        if name.is_empty() {
            return Err(SessionError::MissingField("name"));
        }
        if roll.is_empty() {
            return Err(SessionError::MissingField("roll number"));
        }

        if self.roster.store().contains(roll)? {
            return Err(SessionError::DuplicateId(roll.to_string()));
        }

        self.roster
            .events()
            .status(StatusLevel::Info, "Scanning face for uniqueness...");
        let detection = self
            .engine
            .detect_one()
            .await?
            .ok_or(SessionError::NoFaceDetected)?;

        // Re-read: the capture may have taken a while.
        let existing = self.roster.students()?;
        let matcher = FaceMatcher::from_records(&existing, self.matching.threshold)?
            .with_policy(self.matching.policy);
        let best = matcher.find_best_match(&detection.embedding)?;
        if let Some(label) = best.known_label() {
            return Err(SessionError::DuplicateFace {
                label: label.to_string(),
                distance: best.distance,
            });
        }

        let record = StudentRecord {
            name: name.to_string(),
            roll: roll.to_string(),
            descriptor: detection.embedding,
        };
        self.roster.store().add(record.clone())?;
        tracing::info!(
            name,
            roll,
            nearest = best.distance,
            dims = record.descriptor.len(),
            "student registered"
        );
        Ok(record)
    }
}
