//! Manual body measurement entry.
//!
//! The form keeps its inputs as raw text, the way a form view holds them, and
//! only turns them into numbers on submit. It writes straight to the record
//! store without going through the upload pipeline.

use crate::error::{IntakeError, Result};
use crate::events::{EventBus, IntakeEvent};
use crate::identity::{Identity, SessionContext};
use crate::notify::{Notifier, Severity};
use crate::pipeline::Collaborators;
use crate::profile::{Measurements, ProfilePatch};
use crate::storage::RecordStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementField {
    Height,
    Weight,
    Chest,
    Waist,
    Hips,
}

impl MeasurementField {
    pub fn name(&self) -> &'static str {
        match self {
            MeasurementField::Height => "height",
            MeasurementField::Weight => "weight",
            MeasurementField::Chest => "chest",
            MeasurementField::Waist => "waist",
            MeasurementField::Hips => "hips",
        }
    }
}

/// Text currently entered in each field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementInput {
    pub height: String,
    pub weight: String,
    pub chest: String,
    pub waist: String,
    pub hips: String,
}

impl MeasurementInput {
    fn slot(&mut self, field: MeasurementField) -> &mut String {
        match field {
            MeasurementField::Height => &mut self.height,
            MeasurementField::Weight => &mut self.weight,
            MeasurementField::Chest => &mut self.chest,
            MeasurementField::Waist => &mut self.waist,
            MeasurementField::Hips => &mut self.hips,
        }
    }

    pub fn is_empty(&self) -> bool {
        [&self.height, &self.weight, &self.chest, &self.waist, &self.hips]
            .iter()
            .all(|value| value.trim().is_empty())
    }

    /// Parse the entered text into measurements
    pub fn parse(&self) -> Result<Measurements> {
        Ok(Measurements {
            height: required(MeasurementField::Height, &self.height)?,
            weight: required(MeasurementField::Weight, &self.weight)?,
            chest: optional(MeasurementField::Chest, &self.chest)?,
            waist: optional(MeasurementField::Waist, &self.waist)?,
            hips: optional(MeasurementField::Hips, &self.hips)?,
        })
    }
}

fn required(field: MeasurementField, raw: &str) -> Result<f64> {
    optional(field, raw)?
        .ok_or_else(|| IntakeError::rejected(format!("{} is required", field.name())))
}

/// Blank means unset; anything else must be a finite positive number
fn optional(field: MeasurementField, raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(Some(value)),
        _ => Err(IntakeError::rejected(format!(
            "{} must be a positive number, got '{}'",
            field.name(),
            raw
        ))),
    }
}

pub struct MeasurementForm {
    input: MeasurementInput,
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    profiles_collection: String,
    event_bus: Option<Arc<EventBus>>,
}

impl MeasurementForm {
    pub fn new(
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        profiles_collection: impl Into<String>,
    ) -> Self {
        Self {
            input: MeasurementInput::default(),
            records,
            notifier,
            profiles_collection: profiles_collection.into(),
            event_bus: None,
        }
    }

    pub fn from_collaborators(
        collaborators: &Collaborators,
        profiles_collection: impl Into<String>,
    ) -> Self {
        Self::new(
            Arc::clone(&collaborators.records),
            Arc::clone(&collaborators.notifier),
            profiles_collection,
        )
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn set(&mut self, field: MeasurementField, value: impl Into<String>) {
        *self.input.slot(field) = value.into();
    }

    pub fn input(&self) -> &MeasurementInput {
        &self.input
    }

    pub fn clear(&mut self) {
        self.input = MeasurementInput::default();
    }

    /// Submit on behalf of the session's user
    pub async fn submit_in(&mut self, context: &SessionContext) -> Result<Measurements> {
        match context.require_identity() {
            Ok(identity) => self.submit(identity).await,
            Err(e) => Err(self.report(e)),
        }
    }

    /// Validate and persist the entered measurements.
    ///
    /// On success the inputs are cleared; on any failure they are kept so the
    /// user can correct them.
    pub async fn submit(&mut self, identity: &Identity) -> Result<Measurements> {
        let measurements = match self.input.parse() {
            Ok(measurements) => measurements,
            Err(e) => return Err(self.report(e)),
        };
        debug!("Saving measurements for {}: {:?}", identity, measurements);

        let partial = match ProfilePatch::measurements(&measurements).into_record() {
            Ok(partial) => partial,
            Err(e) => return Err(self.report(e.into())),
        };
        let fields: Vec<String> = partial.keys().cloned().collect();

        if let Err(e) = self
            .records
            .upsert(&self.profiles_collection, identity, partial)
            .await
        {
            let err = IntakeError::PersistFailed {
                reference: identity.to_string(),
                details: e.to_string(),
            };
            return Err(self.report(err));
        }

        info!("Measurements saved for {}", identity);
        if let Some(bus) = &self.event_bus {
            let _ = bus.publish(IntakeEvent::ProfileUpdated {
                user_id: identity.to_string(),
                fields,
            });
        }
        self.notifier.notify(
            "Measurements saved",
            "Your measurements have been saved to your profile",
            Severity::Success,
        );
        self.clear();

        Ok(measurements)
    }

    fn report(&self, err: IntakeError) -> IntakeError {
        warn!("Measurement submission failed: {}", err);
        let (title, severity) = match err {
            IntakeError::ValidationRejected { .. } => ("Invalid measurements", Severity::Warning),
            _ => (err.kind().title(), Severity::Error),
        };
        self.notifier.notify(title, &err.to_string(), severity);
        err
    }
}
