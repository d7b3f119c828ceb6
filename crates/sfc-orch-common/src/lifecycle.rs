//! Lifecycle stages of a state-changing operation.
//!
//! Every mutating operation moves through
//! `Validating -> Persisting -> Dispatching -> Committed`. Failing in a stage
//! maps to exactly one [`Rejection`], which tells the caller whether local
//! state may have changed before the failure.

use std::fmt;
use tracing::debug;

/// Stage an operation is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleStage {
    /// Request is being checked; nothing has been written.
    Validating,
    /// Store transaction in progress (quota, uniqueness, write).
    Persisting,
    /// Backend drivers are being called.
    Dispatching,
    /// Operation completed.
    Committed,
}

impl LifecycleStage {
    /// Returns the stage name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Validating => "validating",
            LifecycleStage::Persisting => "persisting",
            LifecycleStage::Dispatching => "dispatching",
            LifecycleStage::Committed => "committed",
        }
    }

    /// Returns the rejection a failure in this stage produces.
    ///
    /// `Committed` cannot fail and yields `None`.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            LifecycleStage::Validating => Some(Rejection::RejectedValidation),
            LifecycleStage::Persisting => Some(Rejection::RejectedPersistence),
            LifecycleStage::Dispatching => Some(Rejection::RejectedByDriver),
            LifecycleStage::Committed => None,
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure exit of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Rejected before any write.
    RejectedValidation,
    /// Rejected by the store (quota, uniqueness, references).
    RejectedPersistence,
    /// A driver failed after local state changed.
    RejectedByDriver,
}

impl Rejection {
    /// Returns true if local state was untouched by the failed operation.
    pub fn is_side_effect_free(&self) -> bool {
        matches!(
            self,
            Rejection::RejectedValidation | Rejection::RejectedPersistence
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::RejectedValidation => "rejected_validation",
            Rejection::RejectedPersistence => "rejected_persistence",
            Rejection::RejectedByDriver => "rejected_by_driver",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the stage of one operation and logs each transition.
///
/// Stages only move forward; the transition methods make backward moves
/// unrepresentable.
#[derive(Debug)]
pub struct OperationTracker {
    operation: String,
    object_id: Option<String>,
    stage: LifecycleStage,
}

impl OperationTracker {
    /// Starts tracking an operation in the `Validating` stage.
    pub fn new(operation: impl Into<String>) -> Self {
        let tracker = Self {
            operation: operation.into(),
            object_id: None,
            stage: LifecycleStage::Validating,
        };
        debug!(
            operation = %tracker.operation,
            stage = %tracker.stage,
            "operation started"
        );
        tracker
    }

    /// Records the id of the object the operation acts on.
    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    /// Sets the object id once it is known (e.g. after id assignment).
    pub fn set_object_id(&mut self, id: impl Into<String>) {
        self.object_id = Some(id.into());
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Moves to `Persisting`.
    pub fn persisting(&mut self) {
        self.enter(LifecycleStage::Persisting);
    }

    /// Moves to `Dispatching`.
    pub fn dispatching(&mut self) {
        self.enter(LifecycleStage::Dispatching);
    }

    /// Moves to `Committed`.
    pub fn commit(&mut self) {
        self.enter(LifecycleStage::Committed);
    }

    /// Returns the rejection for a failure in the current stage.
    pub fn reject(&self) -> Rejection {
        // Committed operations do not fail; treat a late failure as a driver one.
        let rejection = self.stage.rejection().unwrap_or(Rejection::RejectedByDriver);
        debug!(
            operation = %self.operation,
            object_id = self.object_id.as_deref().unwrap_or(""),
            stage = %self.stage,
            rejection = %rejection,
            "operation rejected"
        );
        rejection
    }

    fn enter(&mut self, next: LifecycleStage) {
        if next <= self.stage {
            return;
        }
        debug!(
            operation = %self.operation,
            object_id = self.object_id.as_deref().unwrap_or(""),
            from = %self.stage,
            to = %next,
            "operation stage change"
        );
        self.stage = next;
    }
}
