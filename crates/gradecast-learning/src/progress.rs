//! Progress reporting for training runs.
//!
//! [`Trainer`](crate::Trainer) reports each stage it enters through an
//! optional [`ProgressCallback`]. During model selection it also reports
//! which candidate family is being cross-validated.
//!
//! # Example
//!
//! ```
//! use gradecast_learning::{ProgressUpdate, Trainer, TrainingConfig};
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::default())
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% {}", update.stage, update.progress * 100.0, update.message);
//!     })
//!     .build();
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// The stage a training run is in.
///
/// Stages run in declaration order. [`Complete`](Self::Complete),
/// [`Failed`](Self::Failed) and [`Cancelled`](Self::Cancelled) are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    #[default]
    Initializing,
    /// Cleaning, imputing and encoding the table.
    Preprocessing,
    /// Picking the target column.
    TargetResolution,
    /// Building the feature matrix and the train/test split.
    Splitting,
    /// Cross-validating and tuning the candidate families.
    ModelSelection,
    /// Scoring the selected model on the held-out rows.
    Evaluation,
    /// Refitting the selected configuration on every row.
    Refitting,
    Complete,
    Failed,
    Cancelled,
}

impl TrainingStage {
    const ALL: [TrainingStage; 10] = [
        Self::Initializing,
        Self::Preprocessing,
        Self::TargetResolution,
        Self::Splitting,
        Self::ModelSelection,
        Self::Evaluation,
        Self::Refitting,
        Self::Complete,
        Self::Failed,
        Self::Cancelled,
    ];

    /// # Examples
    ///
    /// ```
    /// use gradecast_learning::TrainingStage;
    ///
    /// assert_eq!(TrainingStage::ModelSelection.as_str(), "model_selection");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Preprocessing => "preprocessing",
            Self::TargetResolution => "target_resolution",
            Self::Splitting => "splitting",
            Self::ModelSelection => "model_selection",
            Self::Evaluation => "evaluation",
            Self::Refitting => "refitting",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`TrainingStage`] name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingStageError {
    invalid_value: String,
}

impl ParseTrainingStageError {
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl fmt::Display for ParseTrainingStageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = TrainingStage::ALL.iter().map(|s| s.as_str()).collect();
        write!(
            f,
            "invalid training stage: '{}'. Valid values are: {}",
            self.invalid_value,
            valid.join(", ")
        )
    }
}

impl std::error::Error for ParseTrainingStageError {}

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ParseTrainingStageError {
                invalid_value: s.to_string(),
            })
    }
}

/// A progress update sent to the callback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0, non-decreasing within a run.
    pub progress: f64,

    /// Human-readable status, e.g. "Cross-validating ridge".
    pub message: String,

    /// Family being evaluated, during [`TrainingStage::ModelSelection`].
    pub current_model: Option<String>,

    /// `(completed, total)` candidate families, during model selection.
    pub models_completed: Option<(u32, u32)>,
}

/// Callback receiving [`ProgressUpdate`]s.
///
/// Called on the training thread; keep it quick or forward to a channel.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Sends updates to an optional callback and mirrors them to the debug log.
#[derive(Clone, Copy)]
pub(crate) struct ProgressReporter<'a> {
    callback: Option<&'a ProgressCallback>,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn stage(&self, stage: TrainingStage, progress: f64, message: impl Into<String>) {
        self.send(ProgressUpdate {
            stage,
            progress,
            message: message.into(),
            ..ProgressUpdate::default()
        });
    }

    pub(crate) fn model(&self, family: &str, completed: usize, total: usize, progress: f64) {
        self.send(ProgressUpdate {
            stage: TrainingStage::ModelSelection,
            progress,
            message: format!("Cross-validating {family}"),
            current_model: Some(family.to_string()),
            models_completed: Some((completed as u32, total as u32)),
        });
    }

    fn send(&self, update: ProgressUpdate) {
        debug!(
            "[{}] {:.0}% {}",
            update.stage,
            update.progress * 100.0,
            update.message
        );
        if let Some(callback) = self.callback {
            callback(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_stage_names_round_trip() {
        for stage in TrainingStage::ALL {
            let parsed: TrainingStage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_unknown_stage() {
        let err = "training".parse::<TrainingStage>().unwrap_err();
        assert_eq!(err.invalid_value(), "training");
        assert!(err.to_string().contains("model_selection"));
    }

    #[test]
    fn test_terminal_stages() {
        assert!(TrainingStage::Complete.is_terminal());
        assert!(TrainingStage::Failed.is_terminal());
        assert!(TrainingStage::Cancelled.is_terminal());
        assert!(!TrainingStage::Refitting.is_terminal());
    }

    #[test]
    fn test_progress_update_default() {
        let update = ProgressUpdate::default();
        assert_eq!(update.stage, TrainingStage::Initializing);
        assert_eq!(update.progress, 0.0);
        assert!(update.current_model.is_none());
    }

    #[test]
    fn test_reporter_forwards_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |u: ProgressUpdate| {
            sink.lock().unwrap().push(u);
        });

        let reporter = ProgressReporter::new(Some(&callback));
        reporter.stage(TrainingStage::Preprocessing, 0.1, "Preprocessing 12 rows");
        reporter.model("ridge", 1, 4, 0.4);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].stage, TrainingStage::Preprocessing);
        assert_eq!(seen[1].current_model.as_deref(), Some("ridge"));
        assert_eq!(seen[1].models_completed, Some((1, 4)));
    }

    #[test]
    fn test_reporter_without_callback() {
        ProgressReporter::new(None).stage(TrainingStage::Complete, 1.0, "done");
    }
}
