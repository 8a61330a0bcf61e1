use serde::{Deserialize, Serialize};

// ============================================================================
// Column Roles
// ============================================================================

/// Role a column plays after preprocessing, derived from its native dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Integer or float, stored as `f64`.
    Numeric,
    /// Date or timestamp, stored as fractional days since 1970-01-01.
    Datetime,
    /// Boolean, stored as `0.0`/`1.0`.
    Boolean,
    /// Text, stored as a label-encoded integer code.
    Categorical,
}

impl ColumnRole {
    /// Returns the role name as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Datetime => "datetime",
            Self::Boolean => "boolean",
            Self::Categorical => "categorical",
        }
    }

    /// Whether values of this role are continuous measurements.
    ///
    /// Only continuous columns take part in mean/median imputation and outlier
    /// handling, and only they can serve as an inferred regression target.
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::Numeric | Self::Datetime)
    }
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A preprocessed column: its name, role, and the dtype it arrived with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub role: ColumnRole,
    pub original_type: String,
}

// ============================================================================
// Preprocessing Summary
// ============================================================================

/// Human-readable summary of what the preprocessor did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessingSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Number of rows before deduplication.
    pub rows_before: usize,
    /// Number of rows after deduplication.
    pub rows_after: usize,
    /// Number of exact duplicate rows removed.
    pub duplicates_removed: usize,

    /// Number of columns in the input table.
    pub columns_before: usize,
    /// Number of columns in the output table.
    pub columns_after: usize,

    /// Actions taken, in execution order.
    pub actions: Vec<PreprocessingAction>,

    /// Per-column summaries of changes.
    pub column_summaries: Vec<ColumnSummary>,

    /// Warnings about degraded columns.
    pub warnings: Vec<String>,
}

impl PreprocessingSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the summary.
    pub fn add_action(&mut self, action: PreprocessingAction) {
        self.actions.push(action);
    }

    /// Add a warning to the summary.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Mutable access to the summary of a column, creating it on first use.
    pub fn column_mut(&mut self, name: &str) -> &mut ColumnSummary {
        let idx = match self.column_summaries.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.column_summaries.push(ColumnSummary::new(name));
                self.column_summaries.len() - 1
            }
        };
        &mut self.column_summaries[idx]
    }

    /// Total number of cells filled during imputation.
    pub fn total_imputed(&self) -> usize {
        self.column_summaries.iter().map(|c| c.missing_filled).sum()
    }

    /// Total number of outlier values replaced.
    pub fn total_outliers(&self) -> usize {
        self.column_summaries.iter().map(|c| c.outliers_replaced).sum()
    }
}

/// A single action taken during preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingAction {
    /// Type of action performed.
    pub action_type: ActionType,
    /// Target of the action (column name or "dataset").
    pub target: String,
    /// Human-readable description of the action.
    pub description: String,
    /// Additional details (e.g., fill value, fence bounds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PreprocessingAction {
    /// Create a new preprocessing action.
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
            details: None,
        }
    }

    /// Add details to the action.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Types of actions that can be taken during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Duplicate rows were removed.
    DuplicatesRemoved,
    /// A datetime column was converted to day offsets.
    DatetimeConverted,
    /// A column's data type was unified to `f64` or fell back to text.
    TypeCorrected,
    /// Missing values were imputed.
    ValueImputed,
    /// Outliers were replaced.
    OutlierHandled,
    /// Categories were label-encoded.
    CategoriesEncoded,
    /// A column could not be represented numerically and was left out.
    ColumnRemoved,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DuplicatesRemoved => "Duplicates Removed",
            Self::DatetimeConverted => "Datetime Converted",
            Self::TypeCorrected => "Type Corrected",
            Self::ValueImputed => "Value Imputed",
            Self::OutlierHandled => "Outlier Handled",
            Self::CategoriesEncoded => "Categories Encoded",
            Self::ColumnRemoved => "Column Removed",
        }
    }
}

/// Summary of changes made to a single column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Name of the column.
    pub name: String,
    /// Number of missing values filled.
    pub missing_filled: usize,
    /// Imputation method used, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imputation_method: Option<String>,
    /// Number of outlier values replaced.
    pub outliers_replaced: usize,
    /// Number of distinct labels, for encoded columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_labels: Option<usize>,
}

impl ColumnSummary {
    /// Create an empty summary for a column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
