//! Target column resolution.
//!
//! The target is either named by the caller or inferred from column names
//! through an ordered list of keyword tiers. Tiers are data, so callers can
//! swap in rules for other domains without touching the resolver.

use crate::error::{LearningError, Result};
use gradecast_processing::ColumnInfo;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One tier of target keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTier {
    /// Keywords in priority order.
    pub keywords: Vec<String>,
    /// When `false`, column names are lower-cased before matching and the
    /// keywords are expected in lower case.
    pub case_sensitive: bool,
}

impl KeywordTier {
    pub fn new<I, S>(keywords: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            case_sensitive,
        }
    }

    fn normalize<'a>(&self, name: &'a str) -> std::borrow::Cow<'a, str> {
        if self.case_sensitive {
            std::borrow::Cow::Borrowed(name)
        } else {
            std::borrow::Cow::Owned(name.to_lowercase())
        }
    }

    /// Column named exactly like one of the keywords, else the first column
    /// whose name contains one.
    fn find<'a>(&self, columns: &'a [ColumnInfo]) -> Option<&'a ColumnInfo> {
        let names: Vec<_> = columns.iter().map(|c| self.normalize(&c.name)).collect();

        let exact = columns
            .iter()
            .zip(&names)
            .find(|(_, name)| self.keywords.iter().any(|k| name.as_ref() == k.as_str()));
        if let Some((column, _)) = exact {
            return Some(column);
        }

        columns
            .iter()
            .zip(&names)
            .find(|(_, name)| self.keywords.iter().any(|k| name.contains(k.as_str())))
            .map(|(column, _)| column)
    }
}

/// Ordered keyword tiers used to infer the regression target.
///
/// The default rules check grade vocabulary in Chinese first (total score,
/// score, grade, final, midterm, coursework, overall evaluation), then
/// generic English terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRules {
    pub tiers: Vec<KeywordTier>,
}

impl Default for TargetRules {
    fn default() -> Self {
        Self {
            tiers: vec![
                KeywordTier::new(
                    ["总成绩", "总分", "分数", "成绩", "期末", "期中", "平时", "总评"],
                    true,
                ),
                KeywordTier::new(["gpa", "grade", "score", "final", "total"], false),
            ],
        }
    }
}

impl TargetRules {
    /// Rules with no keyword tiers: inference always falls back to the last
    /// continuous column.
    pub fn fallback_only() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Resolve the target column among preprocessed `columns`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::UnknownTargetColumn`] if `explicit` names a column
    ///   that is not present
    /// - [`LearningError::NoTargetColumnFound`] if nothing matches and there is
    ///   no numeric or datetime column to fall back to
    pub fn resolve(&self, explicit: Option<&str>, columns: &[ColumnInfo]) -> Result<String> {
        if let Some(name) = explicit {
            return columns
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.name.clone())
                .ok_or_else(|| LearningError::UnknownTargetColumn(name.to_string()));
        }

        for (idx, tier) in self.tiers.iter().enumerate() {
            if let Some(column) = tier.find(columns) {
                debug!("Target '{}' matched keyword tier {}", column.name, idx + 1);
                return Ok(column.name.clone());
            }
        }

        columns
            .iter()
            .rev()
            .find(|c| c.role.is_continuous())
            .map(|c| {
                debug!("Target '{}' chosen as the last numeric column", c.name);
                c.name.clone()
            })
            .ok_or(LearningError::NoTargetColumnFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradecast_processing::ColumnRole;

    fn columns(layout: &[(&str, ColumnRole)]) -> Vec<ColumnInfo> {
        layout
            .iter()
            .map(|(name, role)| ColumnInfo {
                name: name.to_string(),
                role: *role,
                original_type: "f64".to_string(),
            })
            .collect()
    }

    fn numeric(names: &[&str]) -> Vec<ColumnInfo> {
        let layout: Vec<(&str, ColumnRole)> =
            names.iter().map(|n| (*n, ColumnRole::Numeric)).collect();
        columns(&layout)
    }

    #[test]
    fn test_domain_tier_beats_generic_tier() {
        let cols = columns(&[
            ("name", ColumnRole::Categorical),
            ("总分", ColumnRole::Numeric),
            ("score", ColumnRole::Numeric),
        ]);
        let target = TargetRules::default().resolve(None, &cols).unwrap();
        assert_eq!(target, "总分");
    }

    #[test]
    fn test_exact_name_beats_substring() {
        let cols = numeric(&["study_hours", "attendance_count", "homework_score", "score"]);
        let target = TargetRules::default().resolve(None, &cols).unwrap();
        assert_eq!(target, "score");
    }

    #[test]
    fn test_substring_match_first_in_column_order() {
        let cols = numeric(&["hours", "Midterm_Score", "final_exam"]);
        let target = TargetRules::default().resolve(None, &cols).unwrap();
        assert_eq!(target, "Midterm_Score");
    }

    #[test]
    fn test_domain_tier_is_case_sensitive_substring() {
        let cols = numeric(&["hours", "期末成绩"]);
        let target = TargetRules::default().resolve(None, &cols).unwrap();
        assert_eq!(target, "期末成绩");
    }

    #[test]
    fn test_fallback_to_last_continuous_column() {
        let cols = columns(&[
            ("hours", ColumnRole::Numeric),
            ("exam_date", ColumnRole::Datetime),
            ("class", ColumnRole::Categorical),
            ("passed", ColumnRole::Boolean),
        ]);
        let target = TargetRules::default().resolve(None, &cols).unwrap();
        assert_eq!(target, "exam_date");
    }

    #[test]
    fn test_no_numeric_column() {
        let cols = columns(&[("class", ColumnRole::Categorical)]);
        let err = TargetRules::default().resolve(None, &cols).unwrap_err();
        assert!(matches!(err, LearningError::NoTargetColumnFound));
    }

    #[test]
    fn test_explicit_target_must_exist() {
        let cols = numeric(&["hours", "score"]);
        let rules = TargetRules::default();

        assert_eq!(rules.resolve(Some("hours"), &cols).unwrap(), "hours");
        let err = rules.resolve(Some("Score"), &cols).unwrap_err();
        assert!(matches!(err, LearningError::UnknownTargetColumn(name) if name == "Score"));
    }

    #[test]
    fn test_fallback_only_rules() {
        let cols = numeric(&["score", "hours"]);
        let target = TargetRules::fallback_only().resolve(None, &cols).unwrap();
        assert_eq!(target, "hours");
    }
}
