//! Imputation module for handling missing values.
//!
//! Numeric and datetime columns are filled with their mean or median,
//! boolean and text columns with their mode.

mod statistical;

pub use statistical::StatisticalImputer;
