//! Pipeline module.
//!
//! This module provides the preprocessor that chains deduplication, dtype
//! normalization, imputation, outlier handling and label encoding.

mod executor;
pub mod outliers;

pub use executor::{Preprocessor, preprocess};
pub use outliers::{OutlierHandler, OutlierScan};
