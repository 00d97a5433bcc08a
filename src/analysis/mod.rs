//! Analysis modules.
//!
//! Classification of contrast measurements, per-element evaluation, and
//! aggregation of outcomes into scores and advice.

pub mod aggregator;
pub mod classifier;
pub mod evaluator;

pub use aggregator::*;
pub use classifier::{classify_severity, required_ratio, ClassifierConfig, IssueClassifier};
pub use evaluator::{ElementEvaluator, ElementOutcome};
