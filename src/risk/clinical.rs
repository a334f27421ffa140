//! Self-reported clinical answers.

use serde::{Deserialize, Serialize};

/// Number of values produced by [`ClinicalProfile::to_array`].
pub const CLINICAL_FEATURE_COUNT: usize = 3;

/// Answers collected alongside the recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalProfile {
    /// Age in years.
    pub age: u32,
    /// Has a known respiratory condition (asthma, COPD, ...).
    pub respiratory_condition: bool,
    /// Reports fever or muscle pain.
    pub fever_muscle_pain: bool,
}

impl ClinicalProfile {
    pub fn new(age: u32, respiratory_condition: bool, fever_muscle_pain: bool) -> Self {
        Self {
            age,
            respiratory_condition,
            fever_muscle_pain,
        }
    }

    /// `[age, respiratory_condition, fever_muscle_pain]` with flags as `0`/`1`.
    pub fn to_array(&self) -> [f64; CLINICAL_FEATURE_COUNT] {
        [
            self.age as f64,
            f64::from(u8::from(self.respiratory_condition)),
            f64::from(u8::from(self.fever_muscle_pain)),
        ]
    }
}
