use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four evaluation dimensions every step is scored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Mindfulness,
    Emptiness,
    NonDuality,
    BoundlessCare,
}

impl Dimension {
    /// Fixed order used for rendering and fallback feedback
    pub const ALL: [Dimension; 4] = [
        Dimension::Mindfulness,
        Dimension::Emptiness,
        Dimension::NonDuality,
        Dimension::BoundlessCare,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Mindfulness => "Mindfulness",
            Dimension::Emptiness => "Emptiness",
            Dimension::NonDuality => "Non-duality",
            Dimension::BoundlessCare => "Boundless care",
        }
    }

    /// Key used in the structured step payload
    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Mindfulness => "mindfulness",
            Dimension::Emptiness => "emptiness",
            Dimension::NonDuality => "nonDuality",
            Dimension::BoundlessCare => "boundlessCare",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("{dimension} score {value} is outside [0, 1]")]
    OutOfRange { dimension: Dimension, value: f64 },
}

/// Self-assessed scores for one step, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DharmaScores {
    pub mindfulness: f64,
    pub emptiness: f64,
    #[serde(alias = "non_duality")]
    pub non_duality: f64,
    #[serde(alias = "boundless_care")]
    pub boundless_care: f64,
}

impl DharmaScores {
    pub const MIDPOINT: f64 = 0.5;

    pub fn new(mindfulness: f64, emptiness: f64, non_duality: f64, boundless_care: f64) -> Self {
        Self {
            mindfulness,
            emptiness,
            non_duality,
            boundless_care,
        }
    }

    /// Every dimension set to the same value
    pub fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    /// Scores used when a step could not be parsed
    pub fn midpoint() -> Self {
        Self::uniform(Self::MIDPOINT)
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Mindfulness => self.mindfulness,
            Dimension::Emptiness => self.emptiness,
            Dimension::NonDuality => self.non_duality,
            Dimension::BoundlessCare => self.boundless_care,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    pub fn aggregate(&self) -> f64 {
        aggregate(self)
    }

    /// Reject NaN and anything outside [0, 1]
    pub fn validate(&self) -> Result<(), ScoreError> {
        for (dimension, value) in self.iter() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScoreError::OutOfRange { dimension, value });
            }
        }
        Ok(())
    }

    /// Dimensions scoring strictly below `target`, in fixed order
    pub fn below(&self, target: f64) -> Vec<Dimension> {
        self.iter()
            .filter(|(_, value)| *value < target)
            .map(|(dimension, _)| dimension)
            .collect()
    }

    /// One-line breakdown, e.g. `M 0.80 · E 0.70 · N 0.60 · C 0.90`
    pub fn short_description(&self) -> String {
        format!(
            "M {:.2} · E {:.2} · N {:.2} · C {:.2}",
            self.mindfulness, self.emptiness, self.non_duality, self.boundless_care
        )
    }
}

/// Arithmetic mean of the four sub-scores. Inputs are assumed bounded.
pub fn aggregate(scores: &DharmaScores) -> f64 {
    (scores.mindfulness + scores.emptiness + scores.non_duality + scores.boundless_care) / 4.0
}
