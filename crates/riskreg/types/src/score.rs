//! Probability / impact scores and the derived product.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A probability or impact rating on the register's 1–5 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Build a score, rejecting anything outside `1..=5`.
    pub fn new(value: u8) -> ModelResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ModelError::ScoreOutOfRange(i64::from(value)))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Product of two optional scores; `None` if either side is missing.
    pub fn product(probability: Option<Score>, impact: Option<Score>) -> Option<u8> {
        match (probability, impact) {
            (Some(p), Some(i)) => Some(p.0 * i.0),
            _ => None,
        }
    }

    /// Parse user-entered text. Empty text clears the score.
    pub fn parse_optional(field: &str, text: &str) -> ModelResult<Option<Score>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let raw: i64 = trimmed.parse().map_err(|_| ModelError::InvalidValue {
            field: field.to_string(),
            value: text.to_string(),
        })?;
        let value = u8::try_from(raw).map_err(|_| ModelError::ScoreOutOfRange(raw))?;
        Score::new(value).map(Some)
    }
}

impl TryFrom<u8> for Score {
    type Error = ModelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Probability, impact and their product. Any member may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTriple {
    pub probability: Option<Score>,
    pub impact: Option<Score>,
    pub score: Option<u8>,
}

impl ScoreTriple {
    /// Triple whose score is the product of the two inputs.
    pub fn from_pair(probability: Option<Score>, impact: Option<Score>) -> Self {
        Self {
            probability,
            impact,
            score: Score::product(probability, impact),
        }
    }

    /// The all-null triple ("controls exist but none are scored").
    pub fn unscored() -> Self {
        Self::default()
    }

    pub fn is_unscored(&self) -> bool {
        self.probability.is_none() && self.impact.is_none() && self.score.is_none()
    }
}
