//! Rating scales and per-sample validation.
//!
//! Every completion the provider returns is judged independently: it either
//! becomes an accepted sample or is rejected with a reason. Rejections are
//! data, not errors; the collector logs them and asks for more.

use serde::{Deserialize, Serialize};

/// Inclusive integer range a rating must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: i64,
    pub max: i64,
}

impl RatingScale {
    pub const ONE_TO_FIVE: RatingScale = RatingScale { min: 1, max: 5 };
    pub const ONE_TO_SEVEN: RatingScale = RatingScale { min: 1, max: 7 };
    pub const ONE_TO_HUNDRED: RatingScale = RatingScale { min: 1, max: 100 };

    /// Returns `None` when `min > max`.
    pub fn new(min: i64, max: i64) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Judge one raw completion.
    pub fn judge(&self, raw: &str) -> SampleVerdict {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return SampleVerdict::Rejected(RejectReason::Empty);
        }
        match trimmed.parse::<i64>() {
            Ok(value) if self.contains(value) => SampleVerdict::Accepted(value),
            Ok(value) => SampleVerdict::Rejected(RejectReason::OutOfRange { value }),
            Err(_) => SampleVerdict::Rejected(RejectReason::Unparsable {
                raw: trimmed.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RatingScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Outcome of judging one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleVerdict {
    Accepted(i64),
    Rejected(RejectReason),
}

/// Why a completion did not count toward the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Blank completion (often a token cap hit by a reasoning model).
    Empty,
    /// Not an integer.
    Unparsable { raw: String },
    /// Integer outside the scale.
    OutOfRange { value: i64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Empty => f.write_str("empty completion"),
            RejectReason::Unparsable { raw } => write!(f, "not an integer: {raw:?}"),
            RejectReason::OutOfRange { value } => write!(f, "out of range: {value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judge_accepts_padded_integers_in_range() {
        let scale = RatingScale::ONE_TO_SEVEN;
        assert_eq!(scale.judge(" 4\n"), SampleVerdict::Accepted(4));
        assert_eq!(scale.judge("1"), SampleVerdict::Accepted(1));
        assert_eq!(scale.judge("7"), SampleVerdict::Accepted(7));
    }

    #[test]
    fn judge_rejects_out_of_range() {
        let scale = RatingScale::ONE_TO_SEVEN;
        assert_eq!(
            scale.judge("99"),
            SampleVerdict::Rejected(RejectReason::OutOfRange { value: 99 })
        );
        assert_eq!(
            scale.judge("0"),
            SampleVerdict::Rejected(RejectReason::OutOfRange { value: 0 })
        );
    }

    #[test]
    fn judge_rejects_prose_decimals_and_blanks() {
        let scale = RatingScale::ONE_TO_HUNDRED;
        assert!(matches!(
            scale.judge("I'd say 50"),
            SampleVerdict::Rejected(RejectReason::Unparsable { .. })
        ));
        assert!(matches!(
            scale.judge("4.5"),
            SampleVerdict::Rejected(RejectReason::Unparsable { .. })
        ));
        assert_eq!(
            scale.judge("   "),
            SampleVerdict::Rejected(RejectReason::Empty)
        );
    }

    #[test]
    fn new_rejects_inverted_bounds() {
        assert!(RatingScale::new(7, 1).is_none());
        assert_eq!(RatingScale::new(3, 3), Some(RatingScale { min: 3, max: 3 }));
    }
}
