//! Quorum calculation for a single proposal
//!
//! All inputs are decimal-normalized. `F` and `T` are percentages.

use crate::models::QuorumSummary;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuorumError {
    #[error("total votes is zero (supply {supply}, threshold {threshold}%, max vote weight {fraction}%)")]
    ZeroTotalVotes {
        supply: f64,
        threshold: f64,
        fraction: f64,
    },

    #[error("{name} must be within 0..=100, got {value}")]
    PercentageOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidAmount { name: &'static str, value: f64 },
}

/// Inputs for one quorum calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuorumInputs {
    /// Max vote weight source, percent of supply (`F`)
    pub max_vote_weight_fraction: f64,
    /// Applicable vote threshold, percent (`T`)
    pub vote_threshold: f64,
    /// Governing mint supply (`S`)
    pub supply: f64,
    /// Yes-vote weight (`Y`)
    pub yes_votes: f64,
}

pub struct QuorumCalculator;

impl QuorumCalculator {
    pub fn calculate(inputs: QuorumInputs) -> Result<QuorumSummary, QuorumError> {
        let QuorumInputs {
            max_vote_weight_fraction: fraction,
            vote_threshold: threshold,
            supply,
            yes_votes,
        } = inputs;

        check_percentage("max vote weight fraction", fraction)?;
        check_percentage("vote threshold", threshold)?;
        check_amount("supply", supply)?;
        check_amount("yes votes", yes_votes)?;

        let total_votes = supply * (threshold / 100.0) * (fraction / 100.0);
        if total_votes == 0.0 {
            return Err(QuorumError::ZeroTotalVotes {
                supply,
                threshold,
                fraction,
            });
        }

        let total_votes_needed = (total_votes - yes_votes).ceil();
        let (quorum_target_percentage, quorum_target) = if total_votes_needed <= 0.0 {
            (100.0, None)
        } else {
            (
                total_votes_needed / total_votes * 100.0,
                Some(total_votes_needed),
            )
        };

        let (exceeded_quorum, exceeded_quorum_percentage) = if yes_votes > total_votes {
            let exceeded = yes_votes - total_votes;
            (Some(exceeded), Some(exceeded / total_votes * 100.0))
        } else {
            (None, None)
        };

        Ok(QuorumSummary {
            total_votes,
            total_votes_needed,
            quorum_target_percentage,
            quorum_target,
            exceeded_quorum,
            exceeded_quorum_percentage,
        })
    }
}

fn check_percentage(name: &'static str, value: f64) -> Result<(), QuorumError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(QuorumError::PercentageOutOfRange { name, value })
    }
}

fn check_amount(name: &'static str, value: f64) -> Result<(), QuorumError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(QuorumError::InvalidAmount { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(supply: f64, threshold: f64, fraction: f64, yes: f64) -> QuorumInputs {
        QuorumInputs {
            max_vote_weight_fraction: fraction,
            vote_threshold: threshold,
            supply,
            yes_votes: yes,
        }
    }

    #[test]
    fn test_reference_example() {
        let q = QuorumCalculator::calculate(inputs(1_000_000.0, 50.0, 10.0, 40_000.0)).unwrap();
        assert_eq!(q.total_votes, 50_000.0);
        assert_eq!(q.total_votes_needed, 10_000.0);
        assert_eq!(q.quorum_target_percentage, 20.0);
        assert_eq!(q.quorum_target, Some(10_000.0));
        assert_eq!(q.exceeded_quorum, None);
    }

    #[test]
    fn test_quorum_met_exactly() {
        let q = QuorumCalculator::calculate(inputs(1_000.0, 50.0, 100.0, 500.0)).unwrap();
        assert_eq!(q.total_votes_needed, 0.0);
        assert_eq!(q.quorum_target_percentage, 100.0);
        assert_eq!(q.quorum_target, None);
        assert_eq!(q.exceeded_quorum, None);
    }

    #[test]
    fn test_quorum_exceeded() {
        let q = QuorumCalculator::calculate(inputs(1_000.0, 50.0, 100.0, 600.0)).unwrap();
        assert_eq!(q.quorum_target_percentage, 100.0);
        assert_eq!(q.exceeded_quorum, Some(100.0));
        assert_eq!(q.exceeded_quorum_percentage, Some(20.0));
    }

    #[test]
    fn test_needed_votes_round_up() {
        let q = QuorumCalculator::calculate(inputs(1_001.0, 50.0, 100.0, 0.0)).unwrap();
        assert_eq!(q.total_votes, 500.5);
        assert_eq!(q.total_votes_needed, 501.0);
    }

    #[test]
    fn test_zero_total_votes_is_error() {
        let err = QuorumCalculator::calculate(inputs(0.0, 50.0, 10.0, 0.0)).unwrap_err();
        assert!(matches!(err, QuorumError::ZeroTotalVotes { .. }));

        let err = QuorumCalculator::calculate(inputs(1_000.0, 0.0, 10.0, 0.0)).unwrap_err();
        assert!(matches!(err, QuorumError::ZeroTotalVotes { .. }));
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        assert!(matches!(
            QuorumCalculator::calculate(inputs(1_000.0, 150.0, 10.0, 0.0)),
            Err(QuorumError::PercentageOutOfRange { .. })
        ));
        assert!(matches!(
            QuorumCalculator::calculate(inputs(f64::NAN, 50.0, 10.0, 0.0)),
            Err(QuorumError::InvalidAmount { .. })
        ));
        assert!(matches!(
            QuorumCalculator::calculate(inputs(1_000.0, 50.0, 10.0, -1.0)),
            Err(QuorumError::InvalidAmount { .. })
        ));
    }
}
