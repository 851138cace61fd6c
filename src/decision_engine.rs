//! Decision Engine
//! Mission: fuse the duplicate probability, anomaly probability, text
//! similarity, and rule floor into one `risk_score` and `DecisionLabel`
//! (spec.md §4.8).

use rust_decimal::Decimal;

use crate::config::Thresholds;
use crate::domain::DecisionLabel;

pub struct FusionInput {
    pub dup_prob: f64,
    pub anom_prob: f64,
    pub text_dup_prob: f64,
    pub bank_change: bool,
}

pub struct Fused {
    pub risk_score: Decimal,
    pub p: f64,
}

/// `p = 1 - (1-dup_prob)(1-anom_prob)(1-(0.6 if bank_change else 0))(1-text_dup_prob)`,
/// `risk_score = round(100p, 2)` (spec.md §4.8).
pub fn fuse(input: &FusionInput) -> Fused {
    let bank_term = if input.bank_change { 0.6 } else { 0.0 };
    let p = 1.0
        - (1.0 - input.dup_prob) * (1.0 - input.anom_prob) * (1.0 - bank_term) * (1.0 - input.text_dup_prob);
    let p = p.clamp(0.0, 1.0);
    let risk_score = Decimal::from_f64_retain(p * 100.0)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2);
    Fused { risk_score, p }
}

/// Score-derived label from the thresholds alone, before the rule floor is
/// applied.
pub fn label_from_score(risk_score: Decimal, thresholds: Thresholds) -> DecisionLabel {
    let score = risk_score.to_string().parse::<f64>().unwrap_or(0.0);
    if score >= thresholds.t_hold {
        DecisionLabel::Hold
    } else if score >= thresholds.t_review {
        DecisionLabel::Review
    } else {
        DecisionLabel::Pass
    }
}

/// Final decision is the strictest of the score-derived label and whatever
/// floor the rule engine forces (spec.md §4.7/§4.8).
pub fn final_decision(score_label: DecisionLabel, rule_floor: DecisionLabel) -> DecisionLabel {
    score_label.strictest(rule_floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            t_hold: 80.0,
            t_review: 50.0,
        }
    }

    #[test]
    fn zero_signals_yield_zero_score() {
        let fused = fuse(&FusionInput {
            dup_prob: 0.0,
            anom_prob: 0.0,
            text_dup_prob: 0.0,
            bank_change: false,
        });
        assert_eq!(fused.risk_score, Decimal::ZERO);
    }

    #[test]
    fn high_dup_prob_alone_crosses_hold() {
        let fused = fuse(&FusionInput {
            dup_prob: 0.95,
            anom_prob: 0.0,
            text_dup_prob: 0.0,
            bank_change: false,
        });
        assert!(fused.p >= 0.9);
        assert_eq!(label_from_score(fused.risk_score, thresholds()), DecisionLabel::Hold);
    }

    #[test]
    fn bank_change_alone_crosses_review() {
        let fused = fuse(&FusionInput {
            dup_prob: 0.0,
            anom_prob: 0.0,
            text_dup_prob: 0.0,
            bank_change: true,
        });
        assert_eq!(label_from_score(fused.risk_score, thresholds()), DecisionLabel::Review);
    }

    #[test]
    fn rule_floor_overrides_low_score() {
        let label = final_decision(DecisionLabel::Pass, DecisionLabel::Hold);
        assert_eq!(label, DecisionLabel::Hold);
    }

    #[test]
    fn score_label_can_exceed_rule_floor() {
        let label = final_decision(DecisionLabel::Hold, DecisionLabel::Review);
        assert_eq!(label, DecisionLabel::Hold);
    }
}
