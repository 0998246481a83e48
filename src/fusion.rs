//! Score fusion: three signals (plus an optional extra) into one fraud score.
//!
//! One canonical configuration: weights 0.4 / 0.4 / 0.2 / 0.0 at threshold 0.5.
//! Earlier pipeline variants disagreed (0.35/0.35/0.2/0.1 at 0.3); those are not
//! merged or averaged here, see DESIGN.md for the choice.

use anyhow::{ensure, Result};

#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    pub w_text: f64,
    pub w_anomaly: f64,
    pub w_trust: f64,
    /// Weight on the extra signal (recommendation sentiment); 0 disables it.
    pub w_extra: f64,
    pub threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { w_text: 0.4, w_anomaly: 0.4, w_trust: 0.2, w_extra: 0.0, threshold: 0.5 }
    }
}

impl FusionConfig {
    /// Weights must sum to 1 so the fused score stays in [0,1].
    pub fn validate(&self) -> Result<()> {
        let sum = self.w_text + self.w_anomaly + self.w_trust + self.w_extra;
        ensure!(
            (sum - 1.0).abs() < 1e-9,
            "fusion weights must sum to 1, got {sum}"
        );
        ensure!(
            (0.0..=1.0).contains(&self.threshold),
            "fusion threshold must be in [0,1], got {}",
            self.threshold
        );
        Ok(())
    }

    /// `w_text·text + w_anomaly·anomaly + w_trust·(1 − trust) + w_extra·extra`.
    /// Trust enters inverted: high trust pulls the fraud score down.
    pub fn fraud_score(&self, text: f64, anomaly: f64, trust: f64, extra: f64) -> f64 {
        self.w_text * text
            + self.w_anomaly * anomaly
            + self.w_trust * (1.0 - trust)
            + self.w_extra * extra
    }

    pub fn predict(&self, fraud_score: f64) -> u8 {
        if fraud_score > self.threshold {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_config_is_valid() {
        FusionConfig::default().validate().unwrap();
    }

    #[test]
    fn misconfigured_weights_are_rejected() {
        let cfg = FusionConfig { w_text: 0.5, ..FusionConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn known_fusion_scenario() {
        let cfg = FusionConfig::default();
        let score = cfg.fraud_score(0.8, 0.6, 0.9, 0.0);
        // 0.4·0.8 + 0.4·0.6 + 0.2·0.1 = 0.58
        assert!((score - 0.58).abs() < 1e-12);
        assert_eq!(cfg.predict(score), 1);
    }

    #[test]
    fn prediction_threshold_is_strict() {
        let cfg = FusionConfig::default();
        assert_eq!(cfg.predict(0.5), 0);
        assert_eq!(cfg.predict(0.5 + 1e-9), 1);
    }

    #[test]
    fn unit_inputs_stay_in_unit_interval() {
        let cfg = FusionConfig::default();
        for text in [0.0, 0.5, 1.0] {
            for anomaly in [0.0, 1.0] {
                for trust in [0.0, 0.4, 1.0] {
                    let s = cfg.fraud_score(text, anomaly, trust, 0.0);
                    assert!((0.0..=1.0).contains(&s));
                }
            }
        }
    }
}
