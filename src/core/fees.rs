use crate::domain::model::TransportMode;
use serde::{Deserialize, Serialize};

/// 進口規費參數（MPF 費率與上下限、HMF 費率）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    #[serde(default = "default_mpf_rate")]
    pub mpf_rate_percent: f64,
    #[serde(default = "default_mpf_minimum")]
    pub mpf_minimum: f64,
    #[serde(default = "default_mpf_maximum")]
    pub mpf_maximum: f64,
    #[serde(default = "default_hmf_rate")]
    pub hmf_rate_percent: f64,
}

fn default_mpf_rate() -> f64 {
    0.3464
}
fn default_mpf_minimum() -> f64 {
    27.75
}
fn default_mpf_maximum() -> f64 {
    538.40
}
fn default_hmf_rate() -> f64 {
    0.125
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            mpf_rate_percent: default_mpf_rate(),
            mpf_minimum: default_mpf_minimum(),
            mpf_maximum: default_mpf_maximum(),
            hmf_rate_percent: default_hmf_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fees {
    pub mpf: f64,
    pub hmf: f64,
}

/// 四捨五入到分（遠離零）
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

impl FeeSchedule {
    /// HMF 只對海運收取
    pub fn compute_fees(&self, customs_value: f64, mode: TransportMode) -> Fees {
        let mpf = (customs_value * self.mpf_rate_percent / 100.0)
            .clamp(self.mpf_minimum, self.mpf_maximum);
        let hmf = match mode {
            TransportMode::Ocean => customs_value * self.hmf_rate_percent / 100.0,
            TransportMode::Air | TransportMode::Truck | TransportMode::Rail => 0.0,
        };

        Fees {
            mpf: round_cents(mpf),
            hmf: round_cents(hmf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mpf_is_clamped_at_both_ends() {
        let schedule = FeeSchedule::default();

        for value in [1.0, 100_000.0, 10_000_000.0] {
            let fees = schedule.compute_fees(value, TransportMode::Ocean);
            assert!(fees.mpf >= 27.75 && fees.mpf <= 538.40, "mpf {} for {}", fees.mpf, value);
        }

        assert_eq!(schedule.compute_fees(1.0, TransportMode::Ocean).mpf, 27.75);
        assert_eq!(schedule.compute_fees(100_000.0, TransportMode::Ocean).mpf, 346.40);
        assert_eq!(schedule.compute_fees(10_000_000.0, TransportMode::Ocean).mpf, 538.40);
    }

    #[test]
    fn test_hmf_only_for_ocean() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.compute_fees(1150.0, TransportMode::Ocean).hmf, 1.44);
        assert_eq!(schedule.compute_fees(1150.0, TransportMode::Air).hmf, 0.0);
        assert_eq!(schedule.compute_fees(1150.0, TransportMode::Truck).hmf, 0.0);
    }

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(1.4375), 1.44);
        assert_eq!(round_cents(287.5), 287.5);
        assert_eq!(round_cents(3.98), 3.98);
    }
}
