use pitwall_core::{error::Result, Error, RiskTier};

/// Corte padrão para risco médio, em gwei
pub const DEFAULT_MEDIUM_CUTOFF_GWEI: f64 = 10.0;
/// Corte padrão para risco alto, em gwei
pub const DEFAULT_HIGH_CUTOFF_GWEI: f64 = 15.0;

/// Mapeia preço de gás para nível de risco
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskClassifier {
    medium_cutoff: f64,
    high_cutoff: f64,
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self {
            medium_cutoff: DEFAULT_MEDIUM_CUTOFF_GWEI,
            high_cutoff: DEFAULT_HIGH_CUTOFF_GWEI,
        }
    }
}

impl RiskClassifier {
    /// Exige `0 <= medium <= high`, ambos finitos
    pub fn new(medium_cutoff: f64, high_cutoff: f64) -> Result<Self> {
        if !medium_cutoff.is_finite() || !high_cutoff.is_finite() {
            return Err(Error::ValidationError("cortes de risco devem ser finitos".to_string()));
        }
        if medium_cutoff < 0.0 || medium_cutoff > high_cutoff {
            return Err(Error::ValidationError(format!(
                "cortes de risco inválidos: medium={} high={}",
                medium_cutoff, high_cutoff
            )));
        }
        Ok(Self { medium_cutoff, high_cutoff })
    }

    pub fn medium_cutoff(&self) -> f64 {
        self.medium_cutoff
    }

    pub fn high_cutoff(&self) -> f64 {
        self.high_cutoff
    }

    /// Entrada negativa ou NaN deve ser rejeitada pelo chamador
    pub fn classify(&self, gas_price_gwei: f64) -> RiskTier {
        if gas_price_gwei >= self.high_cutoff {
            RiskTier::High
        } else if gas_price_gwei >= self.medium_cutoff {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries() {
        let c = RiskClassifier::default();
        assert_eq!(c.classify(10.0), RiskTier::Medium);
        assert_eq!(c.classify(9.99), RiskTier::Low);
        assert_eq!(c.classify(15.0), RiskTier::High);
        assert_eq!(c.classify(14.99), RiskTier::Medium);
        assert_eq!(c.classify(0.0), RiskTier::Low);
    }

    #[test]
    fn custom_cutoffs() {
        let c = RiskClassifier::new(1.0, 2.0).unwrap();
        assert_eq!(c.classify(1.5), RiskTier::Medium);
        assert_eq!(c.classify(2.0), RiskTier::High);
        let flat = RiskClassifier::new(5.0, 5.0).unwrap();
        assert_eq!(flat.classify(5.0), RiskTier::High);
        assert_eq!(flat.classify(4.9), RiskTier::Low);
    }

    #[test]
    fn rejects_inverted_or_invalid_cutoffs() {
        assert!(RiskClassifier::new(15.0, 10.0).is_err());
        assert!(RiskClassifier::new(-1.0, 10.0).is_err());
        assert!(RiskClassifier::new(f64::NAN, 10.0).is_err());
        assert!(RiskClassifier::new(1.0, f64::INFINITY).is_err());
    }

    proptest! {
        #[test]
        fn classification_is_monotonic(a in 0.0f64..1_000.0, b in 0.0f64..1_000.0) {
            let c = RiskClassifier::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(c.classify(lo) <= c.classify(hi));
        }
    }
}
