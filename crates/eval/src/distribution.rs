use serde::Serialize;

use crate::statistics::Estimate;

/// Fits need more than this many degrees.
pub const MIN_FIT_SAMPLES: usize = 10;
/// Both models carry two parameters.
const PARAMS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerLawFit {
    pub alpha: f64,
    pub xmin: f64,
    pub log_likelihood: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExponentialFit {
    pub loc: f64,
    pub scale: f64,
    pub log_likelihood: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionComparison {
    pub power_law: PowerLawFit,
    pub exponential: ExponentialFit,
    pub power_law_aic: f64,
    pub exponential_aic: f64,
    pub favors_power_law: bool,
}

pub fn aic(params: f64, log_likelihood: f64) -> f64 {
    2.0 * params - 2.0 * log_likelihood
}

/// Compares degree-distribution models. Implementations that cannot fit
/// report an unavailable estimate instead of failing.
pub trait DistributionFitter: Send + Sync {
    fn compare(&self, degrees: &[f64]) -> Estimate<DistributionComparison>;
}

/// Maximum-likelihood fits of a continuous power law and a shifted
/// exponential, compared by AIC.
pub struct MleFitter;

impl MleFitter {
    /// `alpha = 1 + n / sum(ln(x / xmin))` over degrees `>= xmin`, where
    /// `xmin` is the smallest positive degree.
    pub fn power_law(degrees: &[f64]) -> Option<PowerLawFit> {
        let xmin = degrees
            .iter()
            .copied()
            .filter(|&d| d > 0.0)
            .fold(f64::INFINITY, f64::min);
        if !xmin.is_finite() {
            return None;
        }

        let tail: Vec<f64> = degrees.iter().copied().filter(|&d| d >= xmin).collect();
        let n = tail.len() as f64;
        let log_sum: f64 = tail.iter().map(|d| (d / xmin).ln()).sum();
        if log_sum <= 0.0 {
            return None;
        }

        let alpha = 1.0 + n / log_sum;
        let log_likelihood = n * (alpha - 1.0).ln() - n * xmin.ln() - alpha * log_sum;
        Some(PowerLawFit {
            alpha,
            xmin,
            log_likelihood,
        })
    }

    /// `loc = min`, `scale = mean - loc`.
    pub fn exponential(degrees: &[f64]) -> Option<ExponentialFit> {
        if degrees.is_empty() {
            return None;
        }
        let loc = degrees.iter().copied().fold(f64::INFINITY, f64::min);
        let scale = statistical::mean(degrees) - loc;
        if scale <= 0.0 || !scale.is_finite() {
            return None;
        }

        let n = degrees.len() as f64;
        let spread: f64 = degrees.iter().map(|d| (d - loc) / scale).sum();
        Some(ExponentialFit {
            loc,
            scale,
            log_likelihood: -n * scale.ln() - spread,
        })
    }
}

impl DistributionFitter for MleFitter {
    fn compare(&self, degrees: &[f64]) -> Estimate<DistributionComparison> {
        if degrees.len() <= MIN_FIT_SAMPLES {
            return Estimate::unavailable(format!(
                "insufficient sample size ({} degrees, need more than {MIN_FIT_SAMPLES})",
                degrees.len()
            ));
        }

        let (Some(power_law), Some(exponential)) =
            (Self::power_law(degrees), Self::exponential(degrees))
        else {
            return Estimate::unavailable("could not fit distributions to a degenerate degree sequence");
        };

        let power_law_aic = aic(PARAMS, power_law.log_likelihood);
        let exponential_aic = aic(PARAMS, exponential.log_likelihood);
        Estimate::Available(DistributionComparison {
            favors_power_law: power_law_aic < exponential_aic,
            power_law,
            exponential,
            power_law_aic,
            exponential_aic,
        })
    }
}

/// Stand-in when distribution fitting is switched off.
pub struct UnavailableFitter;

impl DistributionFitter for UnavailableFitter {
    fn compare(&self, _degrees: &[f64]) -> Estimate<DistributionComparison> {
        Estimate::unavailable("distribution fitting disabled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heavy_tail() -> Vec<f64> {
        vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 4.0, 8.0]
    }

    #[test]
    fn test_power_law_mle() {
        let fit = MleFitter::power_law(&heavy_tail()).unwrap();
        let expected = 1.0 + 12.0 / (7.0 * 2f64.ln());
        assert!((fit.alpha - expected).abs() < 1e-12);
        assert_eq!(fit.xmin, 1.0);
    }

    #[test]
    fn test_exponential_mle() {
        let fit = MleFitter::exponential(&heavy_tail()).unwrap();
        assert_eq!(fit.loc, 1.0);
        assert!((fit.scale - 1.0).abs() < 1e-12);
        assert!((fit.log_likelihood + 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_compare_picks_lower_aic() {
        let cmp = MleFitter.compare(&heavy_tail());
        let cmp = cmp.available().unwrap();
        assert_eq!(cmp.power_law_aic, aic(2.0, cmp.power_law.log_likelihood));
        assert_eq!(cmp.favors_power_law, cmp.power_law_aic < cmp.exponential_aic);
    }

    #[test]
    fn test_degenerate_and_small_inputs() {
        assert!(!MleFitter.compare(&[2.0; 12]).is_available());
        assert!(!MleFitter.compare(&[1.0, 2.0, 3.0]).is_available());
        assert!(!MleFitter.compare(&[0.0; 12]).is_available());
    }
}
