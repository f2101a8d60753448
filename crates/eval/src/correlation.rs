use serde::Serialize;

use crate::special::student_t_two_sided;
use crate::statistics::Estimate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub correlation: f64,
    pub p_value: f64,
    pub n: usize,
}

/// 1-based ranks; tied values share the mean of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Spearman rank correlation with a two-sided p-value from the t
/// approximation on `n - 2` degrees of freedom.
pub fn spearman(x: &[f64], y: &[f64]) -> Estimate<Correlation> {
    let n = x.len();
    if n != y.len() {
        return Estimate::unavailable(format!("length mismatch ({n} vs {})", y.len()));
    }
    if n < 3 {
        return Estimate::unavailable(format!("insufficient sample size ({n})"));
    }

    let Some(rho) = pearson(&average_ranks(x), &average_ranks(y)) else {
        return Estimate::unavailable("constant input, correlation undefined");
    };

    let df = (n - 2) as f64;
    let p_value = if rho.abs() >= 1.0 {
        0.0
    } else {
        let t = rho * (df / ((1.0 - rho) * (1.0 + rho))).sqrt();
        student_t_two_sided(t, df)
    };

    Estimate::Available(Correlation {
        correlation: rho,
        p_value,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_monotone_is_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0, 36.0];
        let up = spearman(&x, &y);
        let up = up.available().unwrap();
        assert_eq!(up.correlation, 1.0);
        assert_eq!(up.p_value, 0.0);

        let reversed: Vec<f64> = y.iter().rev().copied().collect();
        let down = spearman(&x, &reversed);
        assert_eq!(down.available().unwrap().correlation, -1.0);
    }

    #[test]
    fn test_partial_correlation_has_p_value() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0, 7.0];
        let c = spearman(&x, &y);
        let c = c.available().unwrap();
        assert!(c.correlation > 0.9 && c.correlation < 1.0);
        assert!(c.p_value > 0.0 && c.p_value < 0.01);
    }

    #[test]
    fn test_constant_input_is_unavailable() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [0.0; 6];
        assert!(!spearman(&x, &y).is_available());
    }
}
