//! Special functions backing the correlation p-values.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

const CF_MAX_ITER: usize = 300;
const CF_EPS: f64 = 3e-14;
const CF_TINY: f64 = 1e-300;

/// Natural log of the gamma function (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // reflection
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let t = x + LANCZOS_G + 0.5;
        let series = LANCZOS
            .iter()
            .enumerate()
            .skip(1)
            .fold(LANCZOS[0], |acc, (i, c)| acc + c / (x + i as f64));
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
    }
}

/// Regularized incomplete beta function `I_x(a, b)`.
pub fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    if x < (a + 1.0) / (a + b + 2.0) {
        ln_front.exp() * beta_fraction(a, b, x) / a
    } else {
        1.0 - ln_front.exp() * beta_fraction(b, a, 1.0 - x) / b
    }
}

/// Lentz evaluation of the continued fraction for `I_x(a, b)`.
fn beta_fraction(a: f64, b: f64, x: f64) -> f64 {
    let clamp = |v: f64| if v.abs() < CF_TINY { CF_TINY } else { v };

    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);
    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=CF_MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let even = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp(1.0 + even * d);
        c = clamp(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp(1.0 + odd * d);
        c = clamp(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < CF_EPS {
            break;
        }
    }
    h
}

/// Two-sided tail probability of Student's t with `df` degrees of freedom.
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    incomplete_beta(df / 2.0, 0.5, df / (df + t * t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ln_gamma() {
        assert!(close(ln_gamma(1.0), 0.0));
        assert!(close(ln_gamma(5.0), 24f64.ln()));
        assert!(close(ln_gamma(0.5), PI.sqrt().ln()));
    }

    #[test]
    fn test_incomplete_beta() {
        assert!(close(incomplete_beta(1.0, 1.0, 0.3), 0.3));
        assert!(close(incomplete_beta(2.0, 3.0, 0.0), 0.0));
        // I_x(a, b) = 1 - I_{1-x}(b, a)
        let lhs = incomplete_beta(2.5, 4.0, 0.35);
        let rhs = 1.0 - incomplete_beta(4.0, 2.5, 0.65);
        assert!(close(lhs, rhs));
    }

    #[test]
    fn test_student_t() {
        // Cauchy: P(|T| > 1) = 0.5
        assert!(close(student_t_two_sided(1.0, 1.0), 0.5));
        assert!(close(student_t_two_sided(0.0, 10.0), 1.0));
        assert_eq!(student_t_two_sided(f64::INFINITY, 4.0), 0.0);
    }
}
