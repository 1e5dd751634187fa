//! Wigner small-d functions `d^l_{m m'}(beta)`.
//!
//! Values are seeded at `l = max(|m|, |m'|)` with the closed-form sum and
//! advanced in `l` with the standard three-term recurrence.

fn ln_factorial(n: i64) -> f64 {
    (1..=n).map(|k| (k as f64).ln()).sum()
}

/// Closed-form `d^l_{m m'}(beta)`.
pub fn wigner_d(l: i64, m: i64, mp: i64, beta: f64) -> f64 {
    if m.abs() > l || mp.abs() > l {
        return 0.0;
    }
    let c = (0.5 * beta).cos();
    let s = (0.5 * beta).sin();
    let prefix =
        0.5 * (ln_factorial(l + m) + ln_factorial(l - m) + ln_factorial(l + mp) + ln_factorial(l - mp));

    let k_min = (mp - m).max(0);
    let k_max = (l + mp).min(l - m);
    let mut total = 0.0;
    for k in k_min..=k_max {
        let denom = ln_factorial(l + mp - k)
            + ln_factorial(k)
            + ln_factorial(m - mp + k)
            + ln_factorial(l - m - k);
        let sign = if (m - mp + k) % 2 == 0 { 1.0 } else { -1.0 };
        let cos_pow = (2 * l + mp - m - 2 * k) as i32;
        let sin_pow = (m - mp + 2 * k) as i32;
        total += sign * (prefix - denom).exp() * c.powi(cos_pow) * s.powi(sin_pow);
    }
    total
}

/// Fill `out[l] = d^l_{m m'}(beta)` for all `l < out.len()`.
///
/// Entries below `max(|m|, |m'|)` are zero.
pub fn wigner_d_series(m: i64, mp: i64, beta: f64, out: &mut [f64]) {
    out.fill(0.0);
    let l0 = m.abs().max(mp.abs());
    let len = out.len() as i64;
    if l0 >= len {
        return;
    }
    out[l0 as usize] = wigner_d(l0, m, mp, beta);

    let cb = beta.cos();
    let (mf, mpf) = (m as f64, mp as f64);
    for j in l0..len - 1 {
        let ju = j as usize;
        if j == 0 {
            out[1] = cb;
            continue;
        }
        let jf = j as f64;
        let prev = if j > l0 { out[ju - 1] } else { 0.0 };
        let num = (2.0 * jf + 1.0) * (jf * (jf + 1.0) * cb - mf * mpf) * out[ju]
            - (jf + 1.0) * ((jf * jf - mf * mf) * (jf * jf - mpf * mpf)).sqrt() * prev;
        let den = jf * (((jf + 1.0).powi(2) - mf * mf) * ((jf + 1.0).powi(2) - mpf * mpf)).sqrt();
        out[ju + 1] = num / den;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_values() {
        let beta = 0.7_f64;
        assert_relative_eq!(wigner_d(0, 0, 0, beta), 1.0);
        assert_relative_eq!(wigner_d(1, 0, 0, beta), beta.cos(), epsilon = 1e-14);
        assert_relative_eq!(wigner_d(1, 1, 1, beta), 0.5 * (1.0 + beta.cos()), epsilon = 1e-14);
        assert_relative_eq!(
            wigner_d(1, 1, 0, beta),
            -beta.sin() / 2f64.sqrt(),
            epsilon = 1e-14
        );
        assert_relative_eq!(
            wigner_d(1, 0, 1, beta),
            beta.sin() / 2f64.sqrt(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_recurrence_matches_closed_form() {
        let beta = 1.3;
        let mut series = vec![0.0; 10];
        for (m, mp) in [(0, 0), (1, -2), (3, 2), (-2, -2), (0, 3), (-4, 1)] {
            wigner_d_series(m, mp, beta, &mut series);
            for l in 0..10 {
                assert_relative_eq!(series[l as usize], wigner_d(l, m, mp, beta), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_identity_at_zero() {
        let mut series = vec![0.0; 6];
        wigner_d_series(2, 2, 0.0, &mut series);
        for l in 2..6 {
            assert_relative_eq!(series[l], 1.0, epsilon = 1e-12);
        }
        wigner_d_series(1, 2, 0.0, &mut series);
        assert!(series.iter().all(|v| v.abs() < 1e-12));
    }
}
