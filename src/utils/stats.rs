use anyhow::{
    anyhow,
    ensure,
    Result,
};
use itertools::Itertools;
use log::*;
use statrs::distribution::{
    ContinuousCDF,
    Discrete,
    Hypergeometric,
    StudentsT,
};
use statrs::statistics::Statistics;

/// Relative tolerance used when comparing hypergeometric probabilities in
/// the two-sided Fisher test.
const FISHER_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Bessel-corrected (ddof = 1) variance. `None` for fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().variance())
}

/// Quantile with linear interpolation between order statistics, the
/// position being `(n - 1) * q`. `values` need not be sorted.
pub fn quantile(
    values: &[f64],
    q: f64,
) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let sorted = values
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect_vec();

    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Min-max scales a column into `[0, 1]`, skipping missing values.
///
/// Returns the scaled column and whether the column was constant. A
/// constant column maps every present value to 0.0. Non-finite values are
/// treated as missing.
pub fn min_max_scale(values: &[Option<f64>]) -> (Vec<Option<f64>>, bool) {
    let values = values
        .iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect_vec();
    let (min, max) = match values
        .iter()
        .flatten()
        .minmax_by(|a, b| a.total_cmp(b))
    {
        itertools::MinMaxResult::NoElements => return (values, false),
        itertools::MinMaxResult::OneElement(v) => (*v, *v),
        itertools::MinMaxResult::MinMax(lo, hi) => (*lo, *hi),
    };
    let range = max - min;

    if range == 0.0 {
        let scaled = values.iter().map(|v| v.map(|_| 0.0)).collect();
        return (scaled, true);
    }
    let scaled = values
        .iter()
        .map(|v| v.map(|x| ((x - min) / range).clamp(0.0, 1.0)))
        .collect();
    (scaled, false)
}

/// Assigns 1-based ranks, averaging the ranks of tied values.
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let order = (0..values.len())
        .sorted_by(|a, b| values[*a].total_cmp(&values[*b]))
        .collect_vec();

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let start = i;
        let mut end = i + 1;

        // Find all tied values
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }

        let avg_rank = (start as f64 + 1.0 + end as f64) / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = avg_rank;
        }
        i = end;
    }
    ranks
}

/// Pearson correlation coefficient. `None` when either series is constant.
pub fn pearson_r(
    x: &[f64],
    y: &[f64],
) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        warn!(
            "Cannot calculate Pearson's r: x length ({}) and y length ({})",
            x.len(),
            y.len()
        );
        return None;
    }
    let x_mean = x.iter().mean();
    let y_mean = y.iter().mean();

    let numerator = x
        .iter()
        .zip(y.iter())
        .map(|(valx, valy)| (valx - x_mean) * (valy - y_mean))
        .sum::<f64>();

    let denominator = {
        let x_dev: f64 = x.iter().map(|valx| (valx - x_mean).powi(2)).sum();
        let y_dev: f64 = y.iter().map(|valy| (valy - y_mean).powi(2)).sum();
        (x_dev * y_dev).sqrt()
    };

    if denominator == 0.0 {
        return None;
    }
    Some((numerator / denominator).clamp(-1.0, 1.0))
}

/// Outcome of a Spearman rank correlation test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpearmanTest {
    pub coefficient: f64,
    pub pvalue:      f64,
    /// False when a series was constant and the coefficient is a fallback.
    pub defined:     bool,
}

/// Spearman rank correlation with a two-sided p-value from the Student-t
/// approximation, `t = r * sqrt((n - 2) / (1 - r^2))` with `n - 2` degrees
/// of freedom.
///
/// A constant series yields a coefficient of 0.0 and a p-value of 1.0. With
/// exactly two observations the coefficient is reported but the p-value is
/// 1.0, as there are no degrees of freedom left.
pub fn spearman(
    x: &[f64],
    y: &[f64],
) -> Result<SpearmanTest> {
    ensure!(
        x.len() == y.len(),
        "series lengths differ: {} and {}",
        x.len(),
        y.len()
    );
    ensure!(x.len() >= 2, "at least 2 observations required, got {}", x.len());

    let Some(r) = pearson_r(&rank_average(x), &rank_average(y))
    else {
        return Ok(SpearmanTest {
            coefficient: 0.0,
            pvalue:      1.0,
            defined:     false,
        });
    };

    let df = (x.len() - 2) as f64;
    let pvalue = if df == 0.0 {
        1.0
    }
    else if 1.0 - r * r <= 0.0 {
        0.0
    }
    else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)?;
        (2.0 * dist.sf(t.abs())).min(1.0)
    };
    debug!("Spearman rho = {:.4}, p = {:.6}", r, pvalue);

    Ok(SpearmanTest {
        coefficient: r,
        pvalue,
        defined: true,
    })
}

/// Sample odds ratio `(a * d) / (b * c)`, computed in floating point.
fn odds_ratio(table: [[u64; 2]; 2]) -> f64 {
    let [[a, b], [c, d]] = table;
    let num = a as f64 * d as f64;
    let den = b as f64 * c as f64;
    if den == 0.0 {
        if num == 0.0 {
            warn!("Odds ratio undefined for table {:?}", table);
            f64::NAN
        }
        else {
            f64::INFINITY
        }
    }
    else {
        num / den
    }
}

/// Fisher's exact test on a 2x2 table `[[a, b], [c, d]]`.
///
/// Returns the sample odds ratio `(a * d) / (b * c)` and the two-sided
/// p-value, which sums the probabilities of every table with the same
/// margins that is at most as probable as the observed one.
pub fn fisher_exact(table: [[u64; 2]; 2]) -> Result<(f64, f64)> {
    let [[a, b], [c, d]] = table;

    let odds_ratio = odds_ratio(table);
    let population = [a, b, c, d]
        .into_iter()
        .try_fold(0u64, u64::checked_add)
        .ok_or_else(|| anyhow!("table {:?} overflows the total count", table))?;
    let row_total = a + b;
    let col_total = a + c;
    if row_total == 0 || col_total == 0 || row_total == population || col_total == population {
        return Ok((odds_ratio, 1.0));
    }

    let dist = Hypergeometric::new(population, row_total, col_total)?;
    let lo = col_total.saturating_sub(population - row_total);
    let hi = row_total.min(col_total);

    let observed = dist.pmf(a);
    let threshold = observed * (1.0 + FISHER_RELATIVE_TOLERANCE);
    let pvalue = (lo..=hi)
        .map(|k| dist.pmf(k))
        .filter(|p| *p <= threshold)
        .sum::<f64>()
        .min(1.0);

    Ok((odds_ratio, pvalue))
}

/// Benjamini-Hochberg adjusted p-values, in input order.
pub fn bh_adjust(pvalues: &[f64]) -> Vec<f64> {
    if pvalues.is_empty() {
        return Vec::new();
    }
    adjustp::adjust(pvalues, adjustp::Procedure::BenjaminiHochberg)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{
        Rng,
        SeedableRng,
    };
    use rstest::rstest;

    use super::*;

    #[test]
    fn variance_is_bessel_corrected() {
        assert_approx_eq!(sample_variance(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 5.0 / 3.0);
        assert_eq!(sample_variance(&[1.0]), None);
        assert_eq!(sample_variance(&[]), None);
    }

    #[rstest]
    #[case(0.25, 1.75)]
    #[case(0.5, 2.5)]
    #[case(0.75, 3.25)]
    #[case(0.0, 1.0)]
    #[case(1.0, 4.0)]
    fn linear_quantiles(
        #[case] q: f64,
        #[case] expected: f64,
    ) {
        assert_approx_eq!(quantile(&[4.0, 1.0, 3.0, 2.0], q).unwrap(), expected);
    }

    #[test]
    fn min_max_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let column = (0..50)
                .map(|_| Some(rng.gen_range(0.0..500.0)))
                .collect_vec();
            let (scaled, constant) = min_max_scale(&column);
            assert!(!constant);

            let values = scaled.iter().flatten().copied().collect_vec();
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));

            let argmin = column
                .iter()
                .position_min_by(|a, b| a.unwrap().total_cmp(&b.unwrap()))
                .unwrap();
            let argmax = column
                .iter()
                .position_max_by(|a, b| a.unwrap().total_cmp(&b.unwrap()))
                .unwrap();
            assert_eq!(values[argmin], 0.0);
            assert_eq!(values[argmax], 1.0);
        }
    }

    #[test]
    fn min_max_constant_and_missing() {
        let (scaled, constant) = min_max_scale(&[Some(3.0), None, Some(3.0)]);
        assert!(constant);
        assert_eq!(scaled, vec![Some(0.0), None, Some(0.0)]);

        let (scaled, constant) = min_max_scale(&[Some(2.0), None, Some(6.0), Some(4.0)]);
        assert!(!constant);
        assert_eq!(scaled, vec![Some(0.0), None, Some(1.0), Some(0.5)]);
    }

    #[test]
    fn min_max_ignores_non_finite() {
        let (scaled, constant) =
            min_max_scale(&[Some(2.0), Some(f64::NAN), Some(6.0), Some(f64::INFINITY)]);
        assert!(!constant);
        assert_eq!(scaled, vec![Some(0.0), None, Some(1.0), None]);
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(rank_average(&[10.0, 20.0, 20.0, 5.0]), vec![
            2.0, 3.5, 3.5, 1.0
        ]);
    }

    #[test]
    fn spearman_monotone_and_constant() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 8.0, 16.0, 32.0];
        let test = spearman(&x, &y).unwrap();
        assert_approx_eq!(test.coefficient, 1.0);
        assert!(test.pvalue < 1e-9);

        let test = spearman(&x, &[1.0; 5]).unwrap();
        assert!(!test.defined);
        assert_eq!(test.coefficient, 0.0);
        assert_eq!(test.pvalue, 1.0);

        assert!(spearman(&[1.0], &[1.0]).is_err());
    }

    #[test]
    fn spearman_pvalue_matches_t_approximation() {
        // rho = 0.8 for n = 5 gives t = 2.3094, df = 3, p = 0.1041
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        let test = spearman(&x, &y).unwrap();
        assert_approx_eq!(test.coefficient, 0.8);
        assert_approx_eq!(test.pvalue, 0.1041, 1e-3);
    }

    #[test]
    fn fisher_exact_two_sided() {
        // Classic tea tasting table
        let (odds, p) = fisher_exact([[3, 1], [1, 3]]).unwrap();
        assert_approx_eq!(odds, 9.0);
        assert_approx_eq!(p, 0.4857142857, 1e-8);

        let (odds, p) = fisher_exact([[8, 2], [1, 5]]).unwrap();
        assert_approx_eq!(odds, 20.0);
        assert_approx_eq!(p, 0.0349650350, 1e-8);

        let (odds, p) = fisher_exact([[0, 0], [4, 5]]).unwrap();
        assert!(odds.is_nan());
        assert_eq!(p, 1.0);
    }

    #[test]
    fn large_counts_do_not_overflow() {
        let big = 1u64 << 40;
        let odds = odds_ratio([[big, 3], [2, big]]);
        assert_approx_eq!(odds / (big as f64 * big as f64 / 6.0), 1.0);
        assert_eq!(odds_ratio([[big, 0], [2, big]]), f64::INFINITY);

        assert!(fisher_exact([[u64::MAX, 1], [1, 0]]).is_err());
    }

    #[test]
    fn bh_closed_form() {
        let p = [0.01, 0.02, 0.03, 0.5];
        let adjusted = bh_adjust(&p);
        let expected = [0.04, 0.04, 0.04, 0.5];
        for (a, e) in adjusted.iter().zip(expected.iter()) {
            assert_approx_eq!(a, e);
        }
        for pair in adjusted.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(bh_adjust(&[]).is_empty());
    }
}
