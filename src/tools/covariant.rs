use hashbrown::{
    HashMap,
    HashSet,
};
use itertools::Itertools;
use log::*;

use crate::data_structs::{
    CovariantSite,
    Observation,
    SampleColumn,
    VarianceRecord,
    WideMatrix,
};
use crate::utils::{
    min_max_scale,
    natural_cmp,
    quantile,
    sample_variance,
};

/// Default multiplier of the interquartile range for outlier bounds.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

/// Min-max scales every FPS sample column over its full range of regions.
/// Constant columns scale to 0.0.
pub fn scale_fps_columns(matrix: &WideMatrix) -> Vec<SampleColumn> {
    matrix
        .fps()
        .iter()
        .map(|column| {
            let (values, constant) = min_max_scale(&column.values);
            if constant {
                warn!(
                    "FPS column of sample {} is constant, scaled values set to 0",
                    column.sample_id
                );
            }
            SampleColumn::new(column.sample_id.clone(), values)
        })
        .collect_vec()
}

/// Reshapes the matrix into long form and inner-joins AF, raw FPS and
/// scaled FPS on `(region_id, sample_id)`.
///
/// A pair is kept only when all three values are present. Rows are ordered
/// naturally by region and then by sample.
pub fn join_observations(
    matrix: &WideMatrix,
    scaled: &[SampleColumn],
) -> Vec<Observation> {
    let af_samples: HashSet<&str> = matrix
        .af()
        .iter()
        .map(|c| c.sample_id.as_str())
        .collect();
    let fps_samples: HashSet<&str> = matrix
        .fps()
        .iter()
        .map(|c| c.sample_id.as_str())
        .collect();
    for sample in af_samples.symmetric_difference(&fps_samples) {
        warn!("Sample {} lacks either AF or FPS values, dropped", sample);
    }

    let region_rows: HashMap<&str, usize> = matrix
        .region_ids()
        .iter()
        .enumerate()
        .map(|(row, region_id)| (region_id.as_str(), row))
        .collect();
    let scaled_by_sample: HashMap<&str, &SampleColumn> = scaled
        .iter()
        .map(|c| (c.sample_id.as_str(), c))
        .collect();

    let long = matrix.to_long();
    let n_pairs = long.len();
    let observations = long
        .into_iter()
        .filter_map(|record| {
            let row = *region_rows.get(record.region_id.as_str())?;
            let fps_scaled = scaled_by_sample
                .get(record.sample_id.as_str())?
                .values[row]?;
            Some(Observation {
                af: record.af?,
                fps: record.fps?,
                fps_scaled,
                region_id: record.region_id,
                sample_id: record.sample_id,
            })
        })
        .collect_vec();

    if observations.len() < n_pairs {
        debug!(
            "Dropped {} (region, sample) pairs with a missing value",
            n_pairs - observations.len()
        );
    }
    observations
}

/// Drops every region whose AF or scaled FPS sums to zero across samples.
pub fn filter_zero_signal(observations: Vec<Observation>) -> Vec<Observation> {
    let mut sums: HashMap<&str, (f64, f64)> = HashMap::new();
    for obs in observations.iter() {
        let entry = sums.entry(obs.region_id.as_str()).or_insert((0.0, 0.0));
        entry.0 += obs.af;
        entry.1 += obs.fps_scaled;
    }
    let keep: HashSet<String> = sums
        .into_iter()
        .filter(|(_, (af_sum, fps_sum))| *af_sum > 0.0 && *fps_sum > 0.0)
        .map(|(region_id, _)| region_id.to_owned())
        .collect();

    observations
        .into_iter()
        .filter(|obs| keep.contains(&obs.region_id))
        .collect_vec()
}

/// Per-region sample variances of AF and scaled FPS, naturally ordered by
/// region. Regions with fewer than two samples are skipped.
pub fn region_variances(observations: &[Observation]) -> Vec<VarianceRecord> {
    observations
        .iter()
        .into_group_map_by(|obs| obs.region_id.as_str())
        .into_iter()
        .sorted_by(|a, b| natural_cmp(a.0, b.0))
        .filter_map(|(region_id, group)| {
            let af = group.iter().map(|obs| obs.af).collect_vec();
            let fps_scaled = group.iter().map(|obs| obs.fps_scaled).collect_vec();
            match (sample_variance(&af), sample_variance(&fps_scaled)) {
                (Some(af_var), Some(fps_scaled_var)) => Some(VarianceRecord {
                    region_id: region_id.to_owned(),
                    af_var,
                    fps_scaled_var,
                }),
                _ => {
                    warn!(
                        "Region {} has {} sample(s), variance needs at least 2",
                        region_id,
                        group.len()
                    );
                    None
                },
            }
        })
        .collect_vec()
}

/// Tukey fences of a distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1:    f64,
    pub q3:    f64,
    pub iqr:   f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn from_values(
        values: &[f64],
        multiplier: f64,
    ) -> Option<Self> {
        let q1 = quantile(values, 0.25)?;
        let q3 = quantile(values, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            iqr,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    /// Strictly above the upper fence.
    pub fn is_upper_outlier(
        &self,
        value: f64,
    ) -> bool {
        value > self.upper
    }
}

/// Selects the regions whose AF variance and scaled FPS variance both lie
/// strictly above their upper IQR fence, and returns their observation
/// rows.
///
/// Rows are ordered by descending AF variance, then descending scaled FPS
/// variance; rows of one region stay together in natural sample order.
pub fn select_covariant_sites(
    observations: &[Observation],
    variances: &[VarianceRecord],
    multiplier: f64,
) -> Vec<CovariantSite> {
    let af_vars = variances.iter().map(|v| v.af_var).collect_vec();
    let fps_vars = variances.iter().map(|v| v.fps_scaled_var).collect_vec();

    let (Some(af_bounds), Some(fps_bounds)) = (
        IqrBounds::from_values(&af_vars, multiplier),
        IqrBounds::from_values(&fps_vars, multiplier),
    )
    else {
        return Vec::new();
    };
    info!(
        "Outlier bounds for AF variance: ({:.6}, {:.6}), FPS_scaled variance: ({:.6}, {:.6})",
        af_bounds.lower, af_bounds.upper, fps_bounds.lower, fps_bounds.upper
    );

    let outliers: HashMap<&str, &VarianceRecord> = variances
        .iter()
        .filter(|v| {
            af_bounds.is_upper_outlier(v.af_var)
                && fps_bounds.is_upper_outlier(v.fps_scaled_var)
        })
        .map(|v| (v.region_id.as_str(), v))
        .collect();
    debug!("{} of {} regions are joint outliers", outliers.len(), variances.len());

    observations
        .iter()
        .filter_map(|obs| {
            outliers
                .get(obs.region_id.as_str())
                .map(|var| CovariantSite {
                    region_id:      obs.region_id.clone(),
                    sample_id:      obs.sample_id.clone(),
                    af:             obs.af,
                    fps_scaled:     obs.fps_scaled,
                    af_var:         var.af_var,
                    fps_scaled_var: var.fps_scaled_var,
                })
        })
        .sorted_by(|a, b| {
            b.af_var
                .total_cmp(&a.af_var)
                .then_with(|| b.fps_scaled_var.total_cmp(&a.fps_scaled_var))
                .then_with(|| natural_cmp(&a.region_id, &b.region_id))
                .then_with(|| natural_cmp(&a.sample_id, &b.sample_id))
        })
        .collect_vec()
}
