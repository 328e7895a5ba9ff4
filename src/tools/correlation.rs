use anyhow::Result;
use hashbrown::HashSet;
use itertools::Itertools;
use log::*;

use crate::data_structs::{
    AdjustedResult,
    CorrelationResult,
    CovariantSite,
};
use crate::utils::{
    bh_adjust,
    natural_cmp,
    spearman,
    AfpsError,
};

/// Default significance threshold on adjusted p-values.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Spearman correlation between AF and scaled FPS across the samples of
/// every covariant region, naturally ordered by region.
///
/// A region needs at least two distinct `(AF, FPS_scaled)` pairs, otherwise
/// [`AfpsError::InsufficientSamples`] is returned.
pub fn correlate_sites(sites: &[CovariantSite]) -> Result<Vec<CorrelationResult>> {
    sites
        .iter()
        .into_group_map_by(|site| site.region_id.as_str())
        .into_iter()
        .sorted_by(|a, b| natural_cmp(a.0, b.0))
        .map(|(region_id, group)| {
            let distinct = group
                .iter()
                .map(|site| (site.af.to_bits(), site.fps_scaled.to_bits()))
                .collect::<HashSet<_>>()
                .len();
            if distinct < 2 {
                return Err(AfpsError::InsufficientSamples {
                    region_id: region_id.to_owned(),
                    n:         distinct,
                }
                .into());
            }

            let af = group.iter().map(|site| site.af).collect_vec();
            let fps_scaled = group.iter().map(|site| site.fps_scaled).collect_vec();
            let test = spearman(&af, &fps_scaled)?;
            if !test.defined {
                warn!(
                    "Correlation undefined for region {} (constant values), reported as 0",
                    region_id
                );
            }

            Ok(CorrelationResult {
                region_id:  region_id.to_owned(),
                corr_coeff: test.coefficient,
                pvalue:     test.pvalue,
            })
        })
        .collect()
}

/// Benjamini-Hochberg correction over the given results. Row order is
/// preserved.
pub fn adjust_correlations(results: Vec<CorrelationResult>) -> Vec<AdjustedResult> {
    let pvalues = results.iter().map(|r| r.pvalue).collect_vec();
    results
        .into_iter()
        .zip(bh_adjust(&pvalues))
        .map(|(result, adj)| AdjustedResult::new(result, adj))
        .collect_vec()
}

/// Rows with an adjusted p-value strictly below `alpha`.
pub fn significant_results(
    results: &[AdjustedResult],
    alpha: f64,
) -> Vec<AdjustedResult> {
    results
        .iter()
        .filter(|r| r.is_significant(alpha))
        .cloned()
        .collect_vec()
}
