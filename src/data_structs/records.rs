use serde::{
    Deserialize,
    Serialize,
};

/// Identifier of a transcription factor binding motif, the unit of
/// independent processing.
pub type MotifId = String;

/// A joined `(region, sample)` observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub region_id:  String,
    pub sample_id:  String,
    pub af:         f64,
    pub fps:        f64,
    pub fps_scaled: f64,
}

/// Variances of AF and scaled FPS across the samples of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceRecord {
    pub region_id:      String,
    pub af_var:         f64,
    pub fps_scaled_var: f64,
}

/// One sample row of a covariant region, with the region's variances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariantSite {
    pub region_id:      String,
    pub sample_id:      String,
    #[serde(rename = "AF")]
    pub af:             f64,
    #[serde(rename = "FPS_scaled")]
    pub fps_scaled:     f64,
    #[serde(rename = "AF_var")]
    pub af_var:         f64,
    #[serde(rename = "FPS_scaled_var")]
    pub fps_scaled_var: f64,
}

/// Spearman correlation between AF and scaled FPS of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub region_id:  String,
    pub corr_coeff: f64,
    pub pvalue:     f64,
}

/// Correlation result with its Benjamini-Hochberg adjusted p-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedResult {
    pub region_id:   String,
    pub corr_coeff:  f64,
    pub pvalue:      f64,
    pub adj_pvalues: f64,
}

impl AdjustedResult {
    pub fn new(
        result: CorrelationResult,
        adj_pvalue: f64,
    ) -> Self {
        Self {
            region_id:   result.region_id,
            corr_coeff:  result.corr_coeff,
            pvalue:      result.pvalue,
            adj_pvalues: adj_pvalue,
        }
    }

    pub fn is_significant(
        &self,
        alpha: f64,
    ) -> bool {
        self.adj_pvalues < alpha
    }
}
