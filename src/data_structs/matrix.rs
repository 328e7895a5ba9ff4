use std::fmt;

use anyhow::{
    bail,
    ensure,
};
use hashbrown::{
    HashMap,
    HashSet,
};
use itertools::Itertools;

use crate::utils::{
    natural_cmp,
    AfpsError,
};

/// Name of the identifier column of a wide matrix.
pub const REGION_ID_COL: &str = "region_id";

/// Kind of value stored in a wide sample column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `<sample>_AF`, allele frequency.
    Af,
    /// `<sample>_fps`, raw footprint score.
    Fps,
}

impl ValueKind {
    pub const fn suffix(&self) -> &'static str {
        match self {
            Self::Af => "AF",
            Self::Fps => "fps",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "AF" => Some(Self::Af),
            "fps" => Some(Self::Fps),
            _ => None,
        }
    }

    /// Splits a wide column name into sample id and value kind on the last
    /// underscore.
    ///
    /// Returns `None` for columns which are not sample columns (no
    /// underscore, or an unknown suffix), and an error when the suffix is
    /// known but no sample id precedes it.
    pub fn split_column(name: &str) -> Option<Result<(String, ValueKind), AfpsError>> {
        let (sample, suffix) = name.rsplit_once('_')?;
        let kind = Self::from_suffix(suffix)?;
        if sample.is_empty() {
            return Some(Err(AfpsError::MalformedColumn {
                column: name.to_owned(),
                reason: "empty sample id before the value suffix".to_owned(),
            }));
        }
        Some(Ok((sample.to_owned(), kind)))
    }

    pub fn column_name(
        &self,
        sample_id: &str,
    ) -> String {
        format!("{}_{}", sample_id, self.suffix())
    }
}

impl fmt::Display for ValueKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Values of one sample for every region of a matrix, in matrix row order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleColumn {
    pub sample_id: String,
    pub values:    Vec<Option<f64>>,
}

impl SampleColumn {
    pub fn new(
        sample_id: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            values,
        }
    }
}

/// One `(region, sample)` row of the long form of a [`WideMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub region_id: String,
    pub sample_id: String,
    pub af:        Option<f64>,
    pub fps:       Option<f64>,
}

/// A motif matrix in wide form.
#[derive(Debug, Clone, PartialEq)]
pub struct WideMatrix {
    region_ids: Vec<String>,
    af:         Vec<SampleColumn>,
    fps:        Vec<SampleColumn>,
}

impl WideMatrix {
    /// Creates a matrix, checking that every column has one value per
    /// region, that region ids are unique and that no sample occurs twice
    /// for the same value kind.
    pub fn try_new(
        region_ids: Vec<String>,
        af: Vec<SampleColumn>,
        fps: Vec<SampleColumn>,
    ) -> anyhow::Result<Self> {
        {
            let mut seen = HashSet::with_capacity(region_ids.len());
            for region_id in region_ids.iter() {
                if !seen.insert(region_id.as_str()) {
                    return Err(AfpsError::DuplicateRegion(region_id.clone()).into());
                }
            }
        }

        for (kind, columns) in [(ValueKind::Af, &af), (ValueKind::Fps, &fps)] {
            let mut samples = HashSet::new();
            for column in columns.iter() {
                ensure!(
                    column.values.len() == region_ids.len(),
                    "column {} has {} values, expected {}",
                    kind.column_name(&column.sample_id),
                    column.values.len(),
                    region_ids.len()
                );
                if !samples.insert(column.sample_id.as_str()) {
                    return Err(AfpsError::MalformedColumn {
                        column: kind.column_name(&column.sample_id),
                        reason: "sample occurs twice".to_owned(),
                    }
                    .into());
                }
            }
        }

        Ok(Self { region_ids, af, fps })
    }

    pub fn region_ids(&self) -> &[String] {
        &self.region_ids
    }

    pub fn af(&self) -> &[SampleColumn] {
        &self.af
    }

    pub fn fps(&self) -> &[SampleColumn] {
        &self.fps
    }

    pub fn n_regions(&self) -> usize {
        self.region_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region_ids.is_empty()
    }

    /// All sample ids present in either value kind, naturally sorted.
    pub fn sample_ids(&self) -> Vec<&str> {
        self.af
            .iter()
            .chain(self.fps.iter())
            .map(|c| c.sample_id.as_str())
            .unique()
            .sorted_by(|a, b| natural_cmp(a, b))
            .collect_vec()
    }

    /// Reshapes into `(region_id, sample_id)` rows, sorted naturally by
    /// region and then by sample. A sample missing one of the value kinds
    /// gets `None` for it.
    pub fn to_long(&self) -> Vec<LongRecord> {
        let af_by_sample: HashMap<&str, &SampleColumn> = self
            .af
            .iter()
            .map(|c| (c.sample_id.as_str(), c))
            .collect();
        let fps_by_sample: HashMap<&str, &SampleColumn> = self
            .fps
            .iter()
            .map(|c| (c.sample_id.as_str(), c))
            .collect();
        let samples = self.sample_ids();

        (0..self.n_regions())
            .sorted_by(|a, b| natural_cmp(&self.region_ids[*a], &self.region_ids[*b]))
            .flat_map(|row| {
                let af_by_sample = &af_by_sample;
                let fps_by_sample = &fps_by_sample;
                samples.iter().map(move |sample| LongRecord {
                    region_id: self.region_ids[row].clone(),
                    sample_id: sample.to_string(),
                    af:        af_by_sample.get(sample).and_then(|c| c.values[row]),
                    fps:       fps_by_sample.get(sample).and_then(|c| c.values[row]),
                })
            })
            .collect_vec()
    }

    /// Pivots long rows back into a wide matrix. Regions and samples are
    /// ordered naturally; a value kind gets a column for a sample only if
    /// at least one row carries that kind for it.
    pub fn from_long(records: &[LongRecord]) -> anyhow::Result<Self> {
        let region_ids = records
            .iter()
            .map(|r| r.region_id.clone())
            .unique()
            .sorted_by(|a, b| natural_cmp(a, b))
            .collect_vec();
        let samples = records
            .iter()
            .map(|r| r.sample_id.as_str())
            .unique()
            .sorted_by(|a, b| natural_cmp(a, b))
            .collect_vec();

        let mut af = vec![vec![None; region_ids.len()]; samples.len()];
        let mut fps = vec![vec![None; region_ids.len()]; samples.len()];
        {
            let region_idx: HashMap<&str, usize> = region_ids
                .iter()
                .enumerate()
                .map(|(i, r)| (r.as_str(), i))
                .collect();
            let sample_idx: HashMap<&str, usize> = samples
                .iter()
                .enumerate()
                .map(|(i, s)| (*s, i))
                .collect();
            let mut filled = HashSet::with_capacity(records.len());

            for record in records {
                let row = region_idx[record.region_id.as_str()];
                let col = sample_idx[record.sample_id.as_str()];
                if !filled.insert((row, col)) {
                    bail!(
                        "duplicate entry for region {} and sample {}",
                        record.region_id,
                        record.sample_id
                    );
                }
                af[col][row] = record.af;
                fps[col][row] = record.fps;
            }
        }

        let into_columns = |values: Vec<Vec<Option<f64>>>| {
            values
                .into_iter()
                .zip(samples.iter())
                .filter(|(column, _)| column.iter().any(Option::is_some))
                .map(|(column, sample)| SampleColumn::new(*sample, column))
                .collect_vec()
        };
        let af = into_columns(af);
        let fps = into_columns(fps);

        Self::try_new(region_ids, af, fps)
    }
}
