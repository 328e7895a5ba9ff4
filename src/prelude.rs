pub use crate::data_structs::{
    AdjustedResult,
    CorrelationResult,
    CovariantSite,
    LongRecord,
    MotifId,
    Observation,
    SampleColumn,
    ValueKind,
    VarianceRecord,
    WideMatrix,
};
pub use crate::io::{
    discover_files,
    discover_motif_files,
    MotifJob,
};
pub use crate::tools::covariant::{
    filter_zero_signal,
    join_observations,
    region_variances,
    scale_fps_columns,
    select_covariant_sites,
    IqrBounds,
};
pub use crate::tools::pipeline::{
    CovariantConfig,
    CovariantPipeline,
    FdrScope,
    MotifStatus,
    MotifSummary,
    OutputLayout,
    PipelineReport,
};
pub use crate::tools::contingency::{
    run_contingency,
    ContingencyReport,
    ContingencyTable,
    FisherResult,
};
pub use crate::tools::correlation::{
    adjust_correlations,
    correlate_sites,
    significant_results,
};
pub use crate::tools::merge::{
    merge_significant,
    run_merge,
    CombinedRow,
};
pub use crate::utils::{
    natural_cmp,
    AfpsError,
};
