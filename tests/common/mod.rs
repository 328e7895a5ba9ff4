#![allow(dead_code)]

use std::path::{
    Path,
    PathBuf,
};

use afps_covar::tools::pipeline::DEFAULT_INPUT_SUFFIX;

/// Five regions over three samples. `chr1:100-120` is the only region
/// varying strongly in both AF and FPS, `chr1:300-320` has no footprint
/// signal at all.
pub const MATRIX: &str = "\
region_id\ts1_AF\ts1_fps\ts2_AF\ts2_fps\ts3_AF\ts3_fps
chr1:100-120\t0.1\t0\t0.9\t20\t0.9\t40
chr1:200-220\t0.3\t10\t0.32\t20\t0.31\t40
chr1:300-320\t0.2\t0\t0.2\t0\t0.2\t0
chr1:400-420\t0.4\t5\t0.41\t11\t0.42\t20
chr1:1000-1020\t0.5\t5\t0.5\t10\t0.52\t18
";

pub const OUTLIER_REGION: &str = "chr1:100-120";

/// Same layout as [`MATRIX`], but the outlier's AF and FPS ranks disagree
/// across samples so its correlation is weak.
pub const DISCORDANT_MATRIX: &str = "\
region_id\ts1_AF\ts1_fps\ts2_AF\ts2_fps\ts3_AF\ts3_fps
chr1:100-120\t0.1\t0\t0.9\t10\t0.5\t40
chr1:200-220\t0.3\t10\t0.32\t20\t0.31\t40
chr1:300-320\t0.2\t0\t0.2\t0\t0.2\t0
chr1:400-420\t0.4\t5\t0.41\t11\t0.42\t20
chr1:1000-1020\t0.5\t5\t0.5\t10\t0.52\t18
";

pub fn write_motif(
    dir: &Path,
    motif_id: &str,
    content: &str,
) -> PathBuf {
    let path = dir.join(format!("{}{}", motif_id, DEFAULT_INPUT_SUFFIX));
    std::fs::write(&path, content).unwrap();
    path
}
