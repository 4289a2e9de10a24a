//! 程序运行函数.

use std::error::Error;
use std::time::Instant;

use kidney_bean::prelude::*;
use utils::loader;

use crate::report::SegmentReport;

type DynResult<T> = Result<T, Box<dyn Error>>;

/// 实际运行.
pub fn run() -> DynResult<SegmentReport> {
    let path = loader::series_path_from_env_or_home().ok_or("cannot locate home directory")?;
    let out = loader::label_out_from_env_or_home().ok_or("cannot locate home directory")?;
    let mut config = SegmentConfig::default();
    if let Some(t) = loader::threshold_from_env() {
        config.threshold_multiplier = t;
    }

    println!("Loading {} ...", path.display());
    let series = loader::load_series(&path)?;
    println!(
        "Series of shape {:?} x {} frames, spacing {:?} mm, {} s/frame",
        series.spatial_shape(),
        series.frames(),
        series.spacing(),
        series.temporal_resolution()
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(utils::cpus())
        .build_global()?;

    let tic = Instant::now();
    let (segmentation, optimizer) = match loader::optimizer_from_env() {
        Some(program) => {
            let work = loader::work_dir_from_env_or_home().ok_or("cannot locate home directory")?;
            let mut optimizer = ExternalOptimizer::new(program, work);
            if let Some(limit) = loader::timeout_from_env() {
                optimizer = optimizer.with_timeout(limit);
            }
            let label = optimizer.program().display().to_string();
            (segment(&series, &config, &optimizer)?, label)
        }
        None => {
            log::warn!("$KIDNEY_OPTIMIZER not set, running with pass-through optimizer");
            (segment(&series, &config, &PassThrough)?, "pass-through".to_string())
        }
    };
    let elapsed = tic.elapsed();

    write_tensor(&out, &segmentation.labels)?;
    Ok(SegmentReport::new(optimizer, out, elapsed, segmentation))
}
