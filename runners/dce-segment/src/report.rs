//! 分割结果报告.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use kidney_bean::prelude::*;

/// 将单个簇的信号写进 `w` 中.
fn describe_into<W: Write>(s: &ClusterSignal, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let verdict = match s.label {
        Some(l) => format!("label {l}"),
        None => "rejected (noise)".to_string(),
    };
    writeln!(w, "Cluster #{}: {verdict}", s.candidate)?;
    writeln!(w, "{S4}Voxels: {}", s.voxels)?;
    writeln!(w, "{S4}50% rise at frame: {:.3}", s.half_rise)?;
    let peak = s.curve.iter().copied().fold(0.0, f64::max);
    write!(w, "{S4}Peak mean intensity: {peak:.3}")?;
    Ok(())
}

/// 一次运行的结果.
pub struct SegmentReport {
    optimizer: String,
    output: PathBuf,
    elapsed: Duration,
    segmentation: Segmentation,
}

impl SegmentReport {
    pub fn new(optimizer: String, output: PathBuf, elapsed: Duration, segmentation: Segmentation) -> Self {
        Self {
            optimizer,
            output,
            elapsed,
            segmentation,
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        let seg = &self.segmentation;
        let tl = &seg.timeline;
        utils::sep();
        println!("Optimizer: {}", self.optimizer);
        println!(
            "Timeline: start = {}, +30 s = {}, +180 s = {}, frames = {}",
            tl.start(),
            tl.at(Checkpoint::S30),
            tl.at(Checkpoint::S180),
            tl.frames()
        );
        println!(
            "Marker: {}",
            if seg.extended_marker {
                "medulla + cortico-medullary"
            } else {
                "medulla"
            }
        );
        println!("Seed clusters: {}", seg.seed_clusters);
        utils::sep();

        let mut buf = Vec::with_capacity(256);
        for s in seg.signals.iter() {
            if describe_into(s, &mut buf).is_ok() {
                println!("{}", String::from_utf8_lossy(&buf));
            }
            buf.clear();
            utils::sep();
        }
        println!("Regions: {}", seg.regions());
        println!("Labels written to {}", self.output.display());
        println!("Total time: {:.3?}", self.elapsed);
    }
}
