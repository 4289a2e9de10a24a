use std::time::Instant;

use log::info;
use ndarray::Array3;

use crate::cluster::ClusterSelection;
use crate::consts::{BBOX_SCALE, MAX_CLUSTERS, MIN_RELATIVE_SIZE};
use crate::marker::Marker;
use crate::optimizer::{ExternalSegmenter, Optimizer, RoiOutcome};
use crate::post_proc::{ClusterSignal, PostProcessor};
use crate::roi::RoiBuilder;
use crate::signal::{TemporalScores, Timeline};
use crate::{DceSeries, SegResult};

/// 分割参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentConfig {
    /// Otsu 阈值倍率.
    pub threshold_multiplier: f64,

    /// 是否做形态学清理.
    pub cleanup: bool,

    /// 是否依据平均时间信号剔除噪声簇.
    pub reject_noise: bool,

    /// 最多保留的种子簇个数.
    pub max_clusters: usize,

    /// 后处理中相对最大区域的尺寸下限.
    pub min_relative_size: f64,

    /// ROI 包围盒放大倍率.
    pub bbox_scale: f64,

    /// 外观预处理的时间平滑尺度 (s). 0 表示不做时间平滑, 外观直接取减去基线后的曲线.
    pub appearance_sigma_sec: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: 1.0,
            cleanup: true,
            reject_noise: true,
            max_clusters: MAX_CLUSTERS,
            min_relative_size: MIN_RELATIVE_SIZE,
            bbox_scale: BBOX_SCALE,
            appearance_sigma_sec: 5.0,
        }
    }
}

/// 分割结果.
#[derive(Clone, Debug)]
pub struct Segmentation {
    /// 最终标签, 0 为背景, `1..=k` 为通过校验的肾脏区域.
    pub labels: Array3<u32>,

    /// 时间轴.
    pub timeline: Timeline,

    /// 是否使用了长序列标记?
    pub extended_marker: bool,

    /// 种子簇个数.
    pub seed_clusters: usize,

    /// 后处理各簇的平均信号 (包括被剔除的簇).
    pub signals: Vec<ClusterSignal>,
}

impl Segmentation {
    /// 最终区域个数.
    #[inline]
    pub fn regions(&self) -> usize {
        self.signals.iter().filter(|s| s.is_retained()).count()
    }
}

/// 对每个簇构建 ROI 并调用优化器. 各簇相互独立, 结果按簇编号顺序返回.
fn run_clusters<O: Optimizer + ?Sized>(
    builder: &RoiBuilder,
    seeds: &ClusterSelection,
    segmenter: &ExternalSegmenter<O>,
) -> SegResult<Vec<RoiOutcome>> {
    let task = |id: u32| -> SegResult<Option<RoiOutcome>> {
        match builder.build(id, &seeds.mask(id))? {
            Some(roi) => segmenter.segment_roi(&roi).map(Some),
            None => Ok(None),
        }
    };
    let ids: Vec<u32> = seeds.ids().collect();
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            use rayon::prelude::*;
            let outcomes: SegResult<Vec<_>> = ids.into_par_iter().map(task).collect();
        } else {
            let outcomes: SegResult<Vec<_>> = ids.into_iter().map(task).collect();
        }
    }
    Ok(outcomes?.into_iter().flatten().collect())
}

/// 对 4D 序列做双肾分割.
///
/// 任一阶段失败 (包括任一簇的外部优化失败) 都会使整个调用失败, 不提供部分结果.
/// 没有体素超过标记阈值时返回全零标签.
pub fn segment<O: Optimizer + ?Sized>(
    series: &DceSeries,
    config: &SegmentConfig,
    optimizer: &O,
) -> SegResult<Segmentation> {
    let spacing = series.spacing();
    let res = series.temporal_resolution();
    let gray = series.to_gray();
    let gray = gray.view();

    let timeline = Timeline::locate(gray, res);
    let scores = TemporalScores::extract(gray, &timeline, spacing)?;
    let marker = Marker::synthesize(gray, &timeline, spacing, &scores, res)?;
    drop(scores);
    let seeds = ClusterSelection::select(
        &marker.operative(),
        spacing,
        config.threshold_multiplier,
        config.max_clusters,
    );

    let tic = Instant::now();
    let builder = RoiBuilder::new(gray, spacing, res, config.appearance_sigma_sec, config.bbox_scale);
    let segmenter = ExternalSegmenter::new(optimizer);
    let outcomes = run_clusters(&builder, &seeds, &segmenter)?;
    let mut accumulated = Array3::from_elem(series.spatial_shape(), false);
    for outcome in outcomes.iter() {
        ExternalSegmenter::<O>::merge(&mut accumulated, outcome);
    }
    info!(
        "optimized {} cluster(s) in {:.3?}",
        outcomes.len(),
        tic.elapsed()
    );

    let (labels, signals) = PostProcessor::new(gray, spacing, timeline, config.min_relative_size)
        .cleanup(config.cleanup)
        .reject_noise(config.reject_noise)
        .run(&accumulated);
    let result = Segmentation {
        labels,
        timeline,
        extended_marker: marker.is_extended(),
        seed_clusters: seeds.len(),
        signals,
    };
    info!("segmentation completed with {} region(s)", result.regions());
    Ok(result)
}
