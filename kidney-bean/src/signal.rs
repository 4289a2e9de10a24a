//! 时间特征提取: 起始时刻, 检查点以及三种逐体素得分.

use log::info;
use ndarray::{Array3, ArrayView4, Axis};

use crate::consts::{anatomy, crossing, CHECKPOINTS_SEC};
use crate::morph::{self, gaussian, gaussian_1d, max_filter, min_filter};
use crate::numeric::{self, first_crossing, invert, min_max};
use crate::{SegResult, SegmentError, Stage};

/// 检查点 (相对起始时刻的秒数). 下标与 [`CHECKPOINTS_SEC`] 一致.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Checkpoint {
    /// +30 s
    S30,
    /// +45 s
    S45,
    /// +60 s
    S60,
    /// +90 s
    S90,
    /// +120 s
    S120,
    /// +180 s
    S180,
    /// +240 s
    S240,
}

/// 时间轴: 起始帧及各检查点帧. 所有帧都位于 `[0, nt)` 内.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timeline {
    start: usize,
    checkpoints: [usize; 7],
    frames: usize,
}

impl Timeline {
    /// 由起始帧构建时间轴. 每个检查点为 `min(start + ⌈sec / res⌉, nt - 1)`.
    pub fn new(start: usize, temporal_resolution: f64, frames: usize) -> Self {
        let last = frames.saturating_sub(1);
        let start = start.min(last);
        let checkpoints =
            CHECKPOINTS_SEC.map(|sec| (start + (sec / temporal_resolution).ceil() as usize).min(last));
        Self {
            start,
            checkpoints,
            frames,
        }
    }

    /// 从 8-bit 序列定位起始时刻: 对平均曲线做时间平滑后,
    /// 取首次达到上升幅度 10% 的时刻并向下取整.
    pub fn locate(gray: ArrayView4<u8>, temporal_resolution: f64) -> Self {
        let curve = numeric::mean_curve(gray);
        let smooth = gaussian_1d(&curve, anatomy::TEMPORAL_SMOOTHING_SEC / temporal_resolution);
        let t = first_crossing(ndarray::ArrayView1::from(&smooth), crossing::START);
        let timeline = Self::new(t.floor().max(0.0) as usize, temporal_resolution, curve.len());
        info!(
            "timeline: start = {}, checkpoints = {:?}, frames = {}",
            timeline.start, timeline.checkpoints, timeline.frames
        );
        timeline
    }

    /// 起始帧.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// 检查点帧.
    #[inline]
    pub fn at(&self, cp: Checkpoint) -> usize {
        self.checkpoints[cp as usize]
    }

    /// 总帧数.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// 序列是否覆盖 180 s 检查点之后 (即 +180 s 严格早于最后一帧)?
    #[inline]
    pub fn is_extended(&self) -> bool {
        self.at(Checkpoint::S180) + 1 < self.frames
    }
}

/// 三种逐体素时间得分, 取值均在 `[0, 1]`, 越大越可能是肾脏.
#[derive(Clone, Debug)]
pub struct TemporalScores {
    /// 起始时刻强度得分 (初始强度高的体素得分低).
    pub start: Array3<f64>,

    /// 运动得分 (二次拟合残差大的体素得分低).
    pub motion: Array3<f64>,

    /// 达峰时间得分 (90% 上升时刻越早得分越高), 经去斑处理.
    pub time_to_peak: Array3<f64>,
}

/// 检查数组中没有非有限值.
pub(crate) fn ensure_finite<'a>(
    it: impl IntoIterator<Item = &'a f64>,
    stage: Stage,
) -> SegResult<()> {
    if it.into_iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SegmentError::NumericDegenerate { stage })
    }
}

/// 空间平滑 (2 mm) 后做 min-max 归一化.
pub(crate) fn smooth_normalize(a: Array3<f64>, spacing: [f64; 3]) -> Array3<f64> {
    let sigma = morph::sigma_voxels(anatomy::SCORE_SMOOTHING_MM, spacing);
    min_max(gaussian(&a, &sigma))
}

impl TemporalScores {
    /// 从 8-bit 序列提取时间得分.
    pub fn extract(gray: ArrayView4<u8>, timeline: &Timeline, spacing: [f64; 3]) -> SegResult<Self> {
        let t_start = timeline.start();
        let t60 = timeline.at(Checkpoint::S60);
        let t120 = timeline.at(Checkpoint::S120);

        let initial = gray.index_axis(Axis(3), t_start).mapv(|v| v as f64);
        let start = invert(smooth_normalize(initial, spacing));

        let residual = numeric::quadratic_residual_std(gray, t60..t120);
        let motion = invert(smooth_normalize(residual, spacing));

        // 未达到 90% 的体素 (记为 0) 替换为最大值, 避免被当作最早达峰.
        let mut reach = numeric::crossing_map(gray, t_start..t60, crossing::PEAK);
        let latest = reach.iter().copied().fold(0.0, f64::max);
        reach.mapv_inplace(|v| if v == 0.0 { latest } else { v });
        let ttp = invert(smooth_normalize(reach, spacing));
        let nb = morph::window_ceil(anatomy::CORTICAL_THICKNESS_MM, spacing);
        let time_to_peak = min_filter(&max_filter(&ttp, &nb), &nb);

        for a in [&start, &motion, &time_to_peak] {
            ensure_finite(a.iter(), Stage::Features)?;
        }
        Ok(Self {
            start,
            motion,
            time_to_peak,
        })
    }
}
