//! 外部前景/背景优化器.
//!
//! 优化器接收 z 轴在前的外观体 `(z, x, y, c)` 和种子编码 `(z, x, y)`,
//! 返回同形状的编码体. 确定前景和可能前景都被视为选中.

use std::time::Instant;

use log::info;
use ndarray::{Array3, ArrayView3, ArrayView4, Zip};

use crate::consts::gc;
use crate::roi::Roi;
use crate::{BoundingBox, ProcessFailure, SegResult, SegmentError};

mod process;

pub use process::ExternalOptimizer;

/// 前景/背景优化器.
///
/// 实现必须可以在多个簇上并发调用.
pub trait Optimizer: Sync {
    /// 对编号为 `cluster` 的簇求解. `image` 为 `(z, x, y, c)`, `seeds` 为 `(z, x, y)`,
    /// 编码见 [`gc`].
    fn run(&self, cluster: u32, image: ArrayView4<u8>, seeds: ArrayView3<u8>) -> SegResult<Array3<u8>>;
}

/// 直接返回种子编码的优化器. 用于试运行和测试.
#[derive(Copy, Clone, Debug, Default)]
pub struct PassThrough;

impl Optimizer for PassThrough {
    fn run(&self, _: u32, _: ArrayView4<u8>, seeds: ArrayView3<u8>) -> SegResult<Array3<u8>> {
        Ok(seeds.to_owned())
    }
}

/// 单个簇的优化结果, 坐标为包围盒内坐标 `(x, y, z)`.
#[derive(Clone, Debug)]
pub struct RoiOutcome {
    cluster: u32,
    bbox: BoundingBox,
    foreground: Array3<bool>,
}

impl RoiOutcome {
    /// 簇编号.
    #[inline]
    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    /// 选中的前景体素个数.
    pub fn selected(&self) -> usize {
        self.foreground.iter().filter(|v| **v).count()
    }
}

/// 负责 ROI 与优化器之间的轴序和编码转换, 以及结果合并.
pub struct ExternalSegmenter<'o, O: ?Sized> {
    optimizer: &'o O,
}

impl<'o, O: Optimizer + ?Sized> ExternalSegmenter<'o, O> {
    /// 初始化.
    pub fn new(optimizer: &'o O) -> Self {
        Self { optimizer }
    }

    /// 对一个 ROI 调用优化器.
    ///
    /// 种子内的体素编码为可能前景, 其余为可能背景.
    /// 输出形状与输入不一致时返回 [`ProcessFailure::MalformedOutput`].
    pub fn segment_roi(&self, roi: &Roi) -> SegResult<RoiOutcome> {
        let cluster = roi.cluster();
        let image = roi.appearance().view().permuted_axes([2, 0, 1, 3]);
        let seeds = roi.seeds().mapv(gc::seed_code);
        let seeds = seeds.view().permuted_axes([2, 0, 1]);
        let expected = [seeds.shape()[0], seeds.shape()[1], seeds.shape()[2]];

        let tic = Instant::now();
        let codes = self.optimizer.run(cluster, image, seeds)?;
        if codes.shape() != expected {
            return Err(SegmentError::process(
                cluster,
                ProcessFailure::MalformedOutput {
                    expected,
                    found: codes.shape().to_vec(),
                },
            ));
        }
        let foreground = codes.permuted_axes([1, 2, 0]).mapv(gc::is_foreground);
        let outcome = RoiOutcome {
            cluster,
            bbox: roi.bbox(),
            foreground,
        };
        info!(
            "cluster {cluster}: optimizer selected {} voxel(s) in {:.3?}",
            outcome.selected(),
            tic.elapsed()
        );
        Ok(outcome)
    }

    /// 将优化结果写入共享输出体: 只在选中的体素处置为前景.
    pub fn merge(output: &mut Array3<bool>, outcome: &RoiOutcome) {
        let region = outcome.bbox.crop_mut(output.view_mut());
        Zip::from(region).and(&outcome.foreground).for_each(|o, &fg| {
            if fg {
                *o = true;
            }
        });
    }
}
