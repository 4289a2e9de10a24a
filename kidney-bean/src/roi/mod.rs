//! 逐簇的 ROI 构建: 扩张种子, 凸包, 包围盒放大, 以及 PCA 外观体.

use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array3, Array4, ArrayView4, Axis};

use crate::consts::{anatomy, APPEARANCE_CHANNELS};
use crate::morph::{self, convex_hull_3d, gaussian_1d, max_filter};
use crate::signal::ensure_finite;
use crate::{BoundingBox, SegResult, Stage};

pub mod pca;

/// 单个簇的 ROI. 生命周期为一次簇迭代.
#[derive(Clone, Debug)]
pub struct Roi {
    cluster: u32,
    bbox: BoundingBox,
    appearance: Array4<u8>,
    seeds: Array3<bool>,
}

impl Roi {
    /// 所属簇编号 (1 起).
    #[inline]
    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    /// 在整个体中的包围盒.
    #[inline]
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// 外观体, `(x, y, z, c)`, 每个通道都归一化到 `[0, 255]`.
    #[inline]
    pub fn appearance(&self) -> &Array4<u8> {
        &self.appearance
    }

    /// 种子掩膜 (包围盒内坐标).
    #[inline]
    pub fn seeds(&self) -> &Array3<bool> {
        &self.seeds
    }
}

/// ROI 构建器. 每次分割创建一次, 为每个簇调用 [`RoiBuilder::build`].
pub struct RoiBuilder<'a> {
    gray: ArrayView4<'a, u8>,
    spacing: [f64; 3],
    sigma_frames: f64,
    bbox_scale: f64,
}

impl<'a> RoiBuilder<'a> {
    /// `appearance_sigma_sec` 为外观预处理的时间平滑尺度 (s), 0 表示不平滑.
    pub fn new(
        gray: ArrayView4<'a, u8>,
        spacing: [f64; 3],
        temporal_resolution: f64,
        appearance_sigma_sec: f64,
        bbox_scale: f64,
    ) -> Self {
        Self {
            gray,
            spacing,
            sigma_frames: appearance_sigma_sec.max(0.0) / temporal_resolution,
            bbox_scale,
        }
    }

    /// 由簇掩膜 `mask` 构建 ROI. 掩膜为空时返回 `Ok(None)`.
    pub fn build(&self, cluster: u32, mask: &Array3<bool>) -> SegResult<Option<Roi>> {
        let nb = morph::window_ceil(anatomy::ROI_EXPANSION_MM, self.spacing);
        let hull = convex_hull_3d(max_filter(mask, &nb).view());
        let Some(tight) = BoundingBox::of_mask(hull.view()) else {
            return Ok(None);
        };
        let (nx, ny, nz, _) = self.gray.dim();
        let bbox = tight.expanded(self.bbox_scale, [nx, ny, nz]);
        debug!(
            "cluster {cluster}: hull box {:?}..{:?}, roi box {:?}..{:?}",
            tight.min(),
            tight.max(),
            bbox.min(),
            bbox.max()
        );

        let seeds = bbox.crop(hull.view()).to_owned();
        let appearance = self.appearance(bbox)?;
        Ok(Some(Roi {
            cluster,
            bbox,
            appearance,
            seeds,
        }))
    }

    /// 裁剪序列, 逐体素减去时间最小值并做时间平滑, 再投影到前 3 个主成分.
    fn appearance(&self, bbox: BoundingBox) -> SegResult<Array4<u8>> {
        let cropped = bbox.crop_series(self.gray);
        let [bx, by, bz] = bbox.extent();
        let nt = cropped.shape()[3];

        let curves: Vec<f64> = cropped
            .lanes(Axis(3))
            .into_iter()
            .flat_map(|lane| {
                let baseline = lane.iter().copied().min().unwrap_or(0);
                let curve: Vec<f64> = lane.iter().map(|&v| (v - baseline) as f64).collect();
                gaussian_1d(&curve, self.sigma_frames)
            })
            .collect();
        let samples = DMatrix::from_row_slice(bx * by * bz, nt, &curves);
        let scores = pca::project(&samples, APPEARANCE_CHANNELS);
        ensure_finite(scores.iter(), Stage::Roi)?;

        let mut out = Array4::zeros((bx, by, bz, APPEARANCE_CHANNELS));
        for (c, column) in scores.column_iter().enumerate() {
            let (lo, hi) = column
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if !(hi > lo) {
                continue;
            }
            let mut channel = out.index_axis_mut(Axis(3), c);
            for (dst, &v) in channel.iter_mut().zip(column.iter()) {
                *dst = ((v - lo) / (hi - lo) * 255.0) as u8;
            }
        }
        Ok(out)
    }
}
