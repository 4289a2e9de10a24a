//! 种子簇选取.

use log::info;
use ndarray::Array3;

use crate::consts::anatomy;
use crate::morph::{self, label_components, max_filter};
use crate::numeric::{min_max, otsu_positive, quantize_u8};

/// 种子簇. 标签为按尺寸降序的稠密编号 `1..=k`, 0 为背景.
#[derive(Clone, Debug)]
pub struct ClusterSelection {
    labels: Array3<u32>,
    sizes: Vec<usize>,
    cutoff: f64,
}

impl ClusterSelection {
    /// 从复合标记选取最多 `max_clusters` 个种子簇.
    ///
    /// 1. 标记 min-max 归一化后量化为 8-bit;
    /// 2. 对正值求 Otsu 阈值, 乘以 `multiplier` 后二值化 (`q > cutoff`);
    /// 3. 按皮质厚度膨胀以桥接间隙, 再标记 6-连通区域;
    /// 4. 只保留原二值化结果中的体素, 按尺寸降序保留最大的几个非空区域.
    ///
    /// 标记中没有正值时返回空选择.
    pub fn select(marker: &Array3<f64>, spacing: [f64; 3], multiplier: f64, max_clusters: usize) -> Self {
        let quantized = quantize_u8(&min_max(marker.clone()));
        let Some(otsu) = otsu_positive(quantized.iter()) else {
            info!("clusters: marker has no positive voxel");
            return Self::empty(marker.raw_dim());
        };
        let cutoff = otsu as f64 * multiplier;
        let valid = quantized.mapv(|q| q as f64 > cutoff);

        let nb = morph::window_ceil(anatomy::CORTICAL_THICKNESS_MM, spacing);
        let bridged = max_filter(&valid, &nb);
        let mut components = label_components(bridged.view());
        components.restrict_to(valid.view());
        let components = components.keep_largest(max_clusters);

        let sizes = components.sizes().to_vec();
        info!(
            "clusters: otsu = {otsu}, cutoff = {cutoff:.1}, kept {} cluster(s) of sizes {:?}",
            sizes.len() - 1,
            &sizes[1..]
        );
        Self {
            labels: components.into_labels(),
            sizes,
            cutoff,
        }
    }

    fn empty(dim: ndarray::Ix3) -> Self {
        Self {
            labels: Array3::zeros(dim),
            sizes: vec![0],
            cutoff: f64::INFINITY,
        }
    }

    /// 簇个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len() - 1
    }

    /// 是否没有簇?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 标签体.
    #[inline]
    pub fn labels(&self) -> &Array3<u32> {
        &self.labels
    }

    /// 编号为 `id` 的簇的体素个数. 下标 0 为背景 (恒为 0).
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// 实际使用的二值化阈值 (8-bit 量化值). 没有正值时为 `+inf`.
    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// 编号为 `id` 的簇的掩膜.
    pub fn mask(&self, id: u32) -> Array3<bool> {
        self.labels.mapv(|l| l == id)
    }

    /// 所有簇编号 `1..=len()`.
    pub fn ids(&self) -> impl Iterator<Item = u32> {
        1..=self.len() as u32
    }
}
