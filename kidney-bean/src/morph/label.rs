//! 6-连通区域标记及基于尺寸的筛选.

use crate::{Idx3d, Shape3d};
use itertools::Itertools;
use ndarray::{Array3, ArrayView3, Zip};
use std::collections::VecDeque;

/// 连通区域标记结果.
///
/// `labels` 中 0 代表背景, 其余为 `1..=len()` 的稠密编号;
/// `sizes[i]` 为编号 `i` 的体素个数, `sizes[0]` 恒为 0.
#[derive(Clone, Debug)]
pub struct Components {
    labels: Array3<u32>,
    sizes: Vec<usize>,
}

/// 获取 `pos` 前后上下左右六个点的坐标.
///
/// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
#[inline]
fn diamond_neighbours((x, y, z): Idx3d, [nx, ny, nz]: Shape3d) -> impl Iterator<Item = Idx3d> {
    [
        (x.wrapping_sub(1), y, z),
        (x.saturating_add(1), y, z),
        (x, y.wrapping_sub(1), z),
        (x, y.saturating_add(1), z),
        (x, y, z.wrapping_sub(1)),
        (x, y, z.saturating_add(1)),
    ]
    .into_iter()
    .filter(move |&(a, b, c)| a < nx && b < ny && c < nz)
}

/// 按照 6-相邻规则标记 `mask` 中所有前景区域. 编号按扫描顺序 (行优先) 分配.
pub fn label_components(mask: ArrayView3<bool>) -> Components {
    let &[nx, ny, nz] = mask.shape() else {
        unreachable!()
    };
    let shape = [nx, ny, nz];
    let mut labels = Array3::<u32>::zeros((nx, ny, nz));
    let mut sizes = vec![0usize];
    let mut q: VecDeque<Idx3d> = VecDeque::with_capacity(64);

    for (seed, _) in mask.indexed_iter().filter(|(_, &v)| v) {
        if labels[seed] != 0 {
            continue;
        }
        let id = sizes.len() as u32;
        let mut count = 0usize;
        labels[seed] = id;
        q.push_back(seed);
        while let Some(cur) = q.pop_front() {
            count += 1;
            for p in diamond_neighbours(cur, shape) {
                if mask[p] && labels[p] == 0 {
                    labels[p] = id;
                    q.push_back(p);
                }
            }
        }
        sizes.push(count);
    }

    Components { labels, sizes }
}

impl Components {
    /// 区域个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len() - 1
    }

    /// 是否没有任何区域?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 标签体.
    #[inline]
    pub fn labels(&self) -> &Array3<u32> {
        &self.labels
    }

    /// 直接获得标签体的所有权.
    #[inline]
    pub fn into_labels(self) -> Array3<u32> {
        self.labels
    }

    /// 各编号的体素个数, 下标 0 为背景 (恒为 0).
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// 最大区域的体素个数. 没有区域时为 0.
    #[inline]
    pub fn largest(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }

    /// 前景掩膜.
    pub fn mask(&self) -> Array3<bool> {
        self.labels.mapv(|l| l != 0)
    }

    /// 将 `keep` 之外的体素清零 (不重新统计编号).
    pub fn restrict_to(&mut self, keep: ArrayView3<bool>) {
        Zip::from(&mut self.labels).and(keep).for_each(|l, &k| {
            if !k {
                *l = 0;
            }
        });
        let mut sizes = vec![0usize; self.sizes.len()];
        self.labels
            .iter()
            .filter(|l| **l != 0)
            .for_each(|&l| sizes[l as usize] += 1);
        self.sizes = sizes;
    }

    /// 按体素个数降序保留 (稳定排序), 并将存活区域重新编号为 `1..=k`.
    ///
    /// 只有 `keep(size)` 为真且体素个数非零的区域参与排序, 最多保留 `limit` 个.
    fn rank_and_relabel(self, keep: impl Fn(usize) -> bool, limit: usize) -> Self {
        let ranked: Vec<usize> = self
            .sizes
            .iter()
            .enumerate()
            .skip(1)
            .filter(|&(_, &size)| size > 0 && keep(size))
            .sorted_by(|a, b| b.1.cmp(a.1))
            .take(limit)
            .map(|(id, _)| id)
            .collect();

        let mut lut = vec![0u32; self.sizes.len()];
        let mut sizes = vec![0usize];
        for (rank, &id) in ranked.iter().enumerate() {
            lut[id] = rank as u32 + 1;
            sizes.push(self.sizes[id]);
        }
        let labels = self.labels.mapv(|l| lut[l as usize]);
        Self { labels, sizes }
    }

    /// 最多保留 `n` 个最大的非空区域, 按尺寸降序编号为 `1..=k`.
    #[inline]
    pub fn keep_largest(self, n: usize) -> Self {
        self.rank_and_relabel(|_| true, n)
    }

    /// 删除体素个数小于最大区域 `ratio` 倍的区域, 存活区域按尺寸降序稠密编号.
    #[inline]
    pub fn keep_relative(self, ratio: f64) -> Self {
        let cutoff = self.largest() as f64 * ratio;
        self.rank_and_relabel(|size| size as f64 >= cutoff, usize::MAX)
    }
}
