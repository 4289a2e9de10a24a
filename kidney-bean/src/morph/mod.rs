//! 三维形态学与可分离滤波.
//!
//! 所有滤波都按轴分离执行: 对每个轴, 沿该轴的每一条 lane 独立处理.
//! 开启 `rayon` feature 时, lane 之间并行.

use crate::Shape3d;
use ndarray::{Array, ArrayView1, ArrayViewMut1, Axis, Dimension, Zip};

mod holes;
mod hull;
mod label;

pub use holes::fill_holes_3d;
pub use hull::convex_hull_3d;
pub use label::{label_components, Components};

/// 由物理尺寸 (mm) 换算窗口大小, 向上取整, 至少为 1.
#[inline]
pub fn window_ceil(mm: f64, spacing: [f64; 3]) -> Shape3d {
    spacing.map(|s| ((mm / s).ceil() as usize).max(1))
}

/// 由物理尺寸 (mm) 换算窗口大小, 向下取整, 至少为 `at_least`.
#[inline]
pub fn window_floor(mm: f64, spacing: [f64; 3], at_least: usize) -> Shape3d {
    spacing.map(|s| ((mm / s).floor() as usize).max(at_least.max(1)))
}

/// 由物理尺度 (mm) 换算高斯核标准差 (体素).
#[inline]
pub fn sigma_voxels(mm: f64, spacing: [f64; 3]) -> [f64; 3] {
    spacing.map(|s| mm / s)
}

/// "reflect" 边界 (d c b a | a b c d | d c b a) 下的合法索引.
#[inline]
fn reflect(i: isize, n: isize) -> usize {
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m >= n { period - 1 - m } else { m }) as usize
}

/// 截断于 `⌊4σ + 0.5⌋` 的归一化一维高斯核.
pub(crate) fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / (sigma * sigma)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// 对单条 lane 做相关运算.
fn correlate_lane(src: ArrayView1<f64>, mut dst: ArrayViewMut1<f64>, kernel: &[f64]) {
    let n = src.len() as isize;
    let r = (kernel.len() / 2) as isize;
    for i in 0..n {
        dst[i as usize] = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * src[reflect(i + k as isize - r, n)])
            .sum();
    }
}

/// 对单条 lane 做窗口极值运算. 窗口为 `[i - ⌊s/2⌋, i + ⌈s/2⌉ - 1]`, 在边界处裁剪.
fn extremum_lane<T: Copy>(src: ArrayView1<T>, mut dst: ArrayViewMut1<T>, size: usize, pick: fn(T, T) -> T) {
    let n = src.len();
    let before = size / 2;
    let after = size - 1 - before;
    for i in 0..n {
        let lo = i.saturating_sub(before);
        let hi = (i + after + 1).min(n);
        let mut acc = src[lo];
        for j in (lo + 1)..hi {
            acc = pick(acc, src[j]);
        }
        dst[i] = acc;
    }
}

/// 对 `input` 的每个轴依次应用 `lane_op`. `skip(ax)` 为 `true` 的轴被跳过.
fn separable<T, D, F>(input: &Array<T, D>, skip: impl Fn(usize) -> bool, lane_op: F) -> Array<T, D>
where
    T: Copy + Send + Sync,
    D: Dimension,
    F: Fn(usize, ArrayView1<T>, ArrayViewMut1<T>) + Sync + Send,
{
    let mut cur = input.clone();
    for ax in 0..input.ndim() {
        if skip(ax) || input.shape()[ax] == 0 {
            continue;
        }
        let mut next = cur.clone();
        let zip = Zip::from(next.lanes_mut(Axis(ax))).and(cur.lanes(Axis(ax)));
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                zip.par_for_each(|dst, src| lane_op(ax, src, dst));
            } else {
                zip.for_each(|dst, src| lane_op(ax, src, dst));
            }
        }
        cur = next;
    }
    cur
}

/// 多维高斯平滑. `sigma[ax]` 为第 `ax` 轴的标准差 (以体素/帧为单位),
/// 为 0 (或非正) 时跳过该轴. `sigma` 长度不足时, 缺失轴视为 0.
pub fn gaussian<D: Dimension>(input: &Array<f64, D>, sigma: &[f64]) -> Array<f64, D> {
    let sigma_at = |ax: usize| sigma.get(ax).copied().unwrap_or(0.0);
    let kernels: Vec<Vec<f64>> = (0..input.ndim())
        .map(|ax| {
            let s = sigma_at(ax);
            if s > 0.0 {
                gaussian_kernel(s)
            } else {
                vec![1.0]
            }
        })
        .collect();
    separable(
        input,
        |ax| !(sigma_at(ax) > 0.0),
        |ax, src, dst| correlate_lane(src, dst, &kernels[ax]),
    )
}

/// 一维高斯平滑.
pub fn gaussian_1d(signal: &[f64], sigma: f64) -> Vec<f64> {
    if !(sigma > 0.0) || signal.is_empty() {
        return signal.to_vec();
    }
    let src = ArrayView1::from(signal);
    let mut dst = ndarray::Array1::zeros(signal.len());
    correlate_lane(src, dst.view_mut(), &gaussian_kernel(sigma));
    dst.to_vec()
}

#[inline]
fn pick_max<T: PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

#[inline]
fn pick_min<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

/// 矩形窗口极大值滤波 (灰度膨胀). `size[ax]` 为窗口大小, 1 表示不处理.
pub fn max_filter<T, D>(input: &Array<T, D>, size: &[usize]) -> Array<T, D>
where
    T: Copy + PartialOrd + Send + Sync,
    D: Dimension,
{
    let size_at = |ax: usize| size.get(ax).copied().unwrap_or(1).max(1);
    separable(
        input,
        |ax| size_at(ax) == 1,
        |ax, src, dst| extremum_lane(src, dst, size_at(ax), pick_max::<T>),
    )
}

/// 矩形窗口极小值滤波 (灰度腐蚀). `size[ax]` 为窗口大小, 1 表示不处理.
pub fn min_filter<T, D>(input: &Array<T, D>, size: &[usize]) -> Array<T, D>
where
    T: Copy + PartialOrd + Send + Sync,
    D: Dimension,
{
    let size_at = |ax: usize| size.get(ax).copied().unwrap_or(1).max(1);
    separable(
        input,
        |ax| size_at(ax) == 1,
        |ax, src, dst| extremum_lane(src, dst, size_at(ax), pick_min::<T>),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    #[test]
    fn test_reflect() {
        let n = 4;
        let got: Vec<usize> = (-5..9).map(|i| reflect(i, n)).collect();
        assert_eq!(got, vec![3, 3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0, 0]);
        assert_eq!(reflect(-3, 1), 0);
    }

    #[test]
    fn test_gaussian_kernel() {
        let k = gaussian_kernel(1.0);
        assert_eq!(k.len(), 9);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(k[4] > k[3] && (k[3] - k[5]).abs() < 1e-15);
    }

    #[test]
    fn test_gaussian_preserves_constant_and_mass() {
        let c = Array3::from_elem((5, 4, 3), 2.5);
        let g = gaussian(&c, &[1.0, 0.7, 2.0]);
        assert!(g.iter().all(|v| (v - 2.5).abs() < 1e-12));

        let mut impulse = Array1::zeros(21);
        impulse[10] = 1.0;
        let g = gaussian(&impulse, &[2.0]);
        assert!((g.sum() - 1.0).abs() < 1e-12);
        assert!(g[10] > g[9] && (g[9] - g[11]).abs() < 1e-15);
    }

    #[test]
    fn test_gaussian_zero_sigma_is_identity() {
        let a = Array3::from_shape_fn((3, 3, 3), |(x, y, z)| (x * 9 + y * 3 + z) as f64);
        assert_eq!(gaussian(&a, &[0.0, 0.0, 0.0]), a);
        assert_eq!(gaussian_1d(&[1.0, 5.0], 0.0), vec![1.0, 5.0]);
    }

    #[test]
    fn test_extremum_filters() {
        let a = Array1::from(vec![0u8, 0, 5, 0, 0, 0, 1]);
        assert_eq!(max_filter(&a, &[3]).to_vec(), vec![0, 5, 5, 5, 0, 1, 1]);
        // 偶数窗口: [i - 2, i + 1].
        assert_eq!(max_filter(&a, &[4]).to_vec(), vec![0, 5, 5, 5, 5, 1, 1]);
        assert_eq!(min_filter(&a.mapv(|v| 5 - v), &[3]).to_vec(), vec![5, 0, 0, 0, 5, 4, 4]);
    }

    #[test]
    fn test_binary_dilate_erode_3d() {
        let mut m = Array3::from_elem((7, 7, 7), false);
        m[(3, 3, 3)] = true;
        let d = max_filter(&m, &[3, 3, 3]);
        assert_eq!(d.iter().filter(|v| **v).count(), 27);
        let e = min_filter(&d, &[3, 3, 3]);
        assert_eq!(e.iter().filter(|v| **v).count(), 1);
        assert!(e[(3, 3, 3)]);
    }

    #[test]
    fn test_window_sizes() {
        assert_eq!(window_ceil(11.0, [1.5, 2.0, 11.0]), [8, 6, 1]);
        assert_eq!(window_floor(6.4, [1.5, 2.0, 4.0], 3), [4, 3, 3]);
        assert_eq!(sigma_voxels(2.0, [1.0, 2.0, 4.0]), [2.0, 1.0, 0.5]);
    }
}
