//! 数值辅助操作: 归一化, 时间曲线的交叉时刻, Otsu 阈值, 二次拟合残差.
//!
//! 所有归一化操作在零值域时返回全零结果, 不会产生除零.

use log::warn;
use nalgebra::DMatrix;
use ndarray::{s, Array, Array3, Array4, ArrayView1, ArrayView4, Axis, Dimension, Zip};
use std::ops::Range;

use crate::morph::gaussian_1d;

/// 求最小值和最大值. 空迭代器返回 `(+inf, -inf)`.
#[inline]
fn bounds(it: impl Iterator<Item = f64>) -> (f64, f64) {
    it.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// 将 `a` 线性映射到 `[0, 1]`. 值域为零 (或非有限) 时返回全零.
pub fn min_max<D: Dimension>(a: Array<f64, D>) -> Array<f64, D> {
    let (lo, hi) = bounds(a.iter().copied());
    let range = hi - lo;
    if !(range.is_finite() && range > 0.0) {
        warn!("degenerate min-max normalization over {} values", a.len());
        return a.mapv_into(|_| 0.0);
    }
    a.mapv_into(|v| (v - lo) / range)
}

/// 除以最大值. 最大值不是正有限数时返回全零.
pub fn by_max<D: Dimension>(a: Array<f64, D>) -> Array<f64, D> {
    let (_, hi) = bounds(a.iter().copied());
    if !(hi.is_finite() && hi > 0.0) {
        warn!("degenerate max normalization over {} values", a.len());
        return a.mapv_into(|_| 0.0);
    }
    a.mapv_into(|v| v / hi)
}

/// `1 - x`.
#[inline]
pub fn invert<D: Dimension>(a: Array<f64, D>) -> Array<f64, D> {
    a.mapv_into(|v| 1.0 - v)
}

/// 将 `[0, 1]` 内的值量化为 8-bit (`⌊255·v⌋`), 越界值饱和.
pub fn quantize_u8<D: Dimension>(a: &Array<f64, D>) -> Array<u8, D> {
    a.mapv(|v| (255.0 * v) as u8)
}

/// 曲线首次达到上升幅度 `fraction` 的时刻 (帧, 可为小数).
///
/// 阈值为 `min + fraction·(max - min)`. 找到第一个不低于阈值的下标 `i`,
/// 在 `i - 1` 与 `i` 之间线性插值. `i == 0` 或曲线平坦时返回 0.
pub fn first_crossing<T: Copy + Into<f64>>(curve: ArrayView1<T>, fraction: f64) -> f64 {
    let (lo, hi) = bounds(curve.iter().map(|&v| v.into()));
    if !(hi > lo) {
        return 0.0;
    }
    let level = lo + fraction * (hi - lo);
    match curve.iter().position(|&v| v.into() >= level) {
        None | Some(0) => 0.0,
        Some(i) => {
            let (a, b): (f64, f64) = (curve[i - 1].into(), curve[i].into());
            // a < level <= b
            (i - 1) as f64 + (level - a) / (b - a)
        }
    }
}

/// 截取 `frames` 帧窗口 (越界部分被裁剪).
#[inline]
fn window<T>(series: ArrayView4<'_, T>, frames: Range<usize>) -> ArrayView4<'_, T> {
    let nt = series.shape()[3];
    let hi = frames.end.min(nt);
    let lo = frames.start.min(hi);
    series.slice_move(s![.., .., .., lo..hi])
}

/// 逐体素求 `frames` 窗口内曲线的首次交叉时刻, 时刻相对窗口起点.
pub fn crossing_map(series: ArrayView4<u8>, frames: Range<usize>, fraction: f64) -> Array3<f64> {
    let win = window(series, frames);
    let (nx, ny, nz, _) = win.dim();
    let mut out = Array3::zeros((nx, ny, nz));
    let zip = Zip::from(&mut out).and(win.lanes(Axis(3)));
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(|o, lane| *o = first_crossing(lane, fraction));
        } else {
            zip.for_each(|o, lane| *o = first_crossing(lane, fraction));
        }
    }
    out
}

/// 二次多项式最小二乘拟合的残差算子 `I - V (VᵀV)⁻¹ Vᵀ`.
///
/// 自变量取中心化的帧下标, 减小范德蒙德矩阵的条件数.
fn quadratic_residual_operator(n: usize) -> Option<DMatrix<f64>> {
    let center = (n as f64 - 1.0) / 2.0;
    let v_mat = DMatrix::from_fn(n, 3, |r, c| (r as f64 - center).powi(c as i32));
    let v_mat_t = v_mat.transpose();
    let gram_inv = (&v_mat_t * &v_mat).try_inverse()?;
    let hat = &v_mat * gram_inv * v_mat_t;
    Some(DMatrix::identity(n, n) - hat)
}

/// 逐体素对 `frames` 窗口内的曲线做二次拟合, 返回残差的总体标准差.
///
/// 窗口少于 3 帧时无法拟合, 残差记为 0.
pub fn quadratic_residual_std(series: ArrayView4<u8>, frames: Range<usize>) -> Array3<f64> {
    let win = window(series, frames);
    let (nx, ny, nz, n) = win.dim();
    let mut out = Array3::zeros((nx, ny, nz));
    let Some(res_op) = (n >= 3).then(|| quadratic_residual_operator(n)).flatten() else {
        return out;
    };

    let std_of = |lane: ArrayView1<u8>| -> f64 {
        let r: Vec<f64> = (0..n)
            .map(|k| (0..n).map(|j| res_op[(k, j)] * lane[j] as f64).sum())
            .collect();
        let mean = r.iter().sum::<f64>() / n as f64;
        (r.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64).sqrt()
    };
    let zip = Zip::from(&mut out).and(win.lanes(Axis(3)));
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(|o, lane| *o = std_of(lane));
        } else {
            zip.for_each(|o, lane| *o = std_of(lane));
        }
    }
    out
}

/// 全体素平均时间曲线.
pub fn mean_curve(series: ArrayView4<u8>) -> Vec<f64> {
    let n = (series.len() / series.shape()[3].max(1)).max(1) as f64;
    series
        .axis_iter(Axis(3))
        .map(|frame| frame.iter().map(|&v| v as f64).sum::<f64>() / n)
        .collect()
}

/// 对每个体素的曲线做时间高斯平滑 (`sigma` 以帧为单位), 并取出 `frames` 各帧.
///
/// 返回 `(x, y, z, k)`, 第 `k` 个通道对应 `frames[k]`. 帧下标必须合法.
pub fn smoothed_frames(series: ArrayView4<u8>, sigma: f64, frames: &[usize]) -> Array4<f64> {
    let (nx, ny, nz, _) = series.dim();
    let mut out = Array4::zeros((nx, ny, nz, frames.len()));
    let zip = Zip::from(out.lanes_mut(Axis(3))).and(series.lanes(Axis(3)));
    let op = |mut dst: ndarray::ArrayViewMut1<f64>, src: ArrayView1<u8>| {
        let curve: Vec<f64> = src.iter().map(|&v| v as f64).collect();
        let smooth = gaussian_1d(&curve, sigma);
        dst.iter_mut().zip(frames).for_each(|(d, &f)| *d = smooth[f]);
    };
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(op);
        } else {
            zip.for_each(op);
        }
    }
    out
}

/// 对 8-bit 值中严格为正的部分求 Otsu 阈值.
///
/// 使用 256 个整数 bin 的直方图, 返回使 `v <= t` 划分的类间方差最大的 `t`.
/// 只有一种取值时返回该值; 没有正值时返回 `None`.
pub fn otsu_positive<'a>(values: impl IntoIterator<Item = &'a u8>) -> Option<u8> {
    let mut histogram = [0u64; 256];
    values
        .into_iter()
        .filter(|v| **v > 0)
        .for_each(|&v| histogram[v as usize] += 1);

    let mut occupied = histogram.iter().enumerate().filter(|(_, c)| **c > 0);
    let (first, _) = occupied.next()?;
    if occupied.next().is_none() {
        return Some(first as u8);
    }

    let total = histogram.iter().sum::<u64>() as f64;
    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0.0;
    let mut max_variance = 0.0;
    let mut optimal = first;
    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count as f64;
        if weight_background == 0.0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0.0 {
            break;
        }
        sum_background += t as f64 * count as f64;

        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_total - sum_background) / weight_foreground;
        let variance =
            weight_background * weight_foreground * (mean_background - mean_foreground).powi(2);
        if variance > max_variance {
            max_variance = variance;
            optimal = t;
        }
    }
    Some(optimal as u8)
}
