//! 集成测试共用的合成体模.
//!
//! 40 × 40 × 12 的体, 间距 4 mm, 时间分辨率 5 s/帧. 四个 6 × 6 × 4 的方块:
//!
//! | 方块 | 位置 (x, y) | 时间曲线 |
//! | --- | --- | --- |
//! | A (肾脏) | `6..12, 6..12` | 第 6 帧起快速上升, 之后缓慢上升 |
//! | B (迟滞) | `26..32, 6..12` | 第 14 帧起线性上升 |
//! | C (静止) | `6..12, 28..34` | 恒为 100 |
//! | O (抖动) | `26..32, 28..34` | 奇数帧为 60, 偶数帧为 0 |
//!
//! 其余体素恒为 0.

#![allow(dead_code)]

use kidney_bean::DceSeries;
use ndarray::Array4;

pub const SHAPE: (usize, usize, usize) = (40, 40, 12);
pub const SPACING: [f64; 3] = [4.0; 3];
pub const TEMPORAL_RESOLUTION: f64 = 5.0;

pub const CENTER_A: (usize, usize, usize) = (9, 9, 6);
pub const CENTER_B: (usize, usize, usize) = (29, 9, 6);
pub const CENTER_C: (usize, usize, usize) = (9, 31, 6);
pub const CENTER_O: (usize, usize, usize) = (29, 31, 6);

/// 初始化日志. 多次调用是安全的.
pub fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init();
}

fn kidney(t: usize) -> f32 {
    if t < 6 {
        0.0
    } else {
        let dt = (t - 6) as f32;
        120.0 * (dt / 2.0).min(1.0) + 2.0 * dt
    }
}

fn delayed(t: usize) -> f32 {
    if t < 14 {
        0.0
    } else {
        5.0 * (t - 14) as f32
    }
}

/// 体素 `(x, y, z)` 在第 `t` 帧的强度.
pub fn intensity(x: usize, y: usize, z: usize, t: usize) -> f32 {
    if !(4..8).contains(&z) {
        return 0.0;
    }
    let lo = (6..12).contains(&y);
    let hi = (28..34).contains(&y);
    match ((6..12).contains(&x), (26..32).contains(&x)) {
        (true, _) if lo => kidney(t),
        (_, true) if lo => delayed(t),
        (true, _) if hi => 100.0,
        (_, true) if hi => {
            if t % 2 == 1 {
                60.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// 共 `frames` 帧的体模序列.
pub fn phantom(frames: usize) -> DceSeries {
    let (nx, ny, nz) = SHAPE;
    let data = Array4::from_shape_fn((nx, ny, nz, frames), |(x, y, z, t)| intensity(x, y, z, t));
    DceSeries::new(data, SPACING, TEMPORAL_RESOLUTION).unwrap()
}

/// 每一帧都相同的序列 (只有空间变化).
pub fn static_phantom(frames: usize) -> DceSeries {
    let (nx, ny, nz) = SHAPE;
    let data = Array4::from_shape_fn((nx, ny, nz, frames), |(x, y, z, _)| intensity(x, y, z, 20));
    DceSeries::new(data, SPACING, TEMPORAL_RESOLUTION).unwrap()
}

/// 所有样本都相同的序列.
pub fn flat(frames: usize) -> DceSeries {
    let (nx, ny, nz) = SHAPE;
    DceSeries::new(Array4::from_elem((nx, ny, nz, frames), 7.0), SPACING, TEMPORAL_RESOLUTION).unwrap()
}
