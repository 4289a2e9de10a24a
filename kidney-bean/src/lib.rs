#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 从 4D (x, y, z, t) 动态增强 (DCE) 序列中分割双肾,
//! 并依据每个区域的平均时间-信号曲线剔除噪声区域.
//!
//! # 流水线
//!
//! 原始 4D 序列 → 8-bit 归一化序列 → 时间特征 (`signal`) → 复合标记 (`marker`)
//! → 种子簇 (`cluster`) → {每个簇: ROI (`roi`) → 外部前景/背景优化器 (`optimizer`)}
//! → 累积输出 → 后处理 (`post_proc`) → 最终标签.
//!
//! 入口为 [`segment`].
//!
//! # 注意
//!
//! 1. 所有体数据均按照 `(x, y, z[, t])` 组织, 体素间距以毫米为单位,
//!   时间分辨率以秒/帧为单位.
//! 2. 归一化步骤遇到零值域时返回全零结果, 而不会产生除零.
//! 3. 任意一个簇的外部优化失败都会使整个分割调用失败, 不提供部分结果.
//!
//! # 开发计划
//!
//! ### 时间特征与复合标记 ✅
//!
//! 实现位于 `kidney-bean/src/{signal, marker}.rs`.
//!
//! ### 三维形态学辅助操作 ✅
//!
//! 可分离高斯/极值滤波, 6-连通标记, 逐切片填洞, 三维凸包.
//!
//! 实现位于 `kidney-bean/src/morph`.
//!
//! ### 外部优化器协议 ✅
//!
//! 每次调用使用独立的临时目录, 调用结束 (包括出错) 后自动清理.
//!
//! 实现位于 `kidney-bean/src/optimizer`.
//!
//! ### 后处理与噪声剔除 ✅
//!
//! 实现位于 `kidney-bean/src/post_proc.rs`.

/// 三维索引 `(x, y, z)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 三维形状 `[nx, ny, nz]`.
pub type Shape3d = [usize; 3];

pub mod consts;

mod error;

pub use error::{ProcessFailure, SegResult, SegmentError, Stage};

/// 4D 序列和基础几何结构.
mod data;

pub use data::{BoundingBox, DceSeries, GrayWindow};

pub mod morph;

pub mod numeric;

pub mod signal;

pub mod marker;

pub mod cluster;

pub mod roi;

pub mod optimizer;

pub mod tensor;

pub mod post_proc;

mod pipeline;

pub use pipeline::{segment, SegmentConfig, Segmentation};
pub use post_proc::ClusterSignal;

pub mod prelude;
