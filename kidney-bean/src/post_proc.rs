//! 后处理: 尺寸过滤, 形态学清理, 以及基于平均时间信号的噪声剔除.

use log::{info, warn};
use ndarray::{Array3, ArrayView4, Axis, Zip};

use crate::consts::{anatomy, crossing};
use crate::morph::{self, fill_holes_3d, label_components, max_filter, min_filter, Components};
use crate::numeric::first_crossing;
use crate::signal::{Checkpoint, Timeline};

/// 一个后处理后的簇的平均时间信号及校验结果. 仅供报告, 不会持久化.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterSignal {
    /// 校验前的编号.
    pub candidate: u32,

    /// 体素个数.
    pub voxels: usize,

    /// 平均 8-bit 时间曲线.
    pub curve: Vec<f64>,

    /// 平均曲线首次达到上升幅度 50% 的时刻 (帧).
    pub half_rise: f64,

    /// 最终标签. 被剔除时为 `None`.
    pub label: Option<u32>,
}

impl ClusterSignal {
    /// 是否通过校验?
    #[inline]
    pub fn is_retained(&self) -> bool {
        self.label.is_some()
    }
}

/// 后处理器.
pub struct PostProcessor<'a> {
    gray: ArrayView4<'a, u8>,
    spacing: [f64; 3],
    timeline: Timeline,
    min_relative_size: f64,
    cleanup: bool,
    reject_noise: bool,
}

impl<'a> PostProcessor<'a> {
    /// 初始化. 默认开启清理和噪声剔除.
    pub fn new(gray: ArrayView4<'a, u8>, spacing: [f64; 3], timeline: Timeline, min_relative_size: f64) -> Self {
        Self {
            gray,
            spacing,
            timeline,
            min_relative_size,
            cleanup: true,
            reject_noise: true,
        }
    }

    /// 开启或关闭形态学清理.
    pub fn cleanup(mut self, on: bool) -> Self {
        self.cleanup = on;
        self
    }

    /// 开启或关闭噪声剔除.
    pub fn reject_noise(mut self, on: bool) -> Self {
        self.reject_noise = on;
        self
    }

    /// 对累积输出做完整后处理, 返回最终标签 (0 为背景, `1..=k` 稠密) 及各簇信号.
    ///
    /// 开启清理时, 清理直接作用于累积输出, 尺寸过滤在清理之后进行.
    pub fn run(&self, accumulated: &Array3<bool>) -> (Array3<u32>, Vec<ClusterSignal>) {
        let components = if self.cleanup {
            self.clean(accumulated)
        } else {
            label_components(accumulated.view()).keep_relative(self.min_relative_size)
        };
        info!(
            "post-process: {} component(s) after size filter (cleanup: {})",
            components.len(),
            self.cleanup
        );
        self.validate(components)
    }

    /// 形态学清理.
    ///
    /// 逐切片填洞后腐蚀, 再以大 2 体素的窗口膨胀 (开运算), 只保留落在开运算结果内的原体素.
    /// 之后重新标记并按相对尺寸过滤.
    pub fn clean(&self, accumulated: &Array3<bool>) -> Components {
        let filled = fill_holes_3d(accumulated);
        let erode = morph::window_floor(2.0 * anatomy::MIN_CORTICAL_THICKNESS_MM, self.spacing, 3);
        let open = erode.map(|s| s + 2);
        let opened = max_filter(&min_filter(&filled, &erode), &open);

        let mut kept = accumulated.clone();
        Zip::from(&mut kept).and(&opened).for_each(|k, &o| *k = *k && o);
        label_components(kept.view()).keep_relative(self.min_relative_size)
    }

    /// 各编号的平均时间曲线.
    fn mean_curves(&self, components: &Components) -> Vec<Vec<f64>> {
        let nt = self.gray.shape()[3];
        let mut sums = vec![vec![0.0f64; nt]; components.len() + 1];
        Zip::from(components.labels())
            .and(self.gray.lanes(Axis(3)))
            .for_each(|&l, lane| {
                if l != 0 {
                    let acc = &mut sums[l as usize];
                    acc.iter_mut().zip(lane.iter()).for_each(|(a, &v)| *a += v as f64);
                }
            });
        sums.iter_mut()
            .zip(components.sizes())
            .for_each(|(curve, &n)| curve.iter_mut().for_each(|v| *v /= n.max(1) as f64));
        sums
    }

    /// 时间信号校验: 平均曲线 50% 上升时刻落在 `[t_start, t_30]` 之外的簇被剔除.
    /// 存活簇按原顺序重新稠密编号.
    pub fn validate(&self, components: Components) -> (Array3<u32>, Vec<ClusterSignal>) {
        let lo = self.timeline.start() as f64;
        let hi = self.timeline.at(Checkpoint::S30) as f64;
        let curves = self.mean_curves(&components);

        let mut lut = vec![0u32; components.len() + 1];
        let mut signals = Vec::with_capacity(components.len());
        let mut next = 0;
        for (id, curve) in curves.into_iter().enumerate().skip(1) {
            let half_rise = first_crossing(ndarray::ArrayView1::from(&curve), crossing::HALF);
            let noisy = self.reject_noise && (half_rise < lo || half_rise > hi);
            let label = if noisy {
                warn!(
                    "cluster {id}: noise detected, 50% rise at frame {half_rise:.2} outside [{lo}, {hi}]"
                );
                None
            } else {
                next += 1;
                lut[id] = next;
                Some(next)
            };
            signals.push(ClusterSignal {
                candidate: id as u32,
                voxels: components.sizes()[id],
                curve,
                half_rise,
                label,
            });
        }
        let labels = components.into_labels().mapv(|l| lut[l as usize]);
        (labels, signals)
    }
}
