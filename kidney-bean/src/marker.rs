//! 复合标记合成.
//!
//! 髓质期标记由早期/晚期上升梯度与三种时间得分逐点相乘得到.
//! 序列覆盖 +180 s 之后时, 额外合成皮髓质期标记, 两者各自归一化后相加.

use log::info;
use ndarray::{Array3, ArrayView4, Axis, Zip};

use crate::consts::{anatomy, crossing};
use crate::numeric::{self, by_max};
use crate::signal::{ensure_finite, smooth_normalize, Checkpoint, TemporalScores, Timeline};
use crate::{SegResult, Stage};

/// 复合标记. 根据序列时间覆盖范围, 每次分割只会产生其中一种.
#[derive(Clone, Debug)]
pub enum Marker {
    /// 序列未覆盖 +180 s 之后, 只有髓质期标记.
    Short {
        /// 髓质期标记, 取值 `[0, 1]`.
        medulla: Array3<f64>,
    },

    /// 序列足够长, 同时有髓质期和皮髓质期标记.
    Extended {
        /// 髓质期标记, 取值 `[0, 1]`.
        medulla: Array3<f64>,
        /// 皮髓质期标记, 取值 `[0, 1]`.
        cortico: Array3<f64>,
    },
}

/// 逐点乘积.
pub fn product(factors: &[&Array3<f64>]) -> Array3<f64> {
    let Some((first, rest)) = factors.split_first() else {
        return Array3::zeros((0, 0, 0));
    };
    rest.iter().fold((*first).clone(), |mut acc, f| {
        acc *= *f;
        acc
    })
}

/// 乘积合成: 求乘积, 除以最大值, 负值置零, 最后限制在 `mask` 内.
pub fn compose_product(factors: &[&Array3<f64>], mask: &Array3<bool>) -> Array3<f64> {
    let mut m = by_max(product(factors));
    Zip::from(&mut m).and(mask).for_each(|v, &keep| {
        *v = if keep { v.max(0.0) } else { 0.0 };
    });
    m
}

/// 正部分 `max(a - b, 0)` 以及正号掩膜 `a - b > 0`.
fn positive_gain(later: &Array3<f64>, earlier: &Array3<f64>) -> (Array3<f64>, Array3<bool>) {
    let diff = later - earlier;
    let mask = diff.mapv(|v| v > 0.0);
    (diff.mapv_into(|v| v.max(0.0)), mask)
}

impl Marker {
    /// 由 8-bit 序列和时间得分合成标记.
    pub fn synthesize(
        gray: ArrayView4<u8>,
        timeline: &Timeline,
        spacing: [f64; 3],
        scores: &TemporalScores,
        temporal_resolution: f64,
    ) -> SegResult<Self> {
        let frames = [
            timeline.start(),
            timeline.at(Checkpoint::S60),
            timeline.at(Checkpoint::S120),
            timeline.at(Checkpoint::S240),
        ];
        let sigma = anatomy::TEMPORAL_SMOOTHING_SEC / temporal_resolution;
        let images = numeric::smoothed_frames(gray, sigma, &frames);
        let [bl_start, bl60, bl120, bl240] =
            [0, 1, 2, 3].map(|k| images.index_axis(Axis(3), k).to_owned());

        let (early, _) = positive_gain(&bl60, &bl_start);
        let early = smooth_normalize(early, spacing);
        let (late, late_mask) = positive_gain(&bl120, &bl60);
        let late = smooth_normalize(late, spacing);
        let medulla = compose_product(
            &[
                &early,
                &late,
                &scores.motion,
                &scores.start,
                &scores.time_to_peak,
            ],
            &late_mask,
        );
        ensure_finite(medulla.iter(), Stage::Marker)?;

        if !timeline.is_extended() {
            info!("marker: medulla only");
            return Ok(Self::Short { medulla });
        }

        let t180 = timeline.at(Checkpoint::S180);
        let reach = numeric::crossing_map(gray, timeline.start()..t180, crossing::PEAK);
        let cortical_time = smooth_normalize(reach, spacing);
        let (wash, wash_mask) = positive_gain(&bl240, &bl120);
        let wash = smooth_normalize(wash, spacing);
        let cortico = compose_product(
            &[&wash, &scores.motion, &scores.start, &cortical_time],
            &wash_mask,
        );
        ensure_finite(cortico.iter(), Stage::Marker)?;
        info!("marker: medulla + cortico-medullary");
        Ok(Self::Extended { medulla, cortico })
    }

    /// 是否为长序列标记?
    #[inline]
    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended { .. })
    }

    /// 髓质期标记.
    #[inline]
    pub fn medulla(&self) -> &Array3<f64> {
        match self {
            Self::Short { medulla } | Self::Extended { medulla, .. } => medulla,
        }
    }

    /// 用于选取种子簇的标记. 长序列时为两种标记各自除以最大值后之和.
    pub fn operative(&self) -> Array3<f64> {
        match self {
            Self::Short { medulla } => medulla.clone(),
            Self::Extended { medulla, cortico } => by_max(medulla.clone()) + by_max(cortico.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn ramp(shape: (usize, usize, usize), seed: usize) -> Array3<f64> {
        Array3::from_shape_fn(shape, |(x, y, z)| ((x * 7 + y * 3 + z + seed) % 11) as f64 / 10.0)
    }

    #[test]
    fn test_product_bounded_by_factors() {
        let fs: Vec<Array3<f64>> = (0..5).map(|s| ramp((4, 3, 2), s * 2)).collect();
        let refs: Vec<&Array3<f64>> = fs.iter().collect();
        let p = product(&refs);
        for (idx, v) in p.indexed_iter() {
            let lowest = fs.iter().map(|f| f[idx]).fold(1.0, f64::min);
            assert!(*v <= lowest + 1e-15);
        }
    }

    #[test]
    fn test_compose_in_unit_range_and_masked() {
        let a = ramp((4, 3, 2), 1);
        let b = ramp((4, 3, 2), 5);
        let mut mask = Array3::from_elem((4, 3, 2), true);
        mask[(0, 0, 0)] = false;
        mask[(3, 2, 1)] = false;
        let m = compose_product(&[&a, &b], &mask);
        assert!(m.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(m[(0, 0, 0)], 0.0);
        assert_eq!(m[(3, 2, 1)], 0.0);
        assert!(m.iter().any(|v| *v == 1.0));

        // 全零乘积不会除零.
        let z = Array3::zeros((4, 3, 2));
        assert!(compose_product(&[&a, &z], &mask).iter().all(|v| *v == 0.0));
    }

    fn series(nt: usize) -> Array4<u8> {
        Array4::from_shape_fn((6, 6, 3, nt), |(x, y, _, t)| {
            if (1..4).contains(&x) && (1..4).contains(&y) {
                (t.saturating_sub(3) * 4).min(200) as u8
            } else {
                10
            }
        })
    }

    #[test]
    fn test_short_and_extended_variants() {
        let spacing = [2.0; 3];
        for (nt, extended) in [(40, false), (70, true)] {
            let gray = series(nt);
            let tl = Timeline::locate(gray.view(), 5.0);
            let scores = TemporalScores::extract(gray.view(), &tl, spacing).unwrap();
            let marker = Marker::synthesize(gray.view(), &tl, spacing, &scores, 5.0).unwrap();
            assert_eq!(marker.is_extended(), extended);
            let op = marker.operative();
            assert_eq!(op.shape(), &[6, 6, 3]);
            let hi = if extended { 2.0 } else { 1.0 };
            assert!(op.iter().all(|v| (0.0..=hi).contains(v)));
            assert!(marker.medulla().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
