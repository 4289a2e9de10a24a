use std::path::Path;

use ndarray::{Array4, ArrayView4, Ix4};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use num::ToPrimitive;

use crate::{SegResult, SegmentError, Shape3d};

mod bbox;
mod window;

pub use bbox::BoundingBox;
pub use window::GrayWindow;

/// 4D 动态增强序列, 包括强度数据, 体素间距和时间分辨率.
///
/// 数据按照 `(x, y, z, t)` 组织. 构造后不可变.
#[derive(Debug, Clone)]
pub struct DceSeries {
    data: Array4<f32>,
    spacing: [f64; 3],
    temporal_resolution: f64,
}

/// nifti `xyzt_units` 中时间单位对应的秒数倍率.
#[inline]
fn seconds_per_time_unit(xyzt_units: u8) -> f64 {
    match xyzt_units & 0x38 {
        0x10 => 1e-3,
        0x18 => 1e-6,
        // 秒, 或未知单位 (按秒处理).
        _ => 1.0,
    }
}

impl DceSeries {
    /// 根据强度数据 `data`, 体素间距 `spacing` (mm, 按 x/y/z) 和时间分辨率
    /// `temporal_resolution` (s/帧) 创建序列.
    ///
    /// 以下情况返回 [`SegmentError::InputShape`]:
    ///
    /// 1. 任一空间轴为空, 或少于 2 帧;
    /// 2. 间距或时间分辨率不是有限正数;
    /// 3. 数据中含有非有限值.
    pub fn new(data: Array4<f32>, spacing: [f64; 3], temporal_resolution: f64) -> SegResult<Self> {
        let &[nx, ny, nz, nt] = data.shape() else {
            unreachable!()
        };
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(SegmentError::InputShape(format!(
                "empty spatial extent {:?}",
                data.shape()
            )));
        }
        if nt < 2 {
            return Err(SegmentError::InputShape(format!(
                "at least 2 frames are required, got {nt}"
            )));
        }
        if !spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(SegmentError::InputShape(format!(
                "invalid voxel spacing {spacing:?}"
            )));
        }
        if !(temporal_resolution.is_finite() && temporal_resolution > 0.0) {
            return Err(SegmentError::InputShape(format!(
                "invalid temporal resolution {temporal_resolution}"
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SegmentError::InputShape(
                "series contains non-finite samples".to_string(),
            ));
        }
        Ok(Self {
            data,
            spacing,
            temporal_resolution,
        })
    }

    /// 从任意数值类型 (如 `u16`, `i32`, `f64`) 的数据创建序列.
    /// 无法表示为 `f32` 的样本视为非法输入.
    pub fn from_samples<T: ToPrimitive + Copy>(
        samples: ArrayView4<T>,
        spacing: [f64; 3],
        temporal_resolution: f64,
    ) -> SegResult<Self> {
        let data = samples.mapv(|v| v.to_f32().unwrap_or(f32::NAN));
        Self::new(data, spacing, temporal_resolution)
    }

    /// 打开 nii 文件格式的 4D 序列. 体素间距取自 `pixdim[1..4]`,
    /// 时间分辨率取自 `pixdim[4]` 并按 `xyzt_units` 换算为秒.
    pub fn open<P: AsRef<Path>>(path: P) -> SegResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header().clone();
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .into_dimensionality::<Ix4>()
            .map_err(|e| SegmentError::InputShape(format!("expected a 4D volume: {e}")))?;
        let data = data.as_standard_layout().into_owned();

        let [_, sx, sy, sz, st, ..] = header.pixdim;
        let temporal_resolution = st as f64 * seconds_per_time_unit(header.xyzt_units);
        Self::new(
            data,
            [sx as f64, sy as f64, sz as f64],
            temporal_resolution,
        )
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// 空间形状 `[nx, ny, nz]`.
    #[inline]
    pub fn spatial_shape(&self) -> Shape3d {
        let &[nx, ny, nz, _] = self.data.shape() else {
            unreachable!()
        };
        [nx, ny, nz]
    }

    /// 帧数.
    #[inline]
    pub fn frames(&self) -> usize {
        self.data.shape()[3]
    }

    /// 体素间距 (mm).
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 时间分辨率 (s/帧).
    #[inline]
    pub fn temporal_resolution(&self) -> f64 {
        self.temporal_resolution
    }

    /// 序列总时长 (s).
    #[inline]
    pub fn duration(&self) -> f64 {
        self.frames() as f64 * self.temporal_resolution
    }

    /// 覆盖整个序列的灰度窗口. 构造时已检查样本有限且非空, 因此总是 `Some`.
    pub fn window(&self) -> Option<GrayWindow> {
        GrayWindow::spanning(self.data.iter())
    }

    /// 将整个序列线性归一化到 8-bit 灰度. 全等序列得到全零结果.
    pub fn to_gray(&self) -> Array4<u8> {
        match self.window() {
            Some(window) => self.data.mapv(|v| window.eval(v).unwrap_or(0)),
            None => Array4::zeros(self.data.raw_dim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{seconds_per_time_unit, DceSeries};
    use crate::SegmentError;
    use ndarray::Array4;

    #[test]
    fn test_series_validation() {
        let ok = Array4::<f32>::zeros((2, 2, 2, 3));
        assert!(DceSeries::new(ok.clone(), [1.0; 3], 2.0).is_ok());

        let bad = [
            DceSeries::new(Array4::zeros((0, 2, 2, 3)), [1.0; 3], 2.0),
            DceSeries::new(Array4::zeros((2, 2, 2, 1)), [1.0; 3], 2.0),
            DceSeries::new(ok.clone(), [1.0, 0.0, 1.0], 2.0),
            DceSeries::new(ok.clone(), [1.0; 3], f64::NAN),
            DceSeries::new(ok.mapv(|_| f32::INFINITY), [1.0; 3], 2.0),
        ];
        for r in bad {
            assert!(matches!(r, Err(SegmentError::InputShape(_))));
        }
    }

    #[test]
    fn test_integer_samples_to_gray() {
        let raw = Array4::from_shape_fn((2, 1, 1, 3), |(x, _, _, t)| (100 + x * 300 + t * 100) as u16);
        let s = DceSeries::from_samples(raw.view(), [1.0; 3], 1.0).unwrap();
        assert_eq!(s.spatial_shape(), [2, 1, 1]);
        assert_eq!(s.frames(), 3);
        let g = s.to_gray();
        // [100, 600] -> [0, 255]
        assert_eq!(g[(0, 0, 0, 0)], 0);
        assert_eq!(g[(1, 0, 0, 2)], 255);
        assert_eq!(g[(0, 0, 0, 1)], (100.0 / 500.0 * 255.0) as u8);
    }

    #[test]
    fn test_flat_series_is_all_zero() {
        let s = DceSeries::new(Array4::from_elem((3, 3, 3, 4), 42.0), [1.0; 3], 1.0).unwrap();
        assert!(s.to_gray().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_time_units() {
        assert_eq!(seconds_per_time_unit(0x08 | 0x02), 1.0);
        assert_eq!(seconds_per_time_unit(0x10 | 0x02), 1e-3);
        assert_eq!(seconds_per_time_unit(0x18), 1e-6);
        assert_eq!(seconds_per_time_unit(0), 1.0);
    }
}
