use crate::{Idx3d, Shape3d};
use ndarray::{s, ArrayView3, ArrayView4, ArrayViewMut3};

/// 四舍六入五成双.
#[inline]
fn round_half_even(v: f64) -> f64 {
    let r = v.round();
    if (r - v).abs() == 0.5 {
        2.0 * (v / 2.0).round()
    } else {
        r
    }
}

/// 体素坐标下的轴对齐包围盒, `[min, max)` 左闭右开.
///
/// 任何公开途径创建的包围盒在每个轴上的长度都至少为 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoundingBox {
    min: Shape3d,
    max: Shape3d,
}

impl BoundingBox {
    /// 直接创建. 任一轴上 `min >= max` 时返回 `None`.
    pub fn new(min: Shape3d, max: Shape3d) -> Option<Self> {
        (0..3)
            .all(|ax| min[ax] < max[ax])
            .then_some(Self { min, max })
    }

    /// 获取掩膜中所有 `true` 体素的最小包围盒. 全 `false` 时返回 `None`.
    pub fn of_mask(mask: ArrayView3<bool>) -> Option<Self> {
        let mut min = [usize::MAX; 3];
        let mut max = [0usize; 3];
        let mut any = false;
        for ((x, y, z), _) in mask.indexed_iter().filter(|(_, &v)| v) {
            any = true;
            for (ax, v) in [x, y, z].into_iter().enumerate() {
                min[ax] = min[ax].min(v);
                max[ax] = max[ax].max(v + 1);
            }
        }
        any.then_some(Self { min, max })
    }

    /// 下角 (包含).
    #[inline]
    pub fn min(&self) -> Shape3d {
        self.min
    }

    /// 上角 (不包含).
    #[inline]
    pub fn max(&self) -> Shape3d {
        self.max
    }

    /// 各轴长度.
    #[inline]
    pub fn extent(&self) -> Shape3d {
        [0, 1, 2].map(|ax| self.max[ax] - self.min[ax])
    }

    /// 包含的体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.extent().iter().product()
    }

    /// 判断 `(x, y, z)` 是否在盒内.
    #[inline]
    pub fn contains(&self, (x, y, z): Idx3d) -> bool {
        [x, y, z]
            .into_iter()
            .enumerate()
            .all(|(ax, v)| self.min[ax] <= v && v < self.max[ax])
    }

    /// 以 `scale` 倍率对称放大, 并裁剪到形状为 `shape` 的体数据内.
    ///
    /// 每轴放大量为 `(scale - 1)·len` 就近取整 (恰为 .5 时取偶数), 两端各分一半.
    /// 低端越界时整体平移到 0, 高端越界时截去超出的部分.
    /// 结果在每个轴上长度至少为 1, 且不会超出 `shape`. `scale < 1` 视为 1.
    pub fn expanded(&self, scale: f64, shape: Shape3d) -> Self {
        let scale = if scale.is_finite() { scale.max(1.0) } else { 1.0 };
        let mut min = [0usize; 3];
        let mut max = [0usize; 3];
        for ax in 0..3 {
            let n = shape[ax].max(1);
            let hi = self.max[ax].min(n);
            let lo = self.min[ax].min(hi - 1);
            let len = hi - lo;
            let shift = round_half_even((scale - 1.0) * len as f64) as usize;
            let new_min = lo.saturating_sub(shift / 2);
            let new_len = len + shift;
            let over = (new_min + new_len).saturating_sub(n);
            min[ax] = new_min;
            max[ax] = new_min + new_len - over;
        }
        debug_assert!((0..3).all(|ax| min[ax] < max[ax] && max[ax] <= shape[ax].max(1)));
        Self { min, max }
    }

    /// 裁剪 3D 视图.
    #[inline]
    pub fn crop<'a, T>(&self, view: ArrayView3<'a, T>) -> ArrayView3<'a, T> {
        let (lo, hi) = (self.min, self.max);
        view.slice_move(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]])
    }

    /// 裁剪 3D 可变视图.
    #[inline]
    pub fn crop_mut<'a, T>(&self, view: ArrayViewMut3<'a, T>) -> ArrayViewMut3<'a, T> {
        let (lo, hi) = (self.min, self.max);
        view.slice_move(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2]])
    }

    /// 裁剪 4D 视图的空间部分, 时间轴保持完整.
    #[inline]
    pub fn crop_series<'a, T>(&self, view: ArrayView4<'a, T>) -> ArrayView4<'a, T> {
        let (lo, hi) = (self.min, self.max);
        view.slice_move(s![lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2], ..])
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingBox;
    use ndarray::Array3;

    #[test]
    fn test_bbox_of_mask() {
        let mut mask = Array3::from_elem((6, 5, 4), false);
        assert!(BoundingBox::of_mask(mask.view()).is_none());
        mask[(1, 2, 3)] = true;
        mask[(4, 1, 0)] = true;
        let b = BoundingBox::of_mask(mask.view()).unwrap();
        assert_eq!(b.min(), [1, 1, 0]);
        assert_eq!(b.max(), [5, 3, 4]);
        assert_eq!(b.extent(), [4, 2, 4]);
        assert!(b.contains((1, 2, 3)));
        assert!(!b.contains((5, 2, 3)));
    }

    #[test]
    fn test_bbox_expand_inside() {
        let b = BoundingBox::new([10, 10, 10], [20, 14, 12]).unwrap();
        let e = b.expanded(1.5, [100, 100, 100]);
        // len 10 -> shift 5, len 4 -> shift 2, len 2 -> shift 1.
        assert_eq!(e.min(), [8, 9, 10]);
        assert_eq!(e.max(), [23, 15, 13]);
    }

    #[test]
    fn test_bbox_expand_half_rounds_to_even() {
        // len 5 -> 2.5 -> 2, len 7 -> 3.5 -> 4.
        let b = BoundingBox::new([10, 10, 10], [15, 17, 11]).unwrap();
        let e = b.expanded(1.5, [100, 100, 100]);
        assert_eq!(e.extent(), [7, 11, 1]);
        assert_eq!(e.min(), [9, 8, 10]);
    }

    #[test]
    fn test_bbox_expand_clipped() {
        let b = BoundingBox::new([0, 2, 7], [4, 9, 10]).unwrap();
        let e = b.expanded(1.5, [5, 9, 10]);
        assert_eq!(e.min(), [0, 0, 6]);
        assert_eq!(e.max(), [5, 9, 10]);
    }

    /// 任意合法包围盒经放大裁剪后都非退化且不越界.
    #[test]
    fn test_bbox_expand_never_degenerate() {
        for n in 1..=7usize {
            for lo in 0..n {
                for hi in (lo + 1)..=n {
                    for scale in [0.5, 1.0, 1.3, 1.5, 2.0, 3.7] {
                        let b = BoundingBox::new([lo, 0, lo], [hi, n, hi]).unwrap();
                        let e = b.expanded(scale, [n, n, n]);
                        for ax in 0..3 {
                            assert!(e.min()[ax] < e.max()[ax]);
                            assert!(e.max()[ax] <= n);
                            assert!(e.min()[ax] <= b.min()[ax]);
                            assert!(e.max()[ax] >= b.max()[ax]);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_bbox_crop() {
        let arr = Array3::from_shape_fn((4, 4, 4), |(x, y, z)| x * 100 + y * 10 + z);
        let b = BoundingBox::new([1, 2, 0], [3, 4, 1]).unwrap();
        let c = b.crop(arr.view());
        assert_eq!(c.shape(), &[2, 2, 1]);
        assert_eq!(c[(0, 0, 0)], 120);
        assert_eq!(c[(1, 1, 0)], 230);
    }
}
