/// 灰度窗口, 将原始强度线性映射到 8-bit 灰度 (0..=255).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct GrayWindow {
    lower: f32,
    width: f32,
}

impl GrayWindow {
    /// 构建覆盖 `[lower, upper]` 的窗口.
    ///
    /// 两端必须有限且 `lower <= upper`, 否则返回 `None`.
    /// 允许零宽窗口, 此时所有强度映射为 0.
    pub fn new(lower: f32, upper: f32) -> Option<GrayWindow> {
        if lower.is_finite() && upper.is_finite() && lower <= upper {
            Some(Self {
                lower,
                width: upper - lower,
            })
        } else {
            None
        }
    }

    /// 构建恰好覆盖 `it` 中所有强度的窗口. `it` 为空或含非有限值时返回 `None`.
    pub fn spanning<'a, I: IntoIterator<Item = &'a f32>>(it: I) -> Option<GrayWindow> {
        let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
        for &v in it {
            if !v.is_finite() {
                return None;
            }
            lo = lo.min(v);
            hi = hi.max(v);
        }
        Self::new(lo, hi)
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.lower + self.width
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 是否为零宽窗口?
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0
    }

    /// 求 `v` 对应的灰度值 (0 <= value <= 255), 向下取整.
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`. 零宽窗口总是返回 `Some(0)`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        if self.is_degenerate() || v <= self.lower {
            Some(u8::MIN)
        } else if v >= self.upper_bound() {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some(((v - self.lower) / self.width * 255.0) as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GrayWindow;

    #[test]
    fn test_gray_window_invalid_input() {
        assert!(GrayWindow::new(1.0, 0.0).is_none());
        assert!(GrayWindow::new(f32::NAN, 1.0).is_none());
        assert!(GrayWindow::spanning([].iter()).is_none());
        assert!(GrayWindow::spanning([1.0, f32::INFINITY].iter()).is_none());
    }

    #[test]
    fn test_gray_window_generic() {
        // [60, 100]
        let w = GrayWindow::spanning([80.0, 60.0, 100.0, 70.0].iter()).unwrap();
        assert_eq!(w.lower_bound(), 60.0);
        assert_eq!(w.upper_bound(), 100.0);
        assert_eq!(w.eval(f32::NAN), None);
        assert_eq!(w.eval(f32::MIN), Some(0));
        assert_eq!(w.eval(f32::MAX), Some(255));

        assert_eq!(w.eval(60.0), Some(0));
        assert_eq!(w.eval(60.1), Some(0));
        assert_eq!(w.eval(70.0).unwrap(), (255.0 * 0.25) as u8);
        assert_eq!(w.eval(80.0).unwrap(), (255.0 * 0.5) as u8);
        assert_eq!(w.eval(99.999), Some(254));
        assert_eq!(w.eval(100.0), Some(255));
    }

    #[test]
    fn test_gray_window_degenerate() {
        let w = GrayWindow::spanning([7.0; 16].iter()).unwrap();
        assert!(w.is_degenerate());
        assert_eq!(w.eval(7.0), Some(0));
        assert_eq!(w.eval(1e6), Some(0));
    }
}
