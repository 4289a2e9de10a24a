use ndarray::{Array3, ArrayViewMut2, Axis};
use std::collections::VecDeque;

type Idx2d = (usize, usize);

/// 获得 `(h, w)` 的 4-邻居索引. 不检查越界.
#[inline]
fn neighbour4((h, w): Idx2d) -> [Idx2d; 4] {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
}

/// 将二维切片中被前景完全包围的背景区域 (按 4-相邻规则, 不与切片边缘连通)
/// 填充为前景. 如果以此法修改了切片则返回 `true`.
fn fill_slice_holes(mut slice: ArrayViewMut2<bool>) -> bool {
    let &[h, w] = slice.shape() else {
        unreachable!()
    };
    // 与边缘连通的背景.
    let mut outside = ndarray::Array2::from_elem((h, w), false);
    let mut q: VecDeque<Idx2d> = slice
        .indexed_iter()
        .filter(|&((i, j), &v)| !v && (i == 0 || j == 0 || i + 1 == h || j + 1 == w))
        .map(|(pos, _)| pos)
        .collect();
    q.iter().for_each(|&p| outside[p] = true);

    while let Some(cur) = q.pop_front() {
        for p in neighbour4(cur) {
            if p.0 < h && p.1 < w && !slice[p] && !outside[p] {
                outside[p] = true;
                q.push_back(p);
            }
        }
    }

    let mut non_trivial = false;
    ndarray::Zip::from(&mut slice).and(&outside).for_each(|v, &o| {
        if !*v && !o {
            *v = true;
            non_trivial = true;
        }
    });
    non_trivial
}

/// 依次沿 x, y, z 轴, 对每个二维切片填充封闭空洞.
///
/// 用于腐蚀之前恢复凸形内部.
pub fn fill_holes_3d(mask: &Array3<bool>) -> Array3<bool> {
    let mut out = mask.clone();
    for ax in 0..3 {
        out.axis_iter_mut(Axis(ax)).for_each(|s| {
            fill_slice_holes(s);
        });
    }
    out
}
