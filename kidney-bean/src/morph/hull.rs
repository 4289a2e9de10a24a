//! 三维凸包图像.
//!
//! 以体素的角点 (而不是中心) 构造凸包, 因此单个体素或共面的掩膜也有非退化凸包.
//! 所有坐标放大 2 倍后为整数, 凸包构造和光栅化都使用精确整数运算.

use ndarray::{Array3, ArrayView3};
use std::collections::{HashMap, HashSet};

type P3 = [i64; 3];

#[inline]
fn sub(a: P3, b: P3) -> P3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: P3, b: P3) -> P3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(a: P3, b: P3) -> i64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 三角面. 平面为 `n · p = d`, 内侧满足 `n · p <= d`.
#[derive(Copy, Clone, Debug)]
struct Face {
    v: [usize; 3],
    n: P3,
    d: i64,
}

impl Face {
    /// 构造法向朝外的面. `inner4` 是 4 倍坐标下严格位于凸包内部的点.
    fn oriented(pts: &[P3], [a, b, c]: [usize; 3], inner4: P3) -> Self {
        let n = cross(sub(pts[b], pts[a]), sub(pts[c], pts[a]));
        let d = dot(n, pts[a]);
        if dot(n, inner4) > 4 * d {
            Self {
                v: [a, c, b],
                n: [-n[0], -n[1], -n[2]],
                d: -d,
            }
        } else {
            Self { v: [a, b, c], n, d }
        }
    }

    #[inline]
    fn sees(&self, p: P3) -> bool {
        dot(self.n, p) > self.d
    }
}

/// 收集掩膜体素角点 (2 倍坐标), 每个角点列只保留 z 方向的两个端点.
fn corner_points(mask: ArrayView3<bool>) -> Vec<P3> {
    let mut columns: HashMap<(i64, i64), (i64, i64)> = HashMap::new();
    for ((x, y, z), _) in mask.indexed_iter().filter(|(_, &v)| v) {
        let (x, y, z) = (2 * x as i64, 2 * y as i64, 2 * z as i64);
        for cx in [x - 1, x + 1] {
            for cy in [y - 1, y + 1] {
                let e = columns.entry((cx, cy)).or_insert((z - 1, z + 1));
                e.0 = e.0.min(z - 1);
                e.1 = e.1.max(z + 1);
            }
        }
    }
    let mut pts: Vec<P3> = columns
        .into_iter()
        .flat_map(|((cx, cy), (lo, hi))| [[cx, cy, lo], [cx, cy, hi]])
        .collect();
    // HashMap 迭代顺序不确定, 排序以保证每次运行结果一致.
    pts.sort_unstable();
    pts
}

/// 增量法构造凸包, 返回所有外向三角面. 点集退化 (共面) 时返回 `None`.
fn build_hull(pts: &[P3]) -> Option<Vec<Face>> {
    let i0 = 0;
    let i1 = (0..pts.len()).max_by_key(|&i| {
        let v = sub(pts[i], pts[i0]);
        dot(v, v)
    })?;
    let e1 = sub(pts[i1], pts[i0]);
    let i2 = (0..pts.len()).max_by_key(|&i| {
        let c = cross(e1, sub(pts[i], pts[i0]));
        dot(c, c)
    })?;
    let n012 = cross(e1, sub(pts[i2], pts[i0]));
    if n012 == [0; 3] {
        return None;
    }
    let i3 = (0..pts.len()).max_by_key(|&i| dot(n012, sub(pts[i], pts[i0])).abs())?;
    if dot(n012, sub(pts[i3], pts[i0])) == 0 {
        return None;
    }

    let mut inner4 = [0i64; 3];
    for i in [i0, i1, i2, i3] {
        for ax in 0..3 {
            inner4[ax] += pts[i][ax];
        }
    }

    let mut faces: Vec<Face> = [[i0, i1, i2], [i0, i1, i3], [i0, i2, i3], [i1, i2, i3]]
        .into_iter()
        .map(|v| Face::oriented(pts, v, inner4))
        .collect();

    let seeds = [i0, i1, i2, i3];
    for (i, &p) in pts.iter().enumerate() {
        if seeds.contains(&i) {
            continue;
        }
        let visible: Vec<bool> = faces.iter().map(|f| f.sees(p)).collect();
        if !visible.iter().any(|v| *v) {
            continue;
        }
        let edges: HashSet<(usize, usize)> = faces
            .iter()
            .zip(visible.iter())
            .filter(|(_, &vis)| vis)
            .flat_map(|(f, _)| [(f.v[0], f.v[1]), (f.v[1], f.v[2]), (f.v[2], f.v[0])])
            .collect();
        let horizon: Vec<(usize, usize)> = edges
            .iter()
            .copied()
            .filter(|&(a, b)| !edges.contains(&(b, a)))
            .collect();

        faces = faces
            .into_iter()
            .zip(visible)
            .filter_map(|(f, vis)| (!vis).then_some(f))
            .collect();
        faces.extend(
            horizon
                .into_iter()
                .map(|(a, b)| Face::oriented(pts, [a, b, i], inner4)),
        );
    }
    Some(faces)
}

/// 计算三维掩膜的凸包图像: 中心落在凸包内 (含边界) 的体素为 `true`.
///
/// 凸包由所有前景体素的角点构成. 全背景掩膜返回全背景.
pub fn convex_hull_3d(mask: ArrayView3<bool>) -> Array3<bool> {
    let mut out = Array3::from_elem(mask.raw_dim(), false);
    let pts = corner_points(mask.view());
    let Some(faces) = build_hull(&pts) else {
        return mask.to_owned();
    };

    // 凸包内的体素中心一定位于掩膜包围盒内.
    let Some(bbox) = crate::BoundingBox::of_mask(mask) else {
        return out;
    };
    let (lo, hi) = (bbox.min(), bbox.max());
    for x in lo[0]..hi[0] {
        for y in lo[1]..hi[1] {
            let (px, py) = (2 * x as i64, 2 * y as i64);
            let mut z_lo = lo[2] as i64;
            let mut z_hi = hi[2] as i64 - 1;
            for f in faces.iter() {
                let rhs = f.d - f.n[0] * px - f.n[1] * py;
                let nz = f.n[2];
                if nz > 0 {
                    z_hi = z_hi.min(rhs.div_euclid(nz).div_euclid(2));
                } else if nz < 0 {
                    z_lo = z_lo.max(-rhs.div_euclid(-nz).div_euclid(2));
                } else if rhs < 0 {
                    z_hi = z_lo - 1;
                }
                if z_lo > z_hi {
                    break;
                }
            }
            for z in z_lo..=z_hi {
                out[(x, y, z as usize)] = true;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::convex_hull_3d;
    use ndarray::Array3;

    fn count(m: &Array3<bool>) -> usize {
        m.iter().filter(|v| **v).count()
    }

    #[test]
    fn test_single_voxel() {
        let mut m = Array3::from_elem((3, 3, 3), false);
        m[(1, 1, 1)] = true;
        assert_eq!(convex_hull_3d(m.view()), m);
    }

    #[test]
    fn test_empty_mask() {
        let m = Array3::from_elem((3, 3, 3), false);
        assert_eq!(count(&convex_hull_3d(m.view())), 0);
    }

    #[test]
    fn test_two_corners_fill_segment() {
        // 两个对角体素, 凸包覆盖其间的对角线.
        let mut m = Array3::from_elem((5, 5, 5), false);
        m[(0, 0, 0)] = true;
        m[(4, 4, 4)] = true;
        let h = convex_hull_3d(m.view());
        for i in 0..5 {
            assert!(h[(i, i, i)]);
        }
        assert!(!h[(4, 0, 0)]);
        assert!(!h[(0, 4, 4)]);
    }

    #[test]
    fn test_hollow_box_becomes_solid() {
        let mut m = Array3::from_elem((8, 8, 8), false);
        for x in 1..7 {
            for y in 1..7 {
                for z in 1..7 {
                    let shell = [x, y, z].iter().any(|&v| v == 1 || v == 6);
                    m[(x, y, z)] = shell;
                }
            }
        }
        let h = convex_hull_3d(m.view());
        assert_eq!(count(&h), 216);
        assert!(h[(3, 3, 3)]);
        assert!(!h[(0, 3, 3)]);
    }

    #[test]
    fn test_l_shape_in_plane() {
        // 单层 L 形 (共面体素), 凸包补齐为三角形区域.
        let mut m = Array3::from_elem((5, 5, 1), false);
        for i in 0..5 {
            m[(i, 0, 0)] = true;
            m[(0, i, 0)] = true;
        }
        let h = convex_hull_3d(m.view());
        assert!(h[(1, 1, 0)]);
        assert!(h[(2, 2, 0)]);
        assert!(!h[(3, 3, 0)]);
        assert!(!h[(4, 4, 0)]);
        // 原前景全部保留.
        assert!(m.iter().zip(h.iter()).all(|(a, b)| !*a || *b));
    }
}
