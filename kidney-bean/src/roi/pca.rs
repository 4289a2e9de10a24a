//! 主成分投影.

use nalgebra::{DMatrix, SymmetricEigen};
use ordered_float::OrderedFloat;

/// 相对最大特征值低于该比例的成分视为不存在.
const NEGLIGIBLE_VARIANCE: f64 = 1e-12;

/// 将 `samples` (样本 × 特征) 中心化后投影到方差最大的前 `k` 个主成分上,
/// 返回 (样本 × `k`) 的得分矩阵.
///
/// 主成分由协方差矩阵的对称特征分解得到, 按特征值降序排列.
/// 每个主成分的符号取为使其绝对值最大的分量为正.
/// 样本数或特征数不足, 或方差可忽略的成分, 对应的列全为 0.
pub fn project(samples: &DMatrix<f64>, k: usize) -> DMatrix<f64> {
    let (n, d) = samples.shape();
    let mut scores = DMatrix::zeros(n, k);
    if n < 2 || d == 0 {
        return scores;
    }

    let mut centered = samples.clone();
    for mut col in centered.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    let covariance = centered.transpose() * &centered / (n - 1) as f64;
    let eigen = SymmetricEigen::new(covariance);

    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(eigen.eigenvalues[i])));
    let largest = eigen.eigenvalues[order[0]].max(0.0);

    for (rank, &idx) in order.iter().take(k).enumerate() {
        let value = eigen.eigenvalues[idx];
        if !(value > NEGLIGIBLE_VARIANCE * largest.max(1.0)) {
            continue;
        }
        let mut axis = eigen.eigenvectors.column(idx).into_owned();
        let pivot = axis
            .iter()
            .copied()
            .max_by_key(|v| OrderedFloat(v.abs()))
            .unwrap_or(0.0);
        if pivot < 0.0 {
            axis.neg_mut();
        }
        scores.set_column(rank, &(&centered * axis));
    }
    scores
}
