//! 从环境变量或者 `$HOME/dataset/dce` 下解析运行参数.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kidney_bean::DceSeries;

/// `$HOME/dataset/dce/...`. 找不到用户目录时返回 `None`.
pub fn home_dce_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.push("dce");
    ans.extend(it);
    Some(ans)
}

/// 环境变量 `key` 非空时返回其值, 否则返回 `$HOME/dataset/dce/<fallback>`.
fn path_from_env_or_home(key: &str, fallback: &[&str]) -> Option<PathBuf> {
    match env::var(key) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dce_dir_with(fallback),
    }
}

/// 获取 4D 序列路径.
///
/// 1. 若环境变量 `$KIDNEY_DCE_PATH` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/dce/series.nii.gz`.
pub fn series_path_from_env_or_home() -> Option<PathBuf> {
    path_from_env_or_home("KIDNEY_DCE_PATH", &["series.nii.gz"])
}

/// 获取外部优化器路径 `$KIDNEY_OPTIMIZER`. 未设置时返回 `None`, 此时只做试运行.
pub fn optimizer_from_env() -> Option<PathBuf> {
    env::var_os("KIDNEY_OPTIMIZER")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// 获取临时目录的父目录.
///
/// 1. 若环境变量 `$KIDNEY_WORK_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/dce/work`.
pub fn work_dir_from_env_or_home() -> Option<PathBuf> {
    path_from_env_or_home("KIDNEY_WORK_DIR", &["work"])
}

/// 获取标签输出路径.
///
/// 1. 若环境变量 `$KIDNEY_LABEL_OUT` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/dce/labels.npy`.
pub fn label_out_from_env_or_home() -> Option<PathBuf> {
    path_from_env_or_home("KIDNEY_LABEL_OUT", &["labels.npy"])
}

/// 解析 `$key` 为 `T`. 未设置或无法解析时返回 `None`.
fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// 阈值倍率 `$KIDNEY_THRESHOLD`.
pub fn threshold_from_env() -> Option<f64> {
    parse_env::<f64>("KIDNEY_THRESHOLD").filter(|t| t.is_finite() && *t > 0.0)
}

/// 外部优化器超时 `$KIDNEY_TIMEOUT_SEC` (秒).
pub fn timeout_from_env() -> Option<Duration> {
    parse_env::<f64>("KIDNEY_TIMEOUT_SEC")
        .filter(|t| t.is_finite() && *t > 0.0)
        .map(Duration::from_secs_f64)
}

/// 加载 4D 序列.
#[inline]
pub fn load_series<P: AsRef<Path>>(path: P) -> kidney_bean::SegResult<DceSeries> {
    DceSeries::open(path)
}
