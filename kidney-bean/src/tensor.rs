//! 二进制张量容器.
//!
//! 与外部优化器交换的所有数组都以 `.npy` 格式存储 (形状, 元素类型和原始数据),
//! 写入后读回的数组与原数组逐位相同.

use ndarray::{Array, ArrayBase, Data, Dimension};
use ndarray_npy::{
    read_npy, write_npy, ReadNpyError, ReadableElement, WritableElement, WriteNpyError,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 读写张量文件错误.
#[derive(Debug, Error)]
pub enum TensorIoError {
    /// 读取或解析 `.npy` 文件失败 (包括元素类型或维度不符).
    #[error("failed to read tensor {path:?}: {source}")]
    Read {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: ReadNpyError,
    },

    /// 写入 `.npy` 文件失败.
    #[error("failed to write tensor {path:?}: {source}")]
    Write {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: WriteNpyError,
    },
}

/// 将数组 `array` 写入 `path`. 已存在的文件会被覆盖.
pub fn write_tensor<P, A, S, D>(path: P, array: &ArrayBase<S, D>) -> Result<(), TensorIoError>
where
    P: AsRef<Path>,
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    write_npy(path.as_ref(), array).map_err(|source| TensorIoError::Write {
        path: path.as_ref().to_path_buf(),
        source,
    })
}

/// 从 `path` 读取元素类型为 `A`, 维度为 `D` 的数组.
pub fn read_tensor<P, A, D>(path: P) -> Result<Array<A, D>, TensorIoError>
where
    P: AsRef<Path>,
    A: ReadableElement,
    D: Dimension,
{
    read_npy(path.as_ref()).map_err(|source| TensorIoError::Read {
        path: path.as_ref().to_path_buf(),
        source,
    })
}
