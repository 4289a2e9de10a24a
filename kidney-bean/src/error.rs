//! 运行时错误.

use crate::tensor::TensorIoError;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// 分割流水线的阶段, 用于定位错误来源.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    /// 时间特征提取.
    Features,

    /// 复合标记合成.
    Marker,

    /// 种子簇选取.
    Clusters,

    /// ROI 构建.
    Roi,

    /// 外部优化.
    Optimizer,

    /// 后处理.
    PostProcess,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Features => "feature extraction",
            Stage::Marker => "marker synthesis",
            Stage::Clusters => "cluster selection",
            Stage::Roi => "roi building",
            Stage::Optimizer => "external optimizer",
            Stage::PostProcess => "post-processing",
        };
        f.write_str(name)
    }
}

/// 外部优化器调用失败的具体原因.
#[derive(Debug, Error)]
pub enum ProcessFailure {
    /// 无法启动进程.
    #[error("failed to spawn optimizer: {0}")]
    Spawn(#[source] io::Error),

    /// 等待进程时出现 I/O 错误.
    #[error("failed to wait for optimizer: {0}")]
    Wait(#[source] io::Error),

    /// 进程以非零状态退出. `None` 表示被信号终止.
    #[error("optimizer exited with status {0:?}")]
    Exit(Option<i32>),

    /// 进程超时, 已被终止.
    #[error("optimizer timed out after {0:?}")]
    TimedOut(Duration),

    /// 读写交换文件失败.
    #[error(transparent)]
    Tensor(#[from] TensorIoError),

    /// 输出形状与输入不符.
    #[error("optimizer output has shape {found:?}, expected {expected:?}")]
    MalformedOutput {
        /// 期望形状 (z, x, y).
        expected: [usize; 3],
        /// 实际形状.
        found: Vec<usize>,
    },
}

/// 分割错误. 任一错误都会终止整个分割调用.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// 输入 4D 序列的形状或数值不合法.
    #[error("malformed input series: {0}")]
    InputShape(String),

    /// 某阶段产生了非有限数值.
    #[error("non-finite values produced during {stage}")]
    NumericDegenerate {
        /// 出错阶段.
        stage: Stage,
    },

    /// 外部优化器失败.
    #[error("cluster {cluster}: {failure}")]
    ExternalProcess {
        /// 簇编号 (1 起).
        cluster: u32,
        /// 失败原因.
        #[source]
        failure: ProcessFailure,
    },

    /// 临时目录创建或清理失败.
    #[error("cluster {cluster}: scratch storage failure: {source}")]
    TemporaryStorage {
        /// 簇编号 (1 起).
        cluster: u32,
        /// 底层 I/O 错误.
        #[source]
        source: io::Error,
    },

    /// 读取 nii 文件错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 读写张量文件错误.
    #[error(transparent)]
    Tensor(#[from] TensorIoError),
}

impl SegmentError {
    /// 包装外部优化器的失败.
    #[inline]
    pub(crate) fn process(cluster: u32, failure: impl Into<ProcessFailure>) -> Self {
        Self::ExternalProcess {
            cluster,
            failure: failure.into(),
        }
    }
}

/// 分割运行时结果.
pub type SegResult<T> = Result<T, SegmentError>;
