use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use ndarray::{Array3, ArrayView3, ArrayView4};

use super::Optimizer;
use crate::tensor::{read_tensor, write_tensor};
use crate::{ProcessFailure, SegResult, SegmentError};

/// 检查超时的间隔.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 以独立进程运行的外部优化器.
///
/// 调用方式为 `program <input.npy> <mask.npy> <output.npy>`, 退出码 0 表示成功.
/// 每次调用在 `work_root` 下创建唯一的临时目录 `Buffer-cNN-XXXXXX`,
/// 调用结束 (无论成功与否) 后删除.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExternalOptimizer {
    program: PathBuf,
    work_root: PathBuf,
    timeout: Option<Duration>,
}

impl ExternalOptimizer {
    /// 初始化, 不设超时.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(program: P, work_root: Q) -> Self {
        Self {
            program: program.into(),
            work_root: work_root.into(),
            timeout: None,
        }
    }

    /// 设置超时. 超时的进程会被终止, 并使整个分割失败.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 可执行文件路径.
    #[inline]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// 临时目录的父目录.
    #[inline]
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// 超时设置.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 启动进程并等待其结束.
    fn invoke(&self, input: &Path, mask: &Path, output: &Path) -> Result<ExitStatus, ProcessFailure> {
        let mut child = Command::new(&self.program)
            .arg(input)
            .arg(mask)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(ProcessFailure::Spawn)?;

        let Some(limit) = self.timeout else {
            return child.wait().map_err(ProcessFailure::Wait);
        };
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(ProcessFailure::Wait)? {
                return Ok(status);
            }
            let elapsed = started.elapsed();
            if elapsed >= limit {
                if let Err(e) = child.kill() {
                    warn!("failed to kill timed-out optimizer: {e}");
                }
                // 回收僵尸进程.
                let _ = child.wait();
                return Err(ProcessFailure::TimedOut(limit));
            }
            thread::sleep(POLL_INTERVAL.min(limit - elapsed));
        }
    }
}

impl Optimizer for ExternalOptimizer {
    fn run(&self, cluster: u32, image: ArrayView4<u8>, seeds: ArrayView3<u8>) -> SegResult<Array3<u8>> {
        let storage = |source: std::io::Error| SegmentError::TemporaryStorage { cluster, source };
        let failed = |failure: ProcessFailure| SegmentError::process(cluster, failure);

        fs::create_dir_all(&self.work_root).map_err(storage)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("Buffer-c{cluster:02}-"))
            .tempdir_in(&self.work_root)
            .map_err(storage)?;
        debug!("cluster {cluster}: scratch directory {:?}", scratch.path());

        let input = scratch.path().join("input.npy");
        let mask = scratch.path().join("mask.npy");
        let output = scratch.path().join("output.npy");
        write_tensor(&input, &image).map_err(|e| failed(e.into()))?;
        write_tensor(&mask, &seeds).map_err(|e| failed(e.into()))?;

        let status = self.invoke(&input, &mask, &output).map_err(failed)?;
        if !status.success() {
            return Err(failed(ProcessFailure::Exit(status.code())));
        }
        let codes: Array3<u8> = read_tensor(&output).map_err(|e| failed(e.into()))?;

        // 显式关闭以暴露删除错误; 其余路径由 drop 清理.
        scratch.close().map_err(storage)?;
        Ok(codes)
    }
}
