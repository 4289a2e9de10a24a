//! 外部优化器进程协议. 依赖 POSIX shell.
#![cfg(unix)]

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use kidney_bean::prelude::*;
use ndarray::{Array3, Array4};

/// 测试用脚本. 全部在首次使用时一次性写好, 之后才会有进程被启动.
struct Scripts {
    dir: tempfile::TempDir,
}

impl Scripts {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let bodies = [
            ("echo.sh", "cp \"$2\" \"$3\"\n"),
            ("fail.sh", "exit 3\n"),
            ("sleep.sh", "exec sleep 5\n"),
            ("silent.sh", "exit 0\n"),
        ];
        for (name, body) in bodies {
            let p = dir.path().join(name);
            fs::write(&p, format!("#!/bin/sh\n{body}")).unwrap();
            fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
        }
        Scripts { dir }
    })
}

/// `root` 下剩余的临时目录个数.
fn leftovers(root: &Path) -> usize {
    fs::read_dir(root)
        .map(|it| {
            it.filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("Buffer-"))
                .count()
        })
        .unwrap_or(0)
}

fn inputs() -> (Array4<u8>, Array3<u8>) {
    let image = Array4::from_shape_fn((3, 4, 5, 3), |(z, x, y, c)| (z + x + y + c) as u8);
    let seeds = Array3::from_shape_fn((3, 4, 5), |(z, x, _)| if z == 1 && x > 0 { 3 } else { 2 });
    (image, seeds)
}

#[test]
fn test_echo_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let optimizer = ExternalOptimizer::new(scripts().path("echo.sh"), work.path().join("scratch"));
    let (image, seeds) = inputs();
    let out = optimizer.run(5, image.view(), seeds.view()).unwrap();
    assert_eq!(out, seeds);
    assert_eq!(leftovers(optimizer.work_root()), 0);
}

#[test]
fn test_nonzero_exit() {
    let work = tempfile::tempdir().unwrap();
    let optimizer = ExternalOptimizer::new(scripts().path("fail.sh"), work.path());
    let (image, seeds) = inputs();
    match optimizer.run(2, image.view(), seeds.view()) {
        Err(SegmentError::ExternalProcess {
            cluster: 2,
            failure: ProcessFailure::Exit(Some(3)),
        }) => {}
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(leftovers(work.path()), 0);
}

#[test]
fn test_missing_output() {
    let work = tempfile::tempdir().unwrap();
    let optimizer = ExternalOptimizer::new(scripts().path("silent.sh"), work.path());
    let (image, seeds) = inputs();
    let err = optimizer.run(1, image.view(), seeds.view()).unwrap_err();
    assert!(matches!(
        err,
        SegmentError::ExternalProcess {
            cluster: 1,
            failure: ProcessFailure::Tensor(_),
        }
    ));
    assert_eq!(leftovers(work.path()), 0);
}

#[test]
fn test_timeout_kills_child() {
    let work = tempfile::tempdir().unwrap();
    let optimizer = ExternalOptimizer::new(scripts().path("sleep.sh"), work.path())
        .with_timeout(Duration::from_millis(200));
    assert_eq!(optimizer.timeout(), Some(Duration::from_millis(200)));
    let (image, seeds) = inputs();
    let err = optimizer.run(4, image.view(), seeds.view()).unwrap_err();
    assert!(matches!(
        err,
        SegmentError::ExternalProcess {
            cluster: 4,
            failure: ProcessFailure::TimedOut(_),
        }
    ));
    assert_eq!(leftovers(work.path()), 0);
}

#[test]
fn test_missing_program() {
    let _ = scripts();
    let work = tempfile::tempdir().unwrap();
    let optimizer = ExternalOptimizer::new(work.path().join("no-such-program"), work.path());
    let (image, seeds) = inputs();
    let err = optimizer.run(1, image.view(), seeds.view()).unwrap_err();
    assert!(matches!(
        err,
        SegmentError::ExternalProcess {
            failure: ProcessFailure::Spawn(_),
            ..
        }
    ));
}

#[test]
fn test_pipeline_matches_pass_through() {
    common::init_logger();
    let work = tempfile::tempdir().unwrap();
    let series = common::phantom(36);
    let config = SegmentConfig::default();

    let expected = segment(&series, &config, &PassThrough).unwrap();
    let optimizer = ExternalOptimizer::new(scripts().path("echo.sh"), work.path());
    let result = segment(&series, &config, &optimizer).unwrap();
    assert_eq!(result.labels, expected.labels);
    assert_eq!(leftovers(work.path()), 0);
}

#[test]
fn test_pipeline_fails_as_a_whole() {
    common::init_logger();
    let work = tempfile::tempdir().unwrap();
    let optimizer = ExternalOptimizer::new(scripts().path("fail.sh"), work.path());
    let err = segment(&common::phantom(36), &SegmentConfig::default(), &optimizer).unwrap_err();
    assert!(matches!(
        err,
        SegmentError::ExternalProcess {
            failure: ProcessFailure::Exit(Some(3)),
            ..
        }
    ));
    assert_eq!(leftovers(work.path()), 0);
}
