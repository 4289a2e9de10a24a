//! 常用类型与入口.
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Shape3d};

pub use crate::data::{BoundingBox, DceSeries, GrayWindow};
pub use crate::error::{ProcessFailure, SegResult, SegmentError, Stage};

pub use crate::optimizer::{ExternalOptimizer, Optimizer, PassThrough};
pub use crate::pipeline::{segment, SegmentConfig, Segmentation};
pub use crate::post_proc::ClusterSignal;
pub use crate::signal::{Checkpoint, Timeline};

pub use crate::tensor::{read_tensor, write_tensor};
