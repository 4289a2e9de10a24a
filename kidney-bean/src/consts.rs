//! 通用常量.

/// 外部前景/背景优化器使用的体素编码.
pub mod gc {
    /// 确定背景.
    pub const GC_BGD: u8 = 0;

    /// 确定前景.
    pub const GC_FGD: u8 = 1;

    /// 可能背景.
    pub const GC_PR_BGD: u8 = 2;

    /// 可能前景.
    pub const GC_PR_FGD: u8 = 3;

    /// 体素是否被标为前景 (确定或可能)?
    #[inline]
    pub const fn is_foreground(code: u8) -> bool {
        matches!(code, GC_FGD | GC_PR_FGD)
    }

    /// 种子掩膜到编码的映射: 种子内为可能前景, 其余为可能背景.
    #[inline]
    pub const fn seed_code(seed: bool) -> u8 {
        if seed {
            GC_PR_FGD
        } else {
            GC_PR_BGD
        }
    }
}

/// 与肾脏解剖/生理相关的物理量.
pub mod anatomy {
    /// 皮质最大厚度 (mm). 用于桥接种子间隙及时间得分去斑.
    pub const CORTICAL_THICKNESS_MM: f64 = 11.0;

    /// ROI 扩张距离 (mm). 足以覆盖种子四周的完整皮质.
    pub const ROI_EXPANSION_MM: f64 = 25.0;

    /// 皮质最小厚度 (mm). 后处理腐蚀核取其两倍.
    pub const MIN_CORTICAL_THICKNESS_MM: f64 = 3.2;

    /// 得分和标记图的空间平滑尺度 (mm).
    pub const SCORE_SMOOTHING_MM: f64 = 2.0;

    /// 平均曲线与检查点图像的时间平滑尺度 (s).
    pub const TEMPORAL_SMOOTHING_SEC: f64 = 10.0;
}

/// 时间曲线上的关键比例.
pub mod crossing {
    /// 起始时刻: 平均曲线上升幅度的 10%.
    pub const START: f64 = 0.10;

    /// 达峰时刻: 上升幅度的 90%.
    pub const PEAK: f64 = 0.90;

    /// 区域校验: 平均信号上升幅度的 50%.
    pub const HALF: f64 = 0.50;
}

/// 相对起始时刻的检查点偏移 (s).
pub const CHECKPOINTS_SEC: [f64; 7] = [30.0, 45.0, 60.0, 90.0, 120.0, 180.0, 240.0];

/// 默认最多保留的种子簇个数.
pub const MAX_CLUSTERS: usize = 4;

/// 默认相对最大区域的尺寸下限.
pub const MIN_RELATIVE_SIZE: f64 = 0.25;

/// 默认 ROI 包围盒放大倍率.
pub const BBOX_SCALE: f64 = 1.5;

/// ROI 外观体的通道数.
pub const APPEARANCE_CHANNELS: usize = 3;
