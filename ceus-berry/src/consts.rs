//! 领域相关常量与预定义函数.

/// 轮廓重建相关常量.
pub mod contour {
    /// 闭合参数样条的均匀重采样点个数.
    pub const SPLINE_SAMPLES: usize = 1000;

    /// 拟合三次样条所需的最少点击点个数 (不含闭合点).
    pub const MIN_CUBIC_POINTS: usize = 3;

    /// 单个平面轮廓允许的最少点击点个数.
    pub const MIN_CLICK_POINTS: usize = 2;
}

/// 三维表面重建相关常量.
pub mod surface {
    /// alpha-shape 筛选的外接球半径上限 (单位: 体素).
    ///
    /// 超过该半径的四面体视为 "过大" 而被剔除.
    pub const ALPHA_RADIUS: f64 = 100.0;

    /// 拉普拉斯网格平滑的迭代次数.
    pub const SMOOTH_ITERATIONS: usize = 1000;

    /// 拉普拉斯网格平滑的松弛因子.
    pub const SMOOTH_RELAXATION: f64 = 0.01;

    /// 三角形体素化时, 每个重心插值方向的细分步数.
    pub const BARY_STEPS: usize = 100;
}

/// VOI 叠加层 (overlay) 相关常量.
pub mod overlay {
    /// 叠加层的 RGB 颜色 (纯蓝).
    pub const COLOR: [u8; 3] = [0, 0, 255];

    /// 叠加层的默认不透明度.
    pub const DEFAULT_ALPHA: u8 = 255;
}

/// TIC 拟合相关常量.
pub mod fit {
    /// Levenberg-Marquardt 迭代次数上限.
    pub const MAX_ITERATIONS: usize = 400;

    /// 模型参数 `(auc, mu, sigma, t0)` 的初始猜测.
    pub const INITIAL_GUESS: [f64; 4] = [1.0, 3.0, 0.5, 0.1];

    /// `t0` 参数的下界 (单位: 秒).
    pub const T0_LOWER: f64 = -1.0;

    /// `t0` 参数的上界 (单位: 秒).
    pub const T0_UPPER: f64 = 10.0;

    /// 启发式回退时, MTT 估计量相对最大时间戳的放大倍数.
    pub const MTT_FALLBACK_FACTOR: f64 = 2.0;

    /// 拟合至少需要的 TIC 点数 (等于模型参数个数).
    pub const MIN_FIT_POINTS: usize = 4;
}

/// T0 重定基后, 序列首点的时间戳 (单位: 帧间隔).
pub const T0_REBASED_START: f64 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consts_sanity() {
        assert!(surface::ALPHA_RADIUS > 0.0);
        assert!(surface::SMOOTH_RELAXATION > 0.0 && surface::SMOOTH_RELAXATION < 1.0);
        assert!(fit::T0_LOWER < fit::T0_UPPER);
        assert_eq!(fit::MIN_FIT_POINTS, fit::INITIAL_GUESS.len());
    }
}
