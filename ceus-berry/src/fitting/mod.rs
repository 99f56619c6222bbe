//! 曲线拟合与重采样.
//!
//! 包括闭合轮廓的参数样条重采样和 TIC 的 bolus 对数正态模型拟合.

use ndarray::ArrayView1;

mod cubic_spline;

pub mod contour;
pub mod lognormal;

pub use lognormal::{fit_tic, FitResult};

// Q: 用宏替代?

/// 在 `ts` 给定的参数处取自然三次样条曲线的值.
///
/// `x` 是严格递增的数组, `y` 是对应函数值. `ts` 中的值应落在
/// `x` 的区间内 (轻微越界按端点区间外推).
pub fn cubic_spline_eval_f32(
    x: ArrayView1<f32>,
    y: ArrayView1<f32>,
    ts: ArrayView1<f32>,
) -> Vec<f32> {
    cubic_spline::CubicSplineImp::<f32>::new(x.view(), y.view()).eval_many(ts)
}

/// 在 `ts` 给定的参数处取自然三次样条曲线的值.
///
/// `x` 是严格递增的数组, `y` 是对应函数值. `ts` 中的值应落在
/// `x` 的区间内 (轻微越界按端点区间外推).
pub fn cubic_spline_eval_f64(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    ts: ArrayView1<f64>,
) -> Vec<f64> {
    cubic_spline::CubicSplineImp::<f64>::new(x.view(), y.view()).eval_many(ts)
}
