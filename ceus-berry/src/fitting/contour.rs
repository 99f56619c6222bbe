//! 平面闭合轮廓的参数样条重采样.
//!
//! 给定一圈有序点击点, 本模块拟合一条过所有点的闭合参数曲线,
//! 并在 `[0, 1]` 上均匀稠密重采样. 样条次数随点数自动选择:
//! 闭合后共 2 点取线性, 3 点取二次, 更多取三次.

use ndarray::ArrayView1;

use super::cubic_spline_eval_f64;
use crate::consts::contour::SPLINE_SAMPLES;
use crate::data::truncate_clamp;
use crate::{Idx2d, Idx2dF};

/// 对点击点序列做闭合样条重采样, 返回 [`SPLINE_SAMPLES`] 个高精度采样点.
///
/// `clicks` 不含闭合点, 至少 2 个点, 否则程序 panic. 连续重复的点会被合并;
/// 所有点都重合时退化为单点.
///
/// [`SPLINE_SAMPLES`]: crate::consts::contour::SPLINE_SAMPLES
pub fn resample_closed(clicks: &[Idx2d]) -> Vec<Idx2dF> {
    let pts = close_and_collapse(clicks);
    match pts.len() {
        1 => pts,
        2 => resample_with(&pts, eval_linear),
        3 => resample_with(&pts, eval_quadratic),
        _ => resample_cubic(&pts),
    }
}

/// 同 [`resample_closed`], 但无论点数多少都使用线性 (折线) 插值.
///
/// 逐切片凸包填充需要的是精确沿凸包边缘的轮廓线, 不希望高次样条越出凸包.
pub fn resample_closed_linear(clicks: &[Idx2d]) -> Vec<Idx2dF> {
    let pts = close_and_collapse(clicks);
    if pts.len() == 1 {
        return pts;
    }
    resample_with(&pts, eval_linear)
}

/// 闭合样条重采样并体素化: 采样点截断到 `bounds` 范围内的整数格点,
/// 相邻重复体素合并.
pub fn densify_closed(clicks: &[Idx2d], bounds: Idx2d) -> Vec<Idx2d> {
    voxelize(resample_closed(clicks), bounds)
}

/// 同 [`densify_closed`], 但强制线性插值.
pub fn densify_closed_linear(clicks: &[Idx2d], bounds: Idx2d) -> Vec<Idx2d> {
    voxelize(resample_closed_linear(clicks), bounds)
}

/// 追加闭合点并合并连续的重复点.
fn close_and_collapse(clicks: &[Idx2d]) -> Vec<Idx2dF> {
    assert!(clicks.len() >= 2, "闭合轮廓至少需要两个点击点");
    let mut pts: Vec<Idx2dF> = clicks
        .iter()
        .map(|&(u, v)| (u as f64, v as f64))
        .collect();
    pts.push(pts[0]);
    pts.dedup();
    pts
}

/// 弦长参数化, 归一化到 `[0, 1]`.
fn chord_params(pts: &[Idx2dF]) -> Vec<f64> {
    debug_assert!(pts.len() >= 2);
    let mut ts = Vec::with_capacity(pts.len());
    ts.push(0.0);
    let mut acc = 0.0;
    for w in pts.windows(2) {
        let ((x1, y1), (x2, y2)) = (w[0], w[1]);
        acc += ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt();
        ts.push(acc);
    }
    // 重复点已合并, 总弦长必然为正.
    for t in ts.iter_mut() {
        *t /= acc;
    }
    ts
}

/// `[0, 1]` 上的均匀参数, 含两端.
fn uniform_params(n: usize) -> Vec<f64> {
    debug_assert!(n >= 2);
    let step = 1.0 / (n - 1) as f64;
    (0..n).map(|i| (i as f64 * step).min(1.0)).collect()
}

fn resample_with(pts: &[Idx2dF], eval: fn(&[f64], &[f64], f64) -> f64) -> Vec<Idx2dF> {
    let ts = chord_params(pts);
    let us: Vec<f64> = pts.iter().map(|p| p.0).collect();
    let vs: Vec<f64> = pts.iter().map(|p| p.1).collect();
    uniform_params(SPLINE_SAMPLES)
        .into_iter()
        .map(|t| (eval(&ts, &us, t), eval(&ts, &vs, t)))
        .collect()
}

fn resample_cubic(pts: &[Idx2dF]) -> Vec<Idx2dF> {
    let ts = chord_params(pts);
    let us: Vec<f64> = pts.iter().map(|p| p.0).collect();
    let vs: Vec<f64> = pts.iter().map(|p| p.1).collect();
    let samples = uniform_params(SPLINE_SAMPLES);

    let t_view = ArrayView1::from(&ts);
    let s_view = ArrayView1::from(&samples);
    let u_out = cubic_spline_eval_f64(t_view, ArrayView1::from(&us), s_view);
    let v_out = cubic_spline_eval_f64(t_view, ArrayView1::from(&vs), s_view);
    u_out.into_iter().zip(v_out).collect()
}

/// 折线插值.
fn eval_linear(ts: &[f64], vals: &[f64], t: f64) -> f64 {
    let last = ts.len() - 1;
    let i = ts[..last]
        .partition_point(|&v| v <= t)
        .saturating_sub(1)
        .min(last - 1);
    let w = (t - ts[i]) / (ts[i + 1] - ts[i]);
    vals[i] + w * (vals[i + 1] - vals[i])
}

/// 过三点的二次 Lagrange 插值.
fn eval_quadratic(ts: &[f64], vals: &[f64], t: f64) -> f64 {
    debug_assert_eq!(ts.len(), 3);
    let (t0, t1, t2) = (ts[0], ts[1], ts[2]);
    let l0 = (t - t1) * (t - t2) / ((t0 - t1) * (t0 - t2));
    let l1 = (t - t0) * (t - t2) / ((t1 - t0) * (t1 - t2));
    let l2 = (t - t0) * (t - t1) / ((t2 - t0) * (t2 - t1));
    vals[0] * l0 + vals[1] * l1 + vals[2] * l2
}

fn voxelize(samples: Vec<Idx2dF>, (du, dv): Idx2d) -> Vec<Idx2d> {
    let mut chain: Vec<Idx2d> = samples
        .into_iter()
        .map(|(u, v)| (truncate_clamp(u, du), truncate_clamp(v, dv)))
        .collect();
    chain.dedup();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_points_give_the_segment() {
        // 两个点击点的闭合曲线是 "去而复返" 的线段,
        // 体素链上的点都应落在两点连线上.
        let chain = densify_closed(&[(0, 0), (6, 6)], (10, 10));
        assert!(!chain.is_empty());
        for &(u, v) in &chain {
            assert_eq!(u, v);
        }
        assert_eq!(chain[0], (0, 0));
        assert!(chain.contains(&(6, 6)));
    }

    #[test]
    fn test_degenerate_clicks_collapse() {
        let chain = densify_closed(&[(3, 4), (3, 4), (3, 4)], (10, 10));
        assert_eq!(chain, vec![(3, 4)]);
    }

    #[test]
    fn test_duplicate_clicks_equal_plain() {
        // 连续重复的点击点不改变结果.
        let a = resample_closed(&[(1, 1), (1, 1), (7, 2)]);
        let b = resample_closed(&[(1, 1), (7, 2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_square_chain_stays_in_bounds() {
        let clicks = [(1, 1), (8, 1), (8, 8), (1, 8)];
        let chain = densify_closed(&clicks, (10, 10));
        assert!(chain.len() > 4);
        for &(u, v) in &chain {
            assert!(u < 10 && v < 10);
        }
        // 相邻体素不重复.
        for w in chain.windows(2) {
            assert_ne!(w[0], w[1]);
        }
    }

    #[test]
    fn test_linear_respline_follows_hull_edges() {
        // 线性插值严格沿多边形边缘, 不会越出轴对齐矩形.
        let clicks = [(2, 2), (7, 2), (7, 5), (2, 5)];
        let chain = densify_closed_linear(&clicks, (10, 10));
        for &(u, v) in &chain {
            assert!((2..=7).contains(&u));
            assert!((2..=5).contains(&v));
        }
    }

    #[test]
    fn test_resample_starts_and_ends_at_first_click() {
        let pts = resample_closed(&[(1, 2), (5, 3), (4, 7), (1, 6)]);
        assert_eq!(pts.len(), SPLINE_SAMPLES);
        let first = *pts.first().unwrap();
        let last = *pts.last().unwrap();
        assert!((first.0 - 1.0).abs() < 1e-9 && (first.1 - 2.0).abs() < 1e-9);
        assert!((last.0 - 1.0).abs() < 1e-9 && (last.1 - 2.0).abs() < 1e-9);
    }
}
