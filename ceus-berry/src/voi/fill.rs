//! 逐切片凸包填充: 把体素 "壳" 变成实心 VOI.
//!
//! 对每个深度切片, 求壳体素的二维凸包, 沿凸包边缘线性重采样出稠密
//! 轮廓线, 再做背景空洞填充. 空洞填充即从切片边界做 4-连通背景泛洪,
//! 未被淹没的体素都属于 VOI 内部.

use std::collections::VecDeque;

use itertools::Itertools;
use ndarray::Array2;

use crate::data::VoiMask;
use crate::fitting::contour::densify_closed_linear;
use crate::{Idx2d, Idx3d};

/// 将壳体素逐切片填充为实心体, 写入 `mask`.
///
/// `shell` 中的索引必须都在 `mask` 形状范围内.
pub(crate) fn fill_shell(shell: &[Idx3d], mask: &mut VoiMask) {
    let (dx, dy, dz) = mask.shape();

    // 按深度 z 分组.
    let mut slices: Vec<Vec<Idx2d>> = vec![Vec::new(); dz];
    for &(x, y, z) in shell {
        debug_assert!(x < dx && y < dy && z < dz);
        slices[z].push((x, y));
    }

    for (z, points) in slices.into_iter().enumerate() {
        for (x, y) in filled_slice(points, (dx, dy)) {
            mask.insert((x, y, z));
        }
    }
}

/// 单个切片的凸包填充. 返回切片内属于 VOI 的所有 2D 索引.
fn filled_slice(points: Vec<Idx2d>, (dx, dy): Idx2d) -> Vec<Idx2d> {
    if points.len() < 3 {
        return Vec::new();
    }
    // 共线退化切片 (全部 x 相同或全部 y 相同) 没有内部可填.
    if points.iter().map(|p| p.0).all_equal() || points.iter().map(|p| p.1).all_equal() {
        return Vec::new();
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        return Vec::new();
    }

    // 沿凸包边缘的稠密轮廓线.
    let outline = densify_closed_linear(&hull, (dx, dy));

    let mut grid = Array2::<u8>::zeros((dx, dy));
    for &p in &outline {
        grid[p] = 1;
    }
    flood_background(&mut grid);

    grid.indexed_iter()
        .filter_map(|(pos, &v)| (v != 2).then_some(pos))
        .collect()
}

/// 从切片边界做 4-连通背景泛洪, 淹没到的体素标记为 2.
fn flood_background(grid: &mut Array2<u8>) {
    let &[dx, dy] = grid.shape() else {
        unreachable!()
    };
    let mut queue = VecDeque::new();

    fn try_push(grid: &mut Array2<u8>, queue: &mut VecDeque<Idx2d>, p: Idx2d) {
        if grid[p] == 0 {
            grid[p] = 2;
            queue.push_back(p);
        }
    }

    for x in 0..dx {
        try_push(grid, &mut queue, (x, 0));
        try_push(grid, &mut queue, (x, dy - 1));
    }
    for y in 0..dy {
        try_push(grid, &mut queue, (0, y));
        try_push(grid, &mut queue, (dx - 1, y));
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx < dx && ny < dy {
                try_push(grid, &mut queue, (nx, ny));
            }
        }
    }
}

/// 二维凸包 (Andrew 单调链). 返回逆时针顶点序列, 不含重复首点.
fn convex_hull(mut points: Vec<Idx2d>) -> Vec<Idx2d> {
    points.sort_unstable();
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    // 叉积 > 0 表示左转.
    fn cross(o: Idx2d, a: Idx2d, b: Idx2d) -> i64 {
        let (ox, oy) = (o.0 as i64, o.1 as i64);
        let (ax, ay) = (a.0 as i64, a.1 as i64);
        let (bx, by) = (b.0 as i64, b.1 as i64);
        (ax - ox) * (by - oy) - (ay - oy) * (bx - ox)
    }

    let mut lower: Vec<Idx2d> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Idx2d> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
