//! 三维 Delaunay 四面体剖分与 alpha-shape 表面提取.
//!
//! 采用 Bowyer-Watson 增量算法. 输入点先施加一个由坐标决定的微小扰动,
//! 以打破共球退化; 扰动是确定性的, 同一输入必然得到同一剖分.

use std::collections::HashMap;

use log::debug;

use crate::consts::surface::ALPHA_RADIUS;
use crate::voi::mesh::SurfaceMesh;
use crate::{Idx3d, Idx3dF};

/// 扰动半径 (单位: 体素). 远小于体素尺度, 不影响后续截断取整.
const JITTER: f64 = 1e-6;

/// 一个四面体及其外接球信息.
#[derive(Debug, Clone, Copy)]
struct Tetra {
    v: [usize; 4],
    center: Idx3dF,
    /// 外接球半径的平方. 退化四面体取正无穷.
    r2: f64,
}

/// 从轮廓体素点云重建 alpha-shape 边界三角网格.
///
/// `cloud` 中不应有重复点 (上游已去重). 点数不足 4 时返回空网格.
pub(crate) fn alpha_surface(cloud: &[Idx3d]) -> SurfaceMesh {
    let vertices: Vec<Idx3dF> = cloud.iter().map(|&p| jitter(p)).collect();
    if vertices.len() < 4 {
        return SurfaceMesh::new(vertices, Vec::new());
    }

    let tetras = delaunay(&vertices);
    let kept: Vec<&Tetra> = tetras
        .iter()
        .filter(|t| t.r2.sqrt() <= ALPHA_RADIUS)
        .collect();
    debug!(
        "Delaunay 四面体 {} 个, alpha 筛选后保留 {} 个",
        tetras.len(),
        kept.len()
    );

    // 边界面 = 恰好属于一个保留四面体的三角面.
    let mut face_count: HashMap<[usize; 3], ([usize; 3], u32)> = HashMap::new();
    for t in &kept {
        for f in faces(t.v) {
            let mut key = f;
            key.sort_unstable();
            let e = face_count.entry(key).or_insert((f, 0));
            e.1 += 1;
        }
    }
    let triangles: Vec<[usize; 3]> = face_count
        .into_values()
        .filter_map(|(f, n)| (n == 1).then_some(f))
        .collect();

    SurfaceMesh::new(vertices, triangles)
}

/// 对体素坐标施加确定性扰动.
fn jitter((x, y, z): Idx3d) -> Idx3dF {
    // 经典空间散列常数, 再过一轮 xorshift 混合.
    let mut s = (x as u64)
        .wrapping_mul(73856093)
        .wrapping_add((y as u64).wrapping_mul(19349663))
        .wrapping_add((z as u64).wrapping_mul(83492791))
        .wrapping_add(0x9e3779b97f4a7c15);
    let mut next = || {
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        // [0, 1) -> (-1, 1) -> (-JITTER, JITTER)
        ((s >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) * JITTER
    };
    [
        x as f64 + next(),
        y as f64 + next(),
        z as f64 + next(),
    ]
}

/// 四面体的四个三角面, 顶点序不作保证.
#[inline]
fn faces([a, b, c, d]: [usize; 4]) -> [[usize; 3]; 4] {
    [[a, b, c], [a, b, d], [a, c, d], [b, c, d]]
}

#[inline]
fn sub(a: Idx3dF, b: Idx3dF) -> Idx3dF {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn dist2(a: Idx3dF, b: Idx3dF) -> f64 {
    let d = sub(a, b);
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
}

/// 由四个顶点构建四面体, 求解外接球.
fn make_tetra(v: [usize; 4], pts: &[Idx3dF]) -> Tetra {
    use nalgebra::{Matrix3, Vector3};

    let p0 = pts[v[0]];
    let rows: Vec<Idx3dF> = (1..4).map(|i| sub(pts[v[i]], p0)).collect();

    // 外接球心 c 满足 |c - p_i| 相等, 化为线性方程组 2 (p_i - p_0) c' = |p_i - p_0|^2.
    let a = Matrix3::from_rows(&[
        Vector3::from_column_slice(&rows[0]).transpose(),
        Vector3::from_column_slice(&rows[1]).transpose(),
        Vector3::from_column_slice(&rows[2]).transpose(),
    ]) * 2.0;
    let b = Vector3::new(
        rows[0][0] * rows[0][0] + rows[0][1] * rows[0][1] + rows[0][2] * rows[0][2],
        rows[1][0] * rows[1][0] + rows[1][1] * rows[1][1] + rows[1][2] * rows[1][2],
        rows[2][0] * rows[2][0] + rows[2][1] * rows[2][1] + rows[2][2] * rows[2][2],
    );

    match a.lu().solve(&b) {
        Some(c) => {
            let center = [p0[0] + c[0], p0[1] + c[1], p0[2] + c[2]];
            Tetra {
                v,
                center,
                r2: dist2(center, p0),
            }
        }
        // 共面退化 (扰动后几乎不会发生): 视为外接球无穷大,
        // 任何后续插入都会移除它, alpha 筛选也会剔除它.
        None => Tetra {
            v,
            center: p0,
            r2: f64::INFINITY,
        },
    }
}

/// Bowyer-Watson 增量剖分. 返回所有不含辅助顶点的四面体.
fn delaunay(pts: &[Idx3dF]) -> Vec<Tetra> {
    let n = pts.len();

    // 包含所有点的辅助大四面体.
    let (mut lo, mut hi) = ([f64::INFINITY; 3], [f64::NEG_INFINITY; 3]);
    for p in pts {
        for k in 0..3 {
            lo[k] = lo[k].min(p[k]);
            hi[k] = hi[k].max(p[k]);
        }
    }
    let span = (0..3).map(|k| hi[k] - lo[k]).fold(1.0_f64, f64::max);
    let m = 10.0 * span;
    let c = [
        (lo[0] + hi[0]) / 2.0,
        (lo[1] + hi[1]) / 2.0,
        (lo[2] + hi[2]) / 2.0,
    ];

    let mut all: Vec<Idx3dF> = pts.to_vec();
    all.push([c[0] - m, c[1] - m, c[2] - m]);
    all.push([c[0] + m, c[1] - m, c[2] - m]);
    all.push([c[0], c[1] + m, c[2] - m]);
    all.push([c[0], c[1], c[2] + m]);

    let mut tetras = vec![make_tetra([n, n + 1, n + 2, n + 3], &all)];

    for i in 0..n {
        let p = all[i];

        // 外接球包含新点的四面体组成 "空腔".
        let (bad, good): (Vec<Tetra>, Vec<Tetra>) = tetras
            .into_iter()
            .partition(|t| dist2(p, t.center) < t.r2);

        // 空腔的边界面 = 恰好属于一个坏四面体的面.
        let mut boundary: HashMap<[usize; 3], ([usize; 3], u32)> = HashMap::new();
        for t in &bad {
            for f in faces(t.v) {
                let mut key = f;
                key.sort_unstable();
                let e = boundary.entry(key).or_insert((f, 0));
                e.1 += 1;
            }
        }

        tetras = good;
        for (f, cnt) in boundary.into_values() {
            if cnt == 1 {
                tetras.push(make_tetra([f[0], f[1], f[2], i], &all));
            }
        }
    }

    tetras
        .into_iter()
        .filter(|t| t.v.iter().all(|&vi| vi < n))
        .collect()
}
