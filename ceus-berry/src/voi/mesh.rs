//! 边界三角网格: 拉普拉斯平滑与体素化.

use std::collections::HashSet;

use log::debug;

use crate::consts::surface::BARY_STEPS;
use crate::{Idx3d, Idx3dF};

#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

/// alpha-shape 提取出的边界三角网格.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    vertices: Vec<Idx3dF>,
    triangles: Vec<[usize; 3]>,
}

impl SurfaceMesh {
    pub(crate) fn new(vertices: Vec<Idx3dF>, triangles: Vec<[usize; 3]>) -> Self {
        debug_assert!(triangles
            .iter()
            .flatten()
            .all(|&i| i < vertices.len()));
        Self {
            vertices,
            triangles,
        }
    }

    /// 获取网格顶点.
    #[inline]
    pub fn vertices(&self) -> &[Idx3dF] {
        &self.vertices
    }

    /// 获取三角面顶点索引.
    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// 拉普拉斯平滑: 每轮把每个顶点向其邻居均值移动 `relaxation` 的比例.
    ///
    /// 网格连接关系不变, 只移动顶点位置.
    pub fn smooth(&mut self, iterations: usize, relaxation: f64) {
        assert!((0.0..1.0).contains(&relaxation));
        if self.triangles.is_empty() {
            return;
        }

        // 顶点邻接表.
        let mut adj: Vec<HashSet<usize>> = vec![HashSet::new(); self.vertices.len()];
        for t in &self.triangles {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[0], t[2])] {
                adj[a].insert(b);
                adj[b].insert(a);
            }
        }

        let mut next = self.vertices.clone();
        for _ in 0..iterations {
            for (i, nbrs) in adj.iter().enumerate() {
                if nbrs.is_empty() {
                    continue;
                }
                let mut mean = [0.0; 3];
                for &j in nbrs {
                    for k in 0..3 {
                        mean[k] += self.vertices[j][k];
                    }
                }
                let inv = 1.0 / nbrs.len() as f64;
                for k in 0..3 {
                    let target = mean[k] * inv;
                    next[i][k] =
                        self.vertices[i][k] + relaxation * (target - self.vertices[i][k]);
                }
            }
            std::mem::swap(&mut self.vertices, &mut next);
        }
        debug!("网格平滑完成, 共 {iterations} 轮");
    }

    /// 将每个三角面以重心双线性插值方式栅格化为体素.
    ///
    /// 插值样本朝零截断为整数格点; 落在 `shape` 范围外的样本直接丢弃.
    /// 返回的体素集合无重复, 按行优先序排序.
    pub fn voxelize(&self, shape: Idx3d) -> Vec<Idx3d> {
        let mut shell: Vec<Idx3d> = self
            .triangles
            .iter()
            .flat_map(|t| self.rasterize_triangle(*t, shape))
            .collect();
        shell.sort_unstable();
        shell.dedup();
        shell
    }

    /// 多线程版 [`SurfaceMesh::voxelize`], 结果与单线程版完全一致.
    #[cfg(feature = "rayon")]
    pub fn par_voxelize(&self, shape: Idx3d) -> Vec<Idx3d> {
        let mut shell: Vec<Idx3d> = self
            .triangles
            .par_iter()
            .flat_map_iter(|t| self.rasterize_triangle(*t, shape))
            .collect();
        shell.sort_unstable();
        shell.dedup();
        shell
    }

    /// 单个三角面的重心双线性采样.
    fn rasterize_triangle(&self, [ia, ib, ic]: [usize; 3], shape: Idx3d) -> Vec<Idx3d> {
        let (a, b, c) = (self.vertices[ia], self.vertices[ib], self.vertices[ic]);
        let mut out = Vec::with_capacity((BARY_STEPS + 1) * (BARY_STEPS + 1));
        let inv = 1.0 / BARY_STEPS as f64;

        for i in 0..=BARY_STEPS {
            let s = i as f64 * inv;
            // 两条腰上的同参数点, 其连线扫过整个三角形.
            let p1 = lerp(a, b, s);
            let p2 = lerp(a, c, s);
            for j in 0..=BARY_STEPS {
                let q = lerp(p1, p2, j as f64 * inv);
                if let Some(v) = truncate_in_bounds(q, shape) {
                    out.push(v);
                }
            }
        }
        out
    }
}

#[inline]
fn lerp(a: Idx3dF, b: Idx3dF, t: f64) -> Idx3dF {
    [
        a[0] + t * (b[0] - a[0]),
        a[1] + t * (b[1] - a[1]),
        a[2] + t * (b[2] - a[2]),
    ]
}

/// 朝零截断; 越界样本返回 `None`.
#[inline]
fn truncate_in_bounds(p: Idx3dF, (dx, dy, dz): Idx3d) -> Option<Idx3d> {
    let (x, y, z) = (p[0].trunc(), p[1].trunc(), p[2].trunc());
    if x < 0.0 || y < 0.0 || z < 0.0 {
        return None;
    }
    let (x, y, z) = (x as usize, y as usize, z as usize);
    (x < dx && y < dy && z < dz).then_some((x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_triangle() -> SurfaceMesh {
        SurfaceMesh::new(
            vec![[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 4.0, 0.0]],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_voxelize_covers_triangle() {
        let shell = one_triangle().voxelize((5, 5, 5));
        // 三个顶点都被覆盖, 且全部落在 z = 0 平面上.
        assert!(shell.contains(&(0, 0, 0)));
        assert!(shell.contains(&(4, 0, 0)));
        assert!(shell.contains(&(0, 4, 0)));
        assert!(shell.iter().all(|&(_, _, z)| z == 0));
    }

    #[test]
    fn test_voxelize_discards_out_of_bounds() {
        let shell = one_triangle().voxelize((2, 2, 2));
        assert!(shell.iter().all(|&(x, y, _)| x < 2 && y < 2));
        assert!(!shell.is_empty());
    }

    #[test]
    fn test_smooth_shrinks_toward_centroid() {
        let mut mesh = SurfaceMesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [10.0, 0.0, 0.0],
                [0.0, 10.0, 0.0],
                [0.0, 0.0, 10.0],
            ],
            vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]],
        );
        let before = mesh.vertices().to_vec();
        mesh.smooth(10, 0.1);
        // 顶点应当向内收缩, 但不会跑出原包围盒.
        for (b, a) in before.iter().zip(mesh.vertices()) {
            assert_ne!(b, a);
            for k in 0..3 {
                assert!(a[k] >= -1e-9 && a[k] <= 10.0 + 1e-9);
            }
        }
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_voxelize_matches_sequential() {
        let mesh = SurfaceMesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [7.0, 1.0, 2.0],
                [3.0, 6.0, 1.0],
                [2.0, 2.0, 5.0],
            ],
            vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]],
        );
        assert_eq!(mesh.voxelize((8, 8, 8)), mesh.par_voxelize((8, 8, 8)));
    }
}
