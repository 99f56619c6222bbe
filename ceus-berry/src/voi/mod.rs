//! VOI 三维重建流水线.
//!
//! 输入是三个正交平面上的闭合轮廓草图, 输出是实心 VOI mask.
//! 流程: 轮廓体素点云 -> Delaunay + alpha-shape 边界网格 -> 拉普拉斯平滑
//! -> 三角面体素化成壳 -> 活性过滤 -> 逐切片凸包填充.

use log::debug;

mod fill;
mod hull3d;
pub mod mesh;

use crate::consts::surface::{SMOOTH_ITERATIONS, SMOOTH_RELAXATION};
use crate::data::{CeusScan, VoiMask, VoiSketch};
use crate::{CalcError, CalcResult};

pub use mesh::SurfaceMesh;

/// 从轮廓草图重建实心 VOI mask.
///
/// 同一草图和扫描必然重建出同一 mask. 重建失败时不产生任何副作用,
/// 调用方持有的旧 mask 保持原样.
///
/// # 错误
///
/// - 草图未覆盖全部三个平面或轮廓不足时返回 [`CalcError::PlanesNotCovered`].
/// - 重建出的体积没有任何体素落在造影有效区域内时返回 [`CalcError::EmptyVoi`].
pub fn build_voi(scan: &CeusScan, sketch: &VoiSketch) -> CalcResult<VoiMask> {
    sketch.check_ready()?;

    let cloud = sketch.point_cloud();
    debug!("轮廓点云共 {} 个体素", cloud.len());

    let mut mesh = hull3d::alpha_surface(&cloud);
    mesh.smooth(SMOOTH_ITERATIONS, SMOOTH_RELAXATION);

    #[cfg(not(feature = "rayon"))]
    let shell = mesh.voxelize(scan.shape());
    #[cfg(feature = "rayon")]
    let shell = mesh.par_voxelize(scan.shape());

    // 始终为零的体素在造影有效区域之外, 不参与 VOI.
    let shell: Vec<_> = shell.into_iter().filter(|&p| scan.is_live(p)).collect();
    if shell.is_empty() {
        return Err(CalcError::EmptyVoi);
    }
    debug!("活性过滤后壳体素 {} 个", shell.len());

    let mut mask = VoiMask::new(scan.shape());
    fill::fill_shell(&shell, &mut mask);
    if mask.is_empty() {
        // 所有切片都共线退化, 没有可填充的内部.
        return Err(CalcError::EmptyVoi);
    }
    Ok(mask)
}
