use ndarray::{Array4, ArrayView, ArrayView3, Axis, Ix4};

use crate::Idx3d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod contour;
mod mask;

pub use contour::{Contour, Plane, VoiSketch};
pub use mask::VoiMask;

/// 体素几何信息, 相当于 4D CEUS 文件 header 中的 `pixdim` 字段.
///
/// 前三个分量是体素在 `x`, `y`, `z` 方向的分辨率 (单位: 毫米),
/// 第四个分量是相邻帧的时间间隔 (单位: 秒).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoxelGeometry {
    /// `x` 方向体素分辨率, 以毫米为单位.
    pub x_mm: f64,

    /// `y` 方向体素分辨率, 以毫米为单位.
    pub y_mm: f64,

    /// `z` 方向体素分辨率, 以毫米为单位.
    pub z_mm: f64,

    /// 相邻帧的时间间隔, 以秒为单位.
    pub frame_dt: f64,
}

impl VoxelGeometry {
    /// 构建体素几何信息. 所有分量必须为正, 否则程序 panic.
    pub fn new(x_mm: f64, y_mm: f64, z_mm: f64, frame_dt: f64) -> Self {
        assert!(x_mm > 0.0 && y_mm > 0.0 && z_mm > 0.0);
        assert!(frame_dt > 0.0);
        Self {
            x_mm,
            y_mm,
            z_mm,
            frame_dt,
        }
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    pub fn voxel_mm3(&self) -> f64 {
        self.x_mm * self.y_mm * self.z_mm
    }
}

/// 4D 造影超声扫描. 体素值以 `u8` 保存, 按 `V[x, y, z, t]` 组织.
///
/// 文件解码 (DICOM / NIfTI 等) 由上游负责, 本结构只接受已解码的数组.
#[derive(Debug, Clone)]
pub struct CeusScan {
    geometry: VoxelGeometry,
    data: Array4<u8>,
}

impl CeusScan {
    /// 根据裸数据和体素几何信息直接创建 `CeusScan` 实体.
    ///
    /// `data` 的四个轴依次为 `x`, `y`, `z`, `t`, 每个轴长度必须非零,
    /// 否则程序 panic.
    pub fn new(data: Array4<u8>, geometry: VoxelGeometry) -> Self {
        assert!(data.shape().iter().all(|&d| d > 0));
        Self { geometry, data }
    }

    /// 获取空间部分的形状大小, 按 `(x, y, z)` 排列.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let &[x, y, z, _] = self.data.shape() else {
            unreachable!()
        };
        (x, y, z)
    }

    /// 获取时间帧个数.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// 检查空间索引是否合法.
    #[inline]
    pub fn check(&self, (x0, y0, z0): &Idx3d) -> bool {
        let (x, y, z) = self.shape();
        *x0 < x && *y0 < y && *z0 < z
    }

    /// 获取体素几何信息.
    #[inline]
    pub fn geometry(&self) -> &VoxelGeometry {
        &self.geometry
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    pub fn voxel_mm3(&self) -> f64 {
        self.geometry.voxel_mm3()
    }

    /// 获取每一帧对应的时间戳, 以秒为单位.
    ///
    /// 第 `i` 帧 (从 0 计) 的时间戳为 `(i + 1) * frame_dt`.
    pub fn frame_times(&self) -> Vec<f64> {
        (1..=self.num_frames())
            .map(|i| i as f64 * self.geometry.frame_dt)
            .collect()
    }

    /// 获取 `pos` 处第 `frame` 帧的体素值.
    ///
    /// 如果索引越界, 则程序 panic.
    #[inline]
    pub fn value(&self, (x, y, z): Idx3d, frame: usize) -> u8 {
        self.data[(x, y, z, frame)]
    }

    /// `pos` 处的体素是否在任意一帧上取非零值?
    ///
    /// 始终为零的体素位于造影图像的有效区域之外.
    pub fn is_live(&self, pos: Idx3d) -> bool {
        (0..self.num_frames()).any(|t| self.value(pos, t) != 0)
    }

    /// 获取第 `frame` 帧的 3D 体视图.
    ///
    /// 当 `frame` 越界时 panic.
    #[inline]
    pub fn frame_at(&self, frame: usize) -> ArrayView3<'_, u8> {
        self.data.index_axis(Axis(3), frame)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix4> {
        self.data.view()
    }
}

/// 下游分析参数. 本库只负责携带与透传, 不参与任何计算逻辑.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisConfig {
    /// 强度压缩系数. TIC 提取时乘在平均强度上.
    pub compression: f64,

    /// 参数成像的滑动窗口大小, 按 `(x, y, z)` 排列.
    /// 由外部参数图渲染器使用.
    pub window: Idx3d,
}

impl Default for AnalysisConfig {
    #[inline]
    fn default() -> Self {
        Self {
            compression: 1.0,
            window: (1, 1, 1),
        }
    }
}

/// 把 `f64` 坐标截断到 `[0, dim - 1]` 范围内的体素索引.
///
/// 截断方向朝零 (与 `int()` 取整一致), 负值夹到 0.
#[inline]
pub(crate) fn truncate_clamp(v: f64, dim: usize) -> usize {
    debug_assert!(dim > 0);
    let t = v.trunc();
    if t <= 0.0 {
        0
    } else {
        (t as usize).min(dim - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn small_scan() -> CeusScan {
        // 2x2x2 空间, 3 帧; 只有 (0, 0, 0) 在第二帧取非零值.
        let mut data = Array4::<u8>::zeros((2, 2, 2, 3));
        data[(0, 0, 0, 1)] = 7;
        CeusScan::new(data, VoxelGeometry::new(1.0, 1.0, 1.0, 0.5))
    }

    #[test]
    fn test_scan_attrs() {
        let scan = small_scan();
        assert_eq!(scan.shape(), (2, 2, 2));
        assert_eq!(scan.num_frames(), 3);
        assert!(scan.check(&(1, 1, 1)));
        assert!(!scan.check(&(2, 0, 0)));
        assert_eq!(scan.voxel_mm3(), 1.0);
    }

    #[test]
    fn test_frame_times_start_at_dt() {
        let scan = small_scan();
        assert_eq!(scan.frame_times(), vec![0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_is_live() {
        let scan = small_scan();
        assert!(scan.is_live((0, 0, 0)));
        assert!(!scan.is_live((1, 1, 1)));
    }

    #[test]
    fn test_truncate_clamp() {
        assert_eq!(truncate_clamp(3.99, 10), 3);
        assert_eq!(truncate_clamp(-0.2, 10), 0);
        assert_eq!(truncate_clamp(42.0, 10), 9);
    }
}
