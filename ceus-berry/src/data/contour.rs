//! 平面轮廓与 VOI 草图.
//!
//! 用户在三个正交平面上分别勾画若干闭合轮廓, 这些轮廓的体素链并集
//! 是后续三维表面重建的输入点云.

use crate::consts::contour::MIN_CLICK_POINTS;
use crate::fitting::contour::densify_closed;
use crate::{CalcError, CalcResult, Idx2d, Idx3d};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 勾画轮廓所在的正交平面.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Plane {
    /// 横断面, 平面坐标 `(u, v)` 对应体素 `(x, y)`, 深度沿 `z`.
    Axial,

    /// 矢状面, 平面坐标 `(u, v)` 对应体素 `(z, y)`, 深度沿 `x`.
    Sagittal,

    /// 冠状面, 平面坐标 `(u, v)` 对应体素 `(x, z)`, 深度沿 `y`.
    Coronal,
}

impl Plane {
    /// 获取该平面 2D 坐标系的边界, 即 `(u, v)` 两个方向的体素个数.
    #[inline]
    pub fn slice_dims(&self, (x, y, z): Idx3d) -> Idx2d {
        match self {
            Plane::Axial => (x, y),
            Plane::Sagittal => (z, y),
            Plane::Coronal => (x, z),
        }
    }

    /// 获取该平面深度方向的体素个数.
    #[inline]
    pub fn depth_dim(&self, (x, y, z): Idx3d) -> usize {
        match self {
            Plane::Axial => z,
            Plane::Sagittal => x,
            Plane::Coronal => y,
        }
    }

    /// 将该平面上深度为 `depth` 的 2D 坐标 `(u, v)` 映射为 3D 体素索引.
    #[inline]
    pub fn to_3d(&self, (u, v): Idx2d, depth: usize) -> Idx3d {
        match self {
            Plane::Axial => (u, v, depth),
            Plane::Sagittal => (depth, v, u),
            Plane::Coronal => (u, depth, v),
        }
    }
}

/// 一条已接受的平面闭合轮廓.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contour {
    plane: Plane,
    depth: usize,
    clicks: Vec<Idx2d>,
    voxels: Vec<Idx3d>,
}

impl Contour {
    /// 获取轮廓所在平面.
    #[inline]
    pub fn plane(&self) -> Plane {
        self.plane
    }

    /// 获取轮廓所在平面的深度索引.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 获取原始点击点 (不含闭合点).
    #[inline]
    pub fn clicks(&self) -> &[Idx2d] {
        &self.clicks
    }

    /// 获取样条重采样后的 3D 体素链.
    #[inline]
    pub fn voxels(&self) -> &[Idx3d] {
        &self.voxels
    }
}

/// VOI 草图: 在建的点击序列与已接受的轮廓集合.
///
/// 点击点的积累是 "草稿" 式的, 支持逐点撤销; 调用 [`VoiSketch::accept_contour`]
/// 后草稿被样条化并定格为一条 [`Contour`].
#[derive(Debug, Clone, Default)]
pub struct VoiSketch {
    /// 在建草稿的点击点.
    draft: Vec<Idx2d>,

    /// 在建草稿所在的平面和深度. 草稿为空时无意义.
    draft_at: Option<(Plane, usize)>,

    /// 已接受的轮廓, 按接受顺序存储.
    contours: Vec<Contour>,
}

impl VoiSketch {
    /// 创建空草图.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 在 `plane` 平面深度 `depth` 处追加一个点击点.
    ///
    /// 草稿非空时, `plane` 和 `depth` 必须与已有草稿一致, 否则程序 panic
    /// (调用方应先接受或清空当前草稿).
    pub fn push_point(&mut self, plane: Plane, depth: usize, p: Idx2d) {
        match self.draft_at {
            Some(at) => assert_eq!(at, (plane, depth)),
            None => self.draft_at = Some((plane, depth)),
        }
        self.draft.push(p);
    }

    /// 撤销最近一个点击点. 草稿为空时返回 `None`.
    pub fn undo_last_point(&mut self) -> Option<Idx2d> {
        let p = self.draft.pop();
        if self.draft.is_empty() {
            self.draft_at = None;
        }
        p
    }

    /// 获取在建草稿的点击点.
    #[inline]
    pub fn draft(&self) -> &[Idx2d] {
        &self.draft
    }

    /// 将当前草稿闭合、样条重采样并定格为一条轮廓.
    ///
    /// `shape` 是扫描的空间形状, 用于把重采样点夹到图像范围内.
    /// 草稿点击点不足时返回 `Err` 且草稿保持不变.
    pub fn accept_contour(&mut self, shape: Idx3d) -> CalcResult<&Contour> {
        if self.draft.len() < MIN_CLICK_POINTS {
            return Err(CalcError::TooFewPoints(
                self.draft.len() as u32,
                MIN_CLICK_POINTS as u32,
            ));
        }
        let (plane, depth) = self.draft_at.unwrap();
        assert!(depth < plane.depth_dim(shape));

        let chain = densify_closed(&self.draft, plane.slice_dims(shape));
        let mut voxels: Vec<Idx3d> = chain.into_iter().map(|p| plane.to_3d(p, depth)).collect();
        voxels.dedup();

        self.contours.push(Contour {
            plane,
            depth,
            clicks: std::mem::take(&mut self.draft),
            voxels,
        });
        self.draft_at = None;
        Ok(self.contours.last().unwrap())
    }

    /// 撤销最近一条已接受的轮廓, 并返回它. 没有轮廓时返回 `None`.
    #[inline]
    pub fn undo_last_contour(&mut self) -> Option<Contour> {
        self.contours.pop()
    }

    /// 获取全部已接受的轮廓.
    #[inline]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// 草图是否已满足三维重建条件?
    ///
    /// 条件为: 至少三条轮廓, 且三个正交平面均已被覆盖.
    pub fn is_ready(&self) -> bool {
        self.contours.len() >= 3
            && [Plane::Axial, Plane::Sagittal, Plane::Coronal]
                .iter()
                .all(|p| self.contours.iter().any(|c| c.plane() == *p))
    }

    /// 同 [`VoiSketch::is_ready`], 但以 `Result` 形式返回.
    #[inline]
    pub fn check_ready(&self) -> CalcResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CalcError::PlanesNotCovered)
        }
    }

    /// 收集所有轮廓体素链的并集, 去除重复体素, 保持首次出现顺序.
    pub fn point_cloud(&self) -> Vec<Idx3d> {
        let mut seen = std::collections::HashSet::new();
        self.contours
            .iter()
            .flat_map(|c| c.voxels().iter().copied())
            .filter(|p| seen.insert(*p))
            .collect()
    }
}
