//! 完整分析会话: 勾画 -> 重建 -> 提取 -> 剪辑 -> 拟合.

use log::debug;

use crate::data::{AnalysisConfig, CeusScan, Contour, Plane, VoiMask, VoiSketch};
use crate::tic::{extract_tic, TicEditor};
use crate::voi::build_voi;
use crate::{CalcError, CalcResult, Idx2d};

/// 一次 VOI 分析会话.
///
/// 会话持有扫描、草图、mask 和 TIC 编辑器, 并维护它们之间的一致性:
/// 草图的任何修改都会使已重建的 mask 和已提取的 TIC 失效;
/// 重建或提取失败时, 上一次的结果原样保留.
#[derive(Debug, Clone)]
pub struct VoiSession {
    scan: CeusScan,
    config: AnalysisConfig,
    sketch: VoiSketch,
    mask: Option<VoiMask>,
    editor: Option<TicEditor>,
}

impl VoiSession {
    /// 以一份扫描和分析参数开始会话.
    pub fn new(scan: CeusScan, config: AnalysisConfig) -> Self {
        Self {
            scan,
            config,
            sketch: VoiSketch::new(),
            mask: None,
            editor: None,
        }
    }

    /// 获取扫描.
    #[inline]
    pub fn scan(&self) -> &CeusScan {
        &self.scan
    }

    /// 获取分析参数.
    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// 获取草图.
    #[inline]
    pub fn sketch(&self) -> &VoiSketch {
        &self.sketch
    }

    /// 获取已重建的 mask (若有).
    #[inline]
    pub fn mask(&self) -> Option<&VoiMask> {
        self.mask.as_ref()
    }

    /// 获取 TIC 编辑器 (若有).
    #[inline]
    pub fn editor(&self) -> Option<&TicEditor> {
        self.editor.as_ref()
    }

    /// 获取可变 TIC 编辑器 (若有).
    #[inline]
    pub fn editor_mut(&mut self) -> Option<&mut TicEditor> {
        self.editor.as_mut()
    }

    /// 草图被修改后, 之前的重建与提取结果全部作废.
    fn invalidate(&mut self) {
        if self.mask.take().is_some() {
            debug!("草图被修改, 作废已有 mask 与 TIC");
        }
        self.editor = None;
    }

    /// 在 `plane` 平面深度 `depth` 处追加一个点击点. 见 [`VoiSketch::push_point`].
    pub fn push_point(&mut self, plane: Plane, depth: usize, p: Idx2d) {
        assert!(depth < plane.depth_dim(self.scan.shape()));
        let (du, dv) = plane.slice_dims(self.scan.shape());
        assert!(p.0 < du && p.1 < dv);
        self.invalidate();
        self.sketch.push_point(plane, depth, p);
    }

    /// 撤销最近一个点击点.
    pub fn undo_last_point(&mut self) -> Option<Idx2d> {
        self.invalidate();
        self.sketch.undo_last_point()
    }

    /// 定格当前草稿为一条轮廓.
    pub fn accept_contour(&mut self) -> CalcResult<&Contour> {
        self.invalidate();
        self.sketch.accept_contour(self.scan.shape())
    }

    /// 撤销最近一条轮廓.
    pub fn undo_last_contour(&mut self) -> Option<Contour> {
        self.invalidate();
        self.sketch.undo_last_contour()
    }

    /// 重建 VOI mask. 失败时已有 mask 原样保留.
    pub fn build_mask(&mut self) -> CalcResult<&VoiMask> {
        let mask = build_voi(&self.scan, &self.sketch)?;
        self.mask = Some(mask);
        self.editor = None;
        Ok(self.mask.as_ref().unwrap())
    }

    /// 调整 mask 叠加层不透明度. 尚未重建 mask 时是无操作.
    pub fn set_alpha(&mut self, alpha: u8) {
        if let Some(m) = self.mask.as_mut() {
            m.set_alpha(alpha);
        }
    }

    /// 从当前 mask 提取 TIC 并创建编辑器. 失败时已有编辑器原样保留.
    ///
    /// 尚未重建 mask 时返回 [`CalcError::EmptyMask`].
    pub fn extract(&mut self) -> CalcResult<&TicEditor> {
        let Some(mask) = self.mask.as_ref() else {
            return Err(CalcError::EmptyMask);
        };
        let series = extract_tic(&self.scan, mask, self.config.compression)?;
        self.editor = Some(TicEditor::new(series));
        Ok(self.editor.as_ref().unwrap())
    }
}
