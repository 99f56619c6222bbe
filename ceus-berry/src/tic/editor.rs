//! TIC 交互式剪辑.
//!
//! 曲线在送入模型拟合之前, 通常需要人工剪掉注射前的基线段和明显的
//! 伪影点. 本模块以显式状态机提供该剪辑协议: 先选定灌注起点 T0,
//! 再做框选/删除/恢复的批量编辑, 最后定格并拟合.
//!
//! 所有删除都以 "批次" 进入栈, 可以按与删除相反的顺序逐批恢复;
//! T0 裁剪也是一个普通批次, 恢复后整条曲线与裁剪前只差一个全局时间平移.

use log::debug;

use super::{TicPoint, TimeSeries};
use crate::consts::T0_REBASED_START;
use crate::fitting::{fit_tic, FitResult};
use crate::{CalcError, CalcResult};

/// 编辑器所处的状态.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// 只读浏览.
    Viewing,

    /// 等待用户选定灌注起点 T0.
    SelectingT0,

    /// 批量剪辑中.
    Editing,

    /// 已定格并完成拟合.
    Fitted,
}

/// 一个已删除的批次.
#[derive(Debug, Clone)]
struct RemovedBatch {
    /// 被删除的点, 按时间升序, 保留删除时刻的原始时间戳.
    points: Vec<TicPoint>,

    /// 本批删除后对剩余序列施加的时间平移量.
    shift: f64,
}

/// TIC 剪辑状态机.
#[derive(Debug, Clone)]
pub struct TicEditor {
    series: TimeSeries,
    state: EditorState,

    /// 待删除的选中点, 按选中顺序存储, 无重复. 索引指向当前 `series`.
    selection: Vec<usize>,

    /// 删除批次栈.
    removed: Vec<RemovedBatch>,
}

impl TicEditor {
    /// 以一条 TIC 初始化编辑器, 初始状态为浏览.
    ///
    /// `series` 必须非空且时间严格递增, 否则程序 panic.
    pub fn new(series: TimeSeries) -> Self {
        assert!(!series.is_empty());
        assert!(series.windows(2).all(|w| w[0].time < w[1].time));
        Self {
            series,
            state: EditorState::Viewing,
            selection: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// 获取当前状态.
    #[inline]
    pub fn state(&self) -> EditorState {
        self.state
    }

    /// 获取当前序列.
    #[inline]
    pub fn series(&self) -> &[TicPoint] {
        &self.series
    }

    /// 获取当前所有被框选的点的索引, 升序无重复.
    pub fn selected(&self) -> Vec<usize> {
        let mut all = self.selection.clone();
        all.sort_unstable();
        all
    }

    /// 基线对齐后的强度序列: 整体下移使最小值为 0. 用于显示.
    pub fn baselined(&self) -> Vec<f64> {
        let min = self
            .series
            .iter()
            .map(|p| p.intensity)
            .fold(f64::INFINITY, f64::min);
        self.series.iter().map(|p| p.intensity - min).collect()
    }

    fn expect_state(&self, s: EditorState) -> CalcResult<()> {
        if self.state == s {
            Ok(())
        } else {
            Err(CalcError::BadEditorState)
        }
    }

    /// 进入 T0 选择状态. 仅在浏览状态下允许.
    pub fn begin_t0_selection(&mut self) -> CalcResult<()> {
        self.expect_state(EditorState::Viewing)?;
        self.state = EditorState::SelectingT0;
        Ok(())
    }

    /// 选定灌注起点 `t`: 时间小于 `t` 的点作为一个批次删除,
    /// 剩余序列整体平移使首点时间为 1 个单位. 完成后进入剪辑状态.
    ///
    /// 裁剪至少保留一个点: `t` 超过最后一点时按保留最后一点处理.
    pub fn select_t0(&mut self, t: f64) -> CalcResult<()> {
        self.expect_state(EditorState::SelectingT0)?;

        let cut = self
            .series
            .iter()
            .position(|p| p.time >= t)
            .unwrap_or(self.series.len() - 1);

        let points: Vec<TicPoint> = self.series.drain(..cut).collect();
        let shift = self.series[0].time - T0_REBASED_START;
        for p in self.series.iter_mut() {
            p.time -= shift;
        }
        debug!("T0 裁剪 {} 个点, 时间平移 {shift}", points.len());
        self.removed.push(RemovedBatch { points, shift });

        self.state = EditorState::Editing;
        Ok(())
    }

    /// 框选开区间矩形 `(t0, t1) x (y0, y1)` 内、尚未被选中的点.
    ///
    /// 新选中的点按索引顺序追加到待选列表尾部, 返回其数量.
    pub fn select_region(&mut self, t0: f64, t1: f64, y0: f64, y1: f64) -> CalcResult<usize> {
        self.expect_state(EditorState::Editing)?;

        let fresh: Vec<usize> = self
            .series
            .iter()
            .enumerate()
            .filter(|(i, p)| {
                p.time > t0
                    && p.time < t1
                    && p.intensity > y0
                    && p.intensity < y1
                    && !self.selection.contains(i)
            })
            .map(|(i, _)| i)
            .collect();

        let n = fresh.len();
        self.selection.extend(fresh);
        Ok(n)
    }

    /// 取消最近选中的一个点. 返回是否确实取消了一个点.
    pub fn deselect_last(&mut self) -> CalcResult<bool> {
        self.expect_state(EditorState::Editing)?;
        Ok(self.selection.pop().is_some())
    }

    /// 将所有被框选的点按索引升序作为一个批次删除, 并清空框选.
    ///
    /// 返回删除的点数. 没有框选时是无操作.
    pub fn remove_selected(&mut self) -> CalcResult<usize> {
        self.expect_state(EditorState::Editing)?;

        let all = self.selected();
        if all.is_empty() {
            return Ok(0);
        }

        let mut points = Vec::with_capacity(all.len());
        for &i in all.iter().rev() {
            points.push(self.series.remove(i));
        }
        points.reverse();

        let n = points.len();
        self.removed.push(RemovedBatch { points, shift: 0.0 });
        self.selection.clear();
        debug!("删除 {n} 个点, 剩余 {}", self.series.len());
        Ok(n)
    }

    /// 恢复最近删除的一个批次: 每个点插入到第一个能保持时间有序的位置.
    ///
    /// 批次携带的时间平移会被补偿, 因此 T0 裁剪批次恢复后,
    /// 整条曲线与裁剪前只差一个全局平移. 恢复同时清空当前框选
    /// (原索引已失效). 返回是否确实恢复了一个批次.
    pub fn restore_last(&mut self) -> CalcResult<bool> {
        self.expect_state(EditorState::Editing)?;

        let Some(batch) = self.removed.pop() else {
            return Ok(false);
        };
        self.selection.clear();

        for p in batch.points {
            let adjusted = TicPoint {
                time: p.time - batch.shift,
                ..p
            };
            let at = self
                .series
                .partition_point(|q| q.time < adjusted.time);
            self.series.insert(at, adjusted);
        }
        Ok(true)
    }

    /// 定格当前序列并做模型拟合. 成功后进入已拟合状态.
    ///
    /// 拟合前强度先做基线对齐, 再按峰值归一化; 峰值作为量纲还原系数
    /// 传给拟合器. 序列退化 (归一化出现 NaN 或无穷) 时返回
    /// [`CalcError::InvalidSignal`] 且状态不变.
    pub fn accept(&mut self) -> CalcResult<FitResult> {
        self.expect_state(EditorState::Editing)?;

        let times: Vec<f64> = self.series.iter().map(|p| p.time).collect();
        let mut ys = self.baselined();
        let peak = ys.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        for y in ys.iter_mut() {
            *y /= peak;
        }
        if ys.iter().any(|y| !y.is_finite()) {
            return Err(CalcError::InvalidSignal);
        }

        let fit = fit_tic(&times, &ys, peak)?;
        self.state = EditorState::Fitted;
        Ok(fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[(f64, f64)]) -> TimeSeries {
        values
            .iter()
            .enumerate()
            .map(|(frame, &(time, intensity))| TicPoint {
                time,
                intensity,
                frame,
            })
            .collect()
    }

    fn editing_editor(values: &[(f64, f64)]) -> TicEditor {
        let mut e = TicEditor::new(series(values));
        e.begin_t0_selection().unwrap();
        // 不裁剪任何点.
        e.select_t0(f64::NEG_INFINITY).unwrap();
        e
    }

    #[test]
    fn test_state_guards() {
        let mut e = TicEditor::new(series(&[(1.0, 0.1), (2.0, 0.5)]));
        assert_eq!(e.state(), EditorState::Viewing);
        // 浏览状态下不允许剪辑操作.
        assert_eq!(e.select_region(0.0, 3.0, 0.0, 1.0), Err(CalcError::BadEditorState));
        assert_eq!(e.remove_selected(), Err(CalcError::BadEditorState));
        assert!(e.accept().is_err());

        e.begin_t0_selection().unwrap();
        assert_eq!(e.begin_t0_selection(), Err(CalcError::BadEditorState));
        e.select_t0(0.0).unwrap();
        assert_eq!(e.state(), EditorState::Editing);
    }

    #[test]
    fn test_select_t0_rebase() {
        let mut e = TicEditor::new(series(&[(2.0, 0.1), (4.0, 0.5), (6.0, 0.9), (8.0, 0.3)]));
        e.begin_t0_selection().unwrap();
        e.select_t0(5.0).unwrap();

        // 前两个点被裁掉, 剩余序列首点时间重定为 1.
        let times: Vec<f64> = e.series().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![1.0, 3.0]);
        assert_eq!(e.series()[0].frame, 2);
    }

    #[test]
    fn test_select_t0_keeps_at_least_one_point() {
        let mut e = TicEditor::new(series(&[(1.0, 0.1), (2.0, 0.5), (3.0, 0.2)]));
        e.begin_t0_selection().unwrap();
        e.select_t0(100.0).unwrap();
        assert_eq!(e.series().len(), 1);
        assert_eq!(e.series()[0].frame, 2);
        assert_eq!(e.series()[0].time, 1.0);
    }

    #[test]
    fn test_region_selection_no_duplicates() {
        let mut e = editing_editor(&[(1.0, 0.1), (2.0, 0.5), (3.0, 0.9), (4.0, 0.3)]);
        assert_eq!(e.select_region(0.5, 2.5, 0.0, 1.0).unwrap(), 2);
        // 重叠的第二次框选只会新增未选中的点.
        assert_eq!(e.select_region(0.5, 3.5, 0.0, 1.0).unwrap(), 1);
        assert_eq!(e.selected(), vec![0, 1, 2]);
    }

    #[test]
    fn test_deselect_pops_single_point() {
        let mut e = editing_editor(&[(1.0, 0.1), (2.0, 0.5), (3.0, 0.9), (4.0, 0.3)]);
        assert_eq!(e.select_region(0.5, 2.5, 0.0, 1.0).unwrap(), 2);
        assert_eq!(e.selected(), vec![0, 1]);

        // 每次撤销只取消最近选中的一个点, 而不是整次框选.
        assert!(e.deselect_last().unwrap());
        assert_eq!(e.selected(), vec![0]);
        assert!(e.deselect_last().unwrap());
        assert!(e.selected().is_empty());
        assert!(!e.deselect_last().unwrap());
    }

    #[test]
    fn test_remove_restore_roundtrip() {
        let original = series(&[(1.0, 0.1), (2.0, 0.9), (3.0, 0.5), (4.0, 0.2)]);
        let mut e = editing_editor(&[(1.0, 0.1), (2.0, 0.9), (3.0, 0.5), (4.0, 0.2)]);

        e.select_region(1.5, 3.5, 0.0, 1.0).unwrap();
        assert_eq!(e.remove_selected().unwrap(), 2);
        assert_eq!(e.series().len(), 2);

        // 空框选下的删除是无操作.
        assert_eq!(e.remove_selected().unwrap(), 0);

        assert!(e.restore_last().unwrap());
        assert_eq!(e.series(), &original[..]);
        // T0 批次 (空) 仍在栈里, 再往前恢复一次后栈空.
        assert!(e.restore_last().unwrap());
        assert!(!e.restore_last().unwrap());
    }

    #[test]
    fn test_t0_restore_up_to_global_shift() {
        let raw = [(2.0, 0.4), (3.0, 0.8), (5.0, 0.6), (7.0, 0.1)];
        let mut e = TicEditor::new(series(&raw));
        e.begin_t0_selection().unwrap();
        e.select_t0(4.5).unwrap();

        assert!(e.restore_last().unwrap());
        // 恢复后与裁剪前只差一个全局时间平移 (此处为 5.0 - 1.0).
        let expect: Vec<f64> = raw.iter().map(|&(t, _)| t - 4.0).collect();
        let times: Vec<f64> = e.series().iter().map(|p| p.time).collect();
        for (a, b) in times.iter().zip(expect.iter()) {
            assert!((a - b).abs() < 1e-12, "{a} != {b}");
        }
        let frames: Vec<usize> = e.series().iter().map(|p| p.frame).collect();
        assert_eq!(frames, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_accept_flat_series_rejected() {
        // 常数序列基线对齐后全零, 峰值归一化产生 NaN.
        let mut e = editing_editor(&[(1.0, 0.5), (2.0, 0.5), (3.0, 0.5)]);
        assert_eq!(e.accept().unwrap_err(), CalcError::InvalidSignal);
        assert_eq!(e.state(), EditorState::Editing);
    }

    #[test]
    fn test_accept_fits_and_freezes() {
        use crate::fitting::lognormal::bolus_lognormal;

        let pts: Vec<(f64, f64)> = (1..=50)
            .map(|i| {
                let t = i as f64;
                (t, bolus_lognormal(t, 2.0, 2.0, 0.5, 0.0) * 80.0)
            })
            .collect();
        let mut e = editing_editor(&pts);
        let fit = e.accept().unwrap();
        assert_eq!(e.state(), EditorState::Fitted);
        assert!(!fit.approximate);
        assert!(fit.pe > 0.0 && fit.auc > 0.0);
        // 定格后不再允许剪辑.
        assert_eq!(e.remove_selected(), Err(CalcError::BadEditorState));
    }
}
