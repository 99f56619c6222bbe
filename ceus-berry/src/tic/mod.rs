//! 时间-强度曲线 (TIC) 提取.
//!
//! 将 4D 造影图像与 VOI mask 归约为逐帧的平均强度序列.

use itertools::izip;
use log::debug;

pub mod editor;

pub use editor::{EditorState, TicEditor};

use crate::data::{CeusScan, VoiMask};
use crate::{CalcError, CalcResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// TIC 上的一个采样点.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TicPoint {
    /// 时间戳, 以秒为单位.
    pub time: f64,

    /// 体积校正后的平均强度.
    pub intensity: f64,

    /// 原始帧序号.
    pub frame: usize,
}

/// 时间严格递增的 TIC 采样序列.
pub type TimeSeries = Vec<TicPoint>;

/// 从 4D 扫描和 VOI mask 提取 TIC.
///
/// 第 `i` 帧的强度为 `compression * mean(V[mask, i]) * voxel_mm3 / mask_len`,
/// 时间戳为 `(i + 1) * frame_dt`. mask 与扫描的空间形状必须一致,
/// 否则程序 panic.
///
/// # 错误
///
/// - mask 为空时返回 [`CalcError::EmptyMask`].
/// - 任何一帧的强度为 NaN 或无穷 (例如 `compression` 非法) 时
///   返回 [`CalcError::InvalidSignal`], 不产生任何序列.
pub fn extract_tic(scan: &CeusScan, mask: &VoiMask, compression: f64) -> CalcResult<TimeSeries> {
    assert_eq!(scan.shape(), mask.shape());

    if mask.is_empty() {
        return Err(CalcError::EmptyMask);
    }
    let indices = mask.indices();
    let scale = compression * scan.voxel_mm3() / indices.len() as f64;

    let series: TimeSeries = izip!(0.., scan.frame_times())
        .map(|(frame, time)| {
            let sum: u64 = indices
                .iter()
                .map(|&p| scan.value(p, frame) as u64)
                .sum();
            let mean = sum as f64 / indices.len() as f64;
            TicPoint {
                time,
                intensity: mean * scale,
                frame,
            }
        })
        .collect();

    if series.iter().any(|p| !p.intensity.is_finite()) {
        return Err(CalcError::InvalidSignal);
    }
    debug!("TIC 提取完成, {} 帧, VOI {} 体素", series.len(), indices.len());
    Ok(series)
}
