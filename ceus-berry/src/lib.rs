#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 3D 造影超声 (CEUS) 四维图像的 VOI (volume of interest)
//! 重建与时间-强度曲线 (TIC) 分析功能.
//!
//! 该 crate 目前仅提供 `safe` 接口. 上游负责图像解码与屏幕坐标映射,
//! 本库只接受已解码的 4D 数组 (`V[x, y, z, t]`, u8 值域) 和体素分辨率信息.
//!
//! # 注意
//!
//! 1. 所有操作均为同步的请求/响应式调用, 没有后台线程与取消机制.
//! 2. 在非期望情况下 (编程错误), 程序会直接 panic, 而不会导致内存错误.
//!   用户输入导致的失败 (轮廓点过少, VOI 为空等) 以 `Result` 返回.
//!
//! # 开发计划
//!
//! ### 平面轮廓的参数样条重采样 ✅
//!
//! 给定若干个有序点击点, 拟合闭合参数样条并稠密重采样为体素链.
//!
//! 实现位于 `ceus-berry/src/fitting/contour.rs`.
//!
//! ### 三维表面重建 (Delaunay 四面体剖分 + alpha shape) ✅
//!
//! 从三个平面的轮廓体素并集构建点云, 做四面体剖分, 以 alpha
//! 参数筛选四面体, 提取并平滑边界三角网格, 最后体素化成 "壳".
//!
//! 实现位于 `ceus-berry/src/voi/{hull3d, mesh}.rs`.
//!
//! ### 逐切片凸包填充 ✅
//!
//! 对每个深度切片求壳体素的二维凸包, 线性重采样出稠密轮廓线,
//! 再做背景空洞填充, 得到实心 VOI mask.
//!
//! 实现位于 `ceus-berry/src/voi/fill.rs`.
//!
//! ### TIC 提取与交互式编辑 ✅
//!
//! 将 4D 图像 + VOI mask 归约为逐帧平均强度序列; 提供人工剪辑协议
//! (区域选点, 批量删除, 批量恢复, T0 重定基).
//!
//! 实现位于 `ceus-berry/src/tic/*`.
//!
//! ### Bolus 对数正态模型拟合 ✅
//!
//! Levenberg-Marquardt 非线性最小二乘; 不收敛时退化为启发式估计.
//!
//! 实现位于 `ceus-berry/src/fitting/lognormal.rs`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private API 提供文档.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
///
/// 在平面轮廓语境下按 `(u, v)` 解释, 其中 `(u, v)` 的含义由所在平面决定.
pub type Idx2d = (usize, usize);

/// 三维体素索引, 按 `(x, y, z)` 解释, 与 4D 图像 `V[x, y, z, t]` 的前三轴一致.
pub type Idx3d = (usize, usize, usize);

/// 高精度通用二维坐标 / 向量.
type Idx2dF = (f64, f64);

/// 高精度通用三维坐标 / 向量.
type Idx3dF = [f64; 3];

/// CEUS 4D 图像与 VOI 草图基础数据结构.
mod data;

pub use data::{AnalysisConfig, CeusScan, Contour, Plane, VoiMask, VoiSketch, VoxelGeometry};

pub mod consts;

mod error;

pub use error::{CalcError, CalcResult};

pub mod fitting;

pub mod voi;

pub mod tic;

mod session;

pub use session::VoiSession;

pub mod prelude;
