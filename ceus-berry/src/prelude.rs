//! 🫐欢迎光临🫐
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{
    AnalysisConfig, CeusScan, Contour, Plane, VoiMask, VoiSketch, VoxelGeometry,
};

pub use crate::error::{CalcError, CalcResult};

pub use crate::fitting::{fit_tic, FitResult};

pub use crate::tic::{extract_tic, EditorState, TicEditor, TicPoint, TimeSeries};

pub use crate::voi::build_voi;

pub use crate::VoiSession;
