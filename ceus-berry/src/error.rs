//! 运行时错误.

/// VOI 重建或 TIC 分析的运行时错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalcError {
    /// 单个平面轮廓的点击点不足.
    ///
    /// 第一个参数代表目前已有的点, 第二个参数代表需要的最少点数.
    TooFewPoints(u32, u32),

    /// 已接受的轮廓没有覆盖全部三个正交平面.
    PlanesNotCovered,

    /// 重建出的 VOI 体积为空 (没有任何体素落在图像范围内).
    EmptyVoi,

    /// VOI mask 为空, 无法提取 TIC.
    EmptyMask,

    /// TIC 信号退化 (归一化后出现 NaN 或无穷值).
    InvalidSignal,

    /// 编辑器当前状态不允许该操作.
    BadEditorState,
}

/// 本 crate 的计算结果.
pub type CalcResult<T> = Result<T, CalcError>;
