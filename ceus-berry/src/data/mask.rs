//! VOI mask 与其 RGBA 叠加层.

use ndarray::{Array3, Array4, ArrayView, Ix4};

use crate::consts::overlay::{COLOR, DEFAULT_ALPHA};
use crate::Idx3d;

/// 实心 VOI mask.
///
/// 内部同时维护布尔体素网格和一份 RGBA 叠加层 (形状 `(x, y, z, 4)`),
/// 后者供外部渲染器直接混合到造影图像上. 叠加层颜色固定为纯蓝,
/// 不透明度可随时整体调整.
#[derive(Debug, Clone)]
pub struct VoiMask {
    grid: Array3<bool>,
    overlay: Array4<u8>,
    alpha: u8,
    len: usize,
}

impl VoiMask {
    /// 创建给定空间形状的空 mask.
    pub fn new((x, y, z): Idx3d) -> Self {
        assert!(x > 0 && y > 0 && z > 0);
        Self {
            grid: Array3::from_elem((x, y, z), false),
            overlay: Array4::zeros((x, y, z, 4)),
            alpha: DEFAULT_ALPHA,
            len: 0,
        }
    }

    /// 获取空间形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let &[x, y, z] = self.grid.shape() else {
            unreachable!()
        };
        (x, y, z)
    }

    /// 将 `pos` 处的体素标记为 VOI 内部, 并以当前颜色和不透明度写入叠加层.
    ///
    /// 重复插入是幂等的. 索引越界时程序 panic.
    pub fn insert(&mut self, pos: Idx3d) {
        let slot = &mut self.grid[pos];
        if !*slot {
            *slot = true;
            self.len += 1;
        }
        let (x, y, z) = pos;
        let [r, g, b] = COLOR;
        self.overlay[(x, y, z, 0)] = r;
        self.overlay[(x, y, z, 1)] = g;
        self.overlay[(x, y, z, 2)] = b;
        self.overlay[(x, y, z, 3)] = self.alpha;
    }

    /// `pos` 处的体素是否在 VOI 内部?
    #[inline]
    pub fn contains(&self, pos: Idx3d) -> bool {
        self.grid[pos]
    }

    /// 获取 VOI 内部体素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// mask 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 调整叠加层不透明度. 已插入的所有体素立刻生效,
    /// 之后插入的体素也使用新值.
    pub fn set_alpha(&mut self, alpha: u8) {
        self.alpha = alpha;
        for (pos, set) in self.grid.indexed_iter() {
            if *set {
                let (x, y, z) = pos;
                self.overlay[(x, y, z, 3)] = alpha;
            }
        }
    }

    /// 获取当前叠加层不透明度.
    #[inline]
    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    /// 清空 mask 与叠加层. 不透明度设置保留.
    pub fn clear(&mut self) {
        self.grid.fill(false);
        self.overlay.fill(0);
        self.len = 0;
    }

    /// 收集 VOI 内部所有体素索引, 按行优先序存储.
    pub fn indices(&self) -> Vec<Idx3d> {
        self.grid
            .indexed_iter()
            .filter_map(|(pos, set)| set.then_some(pos))
            .collect()
    }

    /// 获得叠加层的一份不可变 shallow copy.
    #[inline]
    pub fn overlay(&self) -> ArrayView<'_, u8, Ix4> {
        self.overlay.view()
    }
}
