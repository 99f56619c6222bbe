//! 三次样条曲线.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1};
use num::Float;

// ref: https://zhuanlan.zhihu.com/p/628508199

macro_rules! impl_cubic {
    ($fp: ty, $one: expr, $two: expr, $three: expr) => {
        impl<'a> CubicSplineImp<'a, $fp> {
            #[inline]
            pub fn new(x: ArrayView1<'a, $fp>, y: ArrayView1<'a, $fp>) -> Self {
                assert_eq!(x.len(), y.len(), "x 值和 y 值必须一一对应");
                assert!(x.len() >= 3, "该样条曲线至少需要三个点");
                assert!(
                    x.windows(2).into_iter().all(|v| v[0] < v[1]),
                    "x 值必须严格递增"
                );

                Self { x, y }
            }

            /// 在 `ts` 的每个参数处取样条值.
            pub fn eval_many(&self, ts: ArrayView1<$fp>) -> Vec<$fp> {
                let coe = self.spline_coefficient();
                ts.iter().map(|&t| self.eval_one(&coe, t)).collect()
            }

            fn eval_one(&self, coe: &DMatrix<$fp>, t: $fp) -> $fp {
                let len = self.x.len();

                // 定位 t 所在区间. 越界参数按端点区间外推.
                let mut i = 0usize;
                while i + 2 < len && self.x[i + 1] <= t {
                    i += 1;
                }

                let dx = t - self.x[i];
                self.y[i] + dx * (coe[(i, 0)] + dx * (coe[(i, 1)] + dx * coe[(i, 2)]))
            }

            fn array1_diff(arr: ArrayView1<$fp>) -> Array1<$fp> {
                let vector: Vec<$fp> = arr.windows(2).into_iter().map(|v| v[1] - v[0]).collect();
                Array1::from_vec(vector)
            }

            fn spline_coefficient(&self) -> DMatrix<$fp> {
                let len = self.x.len();
                let mut a = DMatrix::<$fp>::zeros(len, len);
                let mut r = DVector::<$fp>::zeros(len);
                let dx = Self::array1_diff(self.x.view());
                let dy = Self::array1_diff(self.y.view());
                for i in 1..(len - 1) {
                    a[(i, i - 1)] = dx[i - 1];
                    a[(i, i)] = $two * (dx[i - 1] + dx[i]);
                    a[(i, i + 1)] = dx[i];
                    r[i] = $three * (dy[i] / dx[i] - dy[i - 1] / dx[i - 1]);
                }
                // 自然边界条件: 两端二阶导数为零.
                a[(0, 0)] = $one;
                a[(len - 1, len - 1)] = $one;

                // 系数矩阵严格对角占优, 必定可解.
                let c = a.lu().solve(&r).unwrap();

                let mut coe = DMatrix::<$fp>::zeros(len - 1, 3);
                for i in 0..(len - 1) {
                    coe[(i, 1)] = c[i];
                    coe[(i, 2)] = (c[i + 1] - c[i]) / ($three * dx[i]);
                    coe[(i, 0)] =
                        dy[i] / dx[i] - dx[i] * ($two * c[i] + c[i + 1]) / $three;
                }
                coe
            }
        }
    };
}

pub(crate) struct CubicSplineImp<'a, T: Float> {
    x: ArrayView1<'a, T>,
    y: ArrayView1<'a, T>,
}

impl_cubic!(f32, 1.0_f32, 2.0_f32, 3.0_f32);
impl_cubic!(f64, 1.0_f64, 2.0_f64, 3.0_f64);
