//! 液体类别校正曲线
//!
//! 名义体积与通道需要实际位移的体积并不相等：粘度、蒸汽压与吸头
//! 几何都会引入系统偏差。固件接收的是**校正后**体积；校正关系以
//! 逐液体类别的标定曲线描述，编码吸液/排液体积前必须先过曲线。
//!
//! 曲线是单调递增的分段线性函数，由 (名义 µL, 校正 µL) 标定点给出，
//! 点间线性插值，末段斜率向外延伸。

use crate::ProtocolError;

/// 标定点
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurvePoint {
    /// 名义体积（µL）
    pub target: f64,
    /// 校正后体积（µL）
    pub corrected: f64,
}

/// 液体类别
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LiquidClass {
    /// 类别名（如 "water-high-volume"）
    pub name: String,
    curve: Vec<CurvePoint>,
}

impl LiquidClass {
    /// 由标定点创建液体类别
    ///
    /// 标定点须按 `target` 严格递增且 `corrected` 单调不减，首点为
    /// (0, 0)。不满足则拒绝，避免非单调曲线在插值时产生负体积。
    pub fn new(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (f64, f64)>,
    ) -> Result<Self, ProtocolError> {
        let curve: Vec<CurvePoint> = points
            .into_iter()
            .map(|(target, corrected)| CurvePoint { target, corrected })
            .collect();

        if curve.is_empty() {
            return Err(ProtocolError::InvalidCurve {
                reason: "curve has no points",
            });
        }
        if curve[0].target != 0.0 || curve[0].corrected != 0.0 {
            return Err(ProtocolError::InvalidCurve {
                reason: "curve must start at (0, 0)",
            });
        }
        for pair in curve.windows(2) {
            if pair[1].target <= pair[0].target {
                return Err(ProtocolError::InvalidCurve {
                    reason: "targets must be strictly increasing",
                });
            }
            if pair[1].corrected < pair[0].corrected {
                return Err(ProtocolError::InvalidCurve {
                    reason: "corrected volumes must be non-decreasing",
                });
            }
        }

        Ok(Self {
            name: name.into(),
            curve,
        })
    }

    /// 参考水类（高容量吸头）标定曲线
    pub fn water_high_volume() -> Self {
        // 实验室标定值，50–1000 µL 区间
        Self::new(
            "water-high-volume",
            [
                (0.0, 0.0),
                (50.0, 55.1),
                (100.0, 107.2),
                (200.0, 211.0),
                (500.0, 530.0),
                (1000.0, 1053.0),
            ],
        )
        .expect("reference curve is well-formed")
    }

    /// 名义体积 → 校正体积（µL）
    ///
    /// 标定点之间线性插值；超出末点按末段斜率外推。
    pub fn correct(&self, volume_ul: f64) -> f64 {
        debug_assert!(volume_ul >= 0.0);
        let last = self.curve.len() - 1;
        if volume_ul >= self.curve[last].target {
            if last == 0 {
                return volume_ul;
            }
            let a = self.curve[last - 1];
            let b = self.curve[last];
            let slope = (b.corrected - a.corrected) / (b.target - a.target);
            return b.corrected + (volume_ul - b.target) * slope;
        }
        for pair in self.curve.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if volume_ul <= b.target {
                let t = (volume_ul - a.target) / (b.target - a.target);
                return a.corrected + t * (b.corrected - a.corrected);
            }
        }
        // 曲线覆盖 [0, last]，上方两个分支已穷尽
        unreachable!()
    }
}
