//! 三轴坐标与轨道映射
//!
//! 台面沿长轴布置离散安装轨道，轨道索引到 x 坐标是固定线性映射。

use std::ops::{Add, AddAssign};

/// 轨道 1 的 x 坐标（mm）
pub const RAIL_ORIGIN_X_MM: f64 = 100.0;

/// 相邻轨道间距（mm）
pub const RAIL_PITCH_MM: f64 = 22.5;

/// 轨道索引（1 基）→ x 坐标
///
/// 轨道 3 ⇒ 145.0 mm。
pub fn rail_to_x(rail: u8) -> f64 {
    RAIL_ORIGIN_X_MM + (rail as f64 - 1.0) * RAIL_PITCH_MM
}

/// 设备毫米单位的三轴坐标
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub const ZERO: Coordinate = Coordinate {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        Coordinate {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl AddAssign for Coordinate {
    fn add_assign(&mut self, rhs: Coordinate) {
        *self = *self + rhs;
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}
