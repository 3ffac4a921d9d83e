//! 会话配置

use semver::Version;
use std::time::Duration;

/// 会话配置
///
/// 几何默认值面向标准台面；通道帧宽度须与实际装机一致：逐通道
/// 字段的 token 数、传感器数组宽度都由它决定。
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// 通道帧宽度（装机通道数，8 或 16；紧凑机型 4）
    pub channel_count: usize,
    /// 单次往返应答限时
    #[cfg_attr(feature = "serde", serde(skip, default = "default_timeout"))]
    pub response_timeout: Duration,
    /// 巡航高度（mm）
    pub traverse_height_mm: f64,
    /// 拾取下压行程（mm）
    pub pickup_stroke_mm: f64,
    /// 排液口距孔底高度（mm）
    pub dispense_height_mm: f64,
    /// 吸液速度（µL/s）
    pub aspirate_speed_ul_s: f64,
    /// 排液速度（µL/s）
    pub dispense_speed_ul_s: f64,
    /// 最低兼容固件版本
    #[cfg_attr(feature = "serde", serde(skip, default = "default_min_firmware"))]
    pub min_firmware: Version,
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_min_firmware() -> Version {
    Version::new(4, 0, 0)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_count: 8,
            response_timeout: default_timeout(),
            traverse_height_mm: 245.0,
            pickup_stroke_mm: 8.0,
            dispense_height_mm: 2.0,
            aspirate_speed_ul_s: 100.0,
            dispense_speed_ul_s: 120.0,
            min_firmware: default_min_firmware(),
        }
    }
}

impl SessionConfig {
    /// 紧凑 4 通道机型配置
    pub fn compact() -> Self {
        Self {
            channel_count: 4,
            ..Self::default()
        }
    }
}
