//! 吸头类型定义
//!
//! 吸头几何与额定容量既进入 TT 指令（固件需要知道吸头长度来计算
//! z 行程），也用于客户端的容量预检。

/// 吸头类型
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TipType {
    /// 设备内部类型表位（TT 指令 `tt` 字段）
    pub type_index: u8,
    /// 额定容量（µL）
    pub volume_ul: f64,
    /// 吸头总长（mm）
    pub length_mm: f64,
    /// 是否带滤芯
    pub has_filter: bool,
    /// 尺寸档位（TT 指令 `tg` 字段）
    pub size_code: u8,
    /// 拾取方式（TT 指令 `tu` 字段）
    pub pickup_method: u8,
}

impl TipType {
    /// 1000 µL 档高容量滤芯吸头
    ///
    /// 额定容量 1250 µL（含安全余量），长度 87.1 mm。
    pub fn high_volume_filtered() -> Self {
        Self {
            type_index: 1,
            volume_ul: 1250.0,
            length_mm: 87.1,
            has_filter: true,
            size_code: 3,
            pickup_method: 0,
        }
    }

    /// 300 µL 档标准吸头
    pub fn standard_volume() -> Self {
        Self {
            type_index: 2,
            volume_ul: 360.0,
            length_mm: 59.9,
            has_filter: false,
            size_code: 2,
            pickup_method: 0,
        }
    }

    /// 50 µL 档低容量吸头
    pub fn low_volume() -> Self {
        Self {
            type_index: 3,
            volume_ul: 60.0,
            length_mm: 50.4,
            has_filter: false,
            size_code: 1,
            pickup_method: 0,
        }
    }
}
