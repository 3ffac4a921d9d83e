//! # Star Protocol
//!
//! 液体处理工作站固件协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 模块代码与指令代码常量定义
//! - `units`: 设备子单位（0.1 mm / 0.1 µL）定点转换
//! - `fields`: 声明式字段表（指令 = 数据，而非代码路径）
//! - `command`: 指令构建与编码
//! - `response`: 应答解析（含逐通道错误码与传感器数组）
//! - `liquid`: 液体类别校正曲线
//!
//! ## 线格式
//!
//! 指令为单行 ASCII 文本：2 字符模块码 + 2 字符指令码 + 字面量 `id` +
//! 4 位单调递增序号 + 字段体。含逐通道数组的字段体用 `&` 分隔字段、
//! 空格分隔通道 token；纯单值字段体直接连接。

pub mod command;
pub mod fields;
pub mod ids;
pub mod liquid;
pub mod response;
pub mod units;

// 重新导出常用类型
pub use command::{ChannelPattern, FirmwareCommand, Value};
pub use fields::{CommandSpec, FieldScope, FieldSpec, Unit, command_spec};
pub use ids::*;
pub use liquid::LiquidClass;
pub use response::{ChannelErrorCode, DeviceFault, FirmwareResponse, SensorField};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 指令表中不存在该 (模块, 指令) 组合
    #[error("Unknown command: {module}{code}")]
    UnknownCommand { module: String, code: String },

    /// 字段不属于该指令的字段表
    #[error("Unknown field tag '{tag}' for command {module}{code}")]
    UnknownField {
        module: String,
        code: String,
        tag: String,
    },

    /// 单值字段收到逐通道数组，或反之
    #[error("Field '{tag}' scope mismatch: expected {expected}")]
    ScopeMismatch { tag: &'static str, expected: &'static str },

    /// 逐通道数组长度超过通道槽数量
    #[error("Field '{tag}' carries {got} channel tokens, frame has {slots} slots")]
    ChannelOverflow {
        tag: &'static str,
        got: usize,
        slots: usize,
    },

    /// 数值在定点转换后超出字段宽度
    #[error("Value {value} does not fit field '{tag}' (width {width})")]
    FieldOverflow {
        tag: &'static str,
        value: f64,
        width: usize,
    },

    /// 数值为负或非有限值
    #[error("Invalid numeric value for field '{tag}': {value}")]
    InvalidValue { tag: &'static str, value: f64 },

    /// 应答文本不符合语法
    #[error("Malformed response: {reason} in {raw:?}")]
    Malformed { reason: &'static str, raw: String },

    /// 应答序号与在途指令不匹配
    #[error("Response id {got:04} does not match outstanding command id {expected:04}")]
    IdMismatch { expected: u16, got: u16 },

    /// 液体类别校正曲线不合法
    #[error("Invalid liquid class curve: {reason}")]
    InvalidCurve { reason: &'static str },
}
