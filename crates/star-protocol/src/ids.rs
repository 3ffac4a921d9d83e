//! 模块代码与指令代码常量定义
//!
//! STAR 系列固件按硬件模块划分指令空间，每个模块用 2 字符 ASCII
//! 代码寻址。本 SDK 只实现移液模块（`C0`）的指令子集。

/// 移液模块（8/16 通道移液臂）
pub const MODULE_PIPETTING: &str = "C0";

// ============================================================================
// 移液模块指令代码
// ============================================================================

/// 吸头类型定义（单值字段：几何尺寸与额定容量）
pub const CMD_TIP_TYPE: &str = "TT";

/// 拾取吸头
pub const CMD_TIP_PICK_UP: &str = "TP";

/// 丢弃吸头（应答携带 `kz`/`vz` 传感器数组）
pub const CMD_TIP_DISCARD: &str = "TR";

/// 吸液
pub const CMD_ASPIRATE: &str = "AS";

/// 排液
pub const CMD_DISPENSE: &str = "DS";

/// 固件版本查询（应答携带版本文本）
pub const CMD_REQUEST_FIRMWARE: &str = "RF";

/// 吸头在位查询（应答携带 `rt` 逐槽标志数组）
pub const CMD_QUERY_TIP_PRESENCE: &str = "QT";

/// 序号字段字面量前缀
pub const ID_LITERAL: &str = "id";

/// 序号取值空间（4 位十进制，回绕）
pub const SEQUENCE_MODULUS: u16 = 10_000;

/// 应答错误码字段标签
pub const ERROR_FIELD_TAG: &str = "er";
