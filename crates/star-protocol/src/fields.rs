//! 声明式字段表
//!
//! 固件指令语法历史上按模块逐条生长为位置相关的字段语法。这里把
//! (模块, 指令) → 有序字段规格建成静态数据表：新指令是新表项，
//! 不是新代码路径。编码器只按表驱动工作。

use crate::ProtocolError;
use crate::ids::*;
use crate::units::{mm_to_submm, round_half_up, ul_to_subul};

/// 字段作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// 整条指令一个值
    Single,
    /// 每个通道槽一个 token（非活动槽填同宽度全零哨兵）
    PerChannel,
}

/// 字段数值单位
///
/// 逻辑层统一使用 f64（毫米 / 微升 / 原始计数），编码时按单位转换
/// 为设备原生整数子单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// 0.1 mm 子单位
    TenthMillimeter,
    /// 0.1 µL 子单位
    TenthMicroliter,
    /// 布尔标志（0/1）
    Flag,
    /// 无量纲整数（索引、枚举值）
    Raw,
}

/// 单个字段规格
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// 字段标签（短字母代码）
    pub tag: &'static str,
    /// token 十进制宽度（零填充）
    pub width: usize,
    /// 作用域
    pub scope: FieldScope,
    /// 单位
    pub unit: Unit,
    /// 省缺值（逻辑单位）；未显式提供的字段按此编码
    pub default: f64,
}

impl FieldSpec {
    const fn single(tag: &'static str, width: usize, unit: Unit) -> Self {
        Self {
            tag,
            width,
            scope: FieldScope::Single,
            unit,
            default: 0.0,
        }
    }

    const fn per_channel(tag: &'static str, width: usize, unit: Unit) -> Self {
        Self {
            tag,
            width,
            scope: FieldScope::PerChannel,
            unit,
            default: 0.0,
        }
    }

    /// 把一个逻辑值编码为该字段的定宽 token
    pub fn encode_token(&self, value: f64) -> Result<String, ProtocolError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ProtocolError::InvalidValue {
                tag: self.tag,
                value,
            });
        }
        let raw: i64 = match self.unit {
            Unit::TenthMillimeter => mm_to_submm(value),
            Unit::TenthMicroliter => ul_to_subul(value),
            Unit::Flag => (value != 0.0) as i64,
            Unit::Raw => round_half_up(value) as i64,
        };
        let limit = 10_i64.pow(self.width as u32);
        if raw >= limit {
            return Err(ProtocolError::FieldOverflow {
                tag: self.tag,
                value,
                width: self.width,
            });
        }
        Ok(format!("{:0width$}", raw, width = self.width))
    }
}

/// 一条指令的完整规格
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// 2 字符模块码
    pub module: &'static str,
    /// 2 字符指令码
    pub code: &'static str,
    /// 有序字段表（编码顺序即此顺序）
    pub fields: &'static [FieldSpec],
}

impl CommandSpec {
    /// 查找字段规格
    pub fn field(&self, tag: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// 字段体中是否含逐通道字段（决定 `&` 分隔规则）
    pub fn has_per_channel(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.scope == FieldScope::PerChannel)
    }
}

// ============================================================================
// 移液模块指令表
// ============================================================================

/// TT — 吸头类型定义
///
/// 纯单值字段体，直接连接：`tt01tf1tl0871tv12500tg3tu0`
const TIP_TYPE_FIELDS: &[FieldSpec] = &[
    // 吸头类型索引（设备内部表位）
    FieldSpec::single("tt", 2, Unit::Raw),
    // 是否带滤芯
    FieldSpec::single("tf", 1, Unit::Flag),
    // 吸头长度
    FieldSpec::single("tl", 4, Unit::TenthMillimeter),
    // 额定容量
    FieldSpec::single("tv", 5, Unit::TenthMicroliter),
    // 尺寸档位
    FieldSpec::single("tg", 1, Unit::Raw),
    // 拾取方式
    FieldSpec::single("tu", 1, Unit::Raw),
];

/// TP — 拾取吸头
const TIP_PICK_UP_FIELDS: &[FieldSpec] = &[
    FieldSpec::per_channel("xp", 5, Unit::TenthMillimeter),
    FieldSpec::per_channel("yp", 4, Unit::TenthMillimeter),
    // 通道选择掩码
    FieldSpec::per_channel("tm", 1, Unit::Flag),
    // 吸头类型索引（须先以 TT 定义）
    FieldSpec::single("tt", 2, Unit::Raw),
    // 拾取起始 z
    FieldSpec::single("tp", 4, Unit::TenthMillimeter),
    // 拾取终止 z
    FieldSpec::single("tz", 4, Unit::TenthMillimeter),
    // 巡航高度
    FieldSpec::single("th", 4, Unit::TenthMillimeter),
    // 拾取模式
    FieldSpec::single("td", 1, Unit::Raw),
];

/// TR — 丢弃吸头
const TIP_DISCARD_FIELDS: &[FieldSpec] = &[
    FieldSpec::per_channel("xp", 5, Unit::TenthMillimeter),
    FieldSpec::per_channel("yp", 4, Unit::TenthMillimeter),
    FieldSpec::per_channel("tm", 1, Unit::Flag),
    FieldSpec::single("tp", 4, Unit::TenthMillimeter),
    FieldSpec::single("tz", 4, Unit::TenthMillimeter),
    FieldSpec::single("th", 4, Unit::TenthMillimeter),
    // 丢弃方式（0 = 固定位置，1 = 随动）
    FieldSpec::single("ti", 1, Unit::Raw),
];

/// AS — 吸液
///
/// 参考样式：`C0ASid0006at0&tm1 1 1 0&xp02980 02980 02980 00000&...`
const ASPIRATE_FIELDS: &[FieldSpec] = &[
    // 吸液类型（0 = 普通，1 = 连续，2 = 空气）
    FieldSpec::single("at", 1, Unit::Raw),
    FieldSpec::per_channel("tm", 1, Unit::Flag),
    FieldSpec::per_channel("xp", 5, Unit::TenthMillimeter),
    FieldSpec::per_channel("yp", 4, Unit::TenthMillimeter),
    // 巡航高度
    FieldSpec::single("th", 4, Unit::TenthMillimeter),
    // 下降终止高度
    FieldSpec::single("te", 4, Unit::TenthMillimeter),
    // 液面探测模式
    FieldSpec::single("lm", 1, Unit::Raw),
    // 液面 z（逐通道，探测关闭时为命令值）
    FieldSpec::per_channel("zl", 4, Unit::TenthMillimeter),
    // 液面跟随距离
    FieldSpec::single("po", 4, Unit::TenthMillimeter),
    // 吸液体积（已按液体类别校正）
    FieldSpec::per_channel("av", 5, Unit::TenthMicroliter),
    // 吸液速度
    FieldSpec::single("as", 4, Unit::TenthMicroliter),
    // 运输空气体积
    FieldSpec::single("ta", 3, Unit::TenthMicroliter),
    // 前导空气体积
    FieldSpec::single("ba", 4, Unit::TenthMicroliter),
    // 过吸体积
    FieldSpec::single("oa", 4, Unit::TenthMicroliter),
];

/// DS — 排液
const DISPENSE_FIELDS: &[FieldSpec] = &[
    // 排液模式（0 = 射流，1 = 贴壁，2 = 液面下）
    FieldSpec::single("dm", 1, Unit::Raw),
    FieldSpec::per_channel("tm", 1, Unit::Flag),
    FieldSpec::per_channel("xp", 5, Unit::TenthMillimeter),
    FieldSpec::per_channel("yp", 4, Unit::TenthMillimeter),
    // 排液 z（逐通道）
    FieldSpec::per_channel("zx", 4, Unit::TenthMillimeter),
    // 液面探测模式
    FieldSpec::single("lm", 1, Unit::Raw),
    // 液面跟随距离
    FieldSpec::single("po", 4, Unit::TenthMillimeter),
    // 排液体积（已按液体类别校正）
    FieldSpec::per_channel("dv", 5, Unit::TenthMicroliter),
    // 排液速度
    FieldSpec::single("ds", 4, Unit::TenthMicroliter),
    // 停止速度档
    FieldSpec::single("ss", 1, Unit::Raw),
    // 残留吹出体积
    FieldSpec::single("rv", 4, Unit::TenthMicroliter),
    // 运输空气体积
    FieldSpec::single("ta", 3, Unit::TenthMicroliter),
    // 前导空气体积
    FieldSpec::single("ba", 4, Unit::TenthMicroliter),
];

/// RF / QT — 无字段查询指令
const EMPTY_FIELDS: &[FieldSpec] = &[];

/// 移液模块全部指令规格
pub const PIPETTING_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        module: MODULE_PIPETTING,
        code: CMD_TIP_TYPE,
        fields: TIP_TYPE_FIELDS,
    },
    CommandSpec {
        module: MODULE_PIPETTING,
        code: CMD_TIP_PICK_UP,
        fields: TIP_PICK_UP_FIELDS,
    },
    CommandSpec {
        module: MODULE_PIPETTING,
        code: CMD_TIP_DISCARD,
        fields: TIP_DISCARD_FIELDS,
    },
    CommandSpec {
        module: MODULE_PIPETTING,
        code: CMD_ASPIRATE,
        fields: ASPIRATE_FIELDS,
    },
    CommandSpec {
        module: MODULE_PIPETTING,
        code: CMD_DISPENSE,
        fields: DISPENSE_FIELDS,
    },
    CommandSpec {
        module: MODULE_PIPETTING,
        code: CMD_REQUEST_FIRMWARE,
        fields: EMPTY_FIELDS,
    },
    CommandSpec {
        module: MODULE_PIPETTING,
        code: CMD_QUERY_TIP_PRESENCE,
        fields: EMPTY_FIELDS,
    },
];

/// 按 (模块, 指令) 查找指令规格
pub fn command_spec(module: &str, code: &str) -> Option<&'static CommandSpec> {
    PIPETTING_COMMANDS
        .iter()
        .find(|spec| spec.module == module && spec.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(command_spec("C0", "AS").is_some());
        assert!(command_spec("C0", "XX").is_none());
        assert!(command_spec("X1", "AS").is_none());
    }

    #[test]
    fn test_encode_token_widths() {
        let spec = command_spec("C0", "TT").unwrap();
        let tl = spec.field("tl").unwrap();
        assert_eq!(tl.encode_token(87.1).unwrap(), "0871");
        let tv = spec.field("tv").unwrap();
        assert_eq!(tv.encode_token(1250.0).unwrap(), "12500");
    }

    #[test]
    fn test_encode_token_overflow() {
        let spec = command_spec("C0", "TT").unwrap();
        let tg = spec.field("tg").unwrap();
        assert!(matches!(
            tg.encode_token(10.0),
            Err(ProtocolError::FieldOverflow { .. })
        ));
    }

    #[test]
    fn test_encode_token_rejects_negative_and_nan() {
        let spec = command_spec("C0", "AS").unwrap();
        let av = spec.field("av").unwrap();
        assert!(matches!(
            av.encode_token(-1.0),
            Err(ProtocolError::InvalidValue { .. })
        ));
        assert!(matches!(
            av.encode_token(f64::NAN),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_flag_unit() {
        let spec = command_spec("C0", "AS").unwrap();
        let tm = spec.field("tm").unwrap();
        assert_eq!(tm.encode_token(1.0).unwrap(), "1");
        assert_eq!(tm.encode_token(0.0).unwrap(), "0");
    }

    #[test]
    fn test_per_channel_detection() {
        assert!(command_spec("C0", "AS").unwrap().has_per_channel());
        assert!(!command_spec("C0", "TT").unwrap().has_per_channel());
        assert!(!command_spec("C0", "RF").unwrap().has_per_channel());
    }
}
