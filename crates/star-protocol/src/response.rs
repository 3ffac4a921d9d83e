//! 应答解析
//!
//! 应答回显指令的模块码、指令码与序号，随后是逐通道错误码字段
//! `er`（每个**活动**通道一个 2 位十进制码，`/` 分隔，`00` 为无错），
//! 以及零个或多个传感器数组字段（每个通道槽一个读数，空格分隔）：
//!
//! ```text
//! C0ASid0006er00/00
//! C0TRid0010er00/00kz381 356 365 000 000 000 000 000vz303 360 368 000 000 000 000 000
//! C0RFid0012er00rf4.3.0
//! ```
//!
//! 传感器数组只对产生它们的指令有意义（吸头丢弃传感、液面探测）。

use crate::ProtocolError;
use crate::command::ChannelPattern;
use crate::ids::{ERROR_FIELD_TAG, ID_LITERAL};
use num_enum::FromPrimitive;
use smallvec::SmallVec;

/// 逐通道固件错误码
///
/// 未知码保留原始值，不丢弃（固件版本间的码表并不封闭）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum ChannelErrorCode {
    /// 无错误
    NoError = 0,
    /// 指令语法错误
    WrongCommand = 1,
    /// 参数超出范围
    WrongParameter = 2,
    /// 驱动器未初始化
    NotInitialized = 5,
    /// 检测到凝块
    ClotDetected = 70,
    /// 液量不足（液面探测未达到指令体积）
    InsufficientLiquid = 71,
    /// 吸头丢失
    TipLost = 72,
    /// 负压超限
    Underpressure = 73,
    /// 正压超限
    Overpressure = 74,
    /// 通道上已有吸头
    TipAlreadyFitted = 75,
    /// 通道上没有吸头
    NoTipFitted = 76,
    /// 其余码表外的值
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl ChannelErrorCode {
    /// 是否为成功码
    pub fn is_ok(&self) -> bool {
        matches!(self, ChannelErrorCode::NoError)
    }
}

/// 单个通道的设备错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFault {
    /// 通道槽索引（0 基）
    pub channel: usize,
    /// 解析后的错误码
    pub code: ChannelErrorCode,
    /// 原始 2 位码
    pub raw: u8,
}

impl std::fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel {}: {:?} ({:02})", self.channel, self.code, self.raw)
    }
}

/// 传感器数组字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorField {
    /// 字段标签（如 `kz`、`vz`、`rt`）
    pub tag: String,
    /// 逐槽读数（满帧宽度）
    pub values: SmallVec<[i64; 8]>,
}

/// 已解析的固件应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareResponse {
    /// 回显模块码
    pub module: String,
    /// 回显指令码
    pub code: String,
    /// 回显序号
    pub seq: u16,
    /// 逐活动通道错误码（原始 2 位值）
    pub errors: SmallVec<[u8; 8]>,
    /// 传感器数组字段
    pub sensors: Vec<SensorField>,
    /// 文本负载（固件版本查询应答的 `rf` 字段）
    pub text: Option<String>,
    /// 原始应答文本（诊断用）
    pub raw: String,
}

impl FirmwareResponse {
    /// 解析单行应答
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let line = raw.trim_end_matches(['\r', '\n']);
        let malformed = |reason: &'static str| ProtocolError::Malformed {
            reason,
            raw: line.to_string(),
        };

        if !line.is_ascii() {
            return Err(malformed("non-ASCII response"));
        }
        let bytes = line.as_bytes();
        if bytes.len() < 12 {
            return Err(malformed("response shorter than header"));
        }
        if &line[4..6] != ID_LITERAL {
            return Err(malformed("missing id literal"));
        }
        let module = line[0..2].to_string();
        let code = line[2..4].to_string();
        let seq: u16 = line[6..10]
            .parse()
            .map_err(|_| malformed("non-numeric sequence number"))?;

        let mut rest = &line[10..];
        if !rest.starts_with(ERROR_FIELD_TAG) {
            return Err(malformed("missing error field"));
        }
        rest = &rest[2..];

        // 错误码列表：2 位码，'/' 分隔
        let mut errors: SmallVec<[u8; 8]> = SmallVec::new();
        loop {
            if rest.len() < 2 || !rest.as_bytes()[..2].iter().all(u8::is_ascii_digit) {
                return Err(malformed("truncated error code"));
            }
            let code_val: u8 = rest[..2]
                .parse()
                .map_err(|_| malformed("invalid error code"))?;
            errors.push(code_val);
            rest = &rest[2..];
            match rest.as_bytes().first() {
                Some(b'/') => rest = &rest[1..],
                _ => break,
            }
        }

        // 传感器数组字段：2 字母标签 + 空格分隔的整数读数
        let mut sensors = Vec::new();
        let mut text = None;
        while !rest.is_empty() {
            if rest.len() < 2 || !rest.as_bytes()[..2].iter().all(u8::is_ascii_alphabetic) {
                return Err(malformed("invalid sensor field tag"));
            }
            let tag = rest[..2].to_string();
            rest = &rest[2..];

            if tag == "rf" {
                // 版本文本占据行尾
                text = Some(rest.to_string());
                rest = "";
                break;
            }

            let mut values: SmallVec<[i64; 8]> = SmallVec::new();
            loop {
                let digits = rest
                    .as_bytes()
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits == 0 {
                    return Err(malformed("sensor field without readings"));
                }
                let value: i64 = rest[..digits]
                    .parse()
                    .map_err(|_| malformed("invalid sensor reading"))?;
                values.push(value);
                rest = &rest[digits..];
                // 空格后跟数字则同一字段继续，否则下一个字段开始
                if rest.starts_with(' ')
                    && rest.as_bytes().get(1).is_some_and(u8::is_ascii_digit)
                {
                    rest = &rest[1..];
                } else {
                    break;
                }
            }
            sensors.push(SensorField { tag, values });
        }

        Ok(Self {
            module,
            code,
            seq,
            errors,
            sensors,
            text,
            raw: line.to_string(),
        })
    }

    /// 校验应答序号与在途指令匹配
    pub fn correlate(&self, expected: u16) -> Result<(), ProtocolError> {
        if self.seq != expected {
            return Err(ProtocolError::IdMismatch {
                expected,
                got: self.seq,
            });
        }
        Ok(())
    }

    /// 按标签查找传感器数组
    pub fn sensor(&self, tag: &str) -> Option<&SensorField> {
        self.sensors.iter().find(|s| s.tag == tag)
    }

    /// 聚合活动通道的设备错误
    ///
    /// 错误码按活动通道顺序与 `pattern` 对齐（码 i ↔ 第 i 个活动槽）。
    /// 一次性返回**全部**失败通道，而非首个：调用方需要完整图景来
    /// 决定逐通道补救。码数量与活动通道数不一致视为协议错误。
    pub fn faults(&self, pattern: &ChannelPattern) -> Result<Vec<DeviceFault>, ProtocolError> {
        if self.errors.len() != pattern.active_count() {
            return Err(ProtocolError::Malformed {
                reason: "error code count does not match active channels",
                raw: self.raw.clone(),
            });
        }
        Ok(pattern
            .active_slots()
            .zip(self.errors.iter())
            .filter(|&(_, &raw)| raw != 0)
            .map(|(channel, &raw)| DeviceFault {
                channel,
                code: ChannelErrorCode::from(raw),
                raw,
            })
            .collect())
    }
}
