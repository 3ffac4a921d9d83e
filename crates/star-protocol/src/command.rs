//! 指令构建与编码
//!
//! `FirmwareCommand` 按字段表组装一条指令并序列化为单行 ASCII。
//! 编码规则：
//!
//! - 头部：`<模块:2><指令:2>id<序号:4>`，序号 4 位零填充、会话内
//!   单调递增、模 10000 回绕。
//! - 字段体含逐通道字段时，所有字段以 `&` 分隔，通道 token 以单个
//!   空格分隔；纯单值字段体直接连接。
//! - 逐通道字段始终携带满帧 token 数（通道槽数量），非活动槽为
//!   同宽度全零哨兵。

use crate::ProtocolError;
use crate::fields::{CommandSpec, FieldScope, FieldSpec, command_spec};
use crate::ids::{ID_LITERAL, SEQUENCE_MODULUS};
use smallvec::SmallVec;

/// 通道选择模式
///
/// 记录固定通道帧中哪些槽参与本次操作。独立于各字段的零填充存在，
/// 因为部分字段对所有槽都是强制的。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPattern {
    flags: SmallVec<[bool; 8]>,
}

impl ChannelPattern {
    /// 创建全非活动模式
    pub fn none(slots: usize) -> Self {
        Self {
            flags: SmallVec::from_elem(false, slots),
        }
    }

    /// 由活动槽索引集合创建（0 基）
    pub fn from_active(slots: usize, active: &[usize]) -> Self {
        let mut pattern = Self::none(slots);
        for &idx in active {
            if idx < slots {
                pattern.flags[idx] = true;
            }
        }
        pattern
    }

    /// 通道槽总数
    pub fn slots(&self) -> usize {
        self.flags.len()
    }

    /// 活动槽数量
    pub fn active_count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// 指定槽是否活动
    pub fn is_active(&self, slot: usize) -> bool {
        self.flags.get(slot).copied().unwrap_or(false)
    }

    /// 按序迭代活动槽索引
    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f)
            .map(|(i, _)| i)
    }

    /// 掩码字段的逐槽标志值（供 `tm` 字段编码）
    pub fn as_flags(&self) -> SmallVec<[f64; 8]> {
        self.flags.iter().map(|&f| f as u8 as f64).collect()
    }
}

/// 字段值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 单值字段
    Single(f64),
    /// 逐通道字段（按槽序；长度不足以零补齐）
    PerChannel(SmallVec<[f64; 8]>),
}

/// 一条待编码的固件指令
#[derive(Debug, Clone)]
pub struct FirmwareCommand {
    spec: &'static CommandSpec,
    seq: u16,
    values: Vec<(&'static str, Value)>,
}

impl FirmwareCommand {
    /// 按 (模块, 指令) 创建指令
    ///
    /// 序号按 `SEQUENCE_MODULUS` 回绕。
    pub fn new(module: &str, code: &str, seq: u16) -> Result<Self, ProtocolError> {
        let spec = command_spec(module, code).ok_or_else(|| ProtocolError::UnknownCommand {
            module: module.to_string(),
            code: code.to_string(),
        })?;
        Ok(Self {
            spec,
            seq: seq % SEQUENCE_MODULUS,
            values: Vec::new(),
        })
    }

    /// 指令规格
    pub fn spec(&self) -> &'static CommandSpec {
        self.spec
    }

    /// 会话序号
    pub fn seq(&self) -> u16 {
        self.seq
    }

    /// 设置单值字段
    pub fn single(mut self, tag: &str, value: f64) -> Result<Self, ProtocolError> {
        let field = self.lookup(tag)?;
        if field.scope != FieldScope::Single {
            return Err(ProtocolError::ScopeMismatch {
                tag: field.tag,
                expected: "per-channel array",
            });
        }
        self.values.push((field.tag, Value::Single(value)));
        Ok(self)
    }

    /// 设置逐通道字段
    pub fn per_channel(
        mut self,
        tag: &str,
        values: impl IntoIterator<Item = f64>,
    ) -> Result<Self, ProtocolError> {
        let field = self.lookup(tag)?;
        if field.scope != FieldScope::PerChannel {
            return Err(ProtocolError::ScopeMismatch {
                tag: field.tag,
                expected: "single value",
            });
        }
        let collected: SmallVec<[f64; 8]> = values.into_iter().collect();
        self.values.push((field.tag, Value::PerChannel(collected)));
        Ok(self)
    }

    /// 设置通道掩码字段（`tm`）
    pub fn pattern(self, tag: &str, pattern: &ChannelPattern) -> Result<Self, ProtocolError> {
        self.per_channel(tag, pattern.as_flags())
    }

    fn lookup(&self, tag: &str) -> Result<&'static FieldSpec, ProtocolError> {
        self.spec
            .field(tag)
            .ok_or_else(|| ProtocolError::UnknownField {
                module: self.spec.module.to_string(),
                code: self.spec.code.to_string(),
                tag: tag.to_string(),
            })
    }

    fn provided(&self, tag: &str) -> Option<&Value> {
        // 后设置的值覆盖先前的
        self.values
            .iter()
            .rev()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v)
    }

    /// 编码为单行 ASCII 指令
    ///
    /// `slots` 为设备通道帧宽度；逐通道字段一律填满该宽度。
    /// 未显式提供的字段按字段表省缺值编码。
    pub fn encode(&self, slots: usize) -> Result<String, ProtocolError> {
        let mut out = format!(
            "{}{}{}{:04}",
            self.spec.module, self.spec.code, ID_LITERAL, self.seq
        );

        let mut rendered = Vec::with_capacity(self.spec.fields.len());
        for field in self.spec.fields {
            rendered.push(self.encode_field(field, slots)?);
        }
        if self.spec.has_per_channel() {
            out.push_str(&rendered.join("&"));
        } else {
            for field_text in &rendered {
                out.push_str(field_text);
            }
        }
        Ok(out)
    }

    fn encode_field(&self, field: &FieldSpec, slots: usize) -> Result<String, ProtocolError> {
        let mut text = String::from(field.tag);
        match field.scope {
            FieldScope::Single => {
                let value = match self.provided(field.tag) {
                    Some(Value::Single(v)) => *v,
                    None => field.default,
                    Some(Value::PerChannel(_)) => {
                        return Err(ProtocolError::ScopeMismatch {
                            tag: field.tag,
                            expected: "single value",
                        });
                    },
                };
                text.push_str(&field.encode_token(value)?);
            },
            FieldScope::PerChannel => {
                let values: SmallVec<[f64; 8]> = match self.provided(field.tag) {
                    Some(Value::PerChannel(vs)) => {
                        if vs.len() > slots {
                            return Err(ProtocolError::ChannelOverflow {
                                tag: field.tag,
                                got: vs.len(),
                                slots,
                            });
                        }
                        let mut padded = vs.clone();
                        padded.resize(slots, 0.0);
                        padded
                    },
                    None => SmallVec::from_elem(field.default, slots),
                    Some(Value::Single(_)) => {
                        return Err(ProtocolError::ScopeMismatch {
                            tag: field.tag,
                            expected: "per-channel array",
                        });
                    },
                };
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        text.push(' ');
                    }
                    text.push_str(&field.encode_token(*v)?);
                }
            },
        }
        Ok(text)
    }
}
