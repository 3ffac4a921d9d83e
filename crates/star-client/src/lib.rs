//! # Star Client
//!
//! 面向调用方的会话 API：通道状态跟踪 + 指令往返
//!
//! ## 模块
//!
//! - `channels`: 通道状态机（空 / 带吸头 / 带液 / 未知）与操作前校验
//! - `config`: 会话配置
//! - `session`: 串行化会话：编码、发送、按序号关联应答、逐通道提交
//!
//! ## 所有权模型
//!
//! 物理设备的通道状态是全局可变状态。这里把它显式建模为
//! [`channels::ChannelBank`]，由唯一的 [`session::StarSession`] 独占
//! 持有；跨线程共享通过 [`session::SharedSession`]
//! （`Arc<parking_lot::Mutex<_>>`）串行化，绝不搞环境全局量；
//! 注入 mock 传输即可对精确的线上字符串做断言。

pub mod channels;
pub mod config;
pub mod session;

// 重新导出常用类型
pub use channels::{ChannelBank, ChannelError, ChannelState};
pub use config::SessionConfig;
pub use session::{SharedSession, StarSession};

use semver::Version;
use star_deck::DeckError;
use star_protocol::{DeviceFault, ProtocolError};
use star_serial::SerialError;
use thiserror::Error;

/// 客户端错误类型
///
/// 台面/通道错误在任何字节发出前报告，设备状态未被触碰；
/// 设备/协议错误在往返之后报告，并携带逐通道细节。
#[derive(Error, Debug)]
pub enum ClientError {
    /// 台面布局或地址解析错误（发送前）
    #[error("Deck error: {0}")]
    Deck(#[from] DeckError),

    /// 通道状态校验错误（发送前）
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// 协议编码/解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 传输层错误（超时除外）
    #[error("Transport error: {0}")]
    Serial(#[from] SerialError),

    /// 设备报告的逐通道错误（聚合，不吞部分失败）
    #[error("Device reported {} channel fault(s)", .0.len())]
    Device(Vec<DeviceFault>),

    /// 限时内无应答
    ///
    /// 发出后的线上失败在软件边界上是歧义的：操作可能已经发生。
    /// 受影响通道进入未知态，直到显式 `resync`。
    #[error("Response timeout; affected channel state is unknown until resync")]
    Timeout,

    /// 操作入参形状不合法（孔位数与体积数不一致等）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 吸头架该孔位的吸头已被取走
    #[error("No tip left at {resource}/{well}")]
    TipsSpent { resource: String, well: String },

    /// 固件版本低于最低要求
    #[error("Firmware {found} is older than required {required}")]
    FirmwareTooOld { found: Version, required: Version },

    /// 固件版本文本不可解析
    #[error("Unparseable firmware version: {0:?}")]
    FirmwareVersion(String),
}

impl ClientError {
    /// 错误是否发生在任何字节发出之前（纯校验失败，可安全重试）
    pub fn is_pre_wire(&self) -> bool {
        matches!(
            self,
            ClientError::Deck(_)
                | ClientError::Channel(_)
                | ClientError::InvalidInput(_)
                | ClientError::TipsSpent { .. }
        )
    }
}
