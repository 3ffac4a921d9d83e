//! # Star SDK
//!
//! STAR 系列液体处理工作站控制 SDK 的统一入口。
//!
//! ## 分层
//!
//! ```text
//! star-sdk      统一导出 + 日志初始化
//!   star-client   会话 / 通道状态跟踪
//!     star-deck     台面布局 / 坐标解析
//!     star-protocol 固件文本语法编解码
//!     star-serial   传输抽象（mock / 实机后端）
//! ```
//!
//! ## 快速上手
//!
//! ```no_run
//! use star_sdk::prelude::*;
//!
//! # struct UsbTransport;
//! # impl star_sdk::TransportAdapter for UsbTransport {
//! #     fn send(&mut self, _: &str) -> Result<(), star_sdk::SerialError> { Ok(()) }
//! #     fn receive_timeout(
//! #         &mut self,
//! #         _: std::time::Duration,
//! #     ) -> Result<String, star_sdk::SerialError> {
//! #         Err(star_sdk::SerialError::Timeout)
//! #     }
//! # }
//! # fn main() -> Result<(), star_sdk::ClientError> {
//! star_sdk::init_logging();
//!
//! let mut deck = Deck::new();
//! deck.assign_carrier(catalog::tip_carrier("tip_car"), Some(3))?;
//! deck.assign_labware(
//!     "tip_car",
//!     0,
//!     catalog::tip_rack("tips_01", TipType::high_volume_filtered()),
//! )?;
//!
//! # let transport = UsbTransport;
//! let mut session = StarSession::new(transport, deck, SessionConfig::default());
//! session.connect()?;
//! session.pick_up_tips("tips_01/A1:C1")?;
//! # Ok(())
//! # }
//! ```

pub use star_client::{
    ChannelBank, ChannelError, ChannelState, ClientError, SessionConfig, SharedSession,
    StarSession,
};
pub use star_deck::{
    CarrierDef, Coordinate, Deck, DeckError, GridSpec, LabwareDef, ResolvedSite, ResourceKind,
    TipType, WellAddress, WellRange, catalog,
};
pub use star_protocol::{
    ChannelErrorCode, ChannelPattern, DeviceFault, FirmwareCommand, FirmwareResponse,
    LiquidClass, ProtocolError,
};
pub use star_serial::{SerialError, TransportAdapter};

#[cfg(feature = "mock")]
pub use star_serial::{MockController, MockTransport};

/// 常用类型一揽子导入
pub mod prelude {
    pub use crate::{
        ChannelState, ClientError, Deck, LiquidClass, SessionConfig, StarSession, TipType,
        TransportAdapter, catalog,
    };
}

/// 初始化 tracing 日志（含 log 桥接）
///
/// 过滤级别取 `RUST_LOG` 环境变量，缺省 `info`。重复调用安全：
/// 后续调用不覆盖已装好的订阅器。
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
