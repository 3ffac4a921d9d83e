//! # Star Serial
//!
//! 传输层抽象。核心协议栈从不持有具体传输：它只要求"把一行指令
//! 写出去"和"在限时内读回一行应答"两个操作，其余（USB 枚举、
//! 波特率、帧边界）都属于传输实现的职责。
//!
//! 应答允许乱序到达：只要携带序号，上层自行做关联。

use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockController, MockTransport};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Transport closed")]
    Closed,
    #[error("Device not connected")]
    NotConnected,
}

impl SerialError {
    /// 是否为限时内无应答
    pub fn is_timeout(&self) -> bool {
        matches!(self, SerialError::Timeout)
    }
}

/// 传输适配器
///
/// 实现者保证：`send` 在底层通道接受全部字节前可以阻塞；
/// `receive_timeout` 返回完整的单行应答（不含行结束符）。
pub trait TransportAdapter {
    /// 写出一行指令
    fn send(&mut self, command: &str) -> Result<(), SerialError>;

    /// 在限时内读回一行应答
    fn receive_timeout(&mut self, timeout: Duration) -> Result<String, SerialError>;

    /// 非阻塞读取
    fn try_receive(&mut self) -> Result<Option<String>, SerialError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(line) => Ok(Some(line)),
            Err(SerialError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
