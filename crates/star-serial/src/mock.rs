//! Mock 传输后端
//!
//! 无硬件测试用：测试侧通过 `MockController` 预置应答脚本并取回
//! 实际写出的指令文本，断言精确的线上字符串。

use crate::{SerialError, TransportAdapter};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Mock 传输
pub struct MockTransport {
    responses: Receiver<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

/// 测试侧控制句柄
#[derive(Clone)]
pub struct MockController {
    responses: Sender<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// 创建 mock 传输与其控制句柄
    pub fn new() -> (Self, MockController) {
        let (tx, rx) = unbounded();
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                responses: rx,
                sent: Arc::clone(&sent),
            },
            MockController {
                responses: tx,
                sent,
            },
        )
    }
}

impl TransportAdapter for MockTransport {
    fn send(&mut self, command: &str) -> Result<(), SerialError> {
        self.sent.lock().push(command.to_string());
        Ok(())
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<String, SerialError> {
        match self.responses.recv_timeout(timeout) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => Err(SerialError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(SerialError::Closed),
        }
    }
}

impl MockController {
    /// 预置一条应答
    pub fn push_response(&self, line: impl Into<String>) {
        // unbounded 通道，send 仅在接收端析构后失败；测试中直接忽略
        let _ = self.responses.send(line.into());
    }

    /// 写出过的全部指令（按发送顺序）
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// 取出并清空已发送指令
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// 最后一条写出的指令
    pub fn last_sent(&self) -> Option<String> {
        self.sent.lock().last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_is_recorded() {
        let (mut transport, controller) = MockTransport::new();
        transport.send("C0RFid0001").unwrap();
        transport.send("C0QTid0002").unwrap();
        assert_eq!(controller.sent(), vec!["C0RFid0001", "C0QTid0002"]);
        assert_eq!(controller.last_sent().as_deref(), Some("C0QTid0002"));
        assert_eq!(controller.take_sent().len(), 2);
        assert!(controller.sent().is_empty());
    }

    #[test]
    fn test_scripted_responses_in_order() {
        let (mut transport, controller) = MockTransport::new();
        controller.push_response("C0RFid0001er00rf4.3.0");
        controller.push_response("C0QTid0002er00rt0 0 0 0 0 0 0 0");
        assert_eq!(
            transport.receive_timeout(Duration::from_millis(10)).unwrap(),
            "C0RFid0001er00rf4.3.0"
        );
        assert!(
            transport
                .receive_timeout(Duration::from_millis(10))
                .unwrap()
                .starts_with("C0QTid0002")
        );
    }

    #[test]
    fn test_empty_script_times_out() {
        let (mut transport, _controller) = MockTransport::new();
        assert!(matches!(
            transport.receive_timeout(Duration::from_millis(5)),
            Err(SerialError::Timeout)
        ));
        assert!(transport.try_receive().unwrap().is_none());
    }

    #[test]
    fn test_dropped_controller_closes_transport() {
        let (mut transport, controller) = MockTransport::new();
        drop(controller);
        assert!(matches!(
            transport.receive_timeout(Duration::from_millis(5)),
            Err(SerialError::Closed)
        ));
    }
}
