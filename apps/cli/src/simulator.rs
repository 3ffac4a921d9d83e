//! 设备仿真传输
//!
//! 干跑用：对每条发出的指令立即回一条全部成功的应答，序号回显、
//! 错误码按活动通道数给出。不建模真实物理，只保证线格式合法。

use star_sdk::{SerialError, TransportAdapter};
use std::collections::VecDeque;
use std::time::Duration;

pub struct DeviceSimulator {
    pending: VecDeque<String>,
    /// (指令, 应答) 流量记录
    pub log: Vec<(String, String)>,
    firmware: String,
    channel_count: usize,
}

impl DeviceSimulator {
    pub fn new(channel_count: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            log: Vec::new(),
            firmware: "4.3.0".to_string(),
            channel_count,
        }
    }

    /// 为一条指令构造全部成功的应答
    fn acknowledge(&self, command: &str) -> String {
        // 回显头部（模块 + 指令 + id + 序号）
        let header = &command[..command.len().min(10)];
        let code = &command[2..4.min(command.len())];

        let active = command
            .split('&')
            .find(|segment| segment.starts_with("tm"))
            .map(|segment| {
                segment[2..]
                    .split(' ')
                    .filter(|token| *token == "1")
                    .count()
            })
            .filter(|&n| n > 0)
            .unwrap_or(1);

        let codes = vec!["00"; active].join("/");
        let mut response = format!("{header}er{codes}");

        match code {
            "RF" => response.push_str(&format!("rf{}", self.firmware)),
            "QT" => {
                let flags = vec!["0"; self.channel_count].join(" ");
                response.push_str(&format!("rt{flags}"));
            },
            _ => {},
        }
        response
    }
}

impl TransportAdapter for DeviceSimulator {
    fn send(&mut self, command: &str) -> Result<(), SerialError> {
        let response = self.acknowledge(command);
        tracing::debug!(command, response = %response, "simulated round trip");
        self.log.push((command.to_string(), response.clone()));
        self.pending.push_back(response);
        Ok(())
    }

    fn receive_timeout(&mut self, _timeout: Duration) -> Result<String, SerialError> {
        self.pending.pop_front().ok_or(SerialError::Timeout)
    }
}
