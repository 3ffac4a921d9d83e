//! 协议脚本（TOML）与干跑执行
//!
//! ```toml
//! [[steps]]
//! op = "pick_up"
//! at = "tips_01/A1:C1"
//!
//! [[steps]]
//! op = "aspirate"
//! at = "plate_01/A1:C1"
//! volumes = [100.0, 50.0, 200.0]
//! ```

use crate::simulator::DeviceSimulator;
use anyhow::{Context, Result};
use serde::Deserialize;
use star_sdk::prelude::*;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct ProtocolFile {
    pub steps: Vec<Step>,
}

/// 单个协议步骤
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    PickUp { at: String },
    Aspirate { at: String, volumes: Vec<f64> },
    Dispense { at: String, volumes: Vec<f64> },
    Drop { at: String },
    Discard { trash: String },
}

/// 读协议脚本
pub fn load_protocol(path: &Path) -> Result<ProtocolFile> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// 在设备仿真上执行脚本并打印线上流量
pub fn dry_run(deck: Deck, protocol: &ProtocolFile) -> Result<()> {
    let config = SessionConfig::default();
    let simulator = DeviceSimulator::new(config.channel_count);
    let mut session = StarSession::new(simulator, deck, config);
    let water = LiquidClass::water_high_volume();

    session.connect().context("handshake failed")?;
    for (index, step) in protocol.steps.iter().enumerate() {
        let context = || format!("step {} ({step:?})", index + 1);
        match step {
            Step::PickUp { at } => session.pick_up_tips(at),
            Step::Aspirate { at, volumes } => session.aspirate(at, volumes, &water),
            Step::Dispense { at, volumes } => session.dispense(at, volumes, &water),
            Step::Drop { at } => session.drop_tips(at),
            Step::Discard { trash } => session.discard_tips(trash),
        }
        .with_context(context)?;
    }

    // 会话独占持有仿真器，干跑结束后取回流量记录
    let simulator = session.into_transport();
    println!("wire traffic ({} round trips):", simulator.log.len());
    for (command, response) in &simulator.log {
        println!("  > {command}");
        println!("  < {response}");
    }
    Ok(())
}
