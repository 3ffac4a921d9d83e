//! # Star CLI
//!
//! 台面检视与协议干跑（dry-run）命令行工具。
//!
//! ```bash
//! # 查看布局文件对应的台面概要
//! star-cli deck --layout deck.toml
//!
//! # 在内置设备仿真上干跑协议脚本，打印线上流量
//! star-cli simulate --layout deck.toml --protocol steps.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod layout;
mod script;
mod simulator;

/// Star CLI - 液体处理工作站命令行工具
#[derive(Parser, Debug)]
#[command(name = "star-cli")]
#[command(about = "Deck inspection and dry-run tool for STAR-class liquid handlers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 打印台面概要
    Deck {
        /// 台面布局文件（TOML）
        #[arg(long)]
        layout: PathBuf,
    },

    /// 在设备仿真上干跑协议脚本
    Simulate {
        /// 台面布局文件（TOML）
        #[arg(long)]
        layout: PathBuf,

        /// 协议脚本文件（TOML）
        #[arg(long)]
        protocol: PathBuf,
    },
}

fn main() -> Result<()> {
    star_sdk::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Deck { layout } => {
            let deck = layout::load_deck(&layout)
                .with_context(|| format!("loading layout {}", layout.display()))?;
            print!("{}", deck.summary());
        },
        Commands::Simulate { layout, protocol } => {
            let deck = layout::load_deck(&layout)
                .with_context(|| format!("loading layout {}", layout.display()))?;
            let steps = script::load_protocol(&protocol)
                .with_context(|| format!("loading protocol {}", protocol.display()))?;
            script::dry_run(deck, &steps)?;
        },
    }
    Ok(())
}
