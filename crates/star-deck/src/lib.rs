//! # Star Deck
//!
//! 声明式台面布局与坐标解析（无硬件依赖）
//!
//! ## 模块
//!
//! - `geometry`: 三轴坐标与轨道 → 毫米映射
//! - `tips`: 吸头类型定义
//! - `site`: 孔位地址与范围（"A1"、"A1:C1"）解析
//! - `resource`: 资源树（台面 → 载架 → 板/吸头架 → 孔位）与解析器
//! - `catalog`: 少量内置载架/耗材定义
//!
//! ## 坐标模型
//!
//! 所有绝对坐标为设备毫米单位。解析即沿祖先链按 (x, y, z) 固定轴序
//! 求和局部偏移：载架轨道偏移 + 槽位偏移 + 孔位几何偏移。

pub mod catalog;
pub mod geometry;
pub mod resource;
pub mod site;
pub mod tips;

// 重新导出常用类型
pub use catalog::*;
pub use geometry::{Coordinate, RAIL_ORIGIN_X_MM, RAIL_PITCH_MM, rail_to_x};
pub use resource::{CarrierDef, Deck, GridSpec, LabwareDef, NodeId, Resource, ResourceKind, ResolvedSite};
pub use site::{WellAddress, WellRange};
pub use tips::TipType;

use thiserror::Error;

/// 台面布局与坐标解析错误类型
#[derive(Error, Debug)]
pub enum DeckError {
    /// 资源名在树中不存在
    #[error("Resource not found: {0:?}")]
    NotFound(String),

    /// 孔位/范围语法错误或地址路径不合法
    #[error("Invalid address {address:?}: {reason}")]
    Address {
        address: String,
        reason: &'static str,
    },

    /// 资源（或其祖先载架）未挂到任何轨道
    #[error("Resource {0:?} is not assigned to a rail")]
    Unassigned(String),

    /// 资源名在树中重复
    #[error("Duplicate resource name: {0:?}")]
    DuplicateName(String),

    /// 目标槽位已被占用
    #[error("Slot {slot} of {parent:?} is already occupied")]
    SlotOccupied { parent: String, slot: usize },

    /// 槽位索引超出载架槽数
    #[error("Slot {slot} out of range for {parent:?} ({sites} sites)")]
    SlotOutOfRange {
        parent: String,
        slot: usize,
        sites: usize,
    },

    /// 资源没有孔位栅格，不可按孔位寻址
    #[error("Resource {0:?} has no addressable sites")]
    NotAddressable(String),

    /// 孔位落在栅格之外
    #[error("Well {well} out of range ({rows} rows x {cols} columns)")]
    WellOutOfRange { well: String, rows: u8, cols: u16 },
}
