//! 内置载架与耗材定义
//!
//! 完整耗材目录不在本 SDK 范围内；这里只提供常用的一组定义，
//! 足够搭建典型移液布局。自定义耗材直接构造 `CarrierDef`/
//! `LabwareDef` 即可（启用 `serde` feature 后可从配置文件读入）。

use crate::geometry::Coordinate;
use crate::resource::{CarrierDef, GridSpec, LabwareDef, ResourceKind};
use crate::tips::TipType;

/// 96 孔 SBS 栅格：8 行 x 12 列，9 mm 间距
fn sbs_96(a1: Coordinate) -> GridSpec {
    GridSpec {
        rows: 8,
        cols: 12,
        pitch_x: 9.0,
        pitch_y: 9.0,
        a1,
    }
}

/// 5 槽吸头载架
///
/// 槽位沿 y 方向 96 mm 间距排布，槽 0 在最前端。
pub fn tip_carrier(name: impl Into<String>) -> CarrierDef {
    CarrierDef {
        name: name.into(),
        kind: ResourceKind::TipCarrier,
        sites: (0..5)
            .map(|i| Coordinate::new(4.0, 8.5 + i as f64 * 96.0, 115.8))
            .collect(),
    }
}

/// 5 槽板载架
pub fn plate_carrier(name: impl Into<String>) -> CarrierDef {
    CarrierDef {
        name: name.into(),
        kind: ResourceKind::PlateCarrier,
        sites: (0..5)
            .map(|i| Coordinate::new(4.0, 8.5 + i as f64 * 96.0, 86.2))
            .collect(),
    }
}

/// 96 位吸头架
pub fn tip_rack(name: impl Into<String>, tip_type: TipType) -> LabwareDef {
    LabwareDef {
        name: name.into(),
        kind: ResourceKind::TipRack,
        grid: Some(sbs_96(Coordinate::new(7.2, 68.3, 8.2))),
        tip_type: Some(tip_type),
    }
}

/// 96 孔平底微孔板
pub fn plate_96(name: impl Into<String>) -> LabwareDef {
    LabwareDef {
        name: name.into(),
        kind: ResourceKind::Plate,
        grid: Some(sbs_96(Coordinate::new(11.5, 63.0, 1.9))),
        tip_type: None,
    }
}

/// 废料槽（不可按孔位寻址）
pub fn trash(name: impl Into<String>) -> LabwareDef {
    LabwareDef {
        name: name.into(),
        kind: ResourceKind::Trash,
        grid: None,
        tip_type: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_sites_ascend_in_y() {
        let carrier = tip_carrier("t");
        assert_eq!(carrier.sites.len(), 5);
        for pair in carrier.sites.windows(2) {
            assert!(pair[1].y > pair[0].y);
            assert_eq!(pair[0].x, pair[1].x);
        }
    }

    #[test]
    fn test_rack_grid_dimensions() {
        let rack = tip_rack("r", TipType::standard_volume());
        let grid = rack.grid.unwrap();
        assert_eq!((grid.rows, grid.cols), (8, 12));
        assert!(rack.tip_type.is_some());
    }

    #[test]
    fn test_trash_is_not_addressable() {
        assert!(trash("waste").grid.is_none());
    }
}
