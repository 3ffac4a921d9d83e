//! 资源树与坐标解析器
//!
//! 台面是一棵严格属主树：根为台面本身，子节点为载架，载架槽位里
//! 是吸头架/板，板内按栅格寻址孔位。树以竞技场（arena）+ 索引实现，
//! 避免跨会话共享可变别名。
//!
//! 不变量：
//! - 资源名全树唯一
//! - 同一父节点下槽位索引唯一
//! - 解析顺序 = 请求顺序（范围展开序直接决定通道分配）

use crate::DeckError;
use crate::geometry::{Coordinate, rail_to_x};
use crate::site::{WellAddress, WellRange};
use crate::tips::TipType;
use std::collections::HashMap;

/// 竞技场内的节点索引
pub type NodeId = usize;

/// 资源种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    /// 台面根
    Deck,
    /// 吸头载架
    TipCarrier,
    /// 板载架
    PlateCarrier,
    /// 吸头架
    TipRack,
    /// 微孔板
    Plate,
    /// 废料槽
    Trash,
}

/// 孔位栅格规格
///
/// `a1` 为 A1 孔相对资源原点的偏移；行沿 -y 方向（A 行在最远端），
/// 列沿 +x 方向。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridSpec {
    pub rows: u8,
    pub cols: u16,
    /// 列间距（mm）
    pub pitch_x: f64,
    /// 行间距（mm）
    pub pitch_y: f64,
    /// A1 孔偏移
    pub a1: Coordinate,
}

impl GridSpec {
    /// 孔位相对资源原点的偏移
    pub fn well_offset(&self, well: WellAddress) -> Coordinate {
        Coordinate::new(
            self.a1.x + well.col as f64 * self.pitch_x,
            self.a1.y - well.row as f64 * self.pitch_y,
            self.a1.z,
        )
    }

    fn contains(&self, well: WellAddress) -> bool {
        well.row < self.rows && well.col < self.cols
    }
}

/// 载架定义（放上台面前的描述）
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarrierDef {
    pub name: String,
    pub kind: ResourceKind,
    /// 槽位偏移表（槽 0 在前）
    pub sites: Vec<Coordinate>,
}

/// 耗材定义（吸头架 / 板 / 废料槽）
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabwareDef {
    pub name: String,
    pub kind: ResourceKind,
    /// 孔位栅格（废料槽等不可寻址资源为 None）
    pub grid: Option<GridSpec>,
    /// 吸头架所载吸头类型
    pub tip_type: Option<TipType>,
}

/// 树中的一个资源节点
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    /// 相对父节点的局部偏移
    pub offset: Coordinate,
    /// 载架的轨道索引（未挂轨道的载架为 None）
    pub rail: Option<u8>,
    /// 父节点内的槽位索引
    pub slot: Option<usize>,
    /// 载架槽位偏移表
    pub sites: Vec<Coordinate>,
    /// 孔位栅格
    pub grid: Option<GridSpec>,
    /// 吸头类型（吸头架）
    pub tip_type: Option<TipType>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// 一次地址解析出的单个孔位
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSite {
    /// 所属资源节点
    pub node: NodeId,
    /// 所属资源名
    pub resource: String,
    /// 孔位地址
    pub well: WellAddress,
    /// 绝对坐标（mm）
    pub coordinate: Coordinate,
}

/// 台面布局树
#[derive(Debug, Clone)]
pub struct Deck {
    nodes: Vec<Option<Resource>>,
    names: HashMap<String, NodeId>,
    root: NodeId,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// 创建空台面
    pub fn new() -> Self {
        let root = Resource {
            name: "deck".to_string(),
            kind: ResourceKind::Deck,
            offset: Coordinate::ZERO,
            rail: None,
            slot: None,
            sites: Vec::new(),
            grid: None,
            tip_type: None,
            parent: None,
            children: Vec::new(),
        };
        let mut names = HashMap::new();
        names.insert("deck".to_string(), 0);
        Self {
            nodes: vec![Some(root)],
            names,
            root: 0,
        }
    }

    /// 根节点
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 按名查找节点
    pub fn find(&self, name: &str) -> Result<NodeId, DeckError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| DeckError::NotFound(name.to_string()))
    }

    /// 节点只读访问
    pub fn node(&self, id: NodeId) -> &Resource {
        self.nodes[id]
            .as_ref()
            .unwrap_or_else(|| panic!("stale node id {id}"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Resource {
        self.nodes[id]
            .as_mut()
            .unwrap_or_else(|| panic!("stale node id {id}"))
    }

    fn insert(&mut self, resource: Resource) -> Result<NodeId, DeckError> {
        if self.names.contains_key(&resource.name) {
            return Err(DeckError::DuplicateName(resource.name));
        }
        let id = self.nodes.len();
        self.names.insert(resource.name.clone(), id);
        if let Some(parent) = resource.parent {
            self.node_mut(parent).children.push(id);
        }
        self.nodes.push(Some(resource));
        Ok(id)
    }

    /// 把载架挂到台面轨道上
    ///
    /// `rail` 为 None 时载架处于未挂载状态：可以继续装载耗材，但
    /// 解析其下任何坐标都会报 `Unassigned`。
    pub fn assign_carrier(
        &mut self,
        def: CarrierDef,
        rail: Option<u8>,
    ) -> Result<NodeId, DeckError> {
        if let Some(rail) = rail {
            self.check_rail_free(rail)?;
        }
        let offset = rail
            .map(|r| Coordinate::new(rail_to_x(r), 0.0, 0.0))
            .unwrap_or(Coordinate::ZERO);
        self.insert(Resource {
            name: def.name,
            kind: def.kind,
            offset,
            rail,
            slot: rail.map(|r| r as usize),
            sites: def.sites,
            grid: None,
            tip_type: None,
            parent: Some(self.root),
            children: Vec::new(),
        })
    }

    fn check_rail_free(&self, rail: u8) -> Result<(), DeckError> {
        for &child in &self.node(self.root).children {
            if self.node(child).rail == Some(rail) {
                return Err(DeckError::SlotOccupied {
                    parent: "deck".to_string(),
                    slot: rail as usize,
                });
            }
        }
        Ok(())
    }

    /// 把载架移到另一条轨道
    pub fn move_carrier(&mut self, name: &str, rail: u8) -> Result<(), DeckError> {
        let id = self.find(name)?;
        if self.node(id).rail != Some(rail) {
            self.check_rail_free(rail)?;
        }
        let node = self.node_mut(id);
        node.rail = Some(rail);
        node.slot = Some(rail as usize);
        node.offset = Coordinate::new(rail_to_x(rail), 0.0, 0.0);
        Ok(())
    }

    /// 把耗材装入载架槽位
    pub fn assign_labware(
        &mut self,
        carrier: &str,
        slot: usize,
        def: LabwareDef,
    ) -> Result<NodeId, DeckError> {
        let carrier_id = self.find(carrier)?;
        let carrier_node = self.node(carrier_id);
        let sites = carrier_node.sites.len();
        if slot >= sites {
            return Err(DeckError::SlotOutOfRange {
                parent: carrier.to_string(),
                slot,
                sites,
            });
        }
        for &child in &carrier_node.children {
            if self.node(child).slot == Some(slot) {
                return Err(DeckError::SlotOccupied {
                    parent: carrier.to_string(),
                    slot,
                });
            }
        }
        let offset = carrier_node.sites[slot];
        self.insert(Resource {
            name: def.name,
            kind: def.kind,
            offset,
            rail: None,
            slot: Some(slot),
            sites: Vec::new(),
            grid: def.grid,
            tip_type: def.tip_type,
            parent: Some(carrier_id),
            children: Vec::new(),
        })
    }

    /// 把资源（连同子树）从台面移除
    pub fn unassign(&mut self, name: &str) -> Result<(), DeckError> {
        let id = self.find(name)?;
        if id == self.root {
            return Err(DeckError::NotFound(name.to_string()));
        }
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.nodes[current].take().unwrap_or_else(|| {
                panic!("stale node id {current}")
            });
            self.names.remove(&node.name);
            stack.extend(node.children);
        }
        Ok(())
    }

    /// 资源原点的绝对坐标：沿祖先链求和局部偏移
    ///
    /// 链上任何未挂轨道的载架都使坐标不可解析。
    pub fn absolute(&self, id: NodeId) -> Result<Coordinate, DeckError> {
        let mut total = Coordinate::ZERO;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            let carrier_kind = matches!(
                node.kind,
                ResourceKind::TipCarrier | ResourceKind::PlateCarrier
            );
            if carrier_kind && node.rail.is_none() {
                return Err(DeckError::Unassigned(node.name.clone()));
            }
            total += node.offset;
            current = node.parent;
        }
        Ok(total)
    }

    /// 解析地址规格为有序孔位序列
    ///
    /// 规格语法：`<资源名>/<孔位或范围>`，如 `tips_01/A1:C1`。
    /// 返回顺序 = 范围展开序（列优先），下游按该顺序分配通道。
    pub fn resolve(&self, address: &str) -> Result<Vec<ResolvedSite>, DeckError> {
        let (name, range_text) = address.split_once('/').ok_or_else(|| DeckError::Address {
            address: address.to_string(),
            reason: "expected <resource>/<well-or-range>",
        })?;
        let id = self.find(name)?;
        let node = self.node(id);
        let grid = node
            .grid
            .as_ref()
            .ok_or_else(|| DeckError::NotAddressable(name.to_string()))?;

        let range = WellRange::parse(range_text)?;
        let origin = self.absolute(id)?;

        let mut sites = Vec::with_capacity(range.len());
        for well in range.expand() {
            if !grid.contains(well) {
                return Err(DeckError::WellOutOfRange {
                    well: well.to_string(),
                    rows: grid.rows,
                    cols: grid.cols,
                });
            }
            sites.push(ResolvedSite {
                node: id,
                resource: node.name.clone(),
                well,
                coordinate: origin + grid.well_offset(well),
            });
        }
        Ok(sites)
    }

    /// 台面概要（诊断用文本树，不进入协议）
    ///
    /// 按轨道序列出载架、槽位内容、种类与绝对坐标。
    pub fn summary(&self) -> String {
        let mut carriers: Vec<NodeId> = self.node(self.root).children.clone();
        carriers.sort_by_key(|&id| self.node(id).rail.map(|r| r as i32).unwrap_or(-1));

        let mut out = String::from("Rail  Resource               Kind          Position\n");
        for id in carriers {
            let node = self.node(id);
            let rail_text = node
                .rail
                .map(|r| format!("{:>4}", r))
                .unwrap_or_else(|| "   -".to_string());
            let position = self
                .absolute(id)
                .map(|c| c.to_string())
                .unwrap_or_else(|_| "(unassigned)".to_string());
            out.push_str(&format!(
                "{}  {:<21}  {:<12}  {}\n",
                rail_text,
                node.name,
                format!("{:?}", node.kind),
                position
            ));
            for &child in &node.children {
                let child_node = self.node(child);
                let position = self
                    .absolute(child)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|_| "(unassigned)".to_string());
                out.push_str(&format!(
                    "      [{}] {:<17}  {:<12}  {}\n",
                    child_node.slot.unwrap_or(0),
                    child_node.name,
                    format!("{:?}", child_node.kind),
                    position
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn example_deck() -> Deck {
        let mut deck = Deck::new();
        deck.assign_carrier(catalog::tip_carrier("tip_car"), Some(3))
            .unwrap();
        deck.assign_labware(
            "tip_car",
            0,
            catalog::tip_rack("tips_01", TipType::high_volume_filtered()),
        )
        .unwrap();
        deck.assign_carrier(catalog::plate_carrier("plt_car"), Some(8))
            .unwrap();
        deck.assign_labware("plt_car", 1, catalog::plate_96("plate_01"))
            .unwrap();
        deck
    }

    #[test]
    fn test_assign_and_find() {
        let deck = example_deck();
        assert!(deck.find("tips_01").is_ok());
        assert!(matches!(
            deck.find("nonexistent"),
            Err(DeckError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut deck = example_deck();
        assert!(matches!(
            deck.assign_carrier(catalog::tip_carrier("tip_car"), Some(12)),
            Err(DeckError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_occupied_rail_and_slot_rejected() {
        let mut deck = example_deck();
        assert!(matches!(
            deck.assign_carrier(catalog::tip_carrier("tip_car2"), Some(3)),
            Err(DeckError::SlotOccupied { .. })
        ));
        assert!(matches!(
            deck.assign_labware(
                "tip_car",
                0,
                catalog::tip_rack("tips_02", TipType::standard_volume())
            ),
            Err(DeckError::SlotOccupied { .. })
        ));
        assert!(matches!(
            deck.assign_labware(
                "tip_car",
                99,
                catalog::tip_rack("tips_03", TipType::standard_volume())
            ),
            Err(DeckError::SlotOutOfRange { .. })
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let deck = example_deck();
        let first = deck.resolve("tips_01/A1:C1").unwrap();
        let second = deck.resolve("tips_01/A1:C1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].well.to_string(), "A1");
        assert_eq!(first[2].well.to_string(), "C1");
    }

    /// 轨道平移不变性：移动 Δ 条轨道只平移 x，y/z 不变
    #[test]
    fn test_rail_translation_invariance() {
        let mut deck = example_deck();
        let before = deck.resolve("tips_01/A1:H1").unwrap();
        deck.move_carrier("tip_car", 7).unwrap();
        let after = deck.resolve("tips_01/A1:H1").unwrap();

        let delta_rails = 7.0 - 3.0;
        for (a, b) in before.iter().zip(after.iter()) {
            assert!(
                (b.coordinate.x - a.coordinate.x - delta_rails * crate::RAIL_PITCH_MM).abs()
                    < 1e-9
            );
            assert_eq!(a.coordinate.y, b.coordinate.y);
            assert_eq!(a.coordinate.z, b.coordinate.z);
        }
    }

    #[test]
    fn test_unassigned_carrier_is_unresolvable() {
        let mut deck = Deck::new();
        deck.assign_carrier(catalog::tip_carrier("floating"), None)
            .unwrap();
        deck.assign_labware(
            "floating",
            0,
            catalog::tip_rack("tips", TipType::low_volume()),
        )
        .unwrap();
        assert!(matches!(
            deck.resolve("tips/A1"),
            Err(DeckError::Unassigned(_))
        ));
    }

    #[test]
    fn test_well_out_of_range() {
        let deck = example_deck();
        assert!(matches!(
            deck.resolve("plate_01/J1"),
            Err(DeckError::WellOutOfRange { .. })
        ));
        assert!(matches!(
            deck.resolve("plate_01/A13"),
            Err(DeckError::WellOutOfRange { .. })
        ));
    }

    #[test]
    fn test_malformed_spec() {
        let deck = example_deck();
        assert!(matches!(
            deck.resolve("plate_01"),
            Err(DeckError::Address { .. })
        ));
        assert!(matches!(
            deck.resolve("plate_01/1A"),
            Err(DeckError::Address { .. })
        ));
        assert!(matches!(
            deck.resolve("tip_car/A1"),
            Err(DeckError::NotAddressable(_))
        ));
    }

    #[test]
    fn test_unassign_removes_subtree() {
        let mut deck = example_deck();
        deck.unassign("tip_car").unwrap();
        assert!(deck.find("tip_car").is_err());
        // 子树成员一并移除
        assert!(deck.find("tips_01").is_err());
        // 轨道空出，可重新挂载
        deck.assign_carrier(catalog::tip_carrier("tip_car_b"), Some(3))
            .unwrap();
    }

    #[test]
    fn test_rail_x_in_resolved_coordinates() {
        let deck = example_deck();
        let sites = deck.resolve("tips_01/A1").unwrap();
        let rack_origin = catalog::tip_carrier("t").sites[0];
        let grid = catalog::tip_rack("r", TipType::high_volume_filtered())
            .grid
            .unwrap();
        let expected_x = 145.0 + rack_origin.x + grid.a1.x;
        assert!((sites[0].coordinate.x - expected_x).abs() < 1e-9);
    }

    #[test]
    fn test_summary_lists_rails_in_order() {
        let deck = example_deck();
        let summary = deck.summary();
        let tip_pos = summary.find("tip_car").unwrap();
        let plt_pos = summary.find("plt_car").unwrap();
        assert!(tip_pos < plt_pos);
        assert!(summary.contains("tips_01"));
        assert!(summary.contains("145.00"));
    }
}
