//! 台面布局文件（TOML）
//!
//! ```toml
//! [[carriers]]
//! name = "tip_car"
//! kind = "tips"
//! rail = 3
//!
//! [[carriers.labware]]
//! slot = 0
//! name = "tips_01"
//! kind = "tip_rack_1000ul"
//! ```

use anyhow::{Result, bail};
use serde::Deserialize;
use star_sdk::{Deck, TipType, catalog};
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct LayoutFile {
    #[serde(default)]
    pub carriers: Vec<CarrierEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CarrierEntry {
    pub name: String,
    /// "tips" 或 "plates"
    pub kind: String,
    pub rail: Option<u8>,
    #[serde(default)]
    pub labware: Vec<LabwareEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LabwareEntry {
    pub slot: usize,
    pub name: String,
    /// "tip_rack_1000ul" / "tip_rack_300ul" / "tip_rack_50ul" /
    /// "plate_96" / "trash"
    pub kind: String,
}

/// 读布局文件并构建台面
pub fn load_deck(path: &Path) -> Result<Deck> {
    let text = std::fs::read_to_string(path)?;
    let layout: LayoutFile = toml::from_str(&text)?;

    let mut deck = Deck::new();
    for carrier in &layout.carriers {
        let def = match carrier.kind.as_str() {
            "tips" => catalog::tip_carrier(&carrier.name),
            "plates" => catalog::plate_carrier(&carrier.name),
            other => bail!("unknown carrier kind {other:?}"),
        };
        deck.assign_carrier(def, carrier.rail)?;

        for labware in &carrier.labware {
            let def = match labware.kind.as_str() {
                "tip_rack_1000ul" => {
                    catalog::tip_rack(&labware.name, TipType::high_volume_filtered())
                },
                "tip_rack_300ul" => {
                    catalog::tip_rack(&labware.name, TipType::standard_volume())
                },
                "tip_rack_50ul" => catalog::tip_rack(&labware.name, TipType::low_volume()),
                "plate_96" => catalog::plate_96(&labware.name),
                "trash" => catalog::trash(&labware.name),
                other => bail!("unknown labware kind {other:?}"),
            };
            deck.assign_labware(&carrier.name, labware.slot, def)?;
        }
    }
    Ok(deck)
}
