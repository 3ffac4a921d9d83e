//! 系列稀释演示（mock 传输，无硬件即可运行）
//!
//! ```bash
//! cargo run -p star-sdk --example serial_dilution --features mock
//! ```
//!
//! mock 侧脚本化全部应答，演示完整的指令/应答线上流量。

use star_sdk::prelude::*;
use star_sdk::{MockController, MockTransport};

fn build_deck() -> Result<Deck, ClientError> {
    let mut deck = Deck::new();
    deck.assign_carrier(catalog::tip_carrier("tip_car"), Some(3))?;
    deck.assign_labware(
        "tip_car",
        0,
        catalog::tip_rack("tips_01", TipType::high_volume_filtered()),
    )?;
    deck.assign_carrier(catalog::plate_carrier("plt_car"), Some(8))?;
    deck.assign_labware("plt_car", 1, catalog::plate_96("dilution_plate"))?;
    Ok(deck)
}

fn script_responses(controller: &MockController) {
    for line in [
        "C0RFid0001er00rf4.3.0",
        "C0TTid0002er00",
        "C0TPid0003er00/00/00",
        "C0ASid0004er00/00/00",
        "C0DSid0005er00/00/00",
        "C0DSid0006er00/00/00",
        "C0TRid0007er00/00/00kz381 356 365 000vz303 360 368 000",
    ] {
        controller.push_response(line);
    }
}

fn main() -> Result<(), ClientError> {
    star_sdk::init_logging();

    let deck = build_deck()?;
    let (transport, controller) = MockTransport::new();
    script_responses(&controller);

    let mut session = StarSession::new(transport, deck, SessionConfig::compact());
    println!("{}", session.deck_summary());

    let firmware = session.connect()?;
    println!("firmware: {firmware}");

    let water = LiquidClass::water_high_volume();
    session.pick_up_tips("tips_01/A1:C1")?;
    session.aspirate("dilution_plate/A1:C1", &[200.0, 200.0, 200.0], &water)?;
    session.dispense("dilution_plate/D1:F1", &[100.0, 100.0, 100.0], &water)?;
    session.dispense("dilution_plate/D2:F2", &[100.0, 100.0, 100.0], &water)?;
    session.drop_tips("tips_01/A1:C1")?;

    println!("\nwire traffic:");
    for line in controller.sent() {
        println!("  > {line}");
    }
    Ok(())
}
