//! 会话级往返测试（mock 传输，断言精确线上字符串）

use semver::Version;
use star_client::{ChannelState, ClientError, SessionConfig, StarSession};
use star_deck::{Deck, TipType, catalog};
use star_protocol::{ChannelErrorCode, LiquidClass, ProtocolError};
use star_serial::{MockController, MockTransport};
use std::time::Duration;

/// 紧凑 4 通道机型 + 吸头架（轨道 3）+ 96 孔板（轨道 8）
fn compact_session() -> (StarSession<MockTransport>, MockController) {
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
    deck.assign_labware("plt_car", 4, catalog::trash("waste"))
        .unwrap();

    let (transport, controller) = MockTransport::new();
    let mut config = SessionConfig::compact();
    config.response_timeout = Duration::from_millis(50);
    (StarSession::new(transport, deck, config), controller)
}

#[test]
fn connect_parses_firmware_and_gates_version() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0RFid0001er00rf4.3.0");
    let version = session.connect().unwrap();
    assert_eq!(version, Version::new(4, 3, 0));
    assert_eq!(session.firmware_version(), Some(&version));
    assert_eq!(controller.sent(), vec!["C0RFid0001"]);
}

#[test]
fn connect_rejects_old_firmware() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0RFid0001er00rf3.9.9");
    assert!(matches!(
        session.connect(),
        Err(ClientError::FirmwareTooOld { .. })
    ));
}

/// 3 通道拾取：TP 指令恰有 3 个非零通道位置，通道 0–2 转为带吸头
#[test]
fn pick_up_three_tips_emits_reference_commands() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0TTid0001er00");
    controller.push_response("C0TPid0002er00/00/00");

    session.pick_up_tips("tips_01/A1:C1").unwrap();

    let sent = controller.sent();
    assert_eq!(sent[0], "C0TTid0001tt01tf1tl0871tv12500tg3tu0");
    assert_eq!(
        sent[1],
        "C0TPid0002xp01562 01562 01562 00000&yp0768 0678 0588 0000&tm1 1 1 0\
         &tt01&tp1240&tz1160&th2450&td0"
    );

    for channel in 0..3 {
        assert!(matches!(
            session.channels().state(channel).unwrap(),
            ChannelState::TipAttached { .. }
        ));
    }
    assert_eq!(
        session.channels().state(3).unwrap(),
        &ChannelState::Empty
    );
}

/// 吸排全流程：体积字段按标定曲线编码为 01072/00551/02110，
/// 排液后持液量精确归零
#[test]
fn aspirate_dispense_serial_flow() {
    let (mut session, controller) = compact_session();
    let water = LiquidClass::water_high_volume();
    controller.push_response("C0TTid0001er00");
    controller.push_response("C0TPid0002er00/00/00");
    controller.push_response("C0ASid0003er00/00/00");
    controller.push_response("C0DSid0004er00/00/00");

    session.pick_up_tips("tips_01/A1:C1").unwrap();
    session
        .aspirate("plate_01/A1:C1", &[100.0, 50.0, 200.0], &water)
        .unwrap();

    for (channel, held) in [(0, 100.0), (1, 50.0), (2, 200.0)] {
        assert_eq!(
            session.channels().state(channel).unwrap().held_volume(),
            Some(held)
        );
    }

    session
        .dispense("plate_01/D1:F1", &[100.0, 50.0, 200.0], &water)
        .unwrap();

    let sent = controller.sent();
    assert_eq!(
        sent[2],
        "C0ASid0003at0&tm1 1 1 0&xp02730 02730 02730 00000&yp1675 1585 1495 0000\
         &th2450&te2450&lm0&zl0881 0881 0881 0000&po0000&av01072 00551 02110 00000\
         &as1000&ta000&ba0000&oa0000"
    );
    assert!(sent[3].starts_with("C0DSid0004dm0&tm1 1 1 0&"));
    assert!(sent[3].contains("&dv01072 00551 02110 00000&"));
    assert!(sent[3].contains("&zx0901 0901 0901 0000&"));

    // 排空后所有通道持液量为零
    for channel in 0..3 {
        assert_eq!(
            session.channels().state(channel).unwrap().held_volume(),
            Some(0.0)
        );
    }
}

/// er00/71：复合设备错误恰列出通道 1；通道 0 已提交，通道 1 保持
/// 操作前状态
#[test]
fn partial_device_failure_commits_per_channel() {
    let (mut session, controller) = compact_session();
    let water = LiquidClass::water_high_volume();
    controller.push_response("C0TTid0001er00");
    controller.push_response("C0TPid0002er00/00");
    controller.push_response("C0ASid0003er00/00");
    controller.push_response("C0DSid0004er00/71");

    session.pick_up_tips("tips_01/A1:B1").unwrap();
    session
        .aspirate("plate_01/A1:B1", &[100.0, 50.0], &water)
        .unwrap();

    let err = session
        .dispense("plate_01/D1:E1", &[100.0, 50.0], &water)
        .unwrap_err();
    let ClientError::Device(faults) = err else {
        panic!("expected device error");
    };
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].channel, 1);
    assert_eq!(faults[0].code, ChannelErrorCode::InsufficientLiquid);

    // 成功通道已提交，失败通道回到操作前状态
    assert_eq!(
        session.channels().state(0).unwrap().held_volume(),
        Some(0.0)
    );
    assert_eq!(
        session.channels().state(1).unwrap().held_volume(),
        Some(50.0)
    );
}

/// 超时：受影响通道进入未知态，后续操作被拒，resync 后恢复；
/// 迟到的超时应答被静默排掉
#[test]
fn timeout_marks_unknown_until_resync() {
    let (mut session, controller) = compact_session();
    let water = LiquidClass::water_high_volume();
    controller.push_response("C0TTid0001er00");
    // TP 应答缺席 → 超时

    let err = session.pick_up_tips("tips_01/A1:C1").unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
    assert!(session.channels().any_unknown());

    // 未知态通道拒绝一切操作
    assert!(matches!(
        session.aspirate("plate_01/A1", &[10.0], &water),
        Err(ClientError::Channel(_))
    ));

    // 迟到的 TP 应答先于 QT 应答到达，应被排掉
    controller.push_response("C0TPid0002er00/00/00");
    controller.push_response("C0QTid0003er00rt1 1 1 0");
    session.resync().unwrap();
    assert!(!session.channels().any_unknown());
    for channel in 0..3 {
        assert!(matches!(
            session.channels().state(channel).unwrap(),
            ChannelState::TipAttached { .. }
        ));
    }
    assert_eq!(
        session.channels().state(3).unwrap(),
        &ChannelState::Empty
    );

    // 恢复后可以继续操作
    controller.push_response("C0ASid0004er00/00/00");
    session
        .aspirate("plate_01/A1:C1", &[10.0, 10.0, 10.0], &water)
        .unwrap();
}

#[test]
fn mismatched_id_is_protocol_error() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0RFid0099er00rf4.3.0");
    assert!(matches!(
        session.connect(),
        Err(ClientError::Protocol(ProtocolError::IdMismatch {
            expected: 1,
            got: 99
        }))
    ));
}

/// 发送前校验失败不触碰设备：一个字节都不发
#[test]
fn pre_wire_validation_sends_nothing() {
    let (mut session, controller) = compact_session();
    let water = LiquidClass::water_high_volume();

    let err = session
        .aspirate("plate_01/A1", &[10.0], &water)
        .unwrap_err();
    assert!(err.is_pre_wire());
    assert!(controller.sent().is_empty());

    let err = session.pick_up_tips("tips_01/A1:H2").unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));
    assert!(controller.sent().is_empty());

    let err = session.pick_up_tips("nowhere/A1").unwrap_err();
    assert!(matches!(err, ClientError::Deck(_)));
    assert!(controller.sent().is_empty());
}

/// 归还吸头：拾取后丢回吸头架，通道回到空态
#[test]
fn drop_tips_returns_to_rack() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0TTid0001er00");
    controller.push_response("C0TPid0002er00/00/00");
    controller.push_response(
        "C0TRid0003er00/00/00kz381 356 365 000vz303 360 368 000",
    );

    session.pick_up_tips("tips_01/A1:C1").unwrap();
    session.drop_tips("tips_01/A1:C1").unwrap();

    let sent = controller.sent();
    assert!(sent[2].starts_with("C0TRid0003xp01562 01562 01562 00000&"));
    assert!(sent[2].contains("&tm1 1 1 0&"));
    for channel in 0..4 {
        assert_eq!(
            session.channels().state(channel).unwrap(),
            &ChannelState::Empty
        );
    }
}

/// 丢入废料槽：所有带吸头通道一次清空
#[test]
fn discard_tips_into_trash() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0TTid0001er00");
    controller.push_response("C0TPid0002er00/00");
    controller.push_response("C0TRid0003er00/00");

    session.pick_up_tips("tips_01/A1:B1").unwrap();
    session.discard_tips("waste").unwrap();

    let sent = controller.sent();
    assert!(sent[2].starts_with("C0TRid0003"));
    for channel in 0..4 {
        assert_eq!(
            session.channels().state(channel).unwrap(),
            &ChannelState::Empty
        );
    }

    // 没有吸头时再次丢弃是入参错误
    assert!(matches!(
        session.discard_tips("waste"),
        Err(ClientError::InvalidInput(_))
    ));
}

/// 吸头架孔位取走后不可再取；归还后重新可用
#[test]
fn tip_rack_inventory_tracks_spent_wells() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0TTid0001er00");
    controller.push_response("C0TPid0002er00/00");
    controller.push_response("C0TRid0003er00/00");

    session.pick_up_tips("tips_01/A1:B1").unwrap();
    session.discard_tips("waste").unwrap();

    // 通道已空，但 A1/B1 的吸头已进废料槽
    let err = session.pick_up_tips("tips_01/A1:B1").unwrap_err();
    assert!(matches!(err, ClientError::TipsSpent { .. }));
    assert!(err.is_pre_wire());

    // 相邻未动过的孔位仍然可取
    controller.push_response("C0TPid0004er00/00");
    session.pick_up_tips("tips_01/C1:D1").unwrap();

    // 归还后孔位重新可用
    controller.push_response("C0TRid0005er00/00");
    session.drop_tips("tips_01/C1:D1").unwrap();
    controller.push_response("C0TPid0006er00/00");
    session.pick_up_tips("tips_01/C1:D1").unwrap();
}

/// 序号跨指令单调递增
#[test]
fn sequence_numbers_increase_monotonically() {
    let (mut session, controller) = compact_session();
    controller.push_response("C0RFid0001er00rf4.3.0");
    controller.push_response("C0QTid0002er00rt0 0 0 0");
    controller.push_response("C0QTid0003er00rt0 0 0 0");

    session.connect().unwrap();
    session.resync().unwrap();
    session.resync().unwrap();

    let sent = controller.sent();
    assert_eq!(sent[0], "C0RFid0001");
    assert_eq!(sent[1], "C0QTid0002");
    assert_eq!(sent[2], "C0QTid0003");
}
