//! 串行化会话
//!
//! 一台物理设备一个逻辑会话：指令必须逐条确认（或超时）后才能发下
//! 一条，因为通道物理状态由设备串行推进。基础设计不做流水线：
//! 同一时刻至多一条在途指令，序号单调递增，应答按序号关联。
//!
//! 数据流：逻辑操作 → 通道校验（发送前） → 坐标解析 → 编码 →
//! 发送/等待 → 逐通道错误解析 → 逐通道提交状态 → 调用方得到
//! 成功或结构化失败。核心从不自动重试：盲目重发物理吸排液有
//! 双倍加液风险，重试策略属于调用方。

use crate::ClientError;
use crate::channels::ChannelBank;
use crate::config::SessionConfig;
use parking_lot::Mutex;
use semver::Version;
use smallvec::SmallVec;
use star_deck::{Deck, ResolvedSite, TipType};
use star_protocol::{
    CMD_ASPIRATE, CMD_DISPENSE, CMD_QUERY_TIP_PRESENCE, CMD_REQUEST_FIRMWARE, CMD_TIP_DISCARD,
    CMD_TIP_PICK_UP, CMD_TIP_TYPE, ChannelErrorCode, ChannelPattern, DeviceFault,
    FirmwareCommand, FirmwareResponse, MODULE_PIPETTING, ProtocolError, SEQUENCE_MODULUS,
};
use star_serial::{SerialError, TransportAdapter};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 跨线程共享句柄
///
/// 并发调用方必须经由同一把锁串行化，通道状态的唯一属主是会话。
pub type SharedSession<T> = Arc<Mutex<StarSession<T>>>;

/// 液体处理工作站会话
///
/// 独占持有台面布局、通道状态组与传输适配器。
pub struct StarSession<T: TransportAdapter> {
    transport: T,
    deck: Deck,
    bank: ChannelBank,
    config: SessionConfig,
    /// 下一条指令的序号（会话范围，模 10000 回绕）
    next_seq: u16,
    /// 已向设备定义过的吸头类型表位
    defined_tip_types: SmallVec<[u8; 4]>,
    /// 超时作废的在途序号；迟到的对应应答直接丢弃
    stale_seqs: SmallVec<[u16; 4]>,
    /// 各吸头架已取走吸头的孔位（归还后重新可用）
    spent_tips: HashMap<star_deck::NodeId, HashSet<star_deck::WellAddress>>,
    firmware: Option<Version>,
}

impl<T: TransportAdapter> StarSession<T> {
    /// 创建会话
    pub fn new(transport: T, deck: Deck, config: SessionConfig) -> Self {
        let bank = ChannelBank::new(config.channel_count);
        Self {
            transport,
            deck,
            bank,
            config,
            next_seq: 1,
            defined_tip_types: SmallVec::new(),
            stale_seqs: SmallVec::new(),
            spent_tips: HashMap::new(),
            firmware: None,
        }
    }

    /// 包成跨线程共享句柄
    pub fn into_shared(self) -> SharedSession<T> {
        Arc::new(Mutex::new(self))
    }

    /// 台面布局只读访问
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// 台面布局可变访问（仅在无在途指令时安全，由 &mut self 保证）
    pub fn deck_mut(&mut self) -> &mut Deck {
        &mut self.deck
    }

    /// 通道状态组只读访问
    pub fn channels(&self) -> &ChannelBank {
        &self.bank
    }

    /// 已握手的固件版本
    pub fn firmware_version(&self) -> Option<&Version> {
        self.firmware.as_ref()
    }

    /// 结束会话并拆出传输适配器
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// 台面概要文本（诊断用）
    pub fn deck_summary(&self) -> String {
        self.deck.summary()
    }

    /// 解析地址规格为有序孔位序列
    pub fn resolve(&self, address: &str) -> Result<Vec<ResolvedSite>, ClientError> {
        Ok(self.deck.resolve(address)?)
    }

    fn take_seq(&mut self) -> u16 {
        let seq = self.next_seq;
        self.next_seq = (self.next_seq + 1) % SEQUENCE_MODULUS;
        seq
    }

    // ==================== 握手 ====================

    /// 查询固件版本并做最低版本门禁
    pub fn connect(&mut self) -> Result<Version, ClientError> {
        let cmd = FirmwareCommand::new(MODULE_PIPETTING, CMD_REQUEST_FIRMWARE, self.take_seq())?;
        let resp = self.roundtrip(cmd, &[])?;
        self.check_master(&resp)?;

        let text = resp.text.as_deref().unwrap_or("");
        let version = Version::parse(text.trim())
            .map_err(|_| ClientError::FirmwareVersion(text.to_string()))?;
        if version < self.config.min_firmware {
            return Err(ClientError::FirmwareTooOld {
                found: version,
                required: self.config.min_firmware.clone(),
            });
        }
        info!(firmware = %version, channels = self.config.channel_count, "connected");
        self.firmware = Some(version.clone());
        Ok(version)
    }

    // ==================== 高层操作 ====================

    /// 在指定吸头架孔位拾取吸头
    ///
    /// 孔位按解析序映射到通道 0..n（孔位 i ↔ 通道 i）。
    pub fn pick_up_tips(&mut self, address: &str) -> Result<(), ClientError> {
        let sites = self.deck.resolve(address)?;
        let channels = self.leading_channels(sites.len())?;
        self.bank.validate_pick_up(&channels)?;
        // 所请求孔位上必须还留有吸头
        for site in &sites {
            if self
                .spent_tips
                .get(&site.node)
                .is_some_and(|spent| spent.contains(&site.well))
            {
                return Err(ClientError::TipsSpent {
                    resource: site.resource.clone(),
                    well: site.well.to_string(),
                });
            }
        }

        let rack = self.deck.node(sites[0].node);
        let tip = rack.tip_type.ok_or_else(|| {
            ClientError::InvalidInput(format!("{:?} is not a tip rack", rack.name))
        })?;
        self.define_tip_type(&tip)?;

        let pattern = ChannelPattern::from_active(self.config.channel_count, &channels);
        let site_z = sites[0].coordinate.z;
        let cmd = FirmwareCommand::new(MODULE_PIPETTING, CMD_TIP_PICK_UP, self.take_seq())?
            .per_channel("xp", sites.iter().map(|s| s.coordinate.x))?
            .per_channel("yp", sites.iter().map(|s| s.coordinate.y))?
            .pattern("tm", &pattern)?
            .single("tt", tip.type_index as f64)?
            .single("tp", site_z)?
            .single("tz", (site_z - self.config.pickup_stroke_mm).max(0.0))?
            .single("th", self.config.traverse_height_mm)?;

        let resp = self.roundtrip(cmd, &channels)?;
        let faults = resp.faults(&pattern)?;
        for (&channel, site) in channels.iter().zip(&sites) {
            if !faults.iter().any(|f| f.channel == channel) {
                self.bank.commit_pick_up(channel, tip);
                self.spent_tips
                    .entry(site.node)
                    .or_default()
                    .insert(site.well);
            }
        }
        Self::settle(faults)
    }

    /// 在指定孔位吸液（体积为名义 µL，按液体类别校正后编码）
    pub fn aspirate(
        &mut self,
        address: &str,
        volumes: &[f64],
        liquid: &star_protocol::LiquidClass,
    ) -> Result<(), ClientError> {
        let sites = self.deck.resolve(address)?;
        let channels = self.leading_channels(sites.len())?;
        if volumes.len() != sites.len() {
            return Err(ClientError::InvalidInput(format!(
                "{} sites but {} volumes",
                sites.len(),
                volumes.len()
            )));
        }
        for (&channel, &volume) in channels.iter().zip(volumes) {
            self.bank.validate_aspirate(channel, volume)?;
        }

        let pattern = ChannelPattern::from_active(self.config.channel_count, &channels);
        let cmd = FirmwareCommand::new(MODULE_PIPETTING, CMD_ASPIRATE, self.take_seq())?
            .single("at", 0.0)?
            .pattern("tm", &pattern)?
            .per_channel("xp", sites.iter().map(|s| s.coordinate.x))?
            .per_channel("yp", sites.iter().map(|s| s.coordinate.y))?
            .single("th", self.config.traverse_height_mm)?
            .single("te", self.config.traverse_height_mm)?
            .per_channel("zl", sites.iter().map(|s| s.coordinate.z))?
            .per_channel("av", volumes.iter().map(|&v| liquid.correct(v)))?
            .single("as", self.config.aspirate_speed_ul_s)?;

        let resp = self.roundtrip(cmd, &channels)?;
        let faults = resp.faults(&pattern)?;
        for (&channel, &volume) in channels.iter().zip(volumes) {
            if !faults.iter().any(|f| f.channel == channel) {
                self.bank.commit_aspirate(channel, volume);
            }
        }
        Self::settle(faults)
    }

    /// 在指定孔位排液
    ///
    /// 部分排液保留余量；失败通道回到操作前状态（未提交）。
    pub fn dispense(
        &mut self,
        address: &str,
        volumes: &[f64],
        liquid: &star_protocol::LiquidClass,
    ) -> Result<(), ClientError> {
        let sites = self.deck.resolve(address)?;
        let channels = self.leading_channels(sites.len())?;
        if volumes.len() != sites.len() {
            return Err(ClientError::InvalidInput(format!(
                "{} sites but {} volumes",
                sites.len(),
                volumes.len()
            )));
        }
        for (&channel, &volume) in channels.iter().zip(volumes) {
            self.bank.validate_dispense(channel, volume)?;
        }

        let pattern = ChannelPattern::from_active(self.config.channel_count, &channels);
        let cmd = FirmwareCommand::new(MODULE_PIPETTING, CMD_DISPENSE, self.take_seq())?
            .single("dm", 0.0)?
            .pattern("tm", &pattern)?
            .per_channel("xp", sites.iter().map(|s| s.coordinate.x))?
            .per_channel("yp", sites.iter().map(|s| s.coordinate.y))?
            .per_channel(
                "zx",
                sites
                    .iter()
                    .map(|s| s.coordinate.z + self.config.dispense_height_mm),
            )?
            .per_channel("dv", volumes.iter().map(|&v| liquid.correct(v)))?
            .single("ds", self.config.dispense_speed_ul_s)?;

        let resp = self.roundtrip(cmd, &channels)?;
        let faults = resp.faults(&pattern)?;
        for (&channel, &volume) in channels.iter().zip(volumes) {
            if !faults.iter().any(|f| f.channel == channel) {
                self.bank.commit_dispense(channel, volume);
            }
        }
        Self::settle(faults)
    }

    /// 把吸头放回指定孔位（常用于归还吸头架）
    pub fn drop_tips(&mut self, address: &str) -> Result<(), ClientError> {
        let sites = self.deck.resolve(address)?;
        let channels = self.leading_channels(sites.len())?;
        self.bank.validate_drop(&channels)?;
        let site_z = sites[0].coordinate.z;
        let (committed, faults) = self.discard_at(
            &channels,
            sites.iter().map(|s| s.coordinate.x).collect(),
            sites.iter().map(|s| s.coordinate.y).collect(),
            site_z,
        )?;
        // 归还进吸头架的孔位重新可供拾取
        if self.deck.node(sites[0].node).tip_type.is_some() {
            for (&channel, site) in channels.iter().zip(&sites) {
                if committed.contains(&channel) {
                    if let Some(spent) = self.spent_tips.get_mut(&site.node) {
                        spent.remove(&site.well);
                    }
                }
            }
        }
        Self::settle(faults)
    }

    /// 把所有带吸头的通道上的吸头丢入废料槽
    pub fn discard_tips(&mut self, trash: &str) -> Result<(), ClientError> {
        let channels: Vec<usize> = (0..self.bank.count())
            .filter(|&c| {
                self.bank
                    .state(c)
                    .map(|s| s.has_tip())
                    .unwrap_or(false)
            })
            .collect();
        if channels.is_empty() {
            return Err(ClientError::InvalidInput(
                "no tips fitted on any channel".to_string(),
            ));
        }
        self.bank.validate_drop(&channels)?;

        let trash_id = self.deck.find(trash)?;
        let origin = self.deck.absolute(trash_id)?;
        // 通道在废料槽上方沿 y 按 9 mm 展开
        let xs: Vec<f64> = channels.iter().map(|_| origin.x).collect();
        let ys: Vec<f64> = channels
            .iter()
            .enumerate()
            .map(|(i, _)| origin.y - i as f64 * 9.0)
            .collect();
        let (_committed, faults) = self.discard_at(&channels, xs, ys, origin.z)?;
        Self::settle(faults)
    }

    /// 发出 TR 并逐通道提交丢弃；返回已提交的通道与设备错误
    fn discard_at(
        &mut self,
        channels: &[usize],
        xs: Vec<f64>,
        ys: Vec<f64>,
        site_z: f64,
    ) -> Result<(Vec<usize>, Vec<DeviceFault>), ClientError> {
        let pattern = ChannelPattern::from_active(self.config.channel_count, channels);
        let cmd = FirmwareCommand::new(MODULE_PIPETTING, CMD_TIP_DISCARD, self.take_seq())?
            .per_channel("xp", xs)?
            .per_channel("yp", ys)?
            .pattern("tm", &pattern)?
            .single("tp", site_z)?
            .single("tz", (site_z - self.config.pickup_stroke_mm).max(0.0))?
            .single("th", self.config.traverse_height_mm)?;

        let resp = self.roundtrip(cmd, channels)?;
        let faults = resp.faults(&pattern)?;
        let mut committed = Vec::with_capacity(channels.len());
        for &channel in channels {
            if !faults.iter().any(|f| f.channel == channel) {
                self.bank.commit_drop(channel);
                committed.push(channel);
            }
        }
        // 丢弃传感器数组只在该指令的应答里有意义，记录供诊断
        if let Some(kz) = resp.sensor("kz") {
            debug!(readings = ?kz.values, "tip discard sensor");
        }
        Ok((committed, faults))
    }

    /// 超时后的显式重同步
    ///
    /// 问回吸头在位数组，重建空/带吸头两态。持液量在歧义失败后
    /// 物理上不可知，一律清零。这是唯一能离开未知态的途径。
    pub fn resync(&mut self) -> Result<(), ClientError> {
        let cmd =
            FirmwareCommand::new(MODULE_PIPETTING, CMD_QUERY_TIP_PRESENCE, self.take_seq())?;
        let resp = self.roundtrip(cmd, &[])?;
        self.check_master(&resp)?;

        let rt = resp
            .sensor("rt")
            .ok_or_else(|| ProtocolError::Malformed {
                reason: "missing tip presence field",
                raw: resp.raw.clone(),
            })?;
        self.bank
            .apply_tip_presence(&rt.values, self.default_tip_type());
        info!(states = ?self.bank.states(), "channel state resynchronized");
        Ok(())
    }

    // ==================== 内部 ====================

    /// 操作的通道分配策略：孔位 i ↔ 通道 i
    fn leading_channels(&self, count: usize) -> Result<Vec<usize>, ClientError> {
        if count > self.config.channel_count {
            return Err(ClientError::InvalidInput(format!(
                "{} sites exceed {} channels",
                count, self.config.channel_count
            )));
        }
        Ok((0..count).collect())
    }

    /// 向设备定义吸头类型（每表位只发一次 TT，重复调用为空操作）
    ///
    /// 拾取操作会按吸头架的类型自动调用；手工调用可用于预热。
    pub fn define_tip_type(&mut self, tip: &TipType) -> Result<(), ClientError> {
        if self.defined_tip_types.contains(&tip.type_index) {
            return Ok(());
        }
        let cmd = FirmwareCommand::new(MODULE_PIPETTING, CMD_TIP_TYPE, self.take_seq())?
            .single("tt", tip.type_index as f64)?
            .single("tf", tip.has_filter as u8 as f64)?
            .single("tl", tip.length_mm)?
            .single("tv", tip.volume_ul)?
            .single("tg", tip.size_code as f64)?
            .single("tu", tip.pickup_method as f64)?;
        let resp = self.roundtrip(cmd, &[])?;
        self.check_master(&resp)?;
        self.defined_tip_types.push(tip.type_index);
        Ok(())
    }

    fn default_tip_type(&self) -> TipType {
        // resync 后仍在通道上的吸头若类型失考，按高容量档保守处理
        TipType::high_volume_filtered()
    }

    /// 一次指令往返：编码、发送、按序号关联应答
    ///
    /// 超时把 `active` 通道标成未知并作废该序号；此后迟到的同号
    /// 应答在下一次往返中被静默排掉，其余序号错配是协议错误。
    fn roundtrip(
        &mut self,
        cmd: FirmwareCommand,
        active: &[usize],
    ) -> Result<FirmwareResponse, ClientError> {
        let seq = cmd.seq();
        let line = cmd.encode(self.config.channel_count)?;
        debug!(command = %line, "sending");
        self.transport.send(&line)?;

        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.transport.receive_timeout(remaining) {
                Ok(raw) => {
                    let resp = FirmwareResponse::parse(&raw)?;
                    if resp.seq == seq {
                        debug!(response = %resp.raw, "acknowledged");
                        return Ok(resp);
                    }
                    if let Some(pos) = self.stale_seqs.iter().position(|&s| s == resp.seq) {
                        self.stale_seqs.remove(pos);
                        warn!(seq = resp.seq, "discarding late response for timed-out command");
                        continue;
                    }
                    return Err(ProtocolError::IdMismatch {
                        expected: seq,
                        got: resp.seq,
                    }
                    .into());
                },
                Err(SerialError::Timeout) => {
                    self.bank.mark_unknown(active);
                    self.stale_seqs.push(seq);
                    warn!(
                        seq,
                        affected = ?active,
                        "response timeout; affected channels are unknown until resync"
                    );
                    return Err(ClientError::Timeout);
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 无逐通道字段的指令只有主错误码
    fn check_master(&self, resp: &FirmwareResponse) -> Result<(), ClientError> {
        let faults: Vec<DeviceFault> = resp
            .errors
            .iter()
            .enumerate()
            .filter(|&(_, &raw)| raw != 0)
            .map(|(channel, &raw)| DeviceFault {
                channel,
                code: ChannelErrorCode::from(raw),
                raw,
            })
            .collect();
        Self::settle(faults)
    }

    fn settle(faults: Vec<DeviceFault>) -> Result<(), ClientError> {
        if faults.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Device(faults))
        }
    }
}
