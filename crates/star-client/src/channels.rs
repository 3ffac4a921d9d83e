//! 通道状态机
//!
//! 每个通道最多持有一枚吸头，吸头内最多一段液柱。状态只在指令被
//! 设备确认后变迁；本模块不做任何 I/O，只裁决可行性并给编码器
//! 提供通道掩码所需的活动槽集合。
//!
//! 状态转移：
//!
//! ```text
//! Empty --pick_up--> TipAttached --aspirate--> TipWithLiquid
//!   ^                     |  ^                     |
//!   |                   drop  \--dispense(全量)---/
//!   \---------drop------/ <--- TipWithLiquid --dispense(部分)--> TipWithLiquid
//! 任意状态 --(发出后线上失败)--> Unknown --resync--> Empty | TipAttached
//! ```

use smallvec::SmallVec;
use star_deck::TipType;
use thiserror::Error;

/// 通道状态校验错误
///
/// 全部在发送前报告，调用方换通道/换体积即可恢复。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// 通道当前状态不允许该操作
    #[error("Channel {channel} conflict: {reason}")]
    Conflict { channel: usize, reason: &'static str },

    /// 体积超出吸头额定容量
    #[error("Volume {volume} uL exceeds capacity {capacity} uL on channel {channel}")]
    Capacity {
        channel: usize,
        volume: f64,
        capacity: f64,
    },

    /// 排液量超过当前持液量
    #[error("Channel {channel} holds {held} uL, cannot dispense {requested} uL")]
    InsufficientVolume {
        channel: usize,
        held: f64,
        requested: f64,
    },

    /// 通道处于未知态，先 resync
    #[error("Channel {channel} state is unknown; resynchronize first")]
    Unknown { channel: usize },

    /// 通道索引超出通道帧
    #[error("Channel {channel} out of range ({count} channels)")]
    OutOfRange { channel: usize, count: usize },
}

/// 单通道状态
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelState {
    /// 无吸头
    #[default]
    Empty,
    /// 已装吸头，无液
    TipAttached { tip: TipType },
    /// 已装吸头，持液
    TipWithLiquid { tip: TipType, volume_ul: f64 },
    /// 线上歧义失败后的未知态；只有 resync 能离开
    Unknown,
}

impl ChannelState {
    /// 是否装有吸头（持液与否均算）
    pub fn has_tip(&self) -> bool {
        matches!(
            self,
            ChannelState::TipAttached { .. } | ChannelState::TipWithLiquid { .. }
        )
    }

    /// 当前持液量；无吸头或未知态为 None
    pub fn held_volume(&self) -> Option<f64> {
        match self {
            ChannelState::TipAttached { .. } => Some(0.0),
            ChannelState::TipWithLiquid { volume_ul, .. } => Some(*volume_ul),
            _ => None,
        }
    }

    /// 所装吸头类型
    pub fn tip(&self) -> Option<&TipType> {
        match self {
            ChannelState::TipAttached { tip } => Some(tip),
            ChannelState::TipWithLiquid { tip, .. } => Some(tip),
            _ => None,
        }
    }
}

/// 固定通道帧的状态组
#[derive(Debug, Clone)]
pub struct ChannelBank {
    states: SmallVec<[ChannelState; 8]>,
}

impl ChannelBank {
    /// 创建全空通道组
    pub fn new(count: usize) -> Self {
        Self {
            states: SmallVec::from_elem(ChannelState::Empty, count),
        }
    }

    /// 通道数量
    pub fn count(&self) -> usize {
        self.states.len()
    }

    /// 单通道状态
    pub fn state(&self, channel: usize) -> Result<&ChannelState, ChannelError> {
        self.states.get(channel).ok_or(ChannelError::OutOfRange {
            channel,
            count: self.states.len(),
        })
    }

    /// 全部状态（按槽序）
    pub fn states(&self) -> &[ChannelState] {
        &self.states
    }

    fn reject_unknown(&self, channel: usize) -> Result<&ChannelState, ChannelError> {
        let state = self.state(channel)?;
        if matches!(state, ChannelState::Unknown) {
            return Err(ChannelError::Unknown { channel });
        }
        Ok(state)
    }

    // ==================== 校验（发送前，纯函数） ====================

    /// 拾取校验：仅空通道可选
    pub fn validate_pick_up(&self, channels: &[usize]) -> Result<(), ChannelError> {
        for &channel in channels {
            let state = self.reject_unknown(channel)?;
            if !matches!(state, ChannelState::Empty) {
                return Err(ChannelError::Conflict {
                    channel,
                    reason: "channel already carries a tip",
                });
            }
        }
        Ok(())
    }

    /// 吸液校验：须带吸头，总持液不得超过额定容量
    pub fn validate_aspirate(&self, channel: usize, volume_ul: f64) -> Result<(), ChannelError> {
        let state = self.reject_unknown(channel)?;
        let Some(tip) = state.tip() else {
            return Err(ChannelError::Conflict {
                channel,
                reason: "no tip fitted",
            });
        };
        if volume_ul < 0.0 {
            return Err(ChannelError::Capacity {
                channel,
                volume: volume_ul,
                capacity: tip.volume_ul,
            });
        }
        let held = state.held_volume().unwrap_or(0.0);
        if held + volume_ul > tip.volume_ul {
            return Err(ChannelError::Capacity {
                channel,
                volume: held + volume_ul,
                capacity: tip.volume_ul,
            });
        }
        Ok(())
    }

    /// 排液校验：须持液，且排量不超过持液量
    pub fn validate_dispense(&self, channel: usize, volume_ul: f64) -> Result<(), ChannelError> {
        let state = self.reject_unknown(channel)?;
        if !state.has_tip() {
            return Err(ChannelError::Conflict {
                channel,
                reason: "no tip fitted",
            });
        }
        let held = state.held_volume().unwrap_or(0.0);
        if volume_ul < 0.0 || volume_ul > held {
            return Err(ChannelError::InsufficientVolume {
                channel,
                held,
                requested: volume_ul,
            });
        }
        Ok(())
    }

    /// 丢弃校验：须带吸头
    pub fn validate_drop(&self, channels: &[usize]) -> Result<(), ChannelError> {
        for &channel in channels {
            let state = self.reject_unknown(channel)?;
            if !state.has_tip() {
                return Err(ChannelError::Conflict {
                    channel,
                    reason: "no tip to drop",
                });
            }
        }
        Ok(())
    }

    // ==================== 提交（仅在设备确认后调用） ====================

    /// 提交拾取
    pub fn commit_pick_up(&mut self, channel: usize, tip: TipType) {
        self.states[channel] = ChannelState::TipAttached { tip };
    }

    /// 提交吸液（累加持液量）
    pub fn commit_aspirate(&mut self, channel: usize, volume_ul: f64) {
        let state = &mut self.states[channel];
        let tip = *state.tip().expect("validated before commit");
        let held = state.held_volume().unwrap_or(0.0);
        *state = ChannelState::TipWithLiquid {
            tip,
            volume_ul: held + volume_ul,
        };
    }

    /// 提交排液
    ///
    /// 持液量减少排出量；恰好排空才回到无液态，部分排出保留余量
    /// （系列稀释语义，余量非取整误差）。
    pub fn commit_dispense(&mut self, channel: usize, volume_ul: f64) {
        let state = &mut self.states[channel];
        let tip = *state.tip().expect("validated before commit");
        let held = state.held_volume().unwrap_or(0.0);
        let remaining = held - volume_ul;
        *state = if remaining == 0.0 {
            ChannelState::TipAttached { tip }
        } else {
            ChannelState::TipWithLiquid {
                tip,
                volume_ul: remaining,
            }
        };
    }

    /// 提交丢弃（液体随吸头一并丢弃，不再跟踪）
    pub fn commit_drop(&mut self, channel: usize) {
        self.states[channel] = ChannelState::Empty;
    }

    // ==================== 未知态与重同步 ====================

    /// 把一组通道标记为未知（线上歧义失败后）
    pub fn mark_unknown(&mut self, channels: &[usize]) {
        for &channel in channels {
            if channel < self.states.len() {
                self.states[channel] = ChannelState::Unknown;
            }
        }
    }

    /// 是否存在未知态通道
    pub fn any_unknown(&self) -> bool {
        self.states
            .iter()
            .any(|s| matches!(s, ChannelState::Unknown))
    }

    /// 用吸头在位传感器数组重建状态
    ///
    /// 只有吸头有无可以从设备问回；持液量在歧义失败后物理上不可知，
    /// 一律清零。`fallback_tip` 用于有吸头但类型已不可考的通道。
    pub fn apply_tip_presence(&mut self, flags: &[i64], fallback_tip: TipType) {
        for (channel, state) in self.states.iter_mut().enumerate() {
            let present = flags.get(channel).copied().unwrap_or(0) != 0;
            *state = if present {
                let tip = state.tip().copied().unwrap_or(fallback_tip);
                ChannelState::TipAttached { tip }
            } else {
                ChannelState::Empty
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip() -> TipType {
        TipType::high_volume_filtered()
    }

    #[test]
    fn test_pick_up_requires_empty() {
        let mut bank = ChannelBank::new(4);
        bank.validate_pick_up(&[0, 1, 2]).unwrap();
        bank.commit_pick_up(1, tip());
        let err = bank.validate_pick_up(&[0, 1]).unwrap_err();
        assert!(matches!(err, ChannelError::Conflict { channel: 1, .. }));
    }

    #[test]
    fn test_aspirate_requires_tip_and_capacity() {
        let mut bank = ChannelBank::new(4);
        assert!(matches!(
            bank.validate_aspirate(0, 10.0),
            Err(ChannelError::Conflict { .. })
        ));
        bank.commit_pick_up(0, tip());
        bank.validate_aspirate(0, 1250.0).unwrap();
        // 容量不变量：超额吸液失败且状态不变
        let before = bank.state(0).unwrap().clone();
        assert!(matches!(
            bank.validate_aspirate(0, 1250.1),
            Err(ChannelError::Capacity { .. })
        ));
        assert_eq!(bank.state(0).unwrap(), &before);
    }

    #[test]
    fn test_cumulative_aspirate_capacity() {
        let mut bank = ChannelBank::new(2);
        bank.commit_pick_up(0, tip());
        bank.commit_aspirate(0, 1000.0);
        bank.validate_aspirate(0, 250.0).unwrap();
        assert!(matches!(
            bank.validate_aspirate(0, 250.1),
            Err(ChannelError::Capacity { .. })
        ));
    }

    /// 往返不变量：aspirate(v) 后 dispense(v) 持液量精确归零
    #[test]
    fn test_aspirate_dispense_round_trip() {
        let mut bank = ChannelBank::new(2);
        bank.commit_pick_up(0, tip());
        for volume in [100.0, 50.0, 237.3] {
            bank.commit_aspirate(0, volume);
            bank.validate_dispense(0, volume).unwrap();
            bank.commit_dispense(0, volume);
            assert_eq!(bank.state(0).unwrap().held_volume(), Some(0.0));
            assert!(matches!(
                bank.state(0).unwrap(),
                ChannelState::TipAttached { .. }
            ));
        }
    }

    /// 部分排液保留余量（系列稀释语义）
    #[test]
    fn test_partial_dispense_retains_remainder() {
        let mut bank = ChannelBank::new(1);
        bank.commit_pick_up(0, tip());
        bank.commit_aspirate(0, 200.0);
        bank.commit_dispense(0, 50.0);
        assert_eq!(bank.state(0).unwrap().held_volume(), Some(150.0));
        assert!(matches!(
            bank.validate_dispense(0, 150.1),
            Err(ChannelError::InsufficientVolume { .. })
        ));
    }

    /// 往返不变量：pick up 后 drop 回到空态
    #[test]
    fn test_pick_up_drop_round_trip() {
        let mut bank = ChannelBank::new(2);
        bank.commit_pick_up(1, tip());
        bank.commit_aspirate(1, 10.0);
        bank.validate_drop(&[1]).unwrap();
        bank.commit_drop(1);
        assert_eq!(bank.state(1).unwrap(), &ChannelState::Empty);
        assert!(matches!(
            bank.validate_drop(&[1]),
            Err(ChannelError::Conflict { .. })
        ));
    }

    #[test]
    fn test_unknown_blocks_everything_until_resync() {
        let mut bank = ChannelBank::new(4);
        bank.commit_pick_up(0, tip());
        bank.mark_unknown(&[0, 1]);
        assert!(bank.any_unknown());
        assert!(matches!(
            bank.validate_pick_up(&[1]),
            Err(ChannelError::Unknown { channel: 1 })
        ));
        assert!(matches!(
            bank.validate_aspirate(0, 1.0),
            Err(ChannelError::Unknown { channel: 0 })
        ));

        bank.apply_tip_presence(&[1, 0, 0, 0], tip());
        assert!(!bank.any_unknown());
        // 吸头在但持液量已不可知，回到无液态
        assert!(matches!(
            bank.state(0).unwrap(),
            ChannelState::TipAttached { .. }
        ));
        assert_eq!(bank.state(1).unwrap(), &ChannelState::Empty);
    }

    #[test]
    fn test_out_of_range_channel() {
        let bank = ChannelBank::new(2);
        assert!(matches!(
            bank.state(5),
            Err(ChannelError::OutOfRange { channel: 5, count: 2 })
        ));
    }
}
