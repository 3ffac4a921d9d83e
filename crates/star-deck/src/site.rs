//! 孔位地址与范围解析
//!
//! 孔位按行字母 + 列数字标记（"A1" = 首行首列），范围用冒号连接
//! 两个端点（"A1:C1"）。范围展开为**列优先**序：先沿列向下走完行，
//! 再进入下一列。该顺序与设备寻址约定一致，并直接决定下游的通道
//! 分配（第 i 个孔位 ↔ 第 i 个活动通道），属于正确性不变量。

use crate::DeckError;

/// 单个孔位地址（0 基行列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WellAddress {
    /// 行索引（0 = 'A'）
    pub row: u8,
    /// 列索引（0 = 列 1）
    pub col: u16,
}

impl WellAddress {
    pub fn new(row: u8, col: u16) -> Self {
        Self { row, col }
    }

    /// 解析 "A1" 形式的地址
    pub fn parse(text: &str) -> Result<Self, DeckError> {
        let malformed = |reason| DeckError::Address {
            address: text.to_string(),
            reason,
        };

        let mut chars = text.chars();
        let row_char = chars.next().ok_or_else(|| malformed("empty address"))?;
        if !row_char.is_ascii_uppercase() {
            return Err(malformed("row must be an uppercase letter"));
        }
        let row = row_char as u8 - b'A';

        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("column must be a positive number"));
        }
        let col: u16 = digits
            .parse()
            .map_err(|_| malformed("column out of range"))?;
        if col == 0 {
            return Err(malformed("columns are numbered from 1"));
        }
        Ok(Self { row, col: col - 1 })
    }
}

impl std::fmt::Display for WellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", (b'A' + self.row) as char, self.col + 1)
    }
}

/// 连续孔位范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellRange {
    pub start: WellAddress,
    pub end: WellAddress,
}

impl WellRange {
    /// 解析 "A1" 或 "A1:C1" 形式（单孔视为一孔范围）
    pub fn parse(text: &str) -> Result<Self, DeckError> {
        match text.split_once(':') {
            None => {
                let single = WellAddress::parse(text)?;
                Ok(Self {
                    start: single,
                    end: single,
                })
            },
            Some((start, end)) => {
                let start = WellAddress::parse(start)?;
                let end = WellAddress::parse(end)?;
                if end.row < start.row || end.col < start.col {
                    return Err(DeckError::Address {
                        address: text.to_string(),
                        reason: "range end precedes range start",
                    });
                }
                Ok(Self { start, end })
            },
        }
    }

    /// 列优先展开，顺序稳定
    pub fn expand(&self) -> Vec<WellAddress> {
        let mut wells = Vec::with_capacity(self.len());
        for col in self.start.col..=self.end.col {
            for row in self.start.row..=self.end.row {
                wells.push(WellAddress::new(row, col));
            }
        }
        wells
    }

    /// 范围内孔位数量
    pub fn len(&self) -> usize {
        let rows = (self.end.row - self.start.row + 1) as usize;
        let cols = (self.end.col - self.start.col + 1) as usize;
        rows * cols
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
