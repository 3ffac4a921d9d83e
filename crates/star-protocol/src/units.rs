//! 设备子单位定点转换
//!
//! 固件以固定宽度零填充的十进制整数传输所有数值，单位为设备原生
//! 子单位（0.1 mm、0.1 µL）。逻辑层使用 f64 毫米/微升，编码时转换。
//!
//! ## 取整策略
//!
//! 统一使用**四舍五入（half-up）**：`round_half_up(12.45) == 12.0`
//! 不成立，`round_half_up(124.5) == 125.0` 成立。参考语法的观测样本
//! 未完全约束取整规则，这里选定 half-up 并以测试固定下来，避免重复
//! 操作间的系统性漂移。

/// 四舍五入到最近整数，恰好 .5 时远离零进位
///
/// 注意：与 `f64::round` 对正数行为一致；协议中所有物理量非负，
/// 负值在字段编码前即被拒绝。
#[inline]
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// 毫米 → 0.1 mm 子单位
#[inline]
pub fn mm_to_submm(mm: f64) -> i64 {
    round_half_up(mm * 10.0) as i64
}

/// 0.1 mm 子单位 → 毫米
#[inline]
pub fn submm_to_mm(submm: i64) -> f64 {
    submm as f64 / 10.0
}

/// 微升 → 0.1 µL 子单位
#[inline]
pub fn ul_to_subul(ul: f64) -> i64 {
    round_half_up(ul * 10.0) as i64
}

/// 0.1 µL 子单位 → 微升
#[inline]
pub fn subul_to_ul(subul: i64) -> f64 {
    subul as f64 / 10.0
}
