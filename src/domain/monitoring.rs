// ==========================================
// 安保驻勤排班系统 - 查哨领域模型
// ==========================================
// 职责: 驻勤点与查哨配置、查哨时隙、异常事件
// 红线: 时隙ID必须由 (驻勤点, 计划时刻) 确定性生成,
//       重复生成排程不得产生重复行
// ==========================================

use crate::domain::types::{CallChannel, CallOutcome, IncidentKind, IncidentSeverity, MonitoringMode};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 时隙ID命名空间（UUID v5, 固定值, 勿改——改动会使既有时隙全部"改名"）
const SLOT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x14, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30,
    0xc8,
]);

/// 由 (驻勤点, 计划时刻) 确定性生成时隙ID
///
/// # 规则
/// - 同一输入永远得到同一ID, 跨进程/跨运行稳定
/// - 时刻格式化为秒级 `%Y-%m-%d %H:%M:%S`, 与数据库存储口径一致
pub fn slot_identity(installation_id: &str, scheduled_for: NaiveDateTime) -> String {
    let name = format!(
        "{}|{}",
        installation_id,
        scheduled_for.format("%Y-%m-%d %H:%M:%S")
    );
    Uuid::new_v5(&SLOT_ID_NAMESPACE, name.as_bytes()).to_string()
}

// ==========================================
// MonitoringConfig - 驻勤点查哨配置
// ==========================================
// window_start >= window_end 视为跨夜窗口（如 21:00-07:00）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,                    // 是否启用查哨
    pub interval_minutes: i64,            // 查哨间隔（分钟, 必须为正）
    pub window_start: Option<NaiveTime>,  // 窗口开始（本地时间）
    pub window_end: Option<NaiveTime>,    // 窗口结束（本地时间）
    pub mode: MonitoringMode,             // 电话呼叫 / 消息推送
    pub message_template: Option<String>, // 消息模板（message 方式用）
}

impl MonitoringConfig {
    /// 关闭状态的默认配置
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            interval_minutes: 0,
            window_start: None,
            window_end: None,
            mode: MonitoringMode::Call,
            message_template: None,
        }
    }
}

// ==========================================
// Installation - 驻勤点
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub installation_id: String,
    pub name: String,              // 驻勤点名称
    pub phone: Option<String>,     // 值守电话
    pub monitoring: MonitoringConfig,

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Installation {
    pub fn new(installation_id: String, name: String, phone: Option<String>) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            installation_id,
            name,
            phone,
            monitoring: MonitoringConfig::disabled(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// CallSlot - 查哨时隙
// ==========================================
// 生命周期: 排程生成(幂等) -> 录入结果(恰好一次) -> 可 reset 回待执行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSlot {
    pub slot_id: String,              // 确定性ID, 见 slot_identity
    pub installation_id: String,
    pub scheduled_for: NaiveDateTime, // 计划查哨时刻（本地）

    // ===== 结果字段（录入时写, reset 时清空）=====
    pub outcome: CallOutcome,
    pub channel: Option<CallChannel>,
    pub executed_at: Option<NaiveDateTime>, // 实际执行时刻
    pub sla_seconds: Option<i64>,           // executed_at - scheduled_for, 负数=提前
    pub observations: Option<String>,       // 备注
    pub recorded_by: Option<String>,        // 录入人

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
}

impl CallSlot {
    /// 新建待执行时隙（ID 确定性生成）
    pub fn new(installation_id: String, scheduled_for: NaiveDateTime) -> Self {
        Self {
            slot_id: slot_identity(&installation_id, scheduled_for),
            installation_id,
            scheduled_for,
            outcome: CallOutcome::Pending,
            channel: None,
            executed_at: None,
            sla_seconds: None,
            observations: None,
            recorded_by: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }
}

// ==========================================
// CallSlotView - 读侧时隙视图
// ==========================================
// 三个标记为读时计算, 永不落库（见 engine::call_window::annotate_slot）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSlotView {
    pub slot: CallSlot,
    pub is_current: bool,  // 时隙小时 == 当前小时
    pub is_upcoming: bool, // 计划时刻在未来
    pub is_urgent: bool,   // 逾期超阈值且仍待执行
}

// ==========================================
// Incident - 异常事件
// ==========================================
// 红线: 与时隙一一对应(call_id 即主键); outcome=incident 与事件行同生同灭
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub call_id: String, // 关联 call_slot.slot_id（主键）
    pub kind: IncidentKind,
    pub severity: IncidentSeverity,
    pub detail: String,

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

impl Incident {
    pub fn new(
        call_id: String,
        kind: IncidentKind,
        severity: IncidentSeverity,
        detail: String,
        created_by: String,
    ) -> Self {
        Self {
            call_id,
            kind,
            severity,
            detail,
            created_at: chrono::Local::now().naive_local(),
            created_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("测试时间格式错误")
    }

    #[test]
    fn test_slot_identity_deterministic() {
        let a = slot_identity("INST-01", dt("2025-03-10 23:00:00"));
        let b = slot_identity("INST-01", dt("2025-03-10 23:00:00"));
        assert_eq!(a, b, "同一输入必须得到同一ID");
    }

    #[test]
    fn test_slot_identity_distinct_inputs() {
        let base = slot_identity("INST-01", dt("2025-03-10 23:00:00"));
        assert_ne!(base, slot_identity("INST-02", dt("2025-03-10 23:00:00")));
        assert_ne!(base, slot_identity("INST-01", dt("2025-03-10 23:30:00")));
    }

    #[test]
    fn test_call_slot_new_is_pending() {
        let slot = CallSlot::new(
            "INST-01".to_string(),
            NaiveDate::from_ymd_opt(2025, 3, 10)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        );
        assert_eq!(slot.outcome, CallOutcome::Pending);
        assert!(slot.executed_at.is_none());
        assert!(slot.sla_seconds.is_none());
        assert_eq!(slot.slot_id, slot_identity("INST-01", slot.scheduled_for));
    }
}
