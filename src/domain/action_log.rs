// ==========================================
// 安保驻勤排班系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入接口必须记录
// 用途: 审计追踪(谁在何时改了哪个哨位/时隙)
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID (UUID)
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)

    // ===== 定位字段 (业务用) =====
    pub post_id: Option<String>,         // 涉及哨位
    pub installation_id: Option<String>, // 涉及驻勤点
    pub slot_id: Option<String>,         // 涉及查哨时隙
    pub date: Option<NaiveDate>,         // 涉及日期
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    UpsertAssignment,   // 写入基础排班
    RecordLeave,        // 录入人事休假事件
    AssignCoverage,     // 指派替班
    CancelCoverage,     // 取消替班
    ConfirmAttendance,  // 到岗确认
    ApplyStatus,        // 引擎解析落库
    ManualStatusEdit,   // 人工改写运行状态
    UpsertInstallation, // 写入驻勤点/查哨配置
    GenerateSlots,      // 生成查哨时隙
    RecordCall,         // 录入查哨结果
    RecordIncident,     // 录入异常事件
    ResetCall,          // 重置查哨结果
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::UpsertAssignment => "UpsertAssignment",
            ActionType::RecordLeave => "RecordLeave",
            ActionType::AssignCoverage => "AssignCoverage",
            ActionType::CancelCoverage => "CancelCoverage",
            ActionType::ConfirmAttendance => "ConfirmAttendance",
            ActionType::ApplyStatus => "ApplyStatus",
            ActionType::ManualStatusEdit => "ManualStatusEdit",
            ActionType::UpsertInstallation => "UpsertInstallation",
            ActionType::GenerateSlots => "GenerateSlots",
            ActionType::RecordCall => "RecordCall",
            ActionType::RecordIncident => "RecordIncident",
            ActionType::ResetCall => "ResetCall",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UpsertAssignment" => Some(ActionType::UpsertAssignment),
            "RecordLeave" => Some(ActionType::RecordLeave),
            "AssignCoverage" => Some(ActionType::AssignCoverage),
            "CancelCoverage" => Some(ActionType::CancelCoverage),
            "ConfirmAttendance" => Some(ActionType::ConfirmAttendance),
            "ApplyStatus" => Some(ActionType::ApplyStatus),
            "ManualStatusEdit" => Some(ActionType::ManualStatusEdit),
            "UpsertInstallation" => Some(ActionType::UpsertInstallation),
            "GenerateSlots" => Some(ActionType::GenerateSlots),
            "RecordCall" => Some(ActionType::RecordCall),
            "RecordIncident" => Some(ActionType::RecordIncident),
            "ResetCall" => Some(ActionType::ResetCall),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志（自动生成 UUID 与时间戳）
    pub fn new(action_type: ActionType, actor: String) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor,
            payload_json: None,
            post_id: None,
            installation_id: None,
            slot_id: None,
            date: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置涉及哨位与日期
    pub fn with_post(mut self, post_id: &str, date: NaiveDate) -> Self {
        self.post_id = Some(post_id.to_string());
        self.date = Some(date);
        self
    }

    /// 设置涉及驻勤点
    pub fn with_installation(mut self, installation_id: &str) -> Self {
        self.installation_id = Some(installation_id.to_string());
        self
    }

    /// 设置涉及时隙
    pub fn with_slot(mut self, slot_id: &str) -> Self {
        self.slot_id = Some(slot_id.to_string());
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}
