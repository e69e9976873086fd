// ==========================================
// 安保驻勤排班系统 - 领域类型定义
// ==========================================
// 红线: 休假类型优先级只允许在 LeaveKind::priority 一处定义,
//       其余代码一律通过该表比较, 禁止散落的 if/else 优先级判断
// 序列化格式: snake_case (与数据库及对外状态码一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 基础排班 (Plan Base)
// ==========================================
// 哨位某日的底层计划: 排班 / 轮休
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanBase {
    Planned, // 正常排班
    DayOff,  // 轮休日
}

impl fmt::Display for PlanBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PlanBase {
    /// 从字符串解析（数据库存储格式）
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(PlanBase::Planned),
            "day_off" => Some(PlanBase::DayOff),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PlanBase::Planned => "planned",
            PlanBase::DayOff => "day_off",
        }
    }

    /// 轮休日判定（解析规则第一层的短路条件）
    pub fn is_day_off(&self) -> bool {
        matches!(self, PlanBase::DayOff)
    }
}

// ==========================================
// 休假事件类型 (Leave Kind)
// ==========================================
// 来自人事系统(RRHH)的休假/离职事件类型
// 红线: 同一保安员同一天多条事件只取优先级最高的一条, 从不合并
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    Termination,  // 离职
    MedicalLeave, // 病假
    PaidLeave,    // 带薪休假
    UnpaidLeave,  // 无薪事假
}

impl LeaveKind {
    /// 优先级查表（数值越大优先级越高）
    ///
    /// # 规则
    /// 离职 > 病假 > 带薪休假 > 无薪事假
    ///
    /// 新增休假类型时只需在此补一行, 解析引擎无需改动。
    pub fn priority(&self) -> u8 {
        match self {
            LeaveKind::Termination => 3,
            LeaveKind::MedicalLeave => 2,
            LeaveKind::PaidLeave => 1,
            LeaveKind::UnpaidLeave => 0,
        }
    }

    /// 从字符串解析（数据库存储格式）
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "termination" => Some(LeaveKind::Termination),
            "medical_leave" => Some(LeaveKind::MedicalLeave),
            "paid_leave" => Some(LeaveKind::PaidLeave),
            "unpaid_leave" => Some(LeaveKind::UnpaidLeave),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            LeaveKind::Termination => "termination",
            LeaveKind::MedicalLeave => "medical_leave",
            LeaveKind::PaidLeave => "paid_leave",
            LeaveKind::UnpaidLeave => "unpaid_leave",
        }
    }
}

impl fmt::Display for LeaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 人事状态 (RRHH Status)
// ==========================================
// rrhh 命名沿用上游人事系统字段, 勿改
// none 表示当日无任何休假/离职事件覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RrhhStatus {
    None,               // 无人事事件
    Covered(LeaveKind), // 被某休假事件覆盖
}

impl RrhhStatus {
    /// 数据库/状态码字符串
    pub fn as_code(&self) -> &'static str {
        match self {
            RrhhStatus::None => "none",
            RrhhStatus::Covered(kind) => kind.to_db_str(),
        }
    }

    /// 从字符串解析（数据库存储格式）
    pub fn from_code(s: &str) -> Option<Self> {
        if s == "none" {
            return Some(RrhhStatus::None);
        }
        LeaveKind::from_str(s).map(RrhhStatus::Covered)
    }
}

impl fmt::Display for RrhhStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

impl From<LeaveKind> for RrhhStatus {
    fn from(kind: LeaveKind) -> Self {
        RrhhStatus::Covered(kind)
    }
}

impl From<RrhhStatus> for String {
    fn from(status: RrhhStatus) -> Self {
        status.as_code().to_string()
    }
}

impl TryFrom<String> for RrhhStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RrhhStatus::from_code(&value).ok_or_else(|| format!("未知人事状态码: {}", value))
    }
}

// ==========================================
// 运行状态 (Operation Status)
// ==========================================
// 状态解析引擎的最终输出, 每个哨位每天恰好一个
// 状态码由结构组合生成: "{基础}_{是否替班}" , 禁止手拼字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum OperationStatus {
    /// 轮休日, 终态, 不参与任何后续判断
    DayOff,
    /// 正常到岗
    Attended,
    /// 待补位哨位（无在编保安或在编已离职）
    PendingCoverage { filled: bool },
    /// 无人事事件但未到岗
    Absence { filled: bool },
    /// 被人事休假事件覆盖
    Leave { kind: LeaveKind, filled: bool },
}

impl OperationStatus {
    const FILLED_SUFFIX: &'static str = "_filled_by_extra_shift";
    const UNFILLED_SUFFIX: &'static str = "_unfilled";

    /// 状态码（数据库存储与对外展示一致）
    pub fn code(&self) -> String {
        match self {
            OperationStatus::DayOff => "day_off".to_string(),
            OperationStatus::Attended => "attended".to_string(),
            OperationStatus::PendingCoverage { filled } => {
                Self::compose("pending_coverage", *filled)
            }
            OperationStatus::Absence { filled } => Self::compose("absence", *filled),
            OperationStatus::Leave { kind, filled } => Self::compose(kind.to_db_str(), *filled),
        }
    }

    fn compose(base: &str, filled: bool) -> String {
        if filled {
            format!("{}{}", base, Self::FILLED_SUFFIX)
        } else {
            format!("{}{}", base, Self::UNFILLED_SUFFIX)
        }
    }

    /// 从状态码解析
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "day_off" => return Some(OperationStatus::DayOff),
            "attended" => return Some(OperationStatus::Attended),
            _ => {}
        }

        let (base, filled) = if let Some(base) = s.strip_suffix(Self::FILLED_SUFFIX) {
            (base, true)
        } else if let Some(base) = s.strip_suffix(Self::UNFILLED_SUFFIX) {
            (base, false)
        } else {
            return None;
        };

        match base {
            "pending_coverage" => Some(OperationStatus::PendingCoverage { filled }),
            "absence" => Some(OperationStatus::Absence { filled }),
            _ => LeaveKind::from_str(base).map(|kind| OperationStatus::Leave { kind, filled }),
        }
    }

    /// 是否由替班（加班补位）补齐
    pub fn is_filled_by_extra_shift(&self) -> bool {
        matches!(
            self,
            OperationStatus::PendingCoverage { filled: true }
                | OperationStatus::Absence { filled: true }
                | OperationStatus::Leave { filled: true, .. }
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<OperationStatus> for String {
    fn from(status: OperationStatus) -> Self {
        status.code()
    }
}

impl TryFrom<String> for OperationStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OperationStatus::from_code(&value).ok_or_else(|| format!("未知运行状态码: {}", value))
    }
}

// ==========================================
// 查哨结果 (Call Outcome)
// ==========================================
// 状态机: pending -> {successful, no_answer, busy, incident} 终态
//         终态 -> pending 仅允许通过 reset（人工更正）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Pending,    // 待执行
    Successful, // 正常
    NoAnswer,   // 无人接听
    Busy,       // 占线
    Incident,   // 异常事件
}

impl CallOutcome {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallOutcome::Pending)
    }

    /// 从字符串解析（数据库存储格式）
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CallOutcome::Pending),
            "successful" => Some(CallOutcome::Successful),
            "no_answer" => Some(CallOutcome::NoAnswer),
            "busy" => Some(CallOutcome::Busy),
            "incident" => Some(CallOutcome::Incident),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CallOutcome::Pending => "pending",
            CallOutcome::Successful => "successful",
            CallOutcome::NoAnswer => "no_answer",
            CallOutcome::Busy => "busy",
            CallOutcome::Incident => "incident",
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 查哨渠道 (Call Channel)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallChannel {
    Phone, // 电话
    Sms,   // 短信
    App,   // 移动端上报
}

impl CallChannel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "phone" => Some(CallChannel::Phone),
            "sms" => Some(CallChannel::Sms),
            "app" => Some(CallChannel::App),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CallChannel::Phone => "phone",
            CallChannel::Sms => "sms",
            CallChannel::App => "app",
        }
    }
}

impl fmt::Display for CallChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 查哨方式 (Monitoring Mode)
// ==========================================
// 驻勤点级别配置: 电话呼叫 / 消息推送
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    Call,    // 电话呼叫
    Message, // 消息推送（按模板）
}

impl MonitoringMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "call" => Some(MonitoringMode::Call),
            "message" => Some(MonitoringMode::Message),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MonitoringMode::Call => "call",
            MonitoringMode::Message => "message",
        }
    }
}

impl fmt::Display for MonitoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 异常事件类型 (Incident Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Security,   // 安全事件（入侵/盗窃等）
    Medical,    // 人员伤病
    Equipment,  // 设备故障
    NoResponse, // 持续失联
    Other,      // 其他
}

impl IncidentKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "security" => Some(IncidentKind::Security),
            "medical" => Some(IncidentKind::Medical),
            "equipment" => Some(IncidentKind::Equipment),
            "no_response" => Some(IncidentKind::NoResponse),
            "other" => Some(IncidentKind::Other),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            IncidentKind::Security => "security",
            IncidentKind::Medical => "medical",
            IncidentKind::Equipment => "equipment",
            IncidentKind::NoResponse => "no_response",
            IncidentKind::Other => "other",
        }
    }
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 异常严重等级 (Incident Severity)
// ==========================================
// 顺序: Low < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Low,      // 轻微
    Medium,   // 一般
    High,     // 严重
    Critical, // 紧急
}

impl IncidentSeverity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(IncidentSeverity::Low),
            "medium" => Some(IncidentSeverity::Medium),
            "high" => Some(IncidentSeverity::High),
            "critical" => Some(IncidentSeverity::Critical),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            IncidentSeverity::Low => "low",
            IncidentSeverity::Medium => "medium",
            IncidentSeverity::High => "high",
            IncidentSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 状态写入来源 (Status Origin)
// ==========================================
// 区分引擎自动写入与人工改写, 便于审计回溯
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusOrigin {
    System, // 引擎写入
    Manual, // 人工改写
}

impl StatusOrigin {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(StatusOrigin::System),
            "manual" => Some(StatusOrigin::Manual),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            StatusOrigin::System => "system",
            StatusOrigin::Manual => "manual",
        }
    }
}

impl fmt::Display for StatusOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
