// ==========================================
// 安保驻勤排班系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod monitoring;
pub mod roster;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use monitoring::{
    slot_identity, CallSlot, CallSlotView, Incident, Installation, MonitoringConfig,
};
pub use roster::{
    AttendanceRecord, CoverageAssignment, Guard, HrLeaveEvent, OperationalStatus, Post,
    PostAssignment,
};
pub use types::{
    CallChannel, CallOutcome, IncidentKind, IncidentSeverity, LeaveKind, MonitoringMode,
    OperationStatus, PlanBase, RrhhStatus, StatusOrigin,
};
