// ==========================================
// 安保驻勤排班系统 - API 层
// ==========================================
// 职责: 面向调度台/运维入口的业务门面
// ==========================================

pub mod error;
pub mod monitoring_api;
pub mod roster_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use monitoring_api::{DueBoard, DueBoardEntry, MonitoringApi, OutcomeSummary};
pub use roster_api::{DayApplyReport, LeaveRecordReport, PostApplyFailure, RosterApi};
