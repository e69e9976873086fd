// ==========================================
// 安保驻勤排班系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 所有判定必须输出 reason
// ==========================================

pub mod call_window;
pub mod outcome_tracker;
pub mod repositories;
pub mod resolution_core;
pub mod shift_plan_store;
pub mod state_resolution;

// 重导出核心引擎
pub use call_window::{
    annotate_slot, build_candidate_slots, in_day_window, in_overnight_window,
    validate_monitoring_config, window_contains, CallWindowScheduler, ConfigWarning,
    GenerateAllReport, SchedulerError, SlotGenerationReport, ValidatedWindow,
};
pub use outcome_tracker::{
    can_record, can_reset, sla_seconds, CallOutcomeTracker, RecordIncidentRequest,
    RecordOutcomeRequest, TrackerError,
};
pub use repositories::StaffingRepositories;
pub use resolution_core::{DayResolution, ResolutionCore, ResolutionInputs};
pub use shift_plan_store::{ShiftPlanStore, StoreResult};
pub use state_resolution::{ApplyOutcome, ResolutionError, StateResolutionEngine};
