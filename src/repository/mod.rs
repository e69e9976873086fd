// ==========================================
// 安保驻勤排班系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod call_slot_repo;
pub mod error;
pub mod guard_repo;
pub mod installation_repo;
pub mod post_repo;
pub mod roster_repo;
pub mod row;
pub mod sqlite_store;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use call_slot_repo::{CallSlotRepository, IncidentRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use guard_repo::GuardRepository;
pub use installation_repo::InstallationRepository;
pub use post_repo::PostRepository;
pub use roster_repo::{
    AttendanceRepository, CoverageRepository, LeaveEventRepository, OperationalStatusRepository,
    PostAssignmentRepository,
};
pub use sqlite_store::SqliteShiftPlanStore;
