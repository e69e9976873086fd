// ==========================================
// 安保驻勤排班系统 - 驻勤排班仓储
// ==========================================
// 职责: 按日排班事实的五张表
//   post_assignment    基础排班（岗位×日期）
//   hr_leave_event     人事休假/离职事件
//   coverage_assignment 加班顶勤
//   attendance_record  到岗确认
//   operational_status 解析结果快照
// 红线: Repository 不含业务逻辑
// ==========================================

mod assignment;
mod attendance;
mod coverage;
mod leave;
mod status;

pub use assignment::PostAssignmentRepository;
pub use attendance::AttendanceRepository;
pub use coverage::CoverageRepository;
pub use leave::LeaveEventRepository;
pub use status::OperationalStatusRepository;
