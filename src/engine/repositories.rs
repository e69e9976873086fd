// ==========================================
// 安保驻勤排班系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合排班与查哨引擎所需的全部 Repository
// 说明: 全部仓储共享同一个串行化的 SQLite 连接;
//       逐个构造时各仓储自建表, 聚合构造等价于建全库
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::roster_repo::{
    AttendanceRepository, CoverageRepository, LeaveEventRepository, OperationalStatusRepository,
    PostAssignmentRepository,
};
use crate::repository::{
    ActionLogRepository, CallSlotRepository, GuardRepository, IncidentRepository,
    InstallationRepository, PostRepository,
};

/// 驻勤后台仓储集合
///
/// 把整套仓储合并为一个结构体参数, 便于注入与测试
#[derive(Clone)]
pub struct StaffingRepositories {
    pub guard_repo: Arc<GuardRepository>,
    pub post_repo: Arc<PostRepository>,
    pub assignment_repo: Arc<PostAssignmentRepository>,
    pub leave_repo: Arc<LeaveEventRepository>,
    pub coverage_repo: Arc<CoverageRepository>,
    pub attendance_repo: Arc<AttendanceRepository>,
    pub status_repo: Arc<OperationalStatusRepository>,
    pub installation_repo: Arc<InstallationRepository>,
    pub slot_repo: Arc<CallSlotRepository>,
    pub incident_repo: Arc<IncidentRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl StaffingRepositories {
    /// 打开数据库文件并构建全部仓储（建出完整库结构）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 在已有连接上构建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        Ok(Self {
            guard_repo: Arc::new(GuardRepository::from_connection(conn.clone())?),
            post_repo: Arc::new(PostRepository::from_connection(conn.clone())?),
            assignment_repo: Arc::new(PostAssignmentRepository::from_connection(conn.clone())?),
            leave_repo: Arc::new(LeaveEventRepository::from_connection(conn.clone())?),
            coverage_repo: Arc::new(CoverageRepository::from_connection(conn.clone())?),
            attendance_repo: Arc::new(AttendanceRepository::from_connection(conn.clone())?),
            status_repo: Arc::new(OperationalStatusRepository::from_connection(conn.clone())?),
            installation_repo: Arc::new(InstallationRepository::from_connection(conn.clone())?),
            slot_repo: Arc::new(CallSlotRepository::from_connection(conn.clone())?),
            incident_repo: Arc::new(IncidentRepository::from_connection(conn.clone())?),
            action_log_repo: Arc::new(ActionLogRepository::from_connection(conn)?),
        })
    }
}
