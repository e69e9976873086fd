use crate::db::open_sqlite_connection;
use crate::domain::roster::OperationalStatus;
use crate::domain::types::{OperationStatus, PlanBase, RrhhStatus, StatusOrigin};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{coded_col, date_col, datetime_col, DATETIME_FMT, DATE_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// OperationalStatusRepository - 状态快照仓储
// ==========================================
/// 勤务状态快照仓储
/// 职责: 管理 operational_status 表（解析结果的持久化形态）
/// 红线: 快照只由解析引擎或手工改派写入; 本仓储不重算状态
pub struct OperationalStatusRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperationalStatusRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS operational_status (
              post_id TEXT NOT NULL,
              date TEXT NOT NULL,
              plan_base TEXT NOT NULL,
              rrhh_status TEXT NOT NULL,
              operation_status TEXT NOT NULL,
              coverage_guard_id TEXT,
              coverage_motive TEXT,
              is_pending_coverage INTEGER NOT NULL DEFAULT 0,
              origin TEXT NOT NULL,
              resolved_at TEXT NOT NULL,
              resolved_by TEXT NOT NULL,
              PRIMARY KEY (post_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_operational_status_date
              ON operational_status(date);
            CREATE INDEX IF NOT EXISTS idx_operational_status_op
              ON operational_status(operation_status, date);
            "#,
        )?;
        Ok(())
    }

    /// 写入状态快照（同一岗位同一日重复解析为幂等覆盖）
    pub fn upsert(&self, status: &OperationalStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO operational_status
              (post_id, date, plan_base, rrhh_status, operation_status,
               coverage_guard_id, coverage_motive, is_pending_coverage,
               origin, resolved_at, resolved_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(post_id, date) DO UPDATE SET
              plan_base = excluded.plan_base,
              rrhh_status = excluded.rrhh_status,
              operation_status = excluded.operation_status,
              coverage_guard_id = excluded.coverage_guard_id,
              coverage_motive = excluded.coverage_motive,
              is_pending_coverage = excluded.is_pending_coverage,
              origin = excluded.origin,
              resolved_at = excluded.resolved_at,
              resolved_by = excluded.resolved_by
            "#,
            params![
                status.post_id,
                status.date.format(DATE_FMT).to_string(),
                status.plan_base.to_db_str(),
                status.rrhh_status.as_code(),
                status.operation_status.code(),
                status.coverage_guard_id,
                status.coverage_motive,
                status.is_pending_coverage as i32,
                status.origin.to_db_str(),
                status.resolved_at.format(DATETIME_FMT).to_string(),
                status.resolved_by,
            ],
        )?;
        Ok(())
    }

    /// 查某岗位某日的状态快照
    pub fn find(
        &self,
        post_id: &str,
        date: chrono::NaiveDate,
    ) -> RepositoryResult<Option<OperationalStatus>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                &format!("{} WHERE post_id = ?1 AND date = ?2", Self::SELECT_BASE),
                params![post_id, date.format(DATE_FMT).to_string()],
                Self::map_row_to_status,
            )
            .optional()?;
        Ok(result)
    }

    /// 列出某日全部状态快照（排班看板的数据源）
    pub fn list_by_date(&self, date: chrono::NaiveDate) -> RepositoryResult<Vec<OperationalStatus>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE date = ?1 ORDER BY post_id",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(
            params![date.format(DATE_FMT).to_string()],
            Self::map_row_to_status,
        )?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    const SELECT_BASE: &'static str =
        "SELECT post_id, date, plan_base, rrhh_status, operation_status,
                coverage_guard_id, coverage_motive, is_pending_coverage,
                origin, resolved_at, resolved_by
         FROM operational_status";

    fn map_row_to_status(row: &rusqlite::Row) -> SqliteResult<OperationalStatus> {
        Ok(OperationalStatus {
            post_id: row.get(0)?,
            date: date_col(row, 1)?,
            plan_base: coded_col(row, 2, PlanBase::from_str, "排班底")?,
            rrhh_status: coded_col(row, 3, RrhhStatus::from_code, "人事口径")?,
            operation_status: coded_col(row, 4, OperationStatus::from_code, "勤务状态")?,
            coverage_guard_id: row.get(5)?,
            coverage_motive: row.get(6)?,
            is_pending_coverage: row.get::<_, i32>(7)? != 0,
            origin: coded_col(row, 8, StatusOrigin::from_str, "写入来源")?,
            resolved_at: datetime_col(row, 9)?,
            resolved_by: row.get(10)?,
        })
    }
}
