use crate::db::open_sqlite_connection;
use crate::domain::roster::PostAssignment;
use crate::domain::types::PlanBase;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{coded_col, date_col, datetime_col, DATETIME_FMT, DATE_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// PostAssignmentRepository - 基础排班仓储
// ==========================================
/// 基础排班仓储
/// 职责: 管理 post_assignment 表（岗位×日期 的计划事实）
/// 红线: 一岗一日至多一行; assigned_guard_id 允许为空（待补位）
pub struct PostAssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PostAssignmentRepository {
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
            CREATE TABLE IF NOT EXISTS post_assignment (
              post_id TEXT NOT NULL,
              date TEXT NOT NULL,
              plan_base TEXT NOT NULL,
              assigned_guard_id TEXT,
              updated_at TEXT NOT NULL DEFAULT (datetime('now')),
              updated_by TEXT NOT NULL,
              PRIMARY KEY (post_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_post_assignment_date ON post_assignment(date);
            "#,
        )?;
        Ok(())
    }

    /// 写入或覆盖某岗位某日的基础排班（Upsert）
    pub fn upsert(&self, assignment: &PostAssignment) -> RepositoryResult<()> {
        if assignment.post_id.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "post_id 不能为空".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO post_assignment
              (post_id, date, plan_base, assigned_guard_id, updated_at, updated_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(post_id, date) DO UPDATE SET
              plan_base = excluded.plan_base,
              assigned_guard_id = excluded.assigned_guard_id,
              updated_at = excluded.updated_at,
              updated_by = excluded.updated_by
            "#,
            params![
                assignment.post_id,
                assignment.date.format(DATE_FMT).to_string(),
                assignment.plan_base.to_db_str(),
                assignment.assigned_guard_id,
                assignment.updated_at.format(DATETIME_FMT).to_string(),
                assignment.updated_by,
            ],
        )?;
        Ok(())
    }

    /// 查某岗位某日的基础排班（无计划行返回 None, 由上层判定 NotFound）
    pub fn find(
        &self,
        post_id: &str,
        date: chrono::NaiveDate,
    ) -> RepositoryResult<Option<PostAssignment>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                "SELECT post_id, date, plan_base, assigned_guard_id, updated_at, updated_by
                 FROM post_assignment WHERE post_id = ?1 AND date = ?2",
                params![post_id, date.format(DATE_FMT).to_string()],
                Self::map_row_to_assignment,
            )
            .optional()?;
        Ok(result)
    }

    /// 列出某日全部基础排班（整日批量解析的输入）
    pub fn list_by_date(&self, date: chrono::NaiveDate) -> RepositoryResult<Vec<PostAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT post_id, date, plan_base, assigned_guard_id, updated_at, updated_by
             FROM post_assignment WHERE date = ?1 ORDER BY post_id",
        )?;
        let rows = stmt.query_map(
            params![date.format(DATE_FMT).to_string()],
            Self::map_row_to_assignment,
        )?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// 列出某保安员在区间内的全部基础排班（to 为空 = 开放区间）
    ///
    /// 用途: 人事事件登记后刷新受影响的 (岗位, 日期)。
    /// 计划表只在已排班的日期有行, 开放区间查询天然有界。
    pub fn list_by_guard_in_range(
        &self,
        guard_id: &str,
        from: chrono::NaiveDate,
        to: Option<chrono::NaiveDate>,
    ) -> RepositoryResult<Vec<PostAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT post_id, date, plan_base, assigned_guard_id, updated_at, updated_by
             FROM post_assignment
             WHERE assigned_guard_id = ?1 AND date >= ?2 AND (?3 IS NULL OR date <= ?3)
             ORDER BY date, post_id",
        )?;
        let rows = stmt.query_map(
            params![
                guard_id,
                from.format(DATE_FMT).to_string(),
                to.map(|d| d.format(DATE_FMT).to_string()),
            ],
            Self::map_row_to_assignment,
        )?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn map_row_to_assignment(row: &rusqlite::Row) -> SqliteResult<PostAssignment> {
        Ok(PostAssignment {
            post_id: row.get(0)?,
            date: date_col(row, 1)?,
            plan_base: coded_col(row, 2, PlanBase::from_str, "排班底")?,
            assigned_guard_id: row.get(3)?,
            updated_at: datetime_col(row, 4)?,
            updated_by: row.get(5)?,
        })
    }
}
