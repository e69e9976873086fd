use crate::db::open_sqlite_connection;
use crate::domain::roster::CoverageAssignment;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{date_col, datetime_col, DATETIME_FMT, DATE_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// CoverageRepository - 加班顶勤仓储
// ==========================================
/// 加班顶勤仓储
/// 职责: 管理 coverage_assignment 表
/// 红线: 一岗一日至多一条顶勤; 重复指派为整行覆盖而不是追加。
///       covering_guard_id 不设外键, 顶勤人被删除后的孤儿行
///       必须可以继续存在, 由解析核心降级处理
pub struct CoverageRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CoverageRepository {
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
            CREATE TABLE IF NOT EXISTS coverage_assignment (
              coverage_id TEXT NOT NULL,
              post_id TEXT NOT NULL,
              date TEXT NOT NULL,
              covering_guard_id TEXT NOT NULL,
              motive TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              created_by TEXT NOT NULL,
              PRIMARY KEY (post_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_coverage_guard
              ON coverage_assignment(covering_guard_id, date);
            "#,
        )?;
        Ok(())
    }

    /// 指派或改派顶勤（Upsert; 改派保留原 coverage_id）
    pub fn upsert(&self, coverage: &CoverageAssignment) -> RepositoryResult<()> {
        if coverage.covering_guard_id.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "covering_guard_id 不能为空".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO coverage_assignment
              (coverage_id, post_id, date, covering_guard_id, motive, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(post_id, date) DO UPDATE SET
              covering_guard_id = excluded.covering_guard_id,
              motive = excluded.motive,
              created_at = excluded.created_at,
              created_by = excluded.created_by
            "#,
            params![
                coverage.coverage_id,
                coverage.post_id,
                coverage.date.format(DATE_FMT).to_string(),
                coverage.covering_guard_id,
                coverage.motive,
                coverage.created_at.format(DATETIME_FMT).to_string(),
                coverage.created_by,
            ],
        )?;
        Ok(())
    }

    /// 查某岗位某日的顶勤指派
    pub fn find(
        &self,
        post_id: &str,
        date: chrono::NaiveDate,
    ) -> RepositoryResult<Option<CoverageAssignment>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                "SELECT coverage_id, post_id, date, covering_guard_id, motive, created_at, created_by
                 FROM coverage_assignment WHERE post_id = ?1 AND date = ?2",
                params![post_id, date.format(DATE_FMT).to_string()],
                Self::map_row_to_coverage,
            )
            .optional()?;
        Ok(result)
    }

    /// 撤销顶勤指派
    pub fn delete(&self, post_id: &str, date: chrono::NaiveDate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM coverage_assignment WHERE post_id = ?1 AND date = ?2",
            params![post_id, date.format(DATE_FMT).to_string()],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "coverage_assignment".to_string(),
                id: format!("{}@{}", post_id, date),
            });
        }
        Ok(())
    }

    fn map_row_to_coverage(row: &rusqlite::Row) -> SqliteResult<CoverageAssignment> {
        Ok(CoverageAssignment {
            coverage_id: row.get(0)?,
            post_id: row.get(1)?,
            date: date_col(row, 2)?,
            covering_guard_id: row.get(3)?,
            motive: row.get(4)?,
            created_at: datetime_col(row, 5)?,
            created_by: row.get(6)?,
        })
    }
}
