use crate::db::open_sqlite_connection;
use crate::domain::roster::AttendanceRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{date_col, datetime_col, DATETIME_FMT, DATE_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// AttendanceRepository - 到岗确认仓储
// ==========================================
/// 到岗确认仓储
/// 职责: 管理 attendance_record 表
pub struct AttendanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AttendanceRepository {
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
            CREATE TABLE IF NOT EXISTS attendance_record (
              post_id TEXT NOT NULL,
              date TEXT NOT NULL,
              guard_id TEXT NOT NULL,
              confirmed_at TEXT NOT NULL,
              confirmed_by TEXT NOT NULL,
              PRIMARY KEY (post_id, date)
            );
            "#,
        )?;
        Ok(())
    }

    /// 登记到岗确认（重复确认为覆盖, 以最后一次为准）
    pub fn confirm(&self, record: &AttendanceRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO attendance_record (post_id, date, guard_id, confirmed_at, confirmed_by)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(post_id, date) DO UPDATE SET
              guard_id = excluded.guard_id,
              confirmed_at = excluded.confirmed_at,
              confirmed_by = excluded.confirmed_by
            "#,
            params![
                record.post_id,
                record.date.format(DATE_FMT).to_string(),
                record.guard_id,
                record.confirmed_at.format(DATETIME_FMT).to_string(),
                record.confirmed_by,
            ],
        )?;
        Ok(())
    }

    /// 查某岗位某日的到岗确认
    pub fn find(
        &self,
        post_id: &str,
        date: chrono::NaiveDate,
    ) -> RepositoryResult<Option<AttendanceRecord>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                "SELECT post_id, date, guard_id, confirmed_at, confirmed_by
                 FROM attendance_record WHERE post_id = ?1 AND date = ?2",
                params![post_id, date.format(DATE_FMT).to_string()],
                Self::map_row_to_record,
            )
            .optional()?;
        Ok(result)
    }

    /// 某岗位某日是否已确认到岗
    pub fn is_confirmed(&self, post_id: &str, date: chrono::NaiveDate) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM attendance_record WHERE post_id = ?1 AND date = ?2",
            params![post_id, date.format(DATE_FMT).to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn map_row_to_record(row: &rusqlite::Row) -> SqliteResult<AttendanceRecord> {
        Ok(AttendanceRecord {
            post_id: row.get(0)?,
            date: date_col(row, 1)?,
            guard_id: row.get(2)?,
            confirmed_at: datetime_col(row, 3)?,
            confirmed_by: row.get(4)?,
        })
    }
}
