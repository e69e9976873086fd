use crate::db::open_sqlite_connection;
use crate::domain::roster::HrLeaveEvent;
use crate::domain::types::LeaveKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{coded_col, date_col, datetime_col, opt_date_col, DATETIME_FMT, DATE_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// LeaveEventRepository - 人事事件仓储
// ==========================================
/// 人事休假/离职事件仓储
/// 职责: 管理 hr_leave_event 表（人事口径的事实记录）
/// 红线: 只存事件, 不排优先级; 压倒关系由解析核心按
///       LeaveKind::priority() 判定
pub struct LeaveEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LeaveEventRepository {
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
            CREATE TABLE IF NOT EXISTS hr_leave_event (
              event_id TEXT PRIMARY KEY,
              guard_id TEXT NOT NULL,
              kind TEXT NOT NULL,
              start_date TEXT NOT NULL,
              end_date TEXT,
              note TEXT,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              created_by TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_leave_event_guard
              ON hr_leave_event(guard_id, start_date);
            "#,
        )?;
        Ok(())
    }

    /// 登记一条人事事件（事件不可变, 只插入不更新）
    pub fn insert(&self, event: &HrLeaveEvent) -> RepositoryResult<()> {
        if event.guard_id.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "guard_id 不能为空".to_string(),
            ));
        }
        if let Some(end) = event.end_date {
            if end < event.start_date {
                return Err(RepositoryError::FieldValueError {
                    field: "end_date".to_string(),
                    message: format!(
                        "结束日期 {} 早于开始日期 {}",
                        end, event.start_date
                    ),
                });
            }
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO hr_leave_event
              (event_id, guard_id, kind, start_date, end_date, note, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                event.event_id,
                event.guard_id,
                event.kind.to_db_str(),
                event.start_date.format(DATE_FMT).to_string(),
                event.end_date.map(|d| d.format(DATE_FMT).to_string()),
                event.note,
                event.created_at.format(DATETIME_FMT).to_string(),
                event.created_by,
            ],
        )?;
        Ok(())
    }

    /// 按事件编号查询
    pub fn find_by_id(&self, event_id: &str) -> RepositoryResult<Option<HrLeaveEvent>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                &format!("{} WHERE event_id = ?1", Self::SELECT_BASE),
                params![event_id],
                Self::map_row_to_event,
            )
            .optional()?;
        Ok(result)
    }

    /// 查某保安员在指定日期生效的全部事件
    ///
    /// # 规则
    /// - 生效判定: start_date <= date 且 (end_date 为空 或 end_date >= date)
    /// - 返回按 created_at, event_id 升序, 保证同优先级时先登记者先出现
    pub fn find_covering(
        &self,
        guard_id: &str,
        date: chrono::NaiveDate,
    ) -> RepositoryResult<Vec<HrLeaveEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE guard_id = ?1
               AND start_date <= ?2
               AND (end_date IS NULL OR end_date >= ?2)
             ORDER BY created_at, event_id",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(
            params![guard_id, date.format(DATE_FMT).to_string()],
            Self::map_row_to_event,
        )?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// 列出某保安员的全部事件（按开始日期倒序）
    pub fn list_by_guard(&self, guard_id: &str) -> RepositoryResult<Vec<HrLeaveEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE guard_id = ?1 ORDER BY start_date DESC, created_at DESC",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(params![guard_id], Self::map_row_to_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    const SELECT_BASE: &'static str =
        "SELECT event_id, guard_id, kind, start_date, end_date, note, created_at, created_by
         FROM hr_leave_event";

    fn map_row_to_event(row: &rusqlite::Row) -> SqliteResult<HrLeaveEvent> {
        Ok(HrLeaveEvent {
            event_id: row.get(0)?,
            guard_id: row.get(1)?,
            kind: coded_col(row, 2, LeaveKind::from_str, "人事事件类型")?,
            start_date: date_col(row, 3)?,
            end_date: opt_date_col(row, 4)?,
            note: row.get(5)?,
            created_at: datetime_col(row, 6)?,
            created_by: row.get(7)?,
        })
    }
}
