// ==========================================
// 安保驻勤排班系统 - 操作日志仓储
// ==========================================
// 职责: 管理 action_log 表
// 红线: 所有写面操作必须落一条日志; 日志只追加不修改
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{datetime_col, DATETIME_FMT, DATE_FMT};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
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
            CREATE TABLE IF NOT EXISTS action_log (
              action_id TEXT PRIMARY KEY,
              action_type TEXT NOT NULL,
              action_ts TEXT NOT NULL,
              actor TEXT NOT NULL,
              payload_json TEXT,
              post_id TEXT,
              installation_id TEXT,
              slot_id TEXT,
              date TEXT,
              detail TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts DESC);
            CREATE INDEX IF NOT EXISTS idx_action_log_post ON action_log(post_id, date);
            CREATE INDEX IF NOT EXISTS idx_action_log_slot ON action_log(slot_id);
            "#,
        )?;
        Ok(())
    }

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, action_type, action_ts, actor,
                payload_json, post_id, installation_id, slot_id, date, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                log.action_id,
                log.action_type,
                log.action_ts.format(DATETIME_FMT).to_string(),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.post_id,
                log.installation_id,
                log.slot_id,
                log.date.map(|d| d.format(DATE_FMT).to_string()),
                log.detail,
            ],
        )?;
        Ok(log.action_id.clone())
    }

    /// 最近 N 条日志（按时间倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY action_ts DESC, action_id LIMIT ?1",
            Self::SELECT_BASE
        ))?;
        let logs = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 某岗位的全部日志（按时间倒序）
    pub fn list_by_post(&self, post_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE post_id = ?1 ORDER BY action_ts DESC, action_id",
            Self::SELECT_BASE
        ))?;
        let logs = stmt
            .query_map(params![post_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 某查哨时隙的全部日志（录入/撤销轨迹）
    pub fn list_by_slot(&self, slot_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE slot_id = ?1 ORDER BY action_ts DESC, action_id",
            Self::SELECT_BASE
        ))?;
        let logs = stmt
            .query_map(params![slot_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    const SELECT_BASE: &'static str =
        "SELECT action_id, action_type, action_ts, actor, payload_json,
                post_id, installation_id, slot_id, date, detail
         FROM action_log";

    fn map_row(row: &Row) -> SqliteResult<ActionLog> {
        let payload_json = row
            .get::<_, Option<String>>(4)?
            .and_then(|s| serde_json::from_str(&s).ok());
        let date = row
            .get::<_, Option<String>>(8)?
            .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok());

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: row.get(1)?,
            action_ts: datetime_col(row, 2)?,
            actor: row.get(3)?,
            payload_json,
            post_id: row.get(5)?,
            installation_id: row.get(6)?,
            slot_id: row.get(7)?,
            date,
            detail: row.get(9)?,
        })
    }
}
