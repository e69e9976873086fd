// ==========================================
// 安保驻勤排班系统 - 保安员主数据仓储
// ==========================================
// 职责: 管理 guard 表
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::roster::Guard;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{datetime_col, DATETIME_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct GuardRepository {
    conn: Arc<Mutex<Connection>>,
}

impl GuardRepository {
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
            CREATE TABLE IF NOT EXISTS guard (
              guard_id TEXT PRIMARY KEY,
              full_name TEXT NOT NULL,
              active INTEGER NOT NULL DEFAULT 1,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_guard_active ON guard(active);
            "#,
        )?;
        Ok(())
    }

    /// 创建或更新保安员（Upsert）
    pub fn upsert(&self, guard: &Guard) -> RepositoryResult<()> {
        if guard.guard_id.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "guard_id 不能为空".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO guard (guard_id, full_name, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(guard_id) DO UPDATE SET
              full_name = excluded.full_name,
              active = excluded.active,
              updated_at = excluded.updated_at
            "#,
            params![
                guard.guard_id,
                guard.full_name,
                guard.active as i32,
                guard.created_at.format(DATETIME_FMT).to_string(),
                guard.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按工号查询（不存在返回 None）
    pub fn find_by_id(&self, guard_id: &str) -> RepositoryResult<Option<Guard>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                "SELECT guard_id, full_name, active, created_at, updated_at
                 FROM guard WHERE guard_id = ?1",
                params![guard_id],
                Self::map_row_to_guard,
            )
            .optional()?;
        Ok(result)
    }

    /// 列出全部在职保安员
    pub fn list_active(&self) -> RepositoryResult<Vec<Guard>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT guard_id, full_name, active, created_at, updated_at
             FROM guard WHERE active = 1 ORDER BY guard_id",
        )?;
        let rows = stmt.query_map([], Self::map_row_to_guard)?;
        let mut guards = Vec::new();
        for row in rows {
            guards.push(row?);
        }
        Ok(guards)
    }

    /// 停用保安员（归档, 不物理删除）
    pub fn deactivate(&self, guard_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE guard SET active = 0, updated_at = datetime('now') WHERE guard_id = ?1",
            params![guard_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "guard".to_string(),
                id: guard_id.to_string(),
            });
        }
        Ok(())
    }

    fn map_row_to_guard(row: &rusqlite::Row) -> SqliteResult<Guard> {
        Ok(Guard {
            guard_id: row.get(0)?,
            full_name: row.get(1)?,
            active: row.get::<_, i32>(2)? != 0,
            created_at: datetime_col(row, 3)?,
            updated_at: datetime_col(row, 4)?,
        })
    }
}
