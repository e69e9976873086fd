// ==========================================
// 安保驻勤排班系统 - 岗位主数据仓储
// ==========================================
// 职责: 管理 post 表（岗位隶属于驻勤点）
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::roster::Post;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{datetime_col, DATETIME_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct PostRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PostRepository {
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
            CREATE TABLE IF NOT EXISTS post (
              post_id TEXT PRIMARY KEY,
              installation_id TEXT NOT NULL,
              name TEXT NOT NULL,
              active INTEGER NOT NULL DEFAULT 1,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_post_installation ON post(installation_id);
            "#,
        )?;
        Ok(())
    }

    /// 创建或更新岗位（Upsert）
    pub fn upsert(&self, post: &Post) -> RepositoryResult<()> {
        if post.post_id.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "post_id 不能为空".to_string(),
            ));
        }
        if post.installation_id.trim().is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "installation_id".to_string(),
                message: "岗位必须隶属于驻勤点".to_string(),
            });
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO post (post_id, installation_id, name, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(post_id) DO UPDATE SET
              installation_id = excluded.installation_id,
              name = excluded.name,
              active = excluded.active,
              updated_at = excluded.updated_at
            "#,
            params![
                post.post_id,
                post.installation_id,
                post.name,
                post.active as i32,
                post.created_at.format(DATETIME_FMT).to_string(),
                post.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按岗位编号查询（不存在返回 None）
    pub fn find_by_id(&self, post_id: &str) -> RepositoryResult<Option<Post>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                "SELECT post_id, installation_id, name, active, created_at, updated_at
                 FROM post WHERE post_id = ?1",
                params![post_id],
                Self::map_row_to_post,
            )
            .optional()?;
        Ok(result)
    }

    /// 列出驻勤点下的全部在用岗位
    pub fn list_by_installation(&self, installation_id: &str) -> RepositoryResult<Vec<Post>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT post_id, installation_id, name, active, created_at, updated_at
             FROM post WHERE installation_id = ?1 AND active = 1 ORDER BY post_id",
        )?;
        let rows = stmt.query_map(params![installation_id], Self::map_row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    /// 列出全部在用岗位
    pub fn list_active(&self) -> RepositoryResult<Vec<Post>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT post_id, installation_id, name, active, created_at, updated_at
             FROM post WHERE active = 1 ORDER BY installation_id, post_id",
        )?;
        let rows = stmt.query_map([], Self::map_row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn map_row_to_post(row: &rusqlite::Row) -> SqliteResult<Post> {
        Ok(Post {
            post_id: row.get(0)?,
            installation_id: row.get(1)?,
            name: row.get(2)?,
            active: row.get::<_, i32>(3)? != 0,
            created_at: datetime_col(row, 4)?,
            updated_at: datetime_col(row, 5)?,
        })
    }
}
