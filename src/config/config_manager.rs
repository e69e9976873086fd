// ==========================================
// 安保驻勤排班系统 - 配置管理器
// ==========================================
// 职责: 运行参数的加载、查询、覆写管理
// 存储: config_kv 表 (key-value, scope_id 预留多级覆写)
// ==========================================

use crate::repository::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        manager.ensure_table()?;
        Ok(manager)
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)
                .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        }

        let manager = Self { conn };
        manager.ensure_table()?;
        Ok(manager)
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config_kv (
              scope_id TEXT NOT NULL DEFAULT 'global',
              key TEXT NOT NULL,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
              PRIMARY KEY (scope_id, key)
            );
            "#,
        )?;
        Ok(())
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 读取配置值，不存在时返回默认值
    pub fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入（覆盖）global scope 的配置值
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now', 'localtime'))
             ON CONFLICT(scope_id, key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    // ===== 查哨调度配置 =====

    /// 逾期阈值（分钟）：计划时刻过去超过该分钟数且仍未录入结果的查哨视为逾期
    pub fn get_urgent_after_minutes(&self) -> RepositoryResult<i64> {
        let value = self.get_config_or_default(config_keys::URGENT_AFTER_MINUTES, "30")?;
        Ok(value.parse::<i64>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::URGENT_AFTER_MINUTES,
                raw_value = %value,
                "逾期阈值配置格式错误，使用默认值 30"
            );
            30
        }))
    }

    /// 默认生成天数：generate 未显式传 horizon 时使用
    pub fn get_default_horizon_days(&self) -> RepositoryResult<u32> {
        let value = self.get_config_or_default(config_keys::DEFAULT_HORIZON_DAYS, "7")?;
        Ok(value.parse::<u32>().unwrap_or(7))
    }

    /// 单次生成天数上限：防止误传大 horizon 造成大批量写入
    pub fn get_max_horizon_days(&self) -> RepositoryResult<u32> {
        let value = self.get_config_or_default(config_keys::MAX_HORIZON_DAYS, "31")?;
        Ok(value.parse::<u32>().unwrap_or(31))
    }
}

// ==========================================
// 配置键定义
// ==========================================
pub mod config_keys {
    // ===== 查哨调度 =====
    pub const URGENT_AFTER_MINUTES: &str = "urgent_after_minutes";
    pub const DEFAULT_HORIZON_DAYS: &str = "default_horizon_days";
    pub const MAX_HORIZON_DAYS: &str = "max_horizon_days";
}
