// ==========================================
// 安保驻勤排班系统 - 驻勤点主数据仓储
// ==========================================
// 职责: 管理 installation 表（含电话查哨配置列）
// 红线: Repository 不做业务逻辑,只做数据映射;
//       配置是否可用的判定归 engine::call_window
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::monitoring::{Installation, MonitoringConfig};
use crate::domain::types::MonitoringMode;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{coded_col, datetime_col, opt_time_col, DATETIME_FMT, TIME_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct InstallationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InstallationRepository {
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
            CREATE TABLE IF NOT EXISTS installation (
              installation_id TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              phone TEXT,
              monitoring_enabled INTEGER NOT NULL DEFAULT 0,
              interval_minutes INTEGER NOT NULL DEFAULT 0,
              window_start TEXT,
              window_end TEXT,
              mode TEXT NOT NULL DEFAULT 'call',
              message_template TEXT,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_installation_monitoring
              ON installation(monitoring_enabled);
            "#,
        )?;
        Ok(())
    }

    /// 创建或更新驻勤点（Upsert, 整行覆盖含查哨配置）
    pub fn upsert(&self, installation: &Installation) -> RepositoryResult<()> {
        if installation.installation_id.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "installation_id 不能为空".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let m = &installation.monitoring;
        conn.execute(
            r#"
            INSERT INTO installation
              (installation_id, name, phone,
               monitoring_enabled, interval_minutes, window_start, window_end,
               mode, message_template, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(installation_id) DO UPDATE SET
              name = excluded.name,
              phone = excluded.phone,
              monitoring_enabled = excluded.monitoring_enabled,
              interval_minutes = excluded.interval_minutes,
              window_start = excluded.window_start,
              window_end = excluded.window_end,
              mode = excluded.mode,
              message_template = excluded.message_template,
              updated_at = excluded.updated_at
            "#,
            params![
                installation.installation_id,
                installation.name,
                installation.phone,
                m.enabled as i32,
                m.interval_minutes,
                m.window_start.map(|t| t.format(TIME_FMT).to_string()),
                m.window_end.map(|t| t.format(TIME_FMT).to_string()),
                m.mode.to_db_str(),
                m.message_template,
                installation.created_at.format(DATETIME_FMT).to_string(),
                installation.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 只更新查哨配置列, 主数据列不动
    pub fn update_monitoring(
        &self,
        installation_id: &str,
        monitoring: &MonitoringConfig,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE installation SET
              monitoring_enabled = ?2,
              interval_minutes = ?3,
              window_start = ?4,
              window_end = ?5,
              mode = ?6,
              message_template = ?7,
              updated_at = datetime('now')
            WHERE installation_id = ?1
            "#,
            params![
                installation_id,
                monitoring.enabled as i32,
                monitoring.interval_minutes,
                monitoring.window_start.map(|t| t.format(TIME_FMT).to_string()),
                monitoring.window_end.map(|t| t.format(TIME_FMT).to_string()),
                monitoring.mode.to_db_str(),
                monitoring.message_template,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "installation".to_string(),
                id: installation_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按驻勤点编号查询（不存在返回 None）
    pub fn find_by_id(&self, installation_id: &str) -> RepositoryResult<Option<Installation>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                &format!("{} WHERE installation_id = ?1", Self::SELECT_BASE),
                params![installation_id],
                Self::map_row_to_installation,
            )
            .optional()?;
        Ok(result)
    }

    /// 列出全部驻勤点
    pub fn list_all(&self) -> RepositoryResult<Vec<Installation>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare(&format!("{} ORDER BY installation_id", Self::SELECT_BASE))?;
        let rows = stmt.query_map([], Self::map_row_to_installation)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// 列出启用了查哨的驻勤点（时隙生成的输入集合）
    pub fn list_monitoring_enabled(&self) -> RepositoryResult<Vec<Installation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE monitoring_enabled = 1 ORDER BY installation_id",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map([], Self::map_row_to_installation)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    const SELECT_BASE: &'static str =
        "SELECT installation_id, name, phone, monitoring_enabled, interval_minutes,
                window_start, window_end, mode, message_template, created_at, updated_at
         FROM installation";

    fn map_row_to_installation(row: &rusqlite::Row) -> SqliteResult<Installation> {
        Ok(Installation {
            installation_id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            monitoring: MonitoringConfig {
                enabled: row.get::<_, i32>(3)? != 0,
                interval_minutes: row.get(4)?,
                window_start: opt_time_col(row, 5)?,
                window_end: opt_time_col(row, 6)?,
                mode: coded_col(row, 7, MonitoringMode::from_str, "查哨方式")?,
                message_template: row.get(8)?,
            },
            created_at: datetime_col(row, 9)?,
            updated_at: datetime_col(row, 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn temp_repo() -> (tempfile::NamedTempFile, InstallationRepository) {
        let file = tempfile::NamedTempFile::new().expect("创建临时库文件");
        let repo =
            InstallationRepository::new(file.path().to_str().expect("路径")).expect("初始化仓储");
        (file, repo)
    }

    #[test]
    fn test_upsert_round_trips_monitoring_mode() {
        let (_file, repo) = temp_repo();
        let mut installation = Installation::new(
            "INST-01".to_string(),
            "东区园区".to_string(),
            Some("021-0000000".to_string()),
        );
        installation.monitoring = MonitoringConfig {
            enabled: true,
            interval_minutes: 60,
            window_start: Some(NaiveTime::from_hms_opt(8, 0, 0).expect("时刻")),
            window_end: Some(NaiveTime::from_hms_opt(20, 0, 0).expect("时刻")),
            mode: MonitoringMode::Message,
            message_template: Some("请回复到岗".to_string()),
        };
        repo.upsert(&installation).expect("写入");

        let back = repo.find_by_id("INST-01").expect("查询").expect("存在");
        assert_eq!(back.monitoring.mode, MonitoringMode::Message);
        assert_eq!(back.monitoring.interval_minutes, 60);
        assert_eq!(
            back.monitoring.window_start,
            Some(NaiveTime::from_hms_opt(8, 0, 0).expect("时刻"))
        );
        assert_eq!(
            back.monitoring.message_template.as_deref(),
            Some("请回复到岗")
        );
    }

    #[test]
    fn test_update_monitoring_missing_installation_is_not_found() {
        let (_file, repo) = temp_repo();
        let err = repo
            .update_monitoring("没有这个驻勤点", &MonitoringConfig::disabled())
            .expect_err("必须报错");
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
