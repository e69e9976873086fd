// ==========================================
// 安保驻勤排班系统 - 查哨时隙仓储
// ==========================================
// 职责: 管理 call_slot / call_incident 两张表
//       （时隙与事件单是同一聚合, DDL 与事务写都在本仓储）
// 红线: 结果流转必须带前置条件守卫, 并发录入只允许一人成功;
//       幂等生成靠确定性 slot_id + 插入时跳过已存在行
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::monitoring::{CallSlot, Incident};
use crate::domain::types::{CallChannel, CallOutcome, IncidentKind, IncidentSeverity};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row::{coded_col, datetime_col, opt_datetime_col, DATETIME_FMT};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

/// call_incident 建表语句（两个仓储共用, 避免定义漂移）
const CALL_INCIDENT_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS call_incident (
      call_id TEXT PRIMARY KEY,
      kind TEXT NOT NULL,
      severity TEXT NOT NULL,
      detail TEXT NOT NULL,
      created_at TEXT NOT NULL DEFAULT (datetime('now')),
      created_by TEXT NOT NULL,
      FOREIGN KEY (call_id) REFERENCES call_slot(slot_id) ON DELETE CASCADE
    );
"#;

pub struct CallSlotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CallSlotRepository {
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
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS call_slot (
              slot_id TEXT PRIMARY KEY,
              installation_id TEXT NOT NULL,
              scheduled_for TEXT NOT NULL,
              outcome TEXT NOT NULL DEFAULT 'pending',
              channel TEXT,
              executed_at TEXT,
              sla_seconds INTEGER,
              observations TEXT,
              recorded_by TEXT,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              UNIQUE(installation_id, scheduled_for)
            );

            CREATE INDEX IF NOT EXISTS idx_call_slot_time
              ON call_slot(installation_id, scheduled_for);
            CREATE INDEX IF NOT EXISTS idx_call_slot_outcome
              ON call_slot(outcome, scheduled_for);

            {}
            "#,
            CALL_INCIDENT_DDL
        ))?;
        Ok(())
    }

    /// 批量写入时隙, 已存在的行原样跳过
    ///
    /// # 规则
    /// - slot_id 是 (驻勤点, 计划时刻) 的确定性哈希, 重复生成
    ///   不会产生第二行, 也绝不触碰已录入结果的行
    ///
    /// # 返回
    /// - Ok(usize): 本次实际新插入的行数
    pub fn insert_missing(&self, slots: &[CallSlot]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut inserted = 0usize;
        for slot in slots {
            let rows = tx.execute(
                r#"
                INSERT INTO call_slot
                  (slot_id, installation_id, scheduled_for, outcome, channel,
                   executed_at, sla_seconds, observations, recorded_by, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT DO NOTHING
                "#,
                params![
                    slot.slot_id,
                    slot.installation_id,
                    slot.scheduled_for.format(DATETIME_FMT).to_string(),
                    slot.outcome.to_db_str(),
                    slot.channel.map(|c| c.to_db_str()),
                    slot.executed_at.map(|t| t.format(DATETIME_FMT).to_string()),
                    slot.sla_seconds,
                    slot.observations,
                    slot.recorded_by,
                    slot.created_at.format(DATETIME_FMT).to_string(),
                ],
            )?;
            inserted += rows;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(inserted)
    }

    /// 按时隙编号查询
    pub fn find_by_id(&self, slot_id: &str) -> RepositoryResult<Option<CallSlot>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                &format!("{} WHERE slot_id = ?1", Self::SELECT_BASE),
                params![slot_id],
                Self::map_row_to_slot,
            )
            .optional()?;
        Ok(result)
    }

    /// 列出某驻勤点在时间段内的时隙（按计划时刻升序）
    pub fn list_range(
        &self,
        installation_id: &str,
        from: chrono::NaiveDateTime,
        to: chrono::NaiveDateTime,
    ) -> RepositoryResult<Vec<CallSlot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE installation_id = ?1 AND scheduled_for >= ?2 AND scheduled_for <= ?3
             ORDER BY scheduled_for",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(
            params![
                installation_id,
                from.format(DATETIME_FMT).to_string(),
                to.format(DATETIME_FMT).to_string(),
            ],
            Self::map_row_to_slot,
        )?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    /// 列出全部驻勤点在时间段内的时隙
    pub fn list_range_all(
        &self,
        from: chrono::NaiveDateTime,
        to: chrono::NaiveDateTime,
    ) -> RepositoryResult<Vec<CallSlot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE scheduled_for >= ?1 AND scheduled_for <= ?2
             ORDER BY scheduled_for, installation_id",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(
            params![
                from.format(DATETIME_FMT).to_string(),
                to.format(DATETIME_FMT).to_string(),
            ],
            Self::map_row_to_slot,
        )?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    /// 列出计划时刻不晚于 cutoff 且仍待执行的时隙（应呼看板）
    pub fn list_pending_until(
        &self,
        cutoff: chrono::NaiveDateTime,
    ) -> RepositoryResult<Vec<CallSlot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE outcome = 'pending' AND scheduled_for <= ?1
             ORDER BY scheduled_for, installation_id",
            Self::SELECT_BASE
        ))?;
        let rows = stmt.query_map(
            params![cutoff.format(DATETIME_FMT).to_string()],
            Self::map_row_to_slot,
        )?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    /// 持久化一次结果录入（带前置条件守卫）
    ///
    /// # 并发控制
    /// UPDATE 只在行仍为 pending 时生效; 两名话务员抢录同一时隙,
    /// 先提交者成功, 后提交者拿到 PreconditionFailed
    ///
    /// # 错误
    /// - `RepositoryError::PreconditionFailed`: 行已不是 pending
    /// - `RepositoryError::NotFound`: slot_id 不存在
    pub fn record_outcome(&self, slot: &CallSlot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows_affected = conn.execute(
            r#"
            UPDATE call_slot SET
              outcome = ?2,
              channel = ?3,
              executed_at = ?4,
              sla_seconds = ?5,
              observations = ?6,
              recorded_by = ?7
            WHERE slot_id = ?1 AND outcome = 'pending'
            "#,
            params![
                slot.slot_id,
                slot.outcome.to_db_str(),
                slot.channel.map(|c| c.to_db_str()),
                slot.executed_at.map(|t| t.format(DATETIME_FMT).to_string()),
                slot.sla_seconds,
                slot.observations,
                slot.recorded_by,
            ],
        )?;

        if rows_affected == 0 {
            return Err(self.precondition_failure(&conn, &slot.slot_id, "pending"));
        }
        Ok(())
    }

    /// 持久化事件类结果: 时隙流转与事件单写入在同一事务内
    ///
    /// # 规则
    /// - 守卫与 record_outcome 相同; 守卫不过则事务回滚, 不会留下孤儿事件单
    pub fn record_incident(&self, slot: &CallSlot, incident: &Incident) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let rows_affected = tx.execute(
            r#"
            UPDATE call_slot SET
              outcome = ?2,
              channel = ?3,
              executed_at = ?4,
              sla_seconds = ?5,
              observations = ?6,
              recorded_by = ?7
            WHERE slot_id = ?1 AND outcome = 'pending'
            "#,
            params![
                slot.slot_id,
                slot.outcome.to_db_str(),
                slot.channel.map(|c| c.to_db_str()),
                slot.executed_at.map(|t| t.format(DATETIME_FMT).to_string()),
                slot.sla_seconds,
                slot.observations,
                slot.recorded_by,
            ],
        )?;

        if rows_affected == 0 {
            let err = self.precondition_failure(&tx, &slot.slot_id, "pending");
            return Err(err);
        }

        tx.execute(
            r#"
            INSERT INTO call_incident (call_id, kind, severity, detail, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                incident.call_id,
                incident.kind.to_db_str(),
                incident.severity.to_db_str(),
                incident.detail,
                incident.created_at.format(DATETIME_FMT).to_string(),
                incident.created_by,
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 把已终态的时隙退回 pending（话务员撤销）
    ///
    /// # 规则
    /// - 清空结果、渠道、执行时刻、时差、备注、录入人
    /// - 同一事务内删除关联事件单
    /// - 行仍为 pending 时守卫不过, 返回 PreconditionFailed
    pub fn reset(&self, slot_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let rows_affected = tx.execute(
            r#"
            UPDATE call_slot SET
              outcome = 'pending',
              channel = NULL,
              executed_at = NULL,
              sla_seconds = NULL,
              observations = NULL,
              recorded_by = NULL
            WHERE slot_id = ?1 AND outcome != 'pending'
            "#,
            params![slot_id],
        )?;

        if rows_affected == 0 {
            let err = self.precondition_failure(&tx, slot_id, "终态");
            return Err(err);
        }

        tx.execute(
            "DELETE FROM call_incident WHERE call_id = ?1",
            params![slot_id],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 统计时间段内各结果的时隙数
    pub fn count_outcomes(
        &self,
        installation_id: &str,
        from: chrono::NaiveDateTime,
        to: chrono::NaiveDateTime,
    ) -> RepositoryResult<Vec<(CallOutcome, i64)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT outcome, COUNT(*) FROM call_slot
             WHERE installation_id = ?1 AND scheduled_for >= ?2 AND scheduled_for <= ?3
             GROUP BY outcome",
        )?;
        let rows = stmt.query_map(
            params![
                installation_id,
                from.format(DATETIME_FMT).to_string(),
                to.format(DATETIME_FMT).to_string(),
            ],
            |row| {
                let outcome = coded_col(row, 0, CallOutcome::from_str, "查哨结果")?;
                let count: i64 = row.get(1)?;
                Ok((outcome, count))
            },
        )?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    /// 统计时间段内已逾期（计划时刻早于 cutoff）且仍待执行的时隙数
    pub fn count_pending_before(
        &self,
        installation_id: &str,
        cutoff: chrono::NaiveDateTime,
        from: chrono::NaiveDateTime,
        to: chrono::NaiveDateTime,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM call_slot
             WHERE installation_id = ?1 AND outcome = 'pending'
               AND scheduled_for >= ?2 AND scheduled_for <= ?3
               AND scheduled_for < ?4",
            params![
                installation_id,
                from.format(DATETIME_FMT).to_string(),
                to.format(DATETIME_FMT).to_string(),
                cutoff.format(DATETIME_FMT).to_string(),
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// rows_affected == 0 时区分「行不存在」与「守卫不过」
    fn precondition_failure(
        &self,
        conn: &Connection,
        slot_id: &str,
        expected: &str,
    ) -> RepositoryError {
        let actual: Result<String, _> = conn.query_row(
            "SELECT outcome FROM call_slot WHERE slot_id = ?1",
            params![slot_id],
            |row| row.get(0),
        );
        match actual {
            Ok(actual_outcome) => RepositoryError::PreconditionFailed {
                entity: "call_slot".to_string(),
                id: slot_id.to_string(),
                expected: expected.to_string(),
                actual: actual_outcome,
            },
            Err(_) => RepositoryError::NotFound {
                entity: "call_slot".to_string(),
                id: slot_id.to_string(),
            },
        }
    }

    const SELECT_BASE: &'static str =
        "SELECT slot_id, installation_id, scheduled_for, outcome, channel,
                executed_at, sla_seconds, observations, recorded_by, created_at
         FROM call_slot";

    fn map_row_to_slot(row: &rusqlite::Row) -> SqliteResult<CallSlot> {
        let channel = match row.get::<_, Option<String>>(4)? {
            Some(s) => Some(CallChannel::from_str(&s).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("未知录入渠道编码: {}", s).into(),
                )
            })?),
            None => None,
        };
        Ok(CallSlot {
            slot_id: row.get(0)?,
            installation_id: row.get(1)?,
            scheduled_for: datetime_col(row, 2)?,
            outcome: coded_col(row, 3, CallOutcome::from_str, "查哨结果")?,
            channel,
            executed_at: opt_datetime_col(row, 5)?,
            sla_seconds: row.get(6)?,
            observations: row.get(7)?,
            recorded_by: row.get(8)?,
            created_at: datetime_col(row, 9)?,
        })
    }
}

// ==========================================
// IncidentRepository - 事件单只读视角
// ==========================================
/// 事件单查询仓储
/// 职责: call_incident 的读侧; 写入只发生在 CallSlotRepository
/// 的事务方法里（record_incident / reset）
pub struct IncidentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl IncidentRepository {
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

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(CALL_INCIDENT_DDL)?;
        Ok(())
    }

    /// 查某时隙的事件单
    pub fn find_by_call(&self, call_id: &str) -> RepositoryResult<Option<Incident>> {
        let conn = self.get_conn()?;
        let result = conn
            .query_row(
                "SELECT call_id, kind, severity, detail, created_at, created_by
                 FROM call_incident WHERE call_id = ?1",
                params![call_id],
                Self::map_row_to_incident,
            )
            .optional()?;
        Ok(result)
    }

    /// 列出某驻勤点的全部事件单（驻勤点归属经时隙表关联, 按计划时刻升序）
    pub fn list_by_installation(&self, installation_id: &str) -> RepositoryResult<Vec<Incident>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT i.call_id, i.kind, i.severity, i.detail, i.created_at, i.created_by
             FROM call_incident i
             JOIN call_slot s ON s.slot_id = i.call_id
             WHERE s.installation_id = ?1
             ORDER BY s.scheduled_for",
        )?;
        let rows = stmt.query_map(params![installation_id], Self::map_row_to_incident)?;
        let mut incidents = Vec::new();
        for row in rows {
            incidents.push(row?);
        }
        Ok(incidents)
    }

    fn map_row_to_incident(row: &rusqlite::Row) -> SqliteResult<Incident> {
        Ok(Incident {
            call_id: row.get(0)?,
            kind: coded_col(row, 1, IncidentKind::from_str, "事件类型")?,
            severity: coded_col(row, 2, IncidentSeverity::from_str, "严重程度")?,
            detail: row.get(3)?,
            created_at: datetime_col(row, 4)?,
            created_by: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn temp_repo() -> (tempfile::NamedTempFile, CallSlotRepository) {
        let file = tempfile::NamedTempFile::new().expect("创建临时库文件");
        let repo =
            CallSlotRepository::new(file.path().to_str().expect("路径")).expect("初始化仓储");
        (file, repo)
    }

    fn slot_at(installation_id: &str, h: u32, m: u32) -> CallSlot {
        let when = NaiveDate::from_ymd_opt(2026, 3, 10)
            .expect("日期")
            .and_hms_opt(h, m, 0)
            .expect("时刻");
        CallSlot::new(installation_id.to_string(), when)
    }

    #[test]
    fn test_insert_missing_is_idempotent() {
        let (_file, repo) = temp_repo();
        let slots = vec![slot_at("INST-01", 8, 0), slot_at("INST-01", 10, 0)];

        assert_eq!(repo.insert_missing(&slots).expect("首次写入"), 2);
        assert_eq!(repo.insert_missing(&slots).expect("重复写入"), 0, "重复生成不得新增行");
    }

    #[test]
    fn test_record_outcome_guard_rejects_second_writer() {
        let (_file, repo) = temp_repo();
        let mut slot = slot_at("INST-01", 8, 0);
        repo.insert_missing(std::slice::from_ref(&slot)).expect("写入");

        slot.outcome = CallOutcome::Successful;
        slot.executed_at = Some(
            NaiveDate::from_ymd_opt(2026, 3, 10)
                .expect("日期")
                .and_hms_opt(8, 2, 0)
                .expect("时刻"),
        );
        slot.sla_seconds = Some(120);
        slot.recorded_by = Some("op-a".to_string());
        repo.record_outcome(&slot).expect("第一次录入成功");

        slot.recorded_by = Some("op-b".to_string());
        let err = repo.record_outcome(&slot).expect_err("第二次录入必须失败");
        match err {
            RepositoryError::PreconditionFailed { actual, .. } => {
                assert_eq!(actual, "successful");
            }
            other => panic!("预期 PreconditionFailed, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_reset_requires_terminal_state() {
        let (_file, repo) = temp_repo();
        let slot = slot_at("INST-01", 8, 0);
        repo.insert_missing(std::slice::from_ref(&slot)).expect("写入");

        let err = repo.reset(&slot.slot_id).expect_err("pending 行不可撤销");
        assert!(matches!(err, RepositoryError::PreconditionFailed { .. }));
    }

    #[test]
    fn test_list_by_installation_returns_all_dates() {
        let (_file, repo) = temp_repo();
        let mut march = slot_at("INST-01", 8, 0);
        let mut april = CallSlot::new(
            "INST-01".to_string(),
            NaiveDate::from_ymd_opt(2026, 4, 2)
                .expect("日期")
                .and_hms_opt(9, 0, 0)
                .expect("时刻"),
        );
        let mut other = slot_at("INST-02", 10, 0);
        repo.insert_missing(&[march.clone(), april.clone(), other.clone()])
            .expect("写入");

        for slot in [&mut march, &mut april, &mut other] {
            slot.outcome = CallOutcome::Incident;
            slot.sla_seconds = Some(0);
            slot.recorded_by = Some("op-a".to_string());
            let incident = Incident::new(
                slot.slot_id.clone(),
                IncidentKind::Other,
                IncidentSeverity::Low,
                "值守未应答".to_string(),
                "op-a".to_string(),
            );
            repo.record_incident(slot, &incident).expect("事件录入");
        }

        let incident_repo =
            IncidentRepository::from_connection(repo.conn.clone()).expect("事件仓储");
        let listed = incident_repo.list_by_installation("INST-01").expect("查询");
        assert_eq!(listed.len(), 2, "跨月份的事件单必须全部返回");
        assert_eq!(listed[0].call_id, march.slot_id, "按计划时刻升序");
        assert_eq!(listed[1].call_id, april.slot_id);
        assert_eq!(
            incident_repo
                .list_by_installation("INST-02")
                .expect("查询")
                .len(),
            1,
            "只按驻勤点过滤"
        );
    }

    #[test]
    fn test_record_incident_and_reset_remove_incident_row() {
        let (_file, repo) = temp_repo();
        let mut slot = slot_at("INST-01", 8, 0);
        repo.insert_missing(std::slice::from_ref(&slot)).expect("写入");

        slot.outcome = CallOutcome::Incident;
        slot.sla_seconds = Some(0);
        slot.recorded_by = Some("op-a".to_string());
        let incident = Incident::new(
            slot.slot_id.clone(),
            IncidentKind::Security,
            IncidentSeverity::High,
            "岗亭无人应答".to_string(),
            "op-a".to_string(),
        );
        repo.record_incident(&slot, &incident).expect("事件录入");

        let incident_repo =
            IncidentRepository::from_connection(repo.conn.clone()).expect("事件仓储");
        assert!(incident_repo
            .find_by_call(&slot.slot_id)
            .expect("查询")
            .is_some());

        repo.reset(&slot.slot_id).expect("撤销");
        assert!(
            incident_repo
                .find_by_call(&slot.slot_id)
                .expect("查询")
                .is_none(),
            "撤销后事件单必须删除"
        );
        let back = repo.find_by_id(&slot.slot_id).expect("查询").expect("存在");
        assert_eq!(back.outcome, CallOutcome::Pending);
        assert!(back.sla_seconds.is_none());
        assert!(back.recorded_by.is_none());
    }
}
