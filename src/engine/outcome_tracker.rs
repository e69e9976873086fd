// ==========================================
// 安保驻勤排班系统 - 查哨结果流转引擎
// ==========================================
// 职责: 时隙结果状态机 pending → {successful, no_answer, busy, incident}
//       与终态 → pending 的撤销
// 红线: pending 行只允许被改写一次; 事件类结果必须与事件单
//       同事务落库; 撤销必须删除关联事件单
// ==========================================

use chrono::NaiveDateTime;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::domain::monitoring::{CallSlot, Incident};
use crate::domain::roster::now_local;
use crate::domain::types::{CallChannel, CallOutcome, IncidentKind, IncidentSeverity};
use crate::repository::error::RepositoryError;
use crate::repository::CallSlotRepository;

// ==========================================
// TrackerError - 结果流转错误
// ==========================================
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("查哨时隙不存在: slot_id={slot_id}")]
    SlotNotFound { slot_id: String },

    /// 请求落在状态机之外（如对已录入的行再录入、撤销 pending 行）
    #[error("无效的状态流转: from={from} to={to}")]
    InvalidState { from: String, to: String },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// 纯规则（状态机与时差口径）
// ==========================================

/// 只有 pending 行可以录入结果
pub fn can_record(current: CallOutcome) -> bool {
    current == CallOutcome::Pending
}

/// 只有终态行可以撤销回 pending
pub fn can_reset(current: CallOutcome) -> bool {
    current.is_terminal()
}

/// 实际执行与计划时刻的差值（秒）
///
/// # 规则
/// - 提前执行为负数, 原样保留, 不做截断
pub fn sla_seconds(scheduled_for: NaiveDateTime, executed_at: NaiveDateTime) -> i64 {
    (executed_at - scheduled_for).num_seconds()
}

// ==========================================
// 录入请求
// ==========================================
#[derive(Debug, Clone)]
pub struct RecordOutcomeRequest {
    pub slot_id: String,
    pub outcome: CallOutcome,                 // successful / no_answer / busy
    pub channel: Option<CallChannel>,
    pub executed_at: Option<NaiveDateTime>,   // 缺省取当前本地时刻
    pub observations: Option<String>,
    pub recorded_by: String,
}

#[derive(Debug, Clone)]
pub struct RecordIncidentRequest {
    pub slot_id: String,
    pub channel: Option<CallChannel>,
    pub executed_at: Option<NaiveDateTime>,
    pub observations: Option<String>,
    pub recorded_by: String,
    pub kind: IncidentKind,
    pub severity: IncidentSeverity,
    pub detail: String,
}

// ==========================================
// CallOutcomeTracker - 结果流转引擎
// ==========================================
/// 查哨结果流转引擎
/// 职责: 先按当前行状态做语义校验, 再用仓储的条件更新落库;
///       校验挡住误操作, 条件更新挡住并发竞争
pub struct CallOutcomeTracker {
    slot_repo: Arc<CallSlotRepository>,
}

impl CallOutcomeTracker {
    pub fn new(slot_repo: Arc<CallSlotRepository>) -> Self {
        Self { slot_repo }
    }

    /// 录入一次普通查哨结果
    ///
    /// # 规则
    /// - outcome 只接受 successful / no_answer / busy;
    ///   pending 不是结果, incident 必须走 record_incident
    /// - sla_seconds = 实际执行时刻 - 计划时刻, 提前为负
    /// - 行已是终态 → InvalidState; 写入竞争输掉 → 仓储冲突错误上抛
    #[instrument(skip(self, request), fields(slot_id = %request.slot_id, outcome = %request.outcome))]
    pub fn record(&self, request: RecordOutcomeRequest) -> Result<CallSlot, TrackerError> {
        match request.outcome {
            CallOutcome::Pending => {
                return Err(TrackerError::InvalidInput(
                    "pending 不是可录入的结果".to_string(),
                ));
            }
            CallOutcome::Incident => {
                return Err(TrackerError::InvalidInput(
                    "事件类结果必须携带事件单, 走 record_incident".to_string(),
                ));
            }
            CallOutcome::Successful | CallOutcome::NoAnswer | CallOutcome::Busy => {}
        }

        let slot = self.fetch_pending(&request.slot_id, request.outcome)?;
        let updated = Self::apply_recording(
            slot,
            request.outcome,
            request.channel,
            request.executed_at.unwrap_or_else(now_local),
            request.observations,
            request.recorded_by,
        );
        self.slot_repo.record_outcome(&updated)?;

        tracing::info!(
            "查哨结果已录入: slot_id={}, outcome={}, sla_seconds={:?}",
            updated.slot_id,
            updated.outcome,
            updated.sla_seconds
        );
        Ok(updated)
    }

    /// 录入事件类结果: 时隙流转与事件单写入同事务
    ///
    /// # 规则
    /// - 必然恰好产生一张 call_id 等于时隙ID的事件单
    /// - 事件描述不能为空
    #[instrument(skip(self, request), fields(slot_id = %request.slot_id, kind = %request.kind))]
    pub fn record_incident(
        &self,
        request: RecordIncidentRequest,
    ) -> Result<(CallSlot, Incident), TrackerError> {
        if request.detail.trim().is_empty() {
            return Err(TrackerError::InvalidInput("事件描述不能为空".to_string()));
        }

        let slot = self.fetch_pending(&request.slot_id, CallOutcome::Incident)?;
        let updated = Self::apply_recording(
            slot,
            CallOutcome::Incident,
            request.channel,
            request.executed_at.unwrap_or_else(now_local),
            request.observations,
            request.recorded_by.clone(),
        );
        let incident = Incident::new(
            updated.slot_id.clone(),
            request.kind,
            request.severity,
            request.detail,
            request.recorded_by,
        );
        self.slot_repo.record_incident(&updated, &incident)?;

        tracing::info!(
            "查哨事件已录入: slot_id={}, kind={}, severity={}",
            updated.slot_id,
            incident.kind,
            incident.severity
        );
        Ok((updated, incident))
    }

    /// 撤销已录入的结果, 行退回 pending
    ///
    /// # 规则
    /// - 仅话务员纠错使用, 不用于系统自动重试
    /// - pending 行无可撤销 → InvalidState
    /// - 关联事件单同事务删除
    #[instrument(skip(self), fields(slot_id = %slot_id))]
    pub fn reset(&self, slot_id: &str) -> Result<CallSlot, TrackerError> {
        let slot = self
            .slot_repo
            .find_by_id(slot_id)?
            .ok_or_else(|| TrackerError::SlotNotFound {
                slot_id: slot_id.to_string(),
            })?;

        if !can_reset(slot.outcome) {
            return Err(TrackerError::InvalidState {
                from: slot.outcome.to_db_str().to_string(),
                to: CallOutcome::Pending.to_db_str().to_string(),
            });
        }

        self.slot_repo.reset(slot_id)?;

        let fresh = self
            .slot_repo
            .find_by_id(slot_id)?
            .ok_or_else(|| TrackerError::SlotNotFound {
                slot_id: slot_id.to_string(),
            })?;

        tracing::info!("查哨结果已撤销: slot_id={}", slot_id);
        Ok(fresh)
    }

    /// 取行并校验仍可录入
    fn fetch_pending(&self, slot_id: &str, to: CallOutcome) -> Result<CallSlot, TrackerError> {
        let slot = self
            .slot_repo
            .find_by_id(slot_id)?
            .ok_or_else(|| TrackerError::SlotNotFound {
                slot_id: slot_id.to_string(),
            })?;

        if !can_record(slot.outcome) {
            return Err(TrackerError::InvalidState {
                from: slot.outcome.to_db_str().to_string(),
                to: to.to_db_str().to_string(),
            });
        }
        Ok(slot)
    }

    /// 把一次录入写到实体上（纯函数, 不触库）
    fn apply_recording(
        mut slot: CallSlot,
        outcome: CallOutcome,
        channel: Option<CallChannel>,
        executed_at: NaiveDateTime,
        observations: Option<String>,
        recorded_by: String,
    ) -> CallSlot {
        slot.outcome = outcome;
        slot.channel = channel;
        slot.sla_seconds = Some(sla_seconds(slot.scheduled_for, executed_at));
        slot.executed_at = Some(executed_at);
        slot.observations = observations;
        slot.recorded_by = Some(recorded_by);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scheduled() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .expect("日期")
            .and_hms_opt(8, 0, 0)
            .expect("时刻")
    }

    fn setup() -> (tempfile::NamedTempFile, Arc<CallSlotRepository>, CallOutcomeTracker, String) {
        let file = tempfile::NamedTempFile::new().expect("临时库");
        let repo = Arc::new(
            CallSlotRepository::new(file.path().to_str().expect("路径")).expect("仓储"),
        );
        let slot = CallSlot::new("INST-01".to_string(), scheduled());
        let slot_id = slot.slot_id.clone();
        repo.insert_missing(std::slice::from_ref(&slot)).expect("写入时隙");
        let tracker = CallOutcomeTracker::new(repo.clone());
        (file, repo, tracker, slot_id)
    }

    fn record_request(slot_id: &str, outcome: CallOutcome, minutes_late: i64) -> RecordOutcomeRequest {
        RecordOutcomeRequest {
            slot_id: slot_id.to_string(),
            outcome,
            channel: Some(CallChannel::Phone),
            executed_at: Some(scheduled() + chrono::Duration::minutes(minutes_late)),
            observations: None,
            recorded_by: "op-a".to_string(),
        }
    }

    // ==========================================
    // 时差口径
    // ==========================================

    #[test]
    fn test_sla_late_and_early() {
        let base = scheduled();
        assert_eq!(sla_seconds(base, base + chrono::Duration::minutes(45)), 2700);
        assert_eq!(sla_seconds(base, base - chrono::Duration::minutes(3)), -180, "提前为负数");
        assert_eq!(sla_seconds(base, base), 0);
    }

    // ==========================================
    // 录入
    // ==========================================

    #[test]
    fn test_record_no_answer_computes_sla() {
        let (_file, repo, tracker, slot_id) = setup();
        let updated = tracker
            .record(record_request(&slot_id, CallOutcome::NoAnswer, 45))
            .expect("录入成功");

        assert_eq!(updated.outcome, CallOutcome::NoAnswer);
        assert_eq!(updated.sla_seconds, Some(2700));

        let stored = repo.find_by_id(&slot_id).expect("查询").expect("存在");
        assert_eq!(stored.outcome, CallOutcome::NoAnswer);
        assert_eq!(stored.sla_seconds, Some(2700));
        assert_eq!(stored.recorded_by.as_deref(), Some("op-a"));
    }

    #[test]
    fn test_record_defaults_executed_at_to_now() {
        let (_file, repo, tracker, slot_id) = setup();
        let mut request = record_request(&slot_id, CallOutcome::Successful, 0);
        request.executed_at = None;

        let updated = tracker.record(request).expect("录入成功");
        assert!(updated.executed_at.is_some(), "缺省执行时刻必须补当前本地时刻");

        let stored = repo.find_by_id(&slot_id).expect("查询").expect("存在");
        let stored_exec = stored.executed_at.expect("已写入执行时刻");
        assert_eq!(
            stored.sla_seconds,
            Some(sla_seconds(stored.scheduled_for, stored_exec)),
            "时差必须按补入的执行时刻计算"
        );
    }

    #[test]
    fn test_record_pending_is_invalid_input() {
        let (_file, _repo, tracker, slot_id) = setup();
        let err = tracker
            .record(record_request(&slot_id, CallOutcome::Pending, 0))
            .expect_err("pending 不可作为录入结果");
        assert!(matches!(err, TrackerError::InvalidInput(_)));
    }

    #[test]
    fn test_record_incident_outcome_requires_incident_path() {
        let (_file, _repo, tracker, slot_id) = setup();
        let err = tracker
            .record(record_request(&slot_id, CallOutcome::Incident, 0))
            .expect_err("incident 必须走 record_incident");
        assert!(matches!(err, TrackerError::InvalidInput(_)));
    }

    #[test]
    fn test_record_on_terminal_slot_is_invalid_state() {
        let (_file, _repo, tracker, slot_id) = setup();
        tracker
            .record(record_request(&slot_id, CallOutcome::Successful, 2))
            .expect("首次录入");

        let err = tracker
            .record(record_request(&slot_id, CallOutcome::Busy, 5))
            .expect_err("重复录入必须失败");
        match err {
            TrackerError::InvalidState { from, to } => {
                assert_eq!(from, "successful");
                assert_eq!(to, "busy");
            }
            other => panic!("预期 InvalidState, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_record_missing_slot_is_not_found() {
        let (_file, _repo, tracker, _slot_id) = setup();
        let err = tracker
            .record(record_request("不存在的时隙", CallOutcome::Busy, 0))
            .expect_err("必须报错");
        assert!(matches!(err, TrackerError::SlotNotFound { .. }));
    }

    // ==========================================
    // 事件类结果
    // ==========================================

    #[test]
    fn test_record_incident_creates_linked_incident() {
        let (file, _repo, tracker, slot_id) = setup();
        let (slot, incident) = tracker
            .record_incident(RecordIncidentRequest {
                slot_id: slot_id.clone(),
                channel: Some(CallChannel::Phone),
                executed_at: Some(scheduled() + chrono::Duration::minutes(10)),
                observations: Some("值守人员报告异常".to_string()),
                recorded_by: "op-a".to_string(),
                kind: IncidentKind::Security,
                severity: IncidentSeverity::High,
                detail: "外人翻越围栏".to_string(),
            })
            .expect("事件录入");

        assert_eq!(slot.outcome, CallOutcome::Incident);
        assert_eq!(incident.call_id, slot_id);

        let incident_repo = crate::repository::IncidentRepository::new(
            file.path().to_str().expect("路径"),
        )
        .expect("事件仓储");
        let stored = incident_repo
            .find_by_call(&slot_id)
            .expect("查询")
            .expect("事件单存在");
        assert_eq!(stored.detail, "外人翻越围栏");
    }

    #[test]
    fn test_record_incident_rejects_empty_detail() {
        let (_file, _repo, tracker, slot_id) = setup();
        let err = tracker
            .record_incident(RecordIncidentRequest {
                slot_id,
                channel: None,
                executed_at: None,
                observations: None,
                recorded_by: "op-a".to_string(),
                kind: IncidentKind::Other,
                severity: IncidentSeverity::Low,
                detail: "  ".to_string(),
            })
            .expect_err("空描述必须拒绝");
        assert!(matches!(err, TrackerError::InvalidInput(_)));
    }

    // ==========================================
    // 撤销
    // ==========================================

    #[test]
    fn test_reset_terminal_back_to_pending() {
        let (_file, _repo, tracker, slot_id) = setup();
        tracker
            .record(record_request(&slot_id, CallOutcome::Busy, 5))
            .expect("录入");

        let fresh = tracker.reset(&slot_id).expect("撤销成功");
        assert_eq!(fresh.outcome, CallOutcome::Pending);
        assert!(fresh.executed_at.is_none());
        assert!(fresh.sla_seconds.is_none());
        assert!(fresh.channel.is_none());
    }

    #[test]
    fn test_reset_pending_is_invalid_state() {
        let (_file, _repo, tracker, slot_id) = setup();
        let err = tracker.reset(&slot_id).expect_err("pending 行不可撤销");
        assert!(matches!(err, TrackerError::InvalidState { .. }));
    }
}
