// ==========================================
// 安保驻勤排班系统 - 查哨监控 API
// ==========================================
// 职责:
// - 驻勤点与查哨配置维护
// - 时隙生成入口（单点/全量）
// - 查哨结果录入/异常事件/重置
// - 监控读侧: 标记视图、待办看板、结果汇总
// 红线: 所有写入接口必须记录 action_log
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::api::error::{validate_actor, validate_horizon_days, ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::monitoring::{CallSlot, CallSlotView, Incident, Installation, MonitoringConfig};
use crate::domain::roster::{now_local, OperationalStatus};
use crate::domain::types::CallOutcome;
use crate::engine::call_window::{
    annotate_slot, validate_monitoring_config, CallWindowScheduler, GenerateAllReport,
    SlotGenerationReport,
};
use crate::engine::outcome_tracker::{
    CallOutcomeTracker, RecordIncidentRequest, RecordOutcomeRequest,
};
use crate::engine::repositories::StaffingRepositories;

// ==========================================
// 读侧结构
// ==========================================

/// 某驻勤点在日期区间内的查哨结果汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub installation_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub pending: i64,
    pub successful: i64,
    pub no_answer: i64,
    pub busy: i64,
    pub incident: i64,
    pub urgent: i64, // 已逾期且仍待执行（pending 的子集）
}

/// 待办看板: 每个启用查哨的驻勤点一项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueBoard {
    pub generated_at: NaiveDateTime,
    pub entries: Vec<DueBoardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueBoardEntry {
    pub installation_id: String,
    pub installation_name: String,
    pub due_slots: Vec<CallSlotView>,          // 计划时刻已到且仍待执行
    pub post_statuses: Vec<OperationalStatus>, // 该点各岗位当日已落库状态
}

// ==========================================
// MonitoringApi - 查哨监控 API
// ==========================================
pub struct MonitoringApi {
    repos: StaffingRepositories,
    scheduler: CallWindowScheduler,
    tracker: CallOutcomeTracker,
    config_manager: Arc<ConfigManager>,
}

impl MonitoringApi {
    pub fn new(repos: StaffingRepositories, config_manager: Arc<ConfigManager>) -> Self {
        let scheduler =
            CallWindowScheduler::new(repos.installation_repo.clone(), repos.slot_repo.clone());
        let tracker = CallOutcomeTracker::new(repos.slot_repo.clone());
        Self {
            repos,
            scheduler,
            tracker,
            config_manager,
        }
    }

    // ==========================================
    // 驻勤点维护
    // ==========================================

    /// 登记或更新驻勤点（含查哨配置整体）
    pub fn upsert_installation(
        &self,
        installation: Installation,
        actor: &str,
    ) -> ApiResult<Installation> {
        validate_actor(actor)?;
        if installation.installation_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("installation_id 不能为空".to_string()));
        }
        if installation.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("驻勤点名称不能为空".to_string()));
        }

        self.warn_if_config_incomplete(&installation);
        self.repos.installation_repo.upsert(&installation)?;

        let log = ActionLog::new(ActionType::UpsertInstallation, actor.to_string())
            .with_installation(&installation.installation_id)
            .with_payload(&serde_json::json!({
                "name": installation.name,
                "monitoring_enabled": installation.monitoring.enabled,
                "interval_minutes": installation.monitoring.interval_minutes,
            }));
        self.repos.action_log_repo.insert(&log)?;

        let saved = self
            .repos
            .installation_repo
            .find_by_id(&installation.installation_id)?
            .ok_or_else(|| ApiError::InternalError("保存后未找到驻勤点".to_string()))?;
        Ok(saved)
    }

    /// 只更新查哨配置（不动主数据）
    pub fn update_monitoring_config(
        &self,
        installation_id: &str,
        config: MonitoringConfig,
        actor: &str,
    ) -> ApiResult<Installation> {
        validate_actor(actor)?;

        self.repos
            .installation_repo
            .update_monitoring(installation_id, &config)?;

        let updated = self
            .repos
            .installation_repo
            .find_by_id(installation_id)?
            .ok_or_else(|| ApiError::InternalError("更新后未找到驻勤点".to_string()))?;
        self.warn_if_config_incomplete(&updated);

        let log = ActionLog::new(ActionType::UpsertInstallation, actor.to_string())
            .with_installation(installation_id)
            .with_payload(&serde_json::json!({
                "monitoring_enabled": config.enabled,
                "interval_minutes": config.interval_minutes,
                "window_start": config.window_start.map(|t| t.to_string()),
                "window_end": config.window_end.map(|t| t.to_string()),
            }))
            .with_detail("更新查哨配置".to_string());
        self.repos.action_log_repo.insert(&log)?;

        Ok(updated)
    }

    /// 列出全部驻勤点
    pub fn list_installations(&self) -> ApiResult<Vec<Installation>> {
        Ok(self.repos.installation_repo.list_all()?)
    }

    /// 读取单个驻勤点
    pub fn get_installation(&self, installation_id: &str) -> ApiResult<Installation> {
        self.repos
            .installation_repo
            .find_by_id(installation_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "驻勤点不存在: installation_id={}",
                    installation_id
                ))
            })
    }

    // ==========================================
    // 时隙生成
    // ==========================================

    /// 为单个驻勤点生成时隙
    ///
    /// # 参数
    /// - horizon_days: 缺省取配置 default_horizon_days
    pub fn generate_slots(
        &self,
        installation_id: &str,
        from: NaiveDate,
        horizon_days: Option<u32>,
        actor: &str,
    ) -> ApiResult<SlotGenerationReport> {
        validate_actor(actor)?;
        let horizon = self.effective_horizon(horizon_days)?;

        let report = self.scheduler.generate_slots(installation_id, from, horizon)?;

        let log = ActionLog::new(ActionType::GenerateSlots, actor.to_string())
            .with_installation(installation_id)
            .with_payload(&serde_json::json!({
                "from": from.to_string(),
                "horizon_days": horizon,
                "inserted": report.inserted,
                "warnings": report.warnings.len(),
            }));
        self.repos.action_log_repo.insert(&log)?;

        Ok(report)
    }

    /// 为全部启用查哨的驻勤点生成时隙
    pub fn generate_all(
        &self,
        from: NaiveDate,
        horizon_days: Option<u32>,
        actor: &str,
    ) -> ApiResult<GenerateAllReport> {
        validate_actor(actor)?;
        let horizon = self.effective_horizon(horizon_days)?;

        let report = self.scheduler.generate_all(from, horizon)?;

        let log = ActionLog::new(ActionType::GenerateSlots, actor.to_string())
            .with_payload(&serde_json::json!({
                "from": from.to_string(),
                "horizon_days": horizon,
                "installations": report.installations,
                "total_inserted": report.total_inserted,
                "warnings": report.warnings.len(),
            }))
            .with_detail("全量时隙生成".to_string());
        self.repos.action_log_repo.insert(&log)?;

        Ok(report)
    }

    // ==========================================
    // 查哨结果录入
    // ==========================================

    /// 录入一次查哨结果（successful / no_answer / busy）
    pub fn record_call(&self, request: RecordOutcomeRequest) -> ApiResult<CallSlot> {
        validate_actor(&request.recorded_by)?;
        let actor = request.recorded_by.clone();
        let slot = self.tracker.record(request)?;

        let log = ActionLog::new(ActionType::RecordCall, actor)
            .with_slot(&slot.slot_id)
            .with_installation(&slot.installation_id)
            .with_payload(&serde_json::json!({
                "outcome": slot.outcome.to_db_str(),
                "channel": slot.channel.map(|c| c.to_db_str()),
                "sla_seconds": slot.sla_seconds,
            }));
        self.repos.action_log_repo.insert(&log)?;

        Ok(slot)
    }

    /// 录入异常事件（结果置为 incident, 事件单同步建立）
    pub fn record_incident(
        &self,
        request: RecordIncidentRequest,
    ) -> ApiResult<(CallSlot, Incident)> {
        validate_actor(&request.recorded_by)?;
        let actor = request.recorded_by.clone();
        let (slot, incident) = self.tracker.record_incident(request)?;

        let log = ActionLog::new(ActionType::RecordIncident, actor)
            .with_slot(&slot.slot_id)
            .with_installation(&slot.installation_id)
            .with_payload(&serde_json::json!({
                "kind": incident.kind.to_db_str(),
                "severity": incident.severity.to_db_str(),
            }))
            .with_detail(incident.detail.clone());
        self.repos.action_log_repo.insert(&log)?;

        Ok((slot, incident))
    }

    /// 重置已录入的查哨为待执行（操作员撤销）
    ///
    /// # 规则
    /// - 清空结果/时差/执行时刻/渠道/备注, 删除关联事件单
    /// - 仅人工发起, 系统绝不自动重试
    pub fn reset_call(&self, slot_id: &str, actor: &str) -> ApiResult<CallSlot> {
        validate_actor(actor)?;
        let slot = self.tracker.reset(slot_id)?;

        let log = ActionLog::new(ActionType::ResetCall, actor.to_string())
            .with_slot(slot_id)
            .with_installation(&slot.installation_id)
            .with_detail("重置查哨为待执行".to_string());
        self.repos.action_log_repo.insert(&log)?;

        Ok(slot)
    }

    // ==========================================
    // 监控读侧
    // ==========================================

    /// 区间内时隙列表（带读时标记）
    ///
    /// # 参数
    /// - now: 标记计算基准时刻, 缺省取当前本地时刻（测试可注入）
    pub fn list_slots(
        &self,
        installation_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        now: Option<NaiveDateTime>,
    ) -> ApiResult<Vec<CallSlotView>> {
        if from > to {
            return Err(ApiError::InvalidInput(format!(
                "时间区间无效: from={} 晚于 to={}",
                from, to
            )));
        }
        let now = now.unwrap_or_else(now_local);
        let urgent_after = self.config_manager.get_urgent_after_minutes()?;

        let slots = self.repos.slot_repo.list_range(installation_id, from, to)?;
        Ok(slots
            .into_iter()
            .map(|s| annotate_slot(s, now, urgent_after))
            .collect())
    }

    /// 读取单个时隙（带读时标记）
    pub fn get_slot(&self, slot_id: &str, now: Option<NaiveDateTime>) -> ApiResult<CallSlotView> {
        let slot = self
            .repos
            .slot_repo
            .find_by_id(slot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("查哨时隙不存在: slot_id={}", slot_id)))?;
        let now = now.unwrap_or_else(now_local);
        let urgent_after = self.config_manager.get_urgent_after_minutes()?;
        Ok(annotate_slot(slot, now, urgent_after))
    }

    /// 待办看板: 每个启用查哨的驻勤点的到点未打时隙 + 当日岗位状态
    pub fn due_board(&self, now: Option<NaiveDateTime>) -> ApiResult<DueBoard> {
        let now = now.unwrap_or_else(now_local);
        let urgent_after = self.config_manager.get_urgent_after_minutes()?;

        let installations = self.repos.installation_repo.list_monitoring_enabled()?;
        let due = self.repos.slot_repo.list_pending_until(now)?;
        let statuses_today = self.repos.status_repo.list_by_date(now.date())?;

        let mut due_by_installation: HashMap<String, Vec<CallSlotView>> = HashMap::new();
        for slot in due {
            let view = annotate_slot(slot, now, urgent_after);
            due_by_installation
                .entry(view.slot.installation_id.clone())
                .or_default()
                .push(view);
        }
        let status_by_post: HashMap<String, OperationalStatus> = statuses_today
            .into_iter()
            .map(|s| (s.post_id.clone(), s))
            .collect();

        let mut entries = Vec::new();
        for installation in installations {
            let posts = self
                .repos
                .post_repo
                .list_by_installation(&installation.installation_id)?;
            let post_statuses = posts
                .iter()
                .filter_map(|p| status_by_post.get(&p.post_id).cloned())
                .collect();

            entries.push(DueBoardEntry {
                due_slots: due_by_installation
                    .remove(&installation.installation_id)
                    .unwrap_or_default(),
                installation_id: installation.installation_id,
                installation_name: installation.name,
                post_statuses,
            });
        }

        Ok(DueBoard {
            generated_at: now,
            entries,
        })
    }

    /// 某驻勤点在日期区间内的查哨结果汇总
    pub fn outcome_summary(
        &self,
        installation_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        now: Option<NaiveDateTime>,
    ) -> ApiResult<OutcomeSummary> {
        crate::api::error::validate_date_range(from, to)?;
        let now = now.unwrap_or_else(now_local);
        let urgent_after = self.config_manager.get_urgent_after_minutes()?;

        let range_start = from.and_time(NaiveTime::MIN);
        let range_end = to.and_hms_opt(23, 59, 59).unwrap_or_else(|| to.and_time(NaiveTime::MIN));

        let mut summary = OutcomeSummary {
            installation_id: installation_id.to_string(),
            from,
            to,
            pending: 0,
            successful: 0,
            no_answer: 0,
            busy: 0,
            incident: 0,
            urgent: 0,
        };
        for (outcome, count) in
            self.repos
                .slot_repo
                .count_outcomes(installation_id, range_start, range_end)?
        {
            match outcome {
                CallOutcome::Pending => summary.pending = count,
                CallOutcome::Successful => summary.successful = count,
                CallOutcome::NoAnswer => summary.no_answer = count,
                CallOutcome::Busy => summary.busy = count,
                CallOutcome::Incident => summary.incident = count,
            }
        }

        let cutoff = now - chrono::Duration::minutes(urgent_after);
        summary.urgent = self.repos.slot_repo.count_pending_before(
            installation_id,
            cutoff,
            range_start,
            range_end,
        )?;

        Ok(summary)
    }

    /// 某驻勤点的异常事件列表
    pub fn list_incidents(&self, installation_id: &str) -> ApiResult<Vec<Incident>> {
        Ok(self
            .repos
            .incident_repo
            .list_by_installation(installation_id)?)
    }

    // ==========================================
    // 私有辅助
    // ==========================================

    fn effective_horizon(&self, horizon_days: Option<u32>) -> ApiResult<u32> {
        let horizon = match horizon_days {
            Some(h) => h,
            None => self.config_manager.get_default_horizon_days()?,
        };
        let max = self.config_manager.get_max_horizon_days()?;
        validate_horizon_days(horizon, max)?;
        Ok(horizon)
    }

    fn warn_if_config_incomplete(&self, installation: &Installation) {
        // 停用的驻勤点本来就不参与生成, 不必告警
        if !installation.monitoring.enabled {
            return;
        }
        if let Err(w) =
            validate_monitoring_config(&installation.installation_id, &installation.monitoring)
        {
            tracing::warn!(
                installation_id = %installation.installation_id,
                field = %w.field,
                "查哨配置不完整, 生成时将跳过该驻勤点: {}",
                w.message
            );
        }
    }
}
