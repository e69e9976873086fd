// ==========================================
// 安保驻勤排班系统 - 排班与状态 API
// ==========================================
// 职责:
// - 基础排班/人事事件/替班/到岗确认的写入口
// - 每次点写入后对受影响的 (岗位, 日期) 重新解析并落库
// - 运行状态读取与人工改写
// 红线: 所有写入接口必须记录 action_log
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::api::error::{validate_actor, ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::roster::{
    now_local, AttendanceRecord, CoverageAssignment, HrLeaveEvent, OperationalStatus,
    PostAssignment,
};
use crate::domain::types::{LeaveKind, OperationStatus, PlanBase, StatusOrigin};
use crate::engine::repositories::StaffingRepositories;
use crate::engine::resolution_core::{DayResolution, ResolutionCore};
use crate::engine::state_resolution::{ApplyOutcome, StateResolutionEngine};
use crate::repository::sqlite_store::SqliteShiftPlanStore;

// ==========================================
// 结果结构
// ==========================================

/// 整日批量解析报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayApplyReport {
    pub date: NaiveDate,
    pub applied: usize,                    // 成功落库的岗位数
    pub warnings: Vec<String>,             // 各岗位携带的非致命警告
    pub failures: Vec<PostApplyFailure>,   // 失败岗位（不中断整日批量）
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostApplyFailure {
    pub post_id: String,
    pub message: String,
}

/// 人事事件登记报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRecordReport {
    pub event: HrLeaveEvent,
    pub refreshed: usize,                // 重新解析落库的 (岗位, 日期) 数
    pub failures: Vec<PostApplyFailure>, // 刷新失败项（事件本身已登记成功）
}

// ==========================================
// RosterApi - 排班与状态 API
// ==========================================
pub struct RosterApi {
    repos: StaffingRepositories,
    engine: StateResolutionEngine,
}

impl RosterApi {
    pub fn new(repos: StaffingRepositories) -> Self {
        let store = Arc::new(SqliteShiftPlanStore::new(
            repos.assignment_repo.clone(),
            repos.guard_repo.clone(),
            repos.leave_repo.clone(),
            repos.coverage_repo.clone(),
            repos.attendance_repo.clone(),
        ));
        let engine = StateResolutionEngine::new(store, repos.status_repo.clone());
        Self { repos, engine }
    }

    // ==========================================
    // 解析与落库
    // ==========================================

    /// 解析某岗位某日的运行状态（只读, 不落库不审计）
    pub async fn resolve_status(&self, post_id: &str, date: NaiveDate) -> ApiResult<DayResolution> {
        Ok(self.engine.resolve(post_id, date).await?)
    }

    /// 解析并落库某岗位某日的运行状态
    pub async fn apply_status(
        &self,
        post_id: &str,
        date: NaiveDate,
        actor: &str,
    ) -> ApiResult<ApplyOutcome> {
        validate_actor(actor)?;
        let outcome = self.engine.apply(post_id, date, actor).await?;

        let log = ActionLog::new(ActionType::ApplyStatus, actor.to_string())
            .with_post(post_id, date)
            .with_payload(&serde_json::json!({
                "operation_status": outcome.status.operation_status.code(),
                "is_pending_coverage": outcome.status.is_pending_coverage,
                "warnings": outcome.warnings,
            }));
        self.repos.action_log_repo.insert(&log)?;

        Ok(outcome)
    }

    /// 整日批量解析落库
    ///
    /// # 规则
    /// - 范围 = 该日存在基础排班行的全部岗位
    /// - 单岗失败不中断批量, 失败项进入报告
    pub async fn apply_day(&self, date: NaiveDate, actor: &str) -> ApiResult<DayApplyReport> {
        validate_actor(actor)?;

        let assignments = self.repos.assignment_repo.list_by_date(date)?;
        let results = join_all(
            assignments
                .iter()
                .map(|a| self.engine.apply(&a.post_id, date, actor)),
        )
        .await;

        let mut report = DayApplyReport {
            date,
            applied: 0,
            warnings: Vec::new(),
            failures: Vec::new(),
        };
        for (assignment, result) in assignments.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    report.applied += 1;
                    for w in outcome.warnings {
                        report.warnings.push(format!("{}: {}", assignment.post_id, w));
                    }
                }
                Err(e) => report.failures.push(PostApplyFailure {
                    post_id: assignment.post_id.clone(),
                    message: e.to_string(),
                }),
            }
        }

        tracing::info!(
            date = %date,
            applied = report.applied,
            failed = report.failures.len(),
            "整日解析落库完成"
        );

        let log = ActionLog::new(ActionType::ApplyStatus, actor.to_string())
            .with_payload(&serde_json::json!({
                "date": date.to_string(),
                "applied": report.applied,
                "failed": report.failures.len(),
            }))
            .with_detail(format!("整日解析: {}", date));
        self.repos.action_log_repo.insert(&log)?;

        Ok(report)
    }

    // ==========================================
    // 基础排班写入口
    // ==========================================

    /// 写入或覆盖某岗位某日的基础排班, 随后重新解析落库
    ///
    /// # 规则
    /// - 岗位必须已登记
    /// - plan_base=day_off 时在编人可留空; 休息日行照常可被重新解析
    pub async fn upsert_post_assignment(
        &self,
        post_id: &str,
        date: NaiveDate,
        plan_base: PlanBase,
        assigned_guard_id: Option<String>,
        actor: &str,
    ) -> ApiResult<ApplyOutcome> {
        validate_actor(actor)?;
        self.require_post(post_id)?;

        let assigned_guard_id = assigned_guard_id
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());

        let assignment = PostAssignment::new(
            post_id.to_string(),
            date,
            plan_base,
            assigned_guard_id.clone(),
            actor.to_string(),
        );
        self.repos.assignment_repo.upsert(&assignment)?;

        let outcome = self.engine.apply(post_id, date, actor).await?;

        let log = ActionLog::new(ActionType::UpsertAssignment, actor.to_string())
            .with_post(post_id, date)
            .with_payload(&serde_json::json!({
                "plan_base": plan_base.to_db_str(),
                "assigned_guard_id": assigned_guard_id,
                "resolved_status": outcome.status.operation_status.code(),
            }));
        self.repos.action_log_repo.insert(&log)?;

        Ok(outcome)
    }

    // ==========================================
    // 人事事件写入口
    // ==========================================

    /// 登记人事休假/离职事件, 并刷新事件覆盖范围内该保安员的已排班日
    ///
    /// # 规则
    /// - 事件只追加不修改; 同一保安员同日多事件并存, 压倒关系由解析决定
    /// - end_date 为空 = 开放事件（未定复岗日的离职等）
    /// - 刷新范围 = 计划表中该保安员在事件区间内的行; 刷新失败不回滚事件
    pub async fn record_leave_event(
        &self,
        guard_id: &str,
        kind: LeaveKind,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        note: Option<String>,
        actor: &str,
    ) -> ApiResult<LeaveRecordReport> {
        validate_actor(actor)?;
        self.require_guard(guard_id)?;

        let event = HrLeaveEvent::new(
            guard_id.to_string(),
            kind,
            start_date,
            end_date,
            note,
            actor.to_string(),
        );
        self.repos.leave_repo.insert(&event)?;

        let log = ActionLog::new(ActionType::RecordLeave, actor.to_string())
            .with_payload(&serde_json::json!({
                "event_id": event.event_id,
                "guard_id": guard_id,
                "kind": kind.to_db_str(),
                "start_date": start_date.to_string(),
                "end_date": end_date.map(|d| d.to_string()),
            }))
            .with_detail(format!("登记人事事件: {} {}", guard_id, kind.to_db_str()));
        self.repos.action_log_repo.insert(&log)?;

        // 事件登记后刷新受影响的 (岗位, 日期)
        let affected =
            self.repos
                .assignment_repo
                .list_by_guard_in_range(guard_id, start_date, end_date)?;
        let results = join_all(
            affected
                .iter()
                .map(|a| self.engine.apply(&a.post_id, a.date, actor)),
        )
        .await;

        let mut report = LeaveRecordReport {
            event,
            refreshed: 0,
            failures: Vec::new(),
        };
        for (assignment, result) in affected.iter().zip(results) {
            match result {
                Ok(_) => report.refreshed += 1,
                Err(e) => report.failures.push(PostApplyFailure {
                    post_id: assignment.post_id.clone(),
                    message: format!("{}: {}", assignment.date, e),
                }),
            }
        }

        if !report.failures.is_empty() {
            tracing::warn!(
                guard_id = %guard_id,
                failed = report.failures.len(),
                "人事事件登记后部分状态刷新失败"
            );
        }

        Ok(report)
    }

    // ==========================================
    // 替班写入口
    // ==========================================

    /// 指派替班, 随后重新解析落库
    ///
    /// # 规则
    /// - 岗位该日必须有基础排班行
    /// - 替班人必须已登记且在职
    /// - 替班事由按指派时刻的解析基底推导（replacement_for_*）
    pub async fn assign_coverage(
        &self,
        post_id: &str,
        date: NaiveDate,
        covering_guard_id: &str,
        actor: &str,
    ) -> ApiResult<ApplyOutcome> {
        validate_actor(actor)?;

        self.repos
            .assignment_repo
            .find(post_id, date)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("基础排班缺失: post_id={}, date={}", post_id, date))
            })?;

        let covering = self.require_guard(covering_guard_id)?;
        if !covering.active {
            return Err(ApiError::InvalidInput(format!(
                "替班人已离职/停用: guard_id={}",
                covering_guard_id
            )));
        }

        // 先按当前事实解析一次, 得到替班事由的基底
        let before = self.engine.resolve(post_id, date).await?;
        let motive =
            ResolutionCore::replacement_motive(before.rrhh_status, before.is_pending_coverage);

        let coverage = CoverageAssignment::new(
            post_id.to_string(),
            date,
            covering_guard_id.to_string(),
            motive.clone(),
            actor.to_string(),
        );
        self.repos.coverage_repo.upsert(&coverage)?;

        let outcome = self.engine.apply(post_id, date, actor).await?;

        let log = ActionLog::new(ActionType::AssignCoverage, actor.to_string())
            .with_post(post_id, date)
            .with_payload(&serde_json::json!({
                "covering_guard_id": covering_guard_id,
                "motive": motive,
                "resolved_status": outcome.status.operation_status.code(),
            }));
        self.repos.action_log_repo.insert(&log)?;

        Ok(outcome)
    }

    /// 取消替班, 随后重新解析落库
    pub async fn cancel_coverage(
        &self,
        post_id: &str,
        date: NaiveDate,
        actor: &str,
    ) -> ApiResult<ApplyOutcome> {
        validate_actor(actor)?;

        self.repos.coverage_repo.delete(post_id, date)?;
        let outcome = self.engine.apply(post_id, date, actor).await?;

        let log = ActionLog::new(ActionType::CancelCoverage, actor.to_string())
            .with_post(post_id, date)
            .with_payload(&serde_json::json!({
                "resolved_status": outcome.status.operation_status.code(),
            }));
        self.repos.action_log_repo.insert(&log)?;

        Ok(outcome)
    }

    // ==========================================
    // 到岗确认写入口
    // ==========================================

    /// 到岗确认, 随后重新解析落库
    ///
    /// # 规则
    /// - 岗位该日必须有基础排班行
    /// - 重复确认以最后一次为准（幂等覆盖）
    pub async fn confirm_attendance(
        &self,
        post_id: &str,
        date: NaiveDate,
        guard_id: &str,
        actor: &str,
    ) -> ApiResult<ApplyOutcome> {
        validate_actor(actor)?;

        self.repos
            .assignment_repo
            .find(post_id, date)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("基础排班缺失: post_id={}, date={}", post_id, date))
            })?;
        self.require_guard(guard_id)?;

        let record = AttendanceRecord::new(
            post_id.to_string(),
            date,
            guard_id.to_string(),
            actor.to_string(),
        );
        self.repos.attendance_repo.confirm(&record)?;

        let outcome = self.engine.apply(post_id, date, actor).await?;

        let log = ActionLog::new(ActionType::ConfirmAttendance, actor.to_string())
            .with_post(post_id, date)
            .with_payload(&serde_json::json!({
                "guard_id": guard_id,
                "resolved_status": outcome.status.operation_status.code(),
            }));
        self.repos.action_log_repo.insert(&log)?;

        Ok(outcome)
    }

    // ==========================================
    // 运行状态读取与人工改写
    // ==========================================

    /// 读取某岗位某日已落库的运行状态
    pub fn get_status(&self, post_id: &str, date: NaiveDate) -> ApiResult<Option<OperationalStatus>> {
        Ok(self.repos.status_repo.find(post_id, date)?)
    }

    /// 读取某日全部已落库的运行状态
    pub fn list_statuses(&self, date: NaiveDate) -> ApiResult<Vec<OperationalStatus>> {
        Ok(self.repos.status_repo.list_by_date(date)?)
    }

    /// 人工改写运行状态码
    ///
    /// # 规则
    /// - 仅允许改写已落库的状态行（无行时应先 apply）
    /// - origin 置为 manual; 下一次引擎 apply 会覆盖回系统判定
    /// - 改写原因必填, 入审计
    pub fn override_status(
        &self,
        post_id: &str,
        date: NaiveDate,
        operation_status: OperationStatus,
        reason: &str,
        actor: &str,
    ) -> ApiResult<OperationalStatus> {
        validate_actor(actor)?;
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("改写原因不能为空".to_string()));
        }

        let mut status = self
            .repos
            .status_repo
            .find(post_id, date)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "运行状态未落库: post_id={}, date={}",
                    post_id, date
                ))
            })?;

        let previous = status.operation_status;
        status.operation_status = operation_status;
        status.origin = StatusOrigin::Manual;
        status.resolved_at = now_local();
        status.resolved_by = actor.to_string();
        self.repos.status_repo.upsert(&status)?;

        tracing::info!(
            post_id = %post_id,
            date = %date,
            from = previous.code(),
            to = operation_status.code(),
            "人工改写运行状态"
        );

        let log = ActionLog::new(ActionType::ManualStatusEdit, actor.to_string())
            .with_post(post_id, date)
            .with_payload(&serde_json::json!({
                "from": previous.code(),
                "to": operation_status.code(),
                "reason": reason,
            }))
            .with_detail(reason.to_string());
        self.repos.action_log_repo.insert(&log)?;

        Ok(status)
    }

    /// 查询某保安员的人事事件（登记时间倒序）
    pub fn list_leave_events(&self, guard_id: &str) -> ApiResult<Vec<HrLeaveEvent>> {
        Ok(self.repos.leave_repo.list_by_guard(guard_id)?)
    }

    // ==========================================
    // 私有辅助
    // ==========================================

    fn require_post(&self, post_id: &str) -> ApiResult<crate::domain::roster::Post> {
        self.repos.post_repo.find_by_id(post_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("岗位未登记: post_id={}", post_id))
        })
    }

    fn require_guard(&self, guard_id: &str) -> ApiResult<crate::domain::roster::Guard> {
        self.repos.guard_repo.find_by_id(guard_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("保安员未登记: guard_id={}", guard_id))
        })
    }
}
