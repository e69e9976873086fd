// ==========================================
// 安保驻勤排班系统 - 状态解析引擎
// ==========================================
// 职责: 取数 → 纯函数解析 → 快照落库
// 输入: 岗位 + 日期
// 输出: 当日权威勤务状态
// 红线: resolve 只读且可重入; 判定规则全部在 ResolutionCore,
//       本引擎不得自带分支逻辑
// ==========================================

use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::domain::roster::{now_local, OperationalStatus};
use crate::domain::types::StatusOrigin;
use crate::engine::resolution_core::{DayResolution, ResolutionCore, ResolutionInputs};
use crate::engine::shift_plan_store::ShiftPlanStore;
use crate::repository::error::RepositoryError;
use crate::repository::roster_repo::OperationalStatusRepository;

// ==========================================
// ResolutionError - 解析引擎错误
// ==========================================
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// 该岗位该日没有基础排班行; 不得默认补齐
    #[error("基础排班缺失: post_id={post_id}, date={date}")]
    PlanNotFound { post_id: String, date: NaiveDate },

    #[error("排班事实读取失败: {0}")]
    Store(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ResolutionError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ResolutionError::Store(err.to_string())
    }
}

// ==========================================
// ApplyOutcome - 解析并落库的返回
// ==========================================
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub status: OperationalStatus,
    pub reasons: Vec<String>,  // 判定轨迹（逐层）
    pub warnings: Vec<String>, // 非致命数据完整性警告
}

// ==========================================
// StateResolutionEngine - 状态解析引擎
// ==========================================
/// 状态解析引擎
/// 职责: 组织一次解析所需的全部排班事实, 交给 ResolutionCore 判定;
///       apply 在 resolve 之上加快照持久化
pub struct StateResolutionEngine {
    store: Arc<dyn ShiftPlanStore>,
    status_repo: Arc<OperationalStatusRepository>,
}

impl StateResolutionEngine {
    pub fn new(store: Arc<dyn ShiftPlanStore>, status_repo: Arc<OperationalStatusRepository>) -> Self {
        Self { store, status_repo }
    }

    /// 解析某岗位某日的勤务状态（只读, 可重入）
    ///
    /// # 规则
    /// - 无基础排班行 → PlanNotFound
    /// - 休息日短路: 不再读取人员/人事/顶勤/到岗, 直接终态
    /// - 其余输入一次取齐, 判定交给 ResolutionCore::resolve_day
    #[instrument(skip(self), fields(post_id = %post_id, date = %date))]
    pub async fn resolve(
        &self,
        post_id: &str,
        date: NaiveDate,
    ) -> Result<DayResolution, ResolutionError> {
        let plan = self
            .store
            .get_plan(post_id, date)
            .await?
            .ok_or_else(|| ResolutionError::PlanNotFound {
                post_id: post_id.to_string(),
                date,
            })?;

        // 休息日短路
        if plan.plan_base.is_day_off() {
            let inputs = ResolutionInputs {
                plan,
                titular: None,
                leave_events: Vec::new(),
                coverage: None,
                coverage_guard: None,
                attendance_confirmed: false,
            };
            return Ok(ResolutionCore::resolve_day(&inputs, date));
        }

        let titular = match plan.assigned_guard_id.as_deref() {
            Some(guard_id) => self.store.get_guard(guard_id).await?,
            None => None,
        };
        let leave_events = match plan.assigned_guard_id.as_deref() {
            Some(guard_id) => self.store.get_leave_events(guard_id, date).await?,
            None => Vec::new(),
        };
        let coverage = self.store.get_coverage(post_id, date).await?;
        let coverage_guard = match coverage.as_ref() {
            Some(c) => self.store.get_guard(&c.covering_guard_id).await?,
            None => None,
        };
        let attendance_confirmed = self.store.is_attendance_confirmed(post_id, date).await?;

        let inputs = ResolutionInputs {
            plan,
            titular,
            leave_events,
            coverage,
            coverage_guard,
            attendance_confirmed,
        };
        Ok(ResolutionCore::resolve_day(&inputs, date))
    }

    /// 解析并把快照写入 operational_status
    ///
    /// # 规则
    /// - 解析结果幂等, 重复 apply 覆盖为相同内容
    /// - 持久化失败且属可重试类别时, 原样重试一次; 再失败则上抛
    #[instrument(skip(self), fields(post_id = %post_id, date = %date, actor = %actor))]
    pub async fn apply(
        &self,
        post_id: &str,
        date: NaiveDate,
        actor: &str,
    ) -> Result<ApplyOutcome, ResolutionError> {
        let resolution = self.resolve(post_id, date).await?;

        for warning in &resolution.warnings {
            tracing::warn!("数据完整性警告: post_id={}, date={}, {}", post_id, date, warning);
        }

        let status = OperationalStatus {
            post_id: post_id.to_string(),
            date,
            plan_base: resolution.plan_base,
            rrhh_status: resolution.rrhh_status,
            operation_status: resolution.operation_status,
            coverage_guard_id: resolution.coverage_guard_id.clone(),
            coverage_motive: resolution.coverage_motive.clone(),
            is_pending_coverage: resolution.is_pending_coverage,
            origin: StatusOrigin::System,
            resolved_at: now_local(),
            resolved_by: actor.to_string(),
        };

        if let Err(first) = self.status_repo.upsert(&status) {
            if !first.is_retryable() {
                return Err(first.into());
            }
            tracing::warn!(
                "状态快照写入失败, 重试一次: post_id={}, date={}, err={}",
                post_id,
                date,
                first
            );
            self.status_repo.upsert(&status)?;
        }

        tracing::info!(
            "勤务状态已落库: post_id={}, date={}, status={}",
            post_id,
            date,
            status.operation_status
        );

        Ok(ApplyOutcome {
            status,
            reasons: resolution.reasons,
            warnings: resolution.warnings,
        })
    }
}
