// ==========================================
// 安保驻勤排班系统 - 排班事实读取接口的 SQLite 实现
// ==========================================
// 职责: 把 ShiftPlanStore 的读语义落到各仓储上
// 红线: 只读; 不做任何解析判定
// ==========================================

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::domain::roster::{CoverageAssignment, Guard, HrLeaveEvent, PostAssignment};
use crate::engine::shift_plan_store::{ShiftPlanStore, StoreResult};
use crate::repository::roster_repo::{
    AttendanceRepository, CoverageRepository, LeaveEventRepository, PostAssignmentRepository,
};
use crate::repository::GuardRepository;

pub struct SqliteShiftPlanStore {
    assignment_repo: Arc<PostAssignmentRepository>,
    guard_repo: Arc<GuardRepository>,
    leave_repo: Arc<LeaveEventRepository>,
    coverage_repo: Arc<CoverageRepository>,
    attendance_repo: Arc<AttendanceRepository>,
}

impl SqliteShiftPlanStore {
    pub fn new(
        assignment_repo: Arc<PostAssignmentRepository>,
        guard_repo: Arc<GuardRepository>,
        leave_repo: Arc<LeaveEventRepository>,
        coverage_repo: Arc<CoverageRepository>,
        attendance_repo: Arc<AttendanceRepository>,
    ) -> Self {
        Self {
            assignment_repo,
            guard_repo,
            leave_repo,
            coverage_repo,
            attendance_repo,
        }
    }
}

#[async_trait]
impl ShiftPlanStore for SqliteShiftPlanStore {
    async fn get_plan(
        &self,
        post_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<PostAssignment>> {
        Ok(self.assignment_repo.find(post_id, date)?)
    }

    async fn get_guard(&self, guard_id: &str) -> StoreResult<Option<Guard>> {
        Ok(self.guard_repo.find_by_id(guard_id)?)
    }

    async fn get_leave_events(
        &self,
        guard_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<HrLeaveEvent>> {
        Ok(self.leave_repo.find_covering(guard_id, date)?)
    }

    async fn get_coverage(
        &self,
        post_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<CoverageAssignment>> {
        Ok(self.coverage_repo.find(post_id, date)?)
    }

    async fn is_attendance_confirmed(&self, post_id: &str, date: NaiveDate) -> StoreResult<bool> {
        Ok(self.attendance_repo.is_confirmed(post_id, date)?)
    }
}
