// ==========================================
// 安保驻勤排班系统 - 排班事实读取接口
// ==========================================
// 职责: 状态解析引擎对持久层的唯一读取口
// 说明: 解析本身是纯函数; 通过本接口把取数与判定分离,
//       引擎测试用内存实现, 生产用 SQLite 实现
// ==========================================

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::roster::{CoverageAssignment, Guard, HrLeaveEvent, PostAssignment};

/// 读取失败统一为可重试的存储错误, 是否存在用 Option 表达
pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 排班事实读取接口
///
/// # 规则
/// - 所有方法只读, 不得有写副作用
/// - 「无此记录」返回 Ok(None)/空集合, Err 只用于存储层故障
#[async_trait]
pub trait ShiftPlanStore: Send + Sync {
    /// 某岗位某日的基础排班
    ///
    /// # 返回
    /// - Ok(None): 该岗位该日无计划行（上层判定 PlanNotFound, 不得默认补齐）
    async fn get_plan(
        &self,
        post_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<PostAssignment>>;

    /// 保安员主数据（已删除的保安员返回 None）
    async fn get_guard(&self, guard_id: &str) -> StoreResult<Option<Guard>>;

    /// 某保安员在指定日期生效的人事事件
    ///
    /// # 规则
    /// - 返回顺序固定为登记先后（created_at, event_id 升序）,
    ///   压倒关系由解析核心按事件类型优先级判定
    async fn get_leave_events(
        &self,
        guard_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<HrLeaveEvent>>;

    /// 某岗位某日的顶勤指派
    async fn get_coverage(
        &self,
        post_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<CoverageAssignment>>;

    /// 某岗位某日是否已确认到岗
    async fn is_attendance_confirmed(&self, post_id: &str, date: NaiveDate) -> StoreResult<bool>;
}
