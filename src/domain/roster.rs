// ==========================================
// 安保驻勤排班系统 - 排班领域模型
// ==========================================
// 职责: 哨位/保安员主数据、基础排班、人事休假事件、替班与到岗确认、运行状态
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

use crate::domain::types::{LeaveKind, OperationStatus, PlanBase, RrhhStatus, StatusOrigin};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 当前本地时间（统一格式化口径: 秒级）
pub(crate) fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

// ==========================================
// Guard - 保安员主数据
// ==========================================
// 用途: 人事侧维护; 解析引擎只读 active 标记判定"替班人是否有效"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guard {
    pub guard_id: String,  // 工号（外部人事系统分配）
    pub full_name: String, // 姓名
    pub active: bool,      // 在职标记（false = 已删除/已离职归档）

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Guard {
    pub fn new(guard_id: String, full_name: String) -> Self {
        let now = now_local();
        Self {
            guard_id,
            full_name,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// Post - 哨位主数据
// ==========================================
// 哨位隶属于驻勤点(installation), 是排班的最小单位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,         // 哨位编号
    pub installation_id: String, // 所属驻勤点
    pub name: String,            // 哨位名称（如"东门岗"）
    pub active: bool,            // 启用标记

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Post {
    pub fn new(post_id: String, installation_id: String, name: String) -> Self {
        let now = now_local();
        Self {
            post_id,
            installation_id,
            name,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// PostAssignment - 基础排班（哨位 × 日）
// ==========================================
// 红线: 每哨位每天至多一行; 无行 = 当日未排班, 解析时报 NotFound 而非默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAssignment {
    pub post_id: String,
    pub date: NaiveDate,
    pub plan_base: PlanBase,                  // 排班 / 轮休
    pub assigned_guard_id: Option<String>,    // 在编保安员（可空 = 缺编）

    // ===== 审计字段 =====
    pub updated_at: NaiveDateTime,
    pub updated_by: String,
}

impl PostAssignment {
    pub fn new(
        post_id: String,
        date: NaiveDate,
        plan_base: PlanBase,
        assigned_guard_id: Option<String>,
        updated_by: String,
    ) -> Self {
        Self {
            post_id,
            date,
            plan_base,
            assigned_guard_id,
            updated_at: now_local(),
            updated_by,
        }
    }
}

// ==========================================
// HrLeaveEvent - 人事休假/离职事件
// ==========================================
// 来源: 人事系统(RRHH)推送; end_date 为空表示开放事件（如未定复岗日的离职）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrLeaveEvent {
    pub event_id: String, // UUID
    pub guard_id: String,
    pub kind: LeaveKind,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>, // None = 开放（无结束日）
    pub note: Option<String>,        // 备注

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

impl HrLeaveEvent {
    pub fn new(
        guard_id: String,
        kind: LeaveKind,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        note: Option<String>,
        created_by: String,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            guard_id,
            kind,
            start_date,
            end_date,
            note,
            created_at: now_local(),
            created_by,
        }
    }

    /// 事件是否覆盖指定日期
    ///
    /// # 规则
    /// - start_date <= date
    /// - end_date 为空（开放事件）或 end_date >= date
    pub fn covers(&self, date: NaiveDate) -> bool {
        if self.start_date > date {
            return false;
        }
        match self.end_date {
            None => true,
            Some(end) => end >= date,
        }
    }

    /// 是否为开放事件（无结束日）
    pub fn is_open_ended(&self) -> bool {
        self.end_date.is_none()
    }

    /// 是否为覆盖指定日期的"开放离职"
    ///
    /// 开放离职使哨位进入待补位(PPC), 与普通休假走不同分支。
    pub fn is_open_termination_at(&self, date: NaiveDate) -> bool {
        self.kind == LeaveKind::Termination && self.is_open_ended() && self.covers(date)
    }
}

// ==========================================
// CoverageAssignment - 替班（加班补位）
// ==========================================
// 每哨位每天至多一条替班; motive 由引擎按被替原因生成
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageAssignment {
    pub coverage_id: String, // UUID
    pub post_id: String,
    pub date: NaiveDate,
    pub covering_guard_id: String, // 替班保安员
    pub motive: String,            // 替班事由（replacement_for_* 状态码）

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

impl CoverageAssignment {
    pub fn new(
        post_id: String,
        date: NaiveDate,
        covering_guard_id: String,
        motive: String,
        created_by: String,
    ) -> Self {
        Self {
            coverage_id: Uuid::new_v4().to_string(),
            post_id,
            date,
            covering_guard_id,
            motive,
            created_at: now_local(),
            created_by,
        }
    }
}

// ==========================================
// AttendanceRecord - 到岗确认
// ==========================================
// 由考勤工作流写入; 引擎只读"是否已确认"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub post_id: String,
    pub date: NaiveDate,
    pub guard_id: String, // 实际到岗保安员
    pub confirmed_at: NaiveDateTime,
    pub confirmed_by: String, // 确认人（班长/调度）
}

impl AttendanceRecord {
    pub fn new(post_id: String, date: NaiveDate, guard_id: String, confirmed_by: String) -> Self {
        Self {
            post_id,
            date,
            guard_id,
            confirmed_at: now_local(),
            confirmed_by,
        }
    }
}

// ==========================================
// OperationalStatus - 运行状态（解析结果, 持久化）
// ==========================================
// 红线: 唯一事实层; 只能由解析引擎 apply 或人工改写接口写入
// 用途: 读侧直接消费, 免去每次读都跑一遍解析
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalStatus {
    pub post_id: String,
    pub date: NaiveDate,

    // ===== 解析输出 =====
    pub plan_base: PlanBase,
    pub rrhh_status: RrhhStatus,           // 人事状态（字段名沿用上游）
    pub operation_status: OperationStatus, // 最终运行状态码
    pub coverage_guard_id: Option<String>, // 生效替班人（孤儿替班不计入）
    pub coverage_motive: Option<String>,   // 替班事由
    pub is_pending_coverage: bool,         // 待补位标记(PPC)

    // ===== 审计字段 =====
    pub origin: StatusOrigin, // system = 引擎写入 / manual = 人工改写
    pub resolved_at: NaiveDateTime,
    pub resolved_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("测试日期格式错误")
    }

    #[test]
    fn test_leave_event_covers() {
        let event = HrLeaveEvent::new(
            "G001".to_string(),
            LeaveKind::MedicalLeave,
            d("2025-03-10"),
            Some(d("2025-03-12")),
            None,
            "hr".to_string(),
        );

        assert!(!event.covers(d("2025-03-09")), "开始前不覆盖");
        assert!(event.covers(d("2025-03-10")), "首日覆盖");
        assert!(event.covers(d("2025-03-12")), "末日覆盖");
        assert!(!event.covers(d("2025-03-13")), "结束后不覆盖");
    }

    #[test]
    fn test_open_ended_event_covers_forward() {
        let event = HrLeaveEvent::new(
            "G001".to_string(),
            LeaveKind::Termination,
            d("2025-03-10"),
            None,
            None,
            "hr".to_string(),
        );

        assert!(event.is_open_ended());
        assert!(!event.covers(d("2025-03-09")));
        assert!(event.covers(d("2025-03-10")));
        assert!(event.covers(d("2026-01-01")), "开放事件向后无限覆盖");
        assert!(event.is_open_termination_at(d("2025-04-01")));
    }

    #[test]
    fn test_closed_termination_is_not_open() {
        let event = HrLeaveEvent::new(
            "G001".to_string(),
            LeaveKind::Termination,
            d("2025-03-10"),
            Some(d("2025-03-20")),
            None,
            "hr".to_string(),
        );

        // 有结束日的离职按普通休假分支处理, 不触发待补位
        assert!(!event.is_open_termination_at(d("2025-03-15")));
        assert!(event.covers(d("2025-03-15")));
    }
}
