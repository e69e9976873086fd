// ==========================================
// 安保驻勤排班系统 - Resolution Core 纯函数库
// ==========================================
// 职责: 哨位×日运行状态的优先级解析纯逻辑
// 红线: 无状态、无副作用、无 I/O 操作
// 红线: 解析顺序严格分层, 高层命中即终止, 不得跨层合并
// ==========================================

use crate::domain::roster::{CoverageAssignment, Guard, HrLeaveEvent, PostAssignment};
use crate::domain::types::{LeaveKind, OperationStatus, PlanBase, RrhhStatus};
use chrono::NaiveDate;

// ==========================================
// ResolutionInputs - 解析输入快照
// ==========================================
// 由服务层一次性取齐, 核心层只消费、不回查
#[derive(Debug, Clone)]
pub struct ResolutionInputs {
    /// 基础排班行（缺行由服务层报 NotFound, 不会进入核心层）
    pub plan: PostAssignment,
    /// 在编保安主数据（排班引用了工号但主数据缺失时为 None）
    pub titular: Option<Guard>,
    /// 在编保安覆盖范围内的人事事件（未按日过滤, 核心层自行判断 covers）
    pub leave_events: Vec<HrLeaveEvent>,
    /// 当日替班指派
    pub coverage: Option<CoverageAssignment>,
    /// 替班保安主数据（校验孤儿替班用）
    pub coverage_guard: Option<Guard>,
    /// 当日是否已到岗确认
    pub attendance_confirmed: bool,
}

// ==========================================
// DayResolution - 解析输出
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct DayResolution {
    pub plan_base: PlanBase,
    pub rrhh_status: RrhhStatus,
    pub operation_status: OperationStatus,
    pub coverage_guard_id: Option<String>,
    pub coverage_motive: Option<String>,
    pub is_pending_coverage: bool,
    /// 决策原因（逐层追加, 可解释性）
    pub reasons: Vec<String>,
    /// 非致命数据完整性告警（孤儿替班等）
    pub warnings: Vec<String>,
}

// ==========================================
// ResolutionCore - 纯函数工具类
// ==========================================
pub struct ResolutionCore;

impl ResolutionCore {
    /// 选取当日生效的人事事件
    ///
    /// # 规则
    /// - 只考虑覆盖 date 的事件
    /// - 多条并存时取优先级最高者（LeaveKind::priority 查表）
    /// - 同优先级取先录入者（列表序稳定, 从不合并）
    pub fn pick_dominant_leave(
        events: &[HrLeaveEvent],
        date: NaiveDate,
    ) -> Option<&HrLeaveEvent> {
        let mut dominant: Option<&HrLeaveEvent> = None;
        for event in events.iter().filter(|e| e.covers(date)) {
            match dominant {
                None => dominant = Some(event),
                Some(current) => {
                    if event.kind.priority() > current.kind.priority() {
                        dominant = Some(event);
                    }
                }
            }
        }
        dominant
    }

    /// 判定哨位当日是否为待补位(PPC)
    ///
    /// # 规则
    /// 1. 排班未引用任何在编保安 → PPC
    /// 2. 引用的保安主数据缺失或已停用 → PPC
    /// 3. 在编保安存在"开放离职"（无结束日且覆盖当日）→ PPC
    pub fn is_pending_coverage(
        assigned_guard_id: Option<&str>,
        titular: Option<&Guard>,
        leave_events: &[HrLeaveEvent],
        date: NaiveDate,
    ) -> bool {
        if assigned_guard_id.is_none() {
            return true;
        }
        match titular {
            None => true,
            Some(guard) => {
                if !guard.active {
                    return true;
                }
                leave_events.iter().any(|e| e.is_open_termination_at(date))
            }
        }
    }

    /// 校验替班是否有效, 过滤孤儿替班
    ///
    /// # 规则
    /// - 替班保安主数据缺失或已停用 → 视同无替班, 返回完整性告警
    ///
    /// # 返回
    /// - (有效替班, 告警)
    pub fn effective_coverage<'a>(
        coverage: Option<&'a CoverageAssignment>,
        coverage_guard: Option<&Guard>,
    ) -> (Option<&'a CoverageAssignment>, Option<String>) {
        let Some(cov) = coverage else {
            return (None, None);
        };

        match coverage_guard {
            Some(guard) if guard.active => (Some(cov), None),
            Some(_) => (
                None,
                Some(format!(
                    "孤儿替班: 替班保安 {} 已停用, 按无替班处理 (哨位 {} / {})",
                    cov.covering_guard_id, cov.post_id, cov.date
                )),
            ),
            None => (
                None,
                Some(format!(
                    "孤儿替班: 替班保安 {} 主数据缺失, 按无替班处理 (哨位 {} / {})",
                    cov.covering_guard_id, cov.post_id, cov.date
                )),
            ),
        }
    }

    /// 按被替原因生成替班事由码
    ///
    /// # 规则
    /// - 待补位哨位 → replacement_for_pending_coverage
    /// - 无人事事件缺岗 → replacement_for_absence
    /// - 人事休假覆盖 → replacement_for_{休假类型}
    pub fn replacement_motive(rrhh_status: RrhhStatus, is_pending_coverage: bool) -> String {
        if is_pending_coverage {
            return "replacement_for_pending_coverage".to_string();
        }
        match rrhh_status {
            RrhhStatus::None => "replacement_for_absence".to_string(),
            RrhhStatus::Covered(kind) => format!("replacement_for_{}", kind.to_db_str()),
        }
    }

    /// 解析哨位单日运行状态
    ///
    /// # 规则（严格优先级, 命中即终止）
    /// 1. plan_base=day_off → day_off, 不再看任何其他输入
    /// 2. 确定在编保安（titular）
    /// 3. 无在编 / 在编开放离职 → 待补位; 有效替班 ? filled : unfilled
    /// 4. 取当日最高优先级人事事件, 无 → rrhh=none
    /// 5. rrhh=none: 已到岗 → attended; 有效替班 → absence_filled; 否则 absence_unfilled
    /// 6. rrhh≠none: 有效替班 → {类型}_filled; 否则 {类型}_unfilled
    ///
    /// # 说明
    /// 纯函数: 相同输入永远得到相同输出（幂等读）
    pub fn resolve_day(inputs: &ResolutionInputs, date: NaiveDate) -> DayResolution {
        let mut reasons = Vec::new();
        let mut warnings = Vec::new();

        // 规则 1: 轮休日终止解析
        if inputs.plan.plan_base == PlanBase::DayOff {
            reasons.push("day_off: 基础排班为轮休, 终止解析".to_string());
            return DayResolution {
                plan_base: PlanBase::DayOff,
                rrhh_status: RrhhStatus::None,
                operation_status: OperationStatus::DayOff,
                coverage_guard_id: None,
                coverage_motive: None,
                is_pending_coverage: false,
                reasons,
                warnings,
            };
        }

        // 规则 2: 确定在编保安
        let assigned_guard_id = inputs.plan.assigned_guard_id.as_deref();
        if let (Some(guard_id), None) = (assigned_guard_id, inputs.titular.as_ref()) {
            warnings.push(format!(
                "排班引用的保安 {} 主数据缺失 (哨位 {} / {})",
                guard_id, inputs.plan.post_id, date
            ));
        }

        // 规则 3: 待补位判定
        if Self::is_pending_coverage(
            assigned_guard_id,
            inputs.titular.as_ref(),
            &inputs.leave_events,
            date,
        ) {
            let open_termination = inputs
                .leave_events
                .iter()
                .any(|e| e.is_open_termination_at(date));
            // 开放离职导致的待补位保留人事状态, 供读侧区分"缺编"与"已离职"
            let rrhh_status = if open_termination {
                reasons.push("pending_coverage: 在编保安存在开放离职".to_string());
                RrhhStatus::Covered(LeaveKind::Termination)
            } else {
                reasons.push("pending_coverage: 当日无有效在编保安".to_string());
                RrhhStatus::None
            };

            let (coverage, warning) =
                Self::effective_coverage(inputs.coverage.as_ref(), inputs.coverage_guard.as_ref());
            warnings.extend(warning);

            let filled = coverage.is_some();
            reasons.push(if filled {
                "pending_coverage: 替班补位".to_string()
            } else {
                "pending_coverage: 无替班".to_string()
            });

            return DayResolution {
                plan_base: inputs.plan.plan_base,
                rrhh_status,
                operation_status: OperationStatus::PendingCoverage { filled },
                coverage_guard_id: coverage.map(|c| c.covering_guard_id.clone()),
                coverage_motive: filled.then(|| Self::replacement_motive(rrhh_status, true)),
                is_pending_coverage: true,
                reasons,
                warnings,
            };
        }

        // 规则 4: 人事事件优先级选取
        let rrhh_status = match Self::pick_dominant_leave(&inputs.leave_events, date) {
            Some(event) => {
                reasons.push(format!(
                    "rrhh: 事件 {} 生效 (优先级 {})",
                    event.kind,
                    event.kind.priority()
                ));
                RrhhStatus::Covered(event.kind)
            }
            None => {
                reasons.push("rrhh: 当日无人事事件".to_string());
                RrhhStatus::None
            }
        };

        // 规则 5: 无人事事件且已到岗 → attended（替班不生效）
        if rrhh_status == RrhhStatus::None && inputs.attendance_confirmed {
            reasons.push("attended: 到岗已确认".to_string());
            return DayResolution {
                plan_base: inputs.plan.plan_base,
                rrhh_status,
                operation_status: OperationStatus::Attended,
                coverage_guard_id: None,
                coverage_motive: None,
                is_pending_coverage: false,
                reasons,
                warnings,
            };
        }

        // 规则 5/6 共用: 有效替班校验后组合 {基础}_{是否替班}
        let (coverage, warning) =
            Self::effective_coverage(inputs.coverage.as_ref(), inputs.coverage_guard.as_ref());
        warnings.extend(warning);
        let filled = coverage.is_some();

        let operation_status = match rrhh_status {
            // 规则 5: 无人事事件但未到岗 → absence
            RrhhStatus::None => {
                reasons.push(if filled {
                    "absence: 未到岗, 替班补位".to_string()
                } else {
                    "absence: 未到岗且无替班".to_string()
                });
                OperationStatus::Absence { filled }
            }
            // 规则 6: 人事事件覆盖 → {类型}_filled / {类型}_unfilled
            RrhhStatus::Covered(kind) => {
                reasons.push(if filled {
                    format!("leave: {} 覆盖, 替班补位", kind)
                } else {
                    format!("leave: {} 覆盖, 无替班", kind)
                });
                OperationStatus::Leave { kind, filled }
            }
        };

        DayResolution {
            plan_base: inputs.plan.plan_base,
            rrhh_status,
            operation_status,
            coverage_guard_id: coverage.map(|c| c.covering_guard_id.clone()),
            coverage_motive: filled.then(|| Self::replacement_motive(rrhh_status, false)),
            is_pending_coverage: false,
            reasons,
            warnings,
        }
    }
}
