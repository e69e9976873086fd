// ==========================================
// 安保驻勤排班系统 - 电话查哨时隙引擎
// ==========================================
// 职责: 按驻勤点查哨配置生成固定间隔的查哨时隙
// 输入: 驻勤点配置 + 起始日期 + 展望天数
// 输出: 幂等写入的 call_slot 行
// 红线: 跨夜窗口判定必须拆成两个独立谓词, 由
//       window_start >= window_end 这一个分支选择;
//       禁止用取模或单条合并比较实现环绕
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::domain::monitoring::{CallSlot, CallSlotView, Installation, MonitoringConfig};
use crate::repository::error::RepositoryError;
use crate::repository::{CallSlotRepository, InstallationRepository};

// ==========================================
// SchedulerError - 时隙引擎错误
// ==========================================
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("驻勤点不存在: installation_id={installation_id}")]
    InstallationNotFound { installation_id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// ConfigWarning - 配置告警（值对象, 不是错误）
// ==========================================
/// 配置不完整导致某驻勤点被跳过时的告警
/// 说明: 跳过绝不让整轮生成失败, 告警随结果一并返回
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub installation_id: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "驻勤点{}配置不完整({}): {}",
            self.installation_id, self.field, self.message
        )
    }
}

// ==========================================
// 窗口谓词（解析热点, 两个谓词独立测试）
// ==========================================

/// 日间窗口判定: window_start < window_end 时使用
///
/// # 规则
/// - 保留 start <= t <= end, 两端闭区间
pub fn in_day_window(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    start <= t && t <= end
}

/// 跨夜窗口判定: window_start >= window_end 时使用（如 21:00-07:00）
///
/// # 规则
/// - 保留 t >= start 或 t <= end, 两端闭区间
pub fn in_overnight_window(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    t >= start || t <= end
}

/// 统一入口: 由 start >= end 这一个分支选择谓词
pub fn window_contains(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start >= end {
        in_overnight_window(t, start, end)
    } else {
        in_day_window(t, start, end)
    }
}

// ==========================================
// ValidatedWindow - 校验通过的查哨配置
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ValidatedWindow {
    pub interval_minutes: i64,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
}

impl ValidatedWindow {
    pub fn is_overnight(&self) -> bool {
        self.window_start >= self.window_end
    }
}

/// 校验某驻勤点的查哨配置
///
/// # 规则
/// - 必须启用查哨、间隔为正、两个窗口端点都已配置
/// - 任一条件不满足 → ConfigWarning, 该驻勤点整体跳过
pub fn validate_monitoring_config(
    installation_id: &str,
    config: &MonitoringConfig,
) -> Result<ValidatedWindow, ConfigWarning> {
    if !config.enabled {
        return Err(ConfigWarning {
            installation_id: installation_id.to_string(),
            field: "monitoring_enabled".to_string(),
            message: "查哨未启用".to_string(),
        });
    }
    if config.interval_minutes <= 0 {
        return Err(ConfigWarning {
            installation_id: installation_id.to_string(),
            field: "interval_minutes".to_string(),
            message: format!("查哨间隔必须为正, 当前 {}", config.interval_minutes),
        });
    }
    let window_start = match config.window_start {
        Some(t) => t,
        None => {
            return Err(ConfigWarning {
                installation_id: installation_id.to_string(),
                field: "window_start".to_string(),
                message: "窗口开始时刻未配置".to_string(),
            })
        }
    };
    let window_end = match config.window_end {
        Some(t) => t,
        None => {
            return Err(ConfigWarning {
                installation_id: installation_id.to_string(),
                field: "window_end".to_string(),
                message: "窗口结束时刻未配置".to_string(),
            })
        }
    };
    Ok(ValidatedWindow {
        interval_minutes: config.interval_minutes,
        window_start,
        window_end,
    })
}

// ==========================================
// 时间轴构造
// ==========================================

/// 某一天的固定间隔时间轴, 锚定本地零点
///
/// # 规则
/// - 每天重新锚定: t = 当日00:00 + k*interval, t 不跨入次日
fn day_timeline(day: NaiveDate, interval_minutes: i64) -> Vec<NaiveDateTime> {
    let midnight = day.and_time(NaiveTime::MIN);
    let next_midnight = midnight + Duration::days(1);
    let step = Duration::minutes(interval_minutes);

    let mut points = Vec::new();
    let mut t = midnight;
    while t < next_midnight {
        points.push(t);
        t += step;
    }
    points
}

/// 生成候选时隙（纯函数, 不触库）
///
/// # 规则
/// - 覆盖 [from, from + horizon_days] 的每一天
/// - 跨夜窗口追加一个收尾日, 只保留 t <= window_end 的尾段,
///   使最后一天夜里跨过零点的时隙不被截断
/// - 时隙身份是 (installation_id, 计划时刻) 的确定性哈希,
///   同一配置重复生成得到完全相同的集合
pub fn build_candidate_slots(
    installation_id: &str,
    window: &ValidatedWindow,
    from: NaiveDate,
    horizon_days: u32,
) -> Vec<CallSlot> {
    let last = from + Duration::days(horizon_days as i64);
    let mut slots = Vec::new();

    let mut day = from;
    while day <= last {
        for t in day_timeline(day, window.interval_minutes) {
            if window_contains(t.time(), window.window_start, window.window_end) {
                slots.push(CallSlot::new(installation_id.to_string(), t));
            }
        }
        day += Duration::days(1);
    }

    if window.is_overnight() {
        let tail_day = last + Duration::days(1);
        for t in day_timeline(tail_day, window.interval_minutes) {
            if t.time() <= window.window_end {
                slots.push(CallSlot::new(installation_id.to_string(), t));
            }
        }
    }

    slots
}

/// 读取时为时隙补上三个即时标志（不落库）
///
/// # 规则
/// - is_current: 时隙的钟点 == 当前钟点
/// - is_upcoming: 计划时刻在未来
/// - is_urgent: 逾期超过 urgent_after_minutes 且仍为 pending
pub fn annotate_slot(slot: CallSlot, now: NaiveDateTime, urgent_after_minutes: i64) -> CallSlotView {
    let is_current = slot.scheduled_for.hour() == now.hour();
    let is_upcoming = slot.scheduled_for > now;
    let overdue = now - slot.scheduled_for > Duration::minutes(urgent_after_minutes);
    let is_urgent = overdue && !slot.outcome.is_terminal();
    CallSlotView {
        slot,
        is_current,
        is_upcoming,
        is_urgent,
    }
}

// ==========================================
// SlotGenerationReport - 单驻勤点生成结果
// ==========================================
#[derive(Debug, Clone)]
pub struct SlotGenerationReport {
    pub slots: Vec<CallSlot>,          // 生成区间内的持久化行（含既有行）
    pub inserted: usize,               // 本次实际新插入的行数
    pub warnings: Vec<ConfigWarning>,  // 配置告警（有告警则未生成）
}

// ==========================================
// GenerateAllReport - 全量生成结果
// ==========================================
#[derive(Debug, Clone)]
pub struct GenerateAllReport {
    pub installations: usize,          // 参与生成的驻勤点数
    pub total_inserted: usize,         // 新插入的时隙总数
    pub warnings: Vec<ConfigWarning>,  // 被跳过的驻勤点告警
}

// ==========================================
// CallWindowScheduler - 时隙生成引擎
// ==========================================
/// 时隙生成引擎
/// 职责: 校验配置 → 纯函数生成候选 → 幂等写入 → 回读区间
pub struct CallWindowScheduler {
    installation_repo: Arc<InstallationRepository>,
    slot_repo: Arc<CallSlotRepository>,
}

impl CallWindowScheduler {
    pub fn new(
        installation_repo: Arc<InstallationRepository>,
        slot_repo: Arc<CallSlotRepository>,
    ) -> Self {
        Self {
            installation_repo,
            slot_repo,
        }
    }

    /// 为单个驻勤点生成时隙
    ///
    /// # 规则
    /// - 配置不完整 → 不生成, 返回告警（绝不硬失败）
    /// - 已存在的时隙原样跳过, 已录入结果的行不受影响
    #[instrument(skip(self), fields(installation_id = %installation_id, from = %from, horizon_days = %horizon_days))]
    pub fn generate_slots(
        &self,
        installation_id: &str,
        from: NaiveDate,
        horizon_days: u32,
    ) -> Result<SlotGenerationReport, SchedulerError> {
        let installation = self
            .installation_repo
            .find_by_id(installation_id)?
            .ok_or_else(|| SchedulerError::InstallationNotFound {
                installation_id: installation_id.to_string(),
            })?;

        Ok(self.generate_for(&installation, from, horizon_days)?)
    }

    /// 为全部启用查哨的驻勤点生成时隙
    ///
    /// # 规则
    /// - 只遍历 monitoring_enabled=1 的驻勤点
    /// - 单点配置告警只记录, 不中断其余驻勤点
    #[instrument(skip(self), fields(from = %from, horizon_days = %horizon_days))]
    pub fn generate_all(
        &self,
        from: NaiveDate,
        horizon_days: u32,
    ) -> Result<GenerateAllReport, SchedulerError> {
        let installations = self.installation_repo.list_monitoring_enabled()?;

        let mut total_inserted = 0usize;
        let mut generated = 0usize;
        let mut warnings = Vec::new();
        for installation in &installations {
            let report = self.generate_for(installation, from, horizon_days)?;
            if report.warnings.is_empty() {
                generated += 1;
                total_inserted += report.inserted;
            } else {
                warnings.extend(report.warnings);
            }
        }

        tracing::info!(
            "时隙生成完成: 驻勤点={}, 新增={}, 跳过={}",
            generated,
            total_inserted,
            warnings.len()
        );

        Ok(GenerateAllReport {
            installations: generated,
            total_inserted,
            warnings,
        })
    }

    fn generate_for(
        &self,
        installation: &Installation,
        from: NaiveDate,
        horizon_days: u32,
    ) -> Result<SlotGenerationReport, RepositoryError> {
        let window = match validate_monitoring_config(
            &installation.installation_id,
            &installation.monitoring,
        ) {
            Ok(window) => window,
            Err(warning) => {
                tracing::warn!("{}", warning);
                return Ok(SlotGenerationReport {
                    slots: Vec::new(),
                    inserted: 0,
                    warnings: vec![warning],
                });
            }
        };

        let candidates =
            build_candidate_slots(&installation.installation_id, &window, from, horizon_days);
        let inserted = self.slot_repo.insert_missing(&candidates)?;

        // 回读生成区间, 让调用方拿到含既有录入结果的真实行
        let range_start = from.and_time(NaiveTime::MIN);
        let last = from + Duration::days(horizon_days as i64);
        let range_end = if window.is_overnight() {
            (last + Duration::days(1)).and_time(window.window_end)
        } else {
            (last + Duration::days(1)).and_time(NaiveTime::MIN) - Duration::seconds(1)
        };
        let slots =
            self.slot_repo
                .list_range(&installation.installation_id, range_start, range_end)?;

        tracing::debug!(
            "驻勤点{}生成时隙: 候选={}, 新增={}",
            installation.installation_id,
            candidates.len(),
            inserted
        );

        Ok(SlotGenerationReport {
            slots,
            inserted,
            warnings: Vec::new(),
        })
    }
}
