// ==========================================
// 安保驻勤排班系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 把引擎/仓储的技术错误
//       转换为操作员可读的业务错误
// 红线: 并发冲突必须显式上抛(IntegrityConflict), 绝不静默覆盖
// ==========================================

use crate::engine::{ResolutionError, SchedulerError, TrackerError};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 状态机之外的请求(如对已录入的查哨再录入)
    #[error("无效的状态流转: from={from} to={to}")]
    InvalidState { from: String, to: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 另一操作员抢先完成了写入; 发起方需重新拉取后决定是否继续
    #[error("并发写入冲突: {0}")]
    IntegrityConflict(String),

    // ==========================================
    // 存储错误
    // ==========================================
    #[error("存储故障: {0}")]
    StoreFailure(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层的技术错误转换为操作员可读的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::PreconditionFailed {
                entity,
                id,
                expected,
                actual,
            } => ApiError::IntegrityConflict(format!(
                "{}(id={})已被其他操作员更新（期望状态={}，实际状态={}）",
                entity, id, expected, actual
            )),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::IntegrityConflict(format!("唯一约束违反: {}", msg))
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::StoreFailure(msg),
            RepositoryError::DatabaseTransactionError(msg) => ApiError::StoreFailure(msg),
            RepositoryError::LockError(msg) => {
                ApiError::StoreFailure(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::StoreFailure(msg),
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidState { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从引擎错误转换
// ==========================================
impl From<ResolutionError> for ApiError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::PlanNotFound { post_id, date } => {
                ApiError::NotFound(format!("基础排班缺失: post_id={}, date={}", post_id, date))
            }
            ResolutionError::Store(msg) => ApiError::StoreFailure(msg),
            ResolutionError::Repository(e) => e.into(),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InstallationNotFound { installation_id } => ApiError::NotFound(
                format!("驻勤点不存在: installation_id={}", installation_id),
            ),
            SchedulerError::Repository(e) => e.into(),
        }
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::SlotNotFound { slot_id } => {
                ApiError::NotFound(format!("查哨时隙不存在: slot_id={}", slot_id))
            }
            TrackerError::InvalidState { from, to } => ApiError::InvalidState { from, to },
            TrackerError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            TrackerError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 入参校验辅助函数
// ==========================================

/// 校验操作人非空
pub fn validate_actor(actor: &str) -> ApiResult<()> {
    if actor.trim().is_empty() {
        Err(ApiError::InvalidInput("操作人不能为空".to_string()))
    } else {
        Ok(())
    }
}

/// 校验生成天数在 [0, max_days] 范围内
///
/// 说明: horizon=0 表示只生成起始日当天。
pub fn validate_horizon_days(horizon_days: u32, max_days: u32) -> ApiResult<()> {
    if horizon_days > max_days {
        Err(ApiError::InvalidInput(format!(
            "生成天数超出上限: horizon_days={}, max={}",
            horizon_days, max_days
        )))
    } else {
        Ok(())
    }
}

/// 校验日期区间 from <= to
pub fn validate_date_range(from: chrono::NaiveDate, to: chrono::NaiveDate) -> ApiResult<()> {
    if from > to {
        Err(ApiError::InvalidInput(format!(
            "日期区间无效: from={} 晚于 to={}",
            from, to
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_precondition_failure_maps_to_conflict() {
        let repo_err = RepositoryError::PreconditionFailed {
            entity: "call_slot".to_string(),
            id: "S001".to_string(),
            expected: "pending".to_string(),
            actual: "successful".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::IntegrityConflict(msg) => {
                assert!(msg.contains("S001"));
                assert!(msg.contains("已被其他操作员更新"));
                assert!(msg.contains("successful"));
            }
            other => panic!("期望 IntegrityConflict, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_not_found_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "guard".to_string(),
            id: "G001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("guard"));
                assert!(msg.contains("G001"));
            }
            other => panic!("期望 NotFound, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_retryable_repo_errors_become_store_failure() {
        let api_err: ApiError =
            RepositoryError::DatabaseTransactionError("commit 超时".to_string()).into();
        assert!(matches!(api_err, ApiError::StoreFailure(_)));

        let api_err: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert!(matches!(api_err, ApiError::StoreFailure(_)));
    }

    #[test]
    fn test_tracker_error_conversion() {
        let api_err: ApiError = TrackerError::InvalidState {
            from: "successful".to_string(),
            to: "busy".to_string(),
        }
        .into();
        match api_err {
            ApiError::InvalidState { from, to } => {
                assert_eq!(from, "successful");
                assert_eq!(to, "busy");
            }
            other => panic!("期望 InvalidState, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_resolution_plan_not_found_conversion() {
        let api_err: ApiError = ResolutionError::PlanNotFound {
            post_id: "P001".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        }
        .into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("P001"));
                assert!(msg.contains("2026-03-10"));
            }
            other => panic!("期望 NotFound, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_validators() {
        assert!(validate_actor("张三").is_ok());
        assert!(validate_actor("  ").is_err());

        assert!(validate_horizon_days(7, 31).is_ok());
        assert!(validate_horizon_days(0, 31).is_ok());
        assert!(validate_horizon_days(32, 31).is_err());

        let d1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert!(validate_date_range(d1, d2).is_ok());
        assert!(validate_date_range(d1, d1).is_ok());
        assert!(validate_date_range(d2, d1).is_err());
    }
}
