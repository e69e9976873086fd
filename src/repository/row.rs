// ==========================================
// 安保驻勤排班系统 - 行映射辅助
// ==========================================
// 职责: TEXT 列与 chrono 类型之间的统一解析
// 说明: 存储口径固定为 日期 %Y-%m-%d / 时间戳 %Y-%m-%d %H:%M:%S / 时刻 %H:%M:%S
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Error as SqliteError, Result as SqliteResult, Row};

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
pub const TIME_FMT: &str = "%H:%M:%S";

/// 解析必填日期列, 格式损坏视为转换错误而不是静默丢弃
pub fn date_col(row: &Row, idx: usize) -> SqliteResult<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FMT)
        .map_err(|e| SqliteError::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 解析可空日期列
pub fn opt_date_col(row: &Row, idx: usize) -> SqliteResult<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FMT)
            .map(Some)
            .map_err(|e| SqliteError::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// 解析必填时间戳列
pub fn datetime_col(row: &Row, idx: usize) -> SqliteResult<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, DATETIME_FMT)
        .map_err(|e| SqliteError::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 解析可空时间戳列
pub fn opt_datetime_col(row: &Row, idx: usize) -> SqliteResult<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => NaiveDateTime::parse_from_str(&s, DATETIME_FMT)
            .map(Some)
            .map_err(|e| SqliteError::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// 解析可空时刻列（查哨窗口端点）
pub fn opt_time_col(row: &Row, idx: usize) -> SqliteResult<Option<NaiveTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => NaiveTime::parse_from_str(&s, TIME_FMT)
            .map(Some)
            .map_err(|e| SqliteError::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// 解析编码列, 未知编码视为数据损坏
pub fn coded_col<T, F>(row: &Row, idx: usize, decode: F, label: &str) -> SqliteResult<T>
where
    F: FnOnce(&str) -> Option<T>,
{
    let s: String = row.get(idx)?;
    decode(&s).ok_or_else(|| {
        SqliteError::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("未知{}编码: {}", label, s).into(),
        )
    })
}
