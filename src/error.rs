//! 核心算法的错误类型。
//!
//! 索引构建、比对与候选定位返回 [`SfxError`]；I/O 与命令行层使用 `anyhow`。

use std::collections::TryReserveError;

pub type Result<T> = std::result::Result<T, SfxError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SfxError {
    /// 后缀树或 DP 表无法分配
    #[error("cannot allocate {what} ({requested} entries)")]
    AllocationFailure { what: &'static str, requested: usize },

    /// 未知的比对模式（只支持 local / global）
    #[error("invalid alignment mode '{0}' (expected 'local' or 'global')")]
    InvalidAlignmentMode(String),

    /// 空序列
    #[error("{0} sequence is empty")]
    NullOrEmptySequence(&'static str),

    /// 序列含有字母表之外的字符
    #[error("symbol '{symbol}' at position {position} is not in the alphabet")]
    InvalidSymbol { symbol: char, position: usize },

    /// 终止符 `$` 只能出现在序列末尾
    #[error("sentinel '$' found at position {position}, only allowed at the end")]
    MisplacedSentinel { position: usize },

    /// 实现缺陷，不可恢复
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// 单条 query 的比对超时
    #[error("alignment timed out after {elapsed_ms} ms")]
    TimedOut { elapsed_ms: u128 },
}

impl SfxError {
    /// 单条 query 级别的错误可以跳过（记为 miss），其余错误终止整批任务。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SfxError::NullOrEmptySequence(_) | SfxError::InvalidSymbol { .. } | SfxError::TimedOut { .. }
        )
    }

    pub(crate) fn alloc(what: &'static str, requested: usize) -> impl FnOnce(TryReserveError) -> SfxError {
        move |_| SfxError::AllocationFailure { what, requested }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        assert!(SfxError::NullOrEmptySequence("query").is_recoverable());
        assert!(SfxError::InvalidSymbol { symbol: 'N', position: 3 }.is_recoverable());
        assert!(SfxError::TimedOut { elapsed_ms: 10 }.is_recoverable());
        assert!(!SfxError::InvariantViolation("x".into()).is_recoverable());
        assert!(!SfxError::AllocationFailure { what: "tree", requested: 1 }.is_recoverable());
        assert!(!SfxError::InvalidAlignmentMode("x".into()).is_recoverable());
    }

    #[test]
    fn messages_name_the_input() {
        let e = SfxError::NullOrEmptySequence("query");
        assert_eq!(e.to_string(), "query sequence is empty");
        let e = SfxError::InvalidAlignmentMode("semi".into());
        assert!(e.to_string().contains("'semi'"));
    }
}
