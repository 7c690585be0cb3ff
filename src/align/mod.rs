//! 仿射间隙比对引擎：局部 / 全局比对、回溯、不重叠多比对。

pub mod multi;
pub mod sw;

pub use multi::MultiHitOpt;
pub use sw::{align, ops_to_cigar, AlignMode, Aligner, Alignment, Cell, DpTable, ScoringParams, State};
