//! query 映射：候选锚点定位 → 锚点附近局部比对 → 阈值筛选。

pub mod hit;
pub mod locate;
pub mod mapper;

pub use hit::{HitRecord, MapOutcome, MapStats};
pub use locate::{find_candidate_brute_force, find_candidate_linked, matching_statistics, Candidate, LocatorKind};
pub use mapper::{MapOpt, ReadMapper};
