//! # sfxmap
//!
//! 基于后缀树的短序列映射器。
//!
//! 本 crate 提供：
//!
//! - **索引构建**：McCreight 线性时间后缀树（带后缀链接），叶子区间标记
//! - **候选定位**：沿后缀链接计算匹配统计量，找出 query 与参考的最长精确匹配
//! - **序列比对**：仿射间隙的局部 / 全局比对，状态感知回溯，不重叠多比对
//! - **映射**：在候选锚点附近做局部比对，按一致度与覆盖率筛选
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use sfxmap::index::SuffixIndex;
//! use sfxmap::mapping::{MapOpt, MapOutcome, ReadMapper};
//! use sfxmap::align::ScoringParams;
//! use sfxmap::util::alphabet::Alphabet;
//!
//! let reference = b"ACGTACGTAGCTGATCGTAGGATCCATGCAAGTCCGATAGCT";
//! let idx = SuffixIndex::build("ref", reference, &Alphabet::dna(), 8).unwrap();
//!
//! let mapper = ReadMapper::new(&idx, ScoringParams::default(), MapOpt::default()).unwrap();
//! let mut aligner = mapper.new_aligner();
//! if let MapOutcome::Hit(hit) = mapper.map_read("read1", b"GCTGATCGTAGGATCC", &mut aligner).unwrap() {
//!     println!("{}..{} identity {:.1}%", hit.genome_start, hit.genome_end, hit.identity);
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`index`]：后缀树构建、叶子区间、BWT / 后缀数组校验、索引持久化
//! - [`mapping`]：候选定位与 query 映射
//! - [`align`]：仿射间隙比对引擎
//! - [`io`]：FASTA / FASTQ 解析、参数文件、结果输出
//! - [`util`]：字母表
//! - [`error`]：核心错误类型

pub mod align;
pub mod error;
pub mod index;
pub mod io;
pub mod mapping;
pub mod util;
