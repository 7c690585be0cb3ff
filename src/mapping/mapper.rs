use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::hit::{HitRecord, MapOutcome, MapStats};
use super::locate::LocatorKind;
use crate::align::{AlignMode, Aligner, Alignment, ScoringParams};
use crate::error::{Result, SfxError};
use crate::index::SuffixIndex;
use crate::io::SeqRecord;
use crate::util::alphabet::Alphabet;

/// 映射参数；最小匹配长度取自索引的准备阈值
#[derive(Clone, Copy, Debug)]
pub struct MapOpt {
    /// 最低一致度（百分比）
    pub min_identity: f64,
    /// 最低 query 覆盖率（百分比）
    pub min_coverage: f64,
    pub locator: LocatorKind,
    /// 单条 query 的比对时限
    pub timeout: Option<Duration>,
    /// 每条 query 最多比对的锚点数
    pub max_anchors: Option<usize>,
}

impl Default for MapOpt {
    fn default() -> Self {
        Self {
            min_identity: 90.0,
            min_coverage: 80.0,
            locator: LocatorKind::Linked,
            timeout: None,
            max_anchors: None,
        }
    }
}

/// 候选比对及其在参考上的起点
struct Scored {
    pos: usize,
    window_start: usize,
    aln: Alignment,
}

impl Scored {
    /// 覆盖率高者优先，其次得分高者，最后参考位置靠前者
    fn beats(&self, other: &Scored) -> bool {
        let (c1, c2) = (self.aln.query_coverage(), other.aln.query_coverage());
        if c1 != c2 {
            return c1 > c2;
        }
        if self.aln.score != other.aln.score {
            return self.aln.score > other.aln.score;
        }
        self.pos < other.pos
    }
}

pub struct ReadMapper<'a> {
    index: &'a SuffixIndex,
    alphabet: Alphabet,
    params: ScoringParams,
    opt: MapOpt,
}

impl<'a> ReadMapper<'a> {
    pub fn new(index: &'a SuffixIndex, params: ScoringParams, opt: MapOpt) -> anyhow::Result<Self> {
        let alphabet = index.alphabet()?;
        Ok(Self { index, alphabet, params, opt })
    }

    pub fn new_aligner(&self) -> Aligner {
        Aligner::new(self.params)
    }

    /// 按最长 query 预留 DP 表。比对窗口最宽 2|q|，表为 (2|q|+1) x (|q|+1)。
    /// 预留失败时退回按需增长的比对器。
    pub fn new_aligner_for(&self, max_query: usize) -> Aligner {
        match Aligner::with_capacity(self.params, 2 * max_query, max_query) {
            Ok(aligner) => aligner,
            Err(e) => {
                log::warn!("cannot presize alignment table for queries of length {}: {}", max_query, e);
                self.new_aligner()
            }
        }
    }

    /// 映射一条 query。空序列、非法字符与超时记为未命中，其余错误向上传递。
    pub fn map_read(&self, name: &str, seq: &[u8], aligner: &mut Aligner) -> Result<MapOutcome> {
        let mut anchors = 0usize;
        let res = self.try_map(name, seq, aligner, &mut anchors);
        aligner.set_deadline(None);
        match res {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_recoverable() => {
                match e {
                    SfxError::TimedOut { .. } => log::warn!("query '{}': {}", name, e),
                    _ => log::debug!("query '{}' rejected: {}", name, e),
                }
                Ok(MapOutcome::Miss { name: name.to_string(), anchors })
            }
            Err(e) => Err(e),
        }
    }

    fn try_map(&self, name: &str, seq: &[u8], aligner: &mut Aligner, anchors: &mut usize) -> Result<MapOutcome> {
        if seq.is_empty() {
            return Err(SfxError::NullOrEmptySequence("query"));
        }
        self.alphabet.validate(seq)?;

        let tree = &self.index.tree;
        let Some(cand) = self.opt.locator.locate(tree, seq, self.index.min_match_len)? else {
            return Ok(MapOutcome::Miss { name: name.to_string(), anchors: 0 });
        };

        aligner.set_deadline(self.opt.timeout.map(|t| Instant::now() + t));
        let genome = self.index.genome();
        let limit = self.opt.max_anchors.unwrap_or(usize::MAX);
        let mut best: Option<Scored> = None;

        for &offset in self.index.offsets(cand.node).iter().take(limit) {
            *anchors += 1;
            let offset = offset as usize;
            let lo = offset.saturating_sub(seq.len());
            let hi = (offset + seq.len()).min(genome.len());
            let aln = aligner.align(&genome[lo..hi], seq, AlignMode::Local)?;
            if aln.identity() < self.opt.min_identity || aln.query_coverage() < self.opt.min_coverage {
                continue;
            }
            let scored = Scored { pos: lo + aln.a_start, window_start: lo, aln };
            if best.as_ref().map_or(true, |b| scored.beats(b)) {
                best = Some(scored);
            }
        }

        Ok(match best {
            Some(b) => MapOutcome::Hit(HitRecord::from_alignment(name, b.window_start, &b.aln, *anchors)),
            None => MapOutcome::Miss { name: name.to_string(), anchors: *anchors },
        })
    }

    /// 在当前 rayon 线程池上并行映射一批 query，每个工作线程复用一个比对器
    pub fn map_batch(&self, records: &[SeqRecord]) -> Result<(Vec<MapOutcome>, MapStats)> {
        let longest = records.iter().map(|r| r.seq.len()).max().unwrap_or(0);
        let outcomes = records
            .par_iter()
            .map_init(|| self.new_aligner_for(longest), |aligner, rec| self.map_read(&rec.name, &rec.seq, aligner))
            .collect::<Result<Vec<_>>>()?;
        let stats = outcomes.iter().fold(MapStats::default(), |mut s, o| {
            s.record(o);
            s
        });
        Ok((outcomes, stats))
    }
}
