//! 同一对序列上的多条互不重叠的局部比对。

use super::sw::{AlignMode, Aligner, Alignment};
use crate::error::{Result, SfxError};

#[derive(Clone, Copy, Debug)]
pub struct MultiHitOpt {
    /// 最多报告的比对条数
    pub max_hits: usize,
    /// 累计覆盖率（较短序列的百分比）达到该值后停止
    pub coverage_ceiling: f64,
}

impl Default for MultiHitOpt {
    fn default() -> Self {
        Self { max_hits: 10, coverage_ceiling: 90.0 }
    }
}

impl Aligner {
    /// 先求整个矩形内的最优局部比对，再分别在其左上方与右下方的子矩形中递归，
    /// 结果按得分降序排列。
    pub fn align_disjoint(&mut self, a: &[u8], b: &[u8], opt: MultiHitOpt) -> Result<Vec<Alignment>> {
        if a.is_empty() {
            return Err(SfxError::NullOrEmptySequence("first"));
        }
        if b.is_empty() {
            return Err(SfxError::NullOrEmptySequence("second"));
        }
        let shorter = a.len().min(b.len());
        let mut covered = 0usize;
        let mut hits: Vec<Alignment> = Vec::new();
        // (a_lo, a_hi, b_lo, b_hi)
        let mut pending = vec![(0usize, a.len(), 0usize, b.len())];

        while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
            if hits.len() >= opt.max_hits {
                break;
            }
            if covered as f64 / shorter as f64 * 100.0 >= opt.coverage_ceiling {
                break;
            }
            if a_lo >= a_hi || b_lo >= b_hi {
                continue;
            }
            let mut aln = self.align(&a[a_lo..a_hi], &b[b_lo..b_hi], AlignMode::Local)?;
            if aln.score <= 0 {
                continue;
            }
            aln.offset_by(a_lo, b_lo, a.len(), b.len());
            covered += aln.matches + aln.mismatches;

            // 后压入的先处理：左上方优先
            pending.push((aln.a_end, a_hi, aln.b_end, b_hi));
            pending.push((a_lo, aln.a_start, b_lo, aln.b_start));
            hits.push(aln);
        }

        hits.sort_by(|x, y| y.score.cmp(&x.score));
        Ok(hits)
    }
}
