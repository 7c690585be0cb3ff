use std::fmt;

use crate::align::Alignment;

/// 一条 query 的最佳命中，坐标为参考上的 0 起始半开区间
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub name: String,
    pub genome_start: usize,
    pub genome_end: usize,
    pub score: i32,
    pub matches: usize,
    pub mismatches: usize,
    pub gaps: usize,
    pub gap_opens: usize,
    pub identity: f64,
    pub coverage: f64,
    pub cigar: String,
    /// 该 query 实际比对过的锚点数
    pub anchors: usize,
}

impl HitRecord {
    /// `window_start` 为比对窗口在参考上的起点
    pub fn from_alignment(name: &str, window_start: usize, aln: &Alignment, anchors: usize) -> Self {
        Self {
            name: name.to_string(),
            genome_start: window_start + aln.a_start,
            genome_end: window_start + aln.a_end,
            score: aln.score,
            matches: aln.matches,
            mismatches: aln.mismatches,
            gaps: aln.gaps,
            gap_opens: aln.gap_opens,
            identity: aln.identity(),
            coverage: aln.query_coverage(),
            cigar: aln.cigar(),
            anchors,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Hit(HitRecord),
    Miss { name: String, anchors: usize },
}

impl MapOutcome {
    pub fn name(&self) -> &str {
        match self {
            MapOutcome::Hit(h) => &h.name,
            MapOutcome::Miss { name, .. } => name,
        }
    }

    pub fn anchors(&self) -> usize {
        match self {
            MapOutcome::Hit(h) => h.anchors,
            MapOutcome::Miss { anchors, .. } => *anchors,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, MapOutcome::Hit(_))
    }
}

/// 输出一行 TSV（不含换行）。
/// 列：name start end score matches mismatches gaps gap_opens identity coverage cigar anchors
impl fmt::Display for MapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapOutcome::Hit(h) => write!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{}\t{}",
                h.name,
                h.genome_start,
                h.genome_end,
                h.score,
                h.matches,
                h.mismatches,
                h.gaps,
                h.gap_opens,
                h.identity,
                h.coverage,
                h.cigar,
                h.anchors
            ),
            MapOutcome::Miss { name, .. } => write!(f, "{}\tno hit", name),
        }
    }
}

/// 整批 query 的汇总计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapStats {
    pub queries: usize,
    pub hits: usize,
    pub misses: usize,
    pub anchors: usize,
}

impl MapStats {
    pub fn record(&mut self, outcome: &MapOutcome) {
        self.queries += 1;
        if outcome.is_hit() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        self.anchors += outcome.anchors();
    }

    pub fn avg_anchors(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.anchors as f64 / self.queries as f64
        }
    }
}

impl fmt::Display for MapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "queries:\t{}", self.queries)?;
        writeln!(f, "hits:\t{}", self.hits)?;
        writeln!(f, "misses:\t{}", self.misses)?;
        write!(f, "avg_anchors:\t{:.2}", self.avg_anchors())
    }
}
