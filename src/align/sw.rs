use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Instant;

use crate::error::{Result, SfxError};

const NEG_INF: i32 = i32::MIN / 4;

/// 打分参数。所有值直接加到得分上，罚分应为非正数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoringParams {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_open_penalty: i32,
    pub gap_extend_penalty: i32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            match_score: 2,
            mismatch_penalty: -1,
            gap_open_penalty: -2,
            gap_extend_penalty: -1,
        }
    }
}

impl ScoringParams {
    #[inline]
    pub fn substitution(&self, a: u8, b: u8) -> i32 {
        if a == b {
            self.match_score
        } else {
            self.mismatch_penalty
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignMode {
    Local,
    Global,
}

impl FromStr for AlignMode {
    type Err = SfxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "l" | "local" => Ok(AlignMode::Local),
            "g" | "global" => Ok(AlignMode::Global),
            _ => Err(SfxError::InvalidAlignmentMode(s.to_string())),
        }
    }
}

impl fmt::Display for AlignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignMode::Local => f.write_str("local"),
            AlignMode::Global => f.write_str("global"),
        }
    }
}

/// 仿射间隙三状态自动机的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// 匹配/错配，消耗两条序列各一个字符
    Sub,
    /// 消耗 A 的字符，B 中为空位
    Ins,
    /// 消耗 B 的字符，A 中为空位
    Del,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub sub: i32,
    pub ins: i32,
    pub del: i32,
}

impl Cell {
    /// 三个状态中的最大值。平分时 del > ins > sub。
    #[inline]
    pub fn best(&self) -> (i32, State) {
        let m = self.sub.max(self.ins).max(self.del);
        if m == self.del {
            (m, State::Del)
        } else if m == self.ins {
            (m, State::Ins)
        } else {
            (m, State::Sub)
        }
    }
}

#[inline]
fn max3(x: i32, y: i32, z: i32) -> i32 {
    x.max(y).max(z)
}

/// DP 工作表，可跨调用复用。行对应序列 B，列对应序列 A。
#[derive(Debug, Default)]
pub struct DpTable {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl DpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预留可容纳 |A| = max_a、|B| = max_b 的表
    pub fn with_capacity(max_a: usize, max_b: usize) -> Result<Self> {
        let mut t = Self::new();
        let size = (max_a + 1) * (max_b + 1);
        t.cells.try_reserve_exact(size).map_err(SfxError::alloc("alignment table", size))?;
        Ok(t)
    }

    fn reset(&mut self, rows: usize, cols: usize) -> Result<()> {
        let size = rows
            .checked_mul(cols)
            .ok_or(SfxError::AllocationFailure { what: "alignment table", requested: usize::MAX })?;
        if size > self.cells.capacity() {
            self.cells
                .try_reserve_exact(size - self.cells.len())
                .map_err(SfxError::alloc("alignment table", size))?;
        }
        self.cells.clear();
        self.cells.resize(size, Cell::default());
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn capacity(&self) -> usize {
        self.cells.capacity()
    }

    #[inline]
    pub fn cell(&self, i: usize, j: usize) -> Cell {
        self.cells[i * self.cols + j]
    }
}

/// 一次比对的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub mode: AlignMode,
    pub score: i32,
    /// 带空位 '-' 的 A、B 比对串及连接线（'|' 表示匹配）
    pub aligned_a: Vec<u8>,
    pub aligned_b: Vec<u8>,
    pub connector: Vec<u8>,
    pub matches: usize,
    pub mismatches: usize,
    pub gaps: usize,
    pub gap_opens: usize,
    /// A 上的区间 [a_start, a_end)
    pub a_start: usize,
    pub a_end: usize,
    /// B 上的区间 [b_start, b_end)
    pub b_start: usize,
    pub b_end: usize,
    pub a_len: usize,
    pub b_len: usize,
}

fn percent(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64 * 100.0
    }
}

impl Alignment {
    /// 比对列数
    pub fn len(&self) -> usize {
        self.aligned_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aligned_a.is_empty()
    }

    pub fn identity(&self) -> f64 {
        percent(self.matches, self.len())
    }

    /// 覆盖较短序列的百分比
    pub fn coverage(&self) -> f64 {
        percent(self.matches + self.mismatches, self.a_len.min(self.b_len))
    }

    /// 覆盖 B（query）的百分比，A 为任意长度的参考片段时使用
    pub fn query_coverage(&self) -> f64 {
        percent(self.matches + self.mismatches, self.b_len)
    }

    /// 由计数重新计算得分，应与 DP 得分一致
    pub fn recomputed_score(&self, p: &ScoringParams) -> i32 {
        self.matches as i32 * p.match_score
            + self.mismatches as i32 * p.mismatch_penalty
            + self.gap_opens as i32 * p.gap_open_penalty
            + self.gaps as i32 * p.gap_extend_penalty
    }

    /// 以 A 为参考的 CIGAR
    pub fn cigar(&self) -> String {
        let ops: Vec<char> = self
            .aligned_a
            .iter()
            .zip(&self.aligned_b)
            .map(|(&x, &y)| match (x, y) {
                (b'-', _) => 'I',
                (_, b'-') => 'D',
                _ => 'M',
            })
            .collect();
        ops_to_cigar(&ops)
    }

    /// 子矩形上的比对换算回整条序列的坐标
    pub(crate) fn offset_by(&mut self, a_off: usize, b_off: usize, a_len: usize, b_len: usize) {
        self.a_start += a_off;
        self.a_end += a_off;
        self.b_start += b_off;
        self.b_end += b_off;
        self.a_len = a_len;
        self.b_len = b_len;
    }
}

pub fn ops_to_cigar(ops: &[char]) -> String {
    let mut cigar = String::new();
    if ops.is_empty() {
        return cigar;
    }
    let mut cur = ops[0];
    let mut len = 1usize;
    for &op in &ops[1..] {
        if op == cur {
            len += 1;
        } else {
            let _ = write!(&mut cigar, "{}{}", len, cur);
            cur = op;
            len = 1;
        }
    }
    let _ = write!(&mut cigar, "{}{}", len, cur);
    cigar
}

/// 仿射间隙比对器，持有可复用的 DP 表
#[derive(Debug)]
pub struct Aligner {
    params: ScoringParams,
    table: DpTable,
    deadline: Option<Instant>,
    started: Option<Instant>,
}

/// 一次性比对，内部分配新的 DP 表
pub fn align(a: &[u8], b: &[u8], mode: AlignMode, params: ScoringParams) -> Result<Alignment> {
    Aligner::new(params).align(a, b, mode)
}

impl Aligner {
    pub fn new(params: ScoringParams) -> Self {
        Self { params, table: DpTable::new(), deadline: None, started: None }
    }

    pub fn with_capacity(params: ScoringParams, max_a: usize, max_b: usize) -> Result<Self> {
        Ok(Self { params, table: DpTable::with_capacity(max_a, max_b)?, deadline: None, started: None })
    }

    pub fn table(&self) -> &DpTable {
        &self.table
    }

    /// 设置截止时间；填表时每行检查一次
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
        self.started = deadline.map(|_| Instant::now());
    }

    pub fn align(&mut self, a: &[u8], b: &[u8], mode: AlignMode) -> Result<Alignment> {
        if a.is_empty() {
            return Err(SfxError::NullOrEmptySequence("first"));
        }
        if b.is_empty() {
            return Err(SfxError::NullOrEmptySequence("second"));
        }
        let rows = b.len() + 1;
        let cols = a.len() + 1;
        self.table.reset(rows, cols)?;
        self.init(mode);
        let (bi, bj) = self.fill(a, b, mode)?;
        let (bi, bj) = match mode {
            AlignMode::Local => (bi, bj),
            AlignMode::Global => (rows - 1, cols - 1),
        };
        self.traceback(a, b, mode, bi, bj)
    }

    fn check_deadline(&self) -> Result<()> {
        if let Some(d) = self.deadline {
            let now = Instant::now();
            if now >= d {
                let elapsed_ms = self.started.map(|s| now.duration_since(s).as_millis()).unwrap_or(0);
                return Err(SfxError::TimedOut { elapsed_ms });
            }
        }
        Ok(())
    }

    fn init(&mut self, mode: AlignMode) {
        let (rows, cols) = (self.table.rows, self.table.cols);
        let cells = &mut self.table.cells;
        cells[0] = Cell::default();
        match mode {
            // 局部比对边界全为 0
            AlignMode::Local => {
                for j in 1..cols {
                    cells[j] = Cell::default();
                }
                for i in 1..rows {
                    cells[i * cols] = Cell::default();
                }
            }
            AlignMode::Global => {
                let open = self.params.gap_open_penalty;
                let ext = self.params.gap_extend_penalty;
                for j in 1..cols {
                    cells[j] = Cell { sub: NEG_INF, ins: open + j as i32 * ext, del: NEG_INF };
                }
                for i in 1..rows {
                    cells[i * cols] = Cell { sub: NEG_INF, ins: NEG_INF, del: open + i as i32 * ext };
                }
            }
        }
    }

    /// 填表，返回局部比对的最优单元（行优先第一次出现的严格最大值）
    fn fill(&mut self, a: &[u8], b: &[u8], mode: AlignMode) -> Result<(usize, usize)> {
        let p = self.params;
        let ext = p.gap_extend_penalty;
        let open_ext = p.gap_open_penalty + p.gap_extend_penalty;
        let local = mode == AlignMode::Local;
        let (rows, cols) = (self.table.rows, self.table.cols);

        let mut best = 0i32;
        let mut best_i = 0usize;
        let mut best_j = 0usize;

        for i in 1..rows {
            self.check_deadline()?;
            let cells = &mut self.table.cells;
            for j in 1..cols {
                let diag = cells[(i - 1) * cols + (j - 1)];
                let left = cells[i * cols + (j - 1)];
                let up = cells[(i - 1) * cols + j];

                let mut sub = diag.best().0 + p.substitution(a[j - 1], b[i - 1]);
                let mut ins = max3(left.ins + ext, left.sub + open_ext, left.del + open_ext);
                let mut del = max3(up.del + ext, up.sub + open_ext, up.ins + open_ext);
                if local {
                    sub = sub.max(0);
                    ins = ins.max(0);
                    del = del.max(0);
                }
                let cell = Cell { sub, ins, del };
                cells[i * cols + j] = cell;

                if local {
                    let score = cell.best().0;
                    if score > best {
                        best = score;
                        best_i = i;
                        best_j = j;
                    }
                }
            }
        }
        Ok((best_i, best_j))
    }

    fn traceback(&self, a: &[u8], b: &[u8], mode: AlignMode, end_i: usize, end_j: usize) -> Result<Alignment> {
        let p = self.params;
        let ext = p.gap_extend_penalty;
        let open_ext = p.gap_open_penalty + p.gap_extend_penalty;
        let local = mode == AlignMode::Local;
        let t = &self.table;

        let (score, mut state) = t.cell(end_i, end_j).best();
        let mut value = score;
        let (mut i, mut j) = (end_i, end_j);

        let cap = end_i + end_j;
        let mut ra: Vec<u8> = Vec::with_capacity(cap);
        let mut rb: Vec<u8> = Vec::with_capacity(cap);
        let mut conn: Vec<u8> = Vec::with_capacity(cap);
        let (mut matches, mut mismatches, mut gaps, mut gap_opens) = (0usize, 0usize, 0usize, 0usize);

        let broken = |what: &str, i: usize, j: usize| {
            SfxError::InvariantViolation(format!("traceback reached an impossible cell ({}, {}): {}", i, j, what))
        };

        loop {
            if local {
                if value <= 0 {
                    break;
                }
            } else if i == 0 && j == 0 {
                break;
            }

            match state {
                State::Sub => {
                    if i == 0 || j == 0 {
                        return Err(broken("substitution on the border", i, j));
                    }
                    let (x, y) = (a[j - 1], b[i - 1]);
                    ra.push(x);
                    rb.push(y);
                    if x == y {
                        matches += 1;
                        conn.push(b'|');
                    } else {
                        mismatches += 1;
                        conn.push(b' ');
                    }
                    let (pv, ps) = t.cell(i - 1, j - 1).best();
                    if pv + p.substitution(x, y) != value {
                        return Err(broken("no maximal state found", i, j));
                    }
                    i -= 1;
                    j -= 1;
                    value = pv;
                    state = ps;
                }
                State::Del => {
                    if i == 0 {
                        return Err(broken("deletion on the top row", i, j));
                    }
                    ra.push(b'-');
                    rb.push(b[i - 1]);
                    conn.push(b' ');
                    gaps += 1;
                    let up = t.cell(i - 1, j);
                    let (pv, ps) = if up.del + ext == value {
                        (up.del, State::Del)
                    } else if up.ins + open_ext == value {
                        (up.ins, State::Ins)
                    } else if up.sub + open_ext == value {
                        (up.sub, State::Sub)
                    } else {
                        return Err(broken("no predecessor for deletion", i, j));
                    };
                    if ps != State::Del {
                        gap_opens += 1;
                    }
                    i -= 1;
                    value = pv;
                    state = ps;
                }
                State::Ins => {
                    if j == 0 {
                        return Err(broken("insertion on the left column", i, j));
                    }
                    ra.push(a[j - 1]);
                    rb.push(b'-');
                    conn.push(b' ');
                    gaps += 1;
                    let left = t.cell(i, j - 1);
                    let (pv, ps) = if left.del + open_ext == value {
                        (left.del, State::Del)
                    } else if left.ins + ext == value {
                        (left.ins, State::Ins)
                    } else if left.sub + open_ext == value {
                        (left.sub, State::Sub)
                    } else {
                        return Err(broken("no predecessor for insertion", i, j));
                    };
                    if ps != State::Ins {
                        gap_opens += 1;
                    }
                    j -= 1;
                    value = pv;
                    state = ps;
                }
            }
        }

        ra.reverse();
        rb.reverse();
        conn.reverse();

        Ok(Alignment {
            mode,
            score,
            aligned_a: ra,
            aligned_b: rb,
            connector: conn,
            matches,
            mismatches,
            gaps,
            gap_opens,
            a_start: j,
            a_end: end_j,
            b_start: i,
            b_end: end_i,
            a_len: a.len(),
            b_len: b.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tree::tests::make_text;

    fn scenario_params() -> ScoringParams {
        ScoringParams {
            match_score: 2,
            mismatch_penalty: -1,
            gap_open_penalty: -1,
            gap_extend_penalty: -2,
        }
    }

    fn strip_gaps(s: &[u8]) -> Vec<u8> {
        s.iter().copied().filter(|&c| c != b'-').collect()
    }

    #[test]
    fn tie_break_prefers_deletion_then_insertion() {
        assert_eq!(Cell { sub: 1, ins: 1, del: 1 }.best(), (1, State::Del));
        assert_eq!(Cell { sub: 1, ins: 1, del: 0 }.best(), (1, State::Ins));
        assert_eq!(Cell { sub: 3, ins: 1, del: 3 }.best(), (3, State::Del));
        assert_eq!(Cell { sub: 2, ins: 1, del: 0 }.best(), (2, State::Sub));
    }

    #[test]
    fn traceback_prefers_deletion_on_tied_predecessors() {
        // 回溯时前驱平分，同样按 del > ins > sub 选取
        let p = ScoringParams::default();
        let mut aligner = Aligner::new(p);

        let res = aligner.align(b"ACA", b"CAAC", AlignMode::Global).unwrap();
        assert_eq!(res.score, -3);
        assert_eq!(res.aligned_a, b"ACA--");
        assert_eq!(res.aligned_b, b"-CAAC");
        assert_eq!((res.gaps, res.gap_opens), (3, 2));
        assert_eq!(res.recomputed_score(&p), res.score);

        // 平分出现在删除状态的前驱选择上
        let res = aligner.align(b"A", b"CAAC", AlignMode::Global).unwrap();
        assert_eq!(res.score, -5);
        assert_eq!(res.aligned_a, b"-A--");
        assert_eq!(res.aligned_b, b"CAAC");
        assert_eq!(res.gap_opens, 2);

        // 平分出现在插入状态的前驱选择上
        let res = aligner.align(b"CAAC", b"A", AlignMode::Global).unwrap();
        assert_eq!(res.score, -5);
        assert_eq!(res.aligned_a, b"CAAC");
        assert_eq!(res.aligned_b, b"-A--");
        assert_eq!(res.gap_opens, 2);
    }

    #[test]
    fn local_aaag_vs_aaaag_pinned() {
        let mut aligner = Aligner::new(scenario_params());
        let res = aligner.align(b"AAAG", b"AAAAG", AlignMode::Local).unwrap();
        assert_eq!(res.score, 8);
        assert_eq!(res.aligned_a, b"AAAG");
        assert_eq!(res.aligned_b, b"AAAG");
        assert_eq!(res.connector, b"||||");
        assert_eq!((res.a_start, res.a_end), (0, 4));
        assert_eq!((res.b_start, res.b_end), (1, 5));
        assert_eq!((res.matches, res.mismatches, res.gaps, res.gap_opens), (4, 0, 0, 0));

        // 手算的若干单元，含平分的情况
        let t = aligner.table();
        assert_eq!(t.cell(2, 4), Cell { sub: 1, ins: 1, del: 0 });
        assert_eq!(t.cell(2, 4).best(), (1, State::Ins));
        assert_eq!(t.cell(5, 2), Cell { sub: 1, ins: 0, del: 1 });
        assert_eq!(t.cell(5, 2).best(), (1, State::Del));
        assert_eq!(t.cell(4, 3), Cell { sub: 6, ins: 1, del: 3 });
        assert_eq!(t.cell(5, 4), Cell { sub: 8, ins: 0, del: 2 });
    }

    #[test]
    fn global_single_gap() {
        let res = align(b"ACGT", b"AGT", AlignMode::Global, scenario_params()).unwrap();
        assert_eq!(res.score, 3);
        assert_eq!(res.aligned_a, b"ACGT");
        assert_eq!(res.aligned_b, b"A-GT");
        assert_eq!(res.cigar(), "1M1D2M");
        assert_eq!((res.gaps, res.gap_opens), (1, 1));
    }

    #[test]
    fn global_leading_gap_run_counts_one_opening() {
        let res = align(b"GGACGT", b"ACGT", AlignMode::Global, scenario_params()).unwrap();
        assert_eq!(res.score, 3);
        assert_eq!(res.aligned_b, b"--ACGT");
        assert_eq!((res.gaps, res.gap_opens), (2, 1));
        assert_eq!((res.a_start, res.b_start), (0, 0));
    }

    #[test]
    fn global_score_can_be_negative() {
        let res = align(b"AAAA", b"TT", AlignMode::Global, scenario_params()).unwrap();
        assert!(res.score < 0);
        assert_eq!(res.recomputed_score(&scenario_params()), res.score);
        assert_eq!(strip_gaps(&res.aligned_a), b"AAAA");
        assert_eq!(strip_gaps(&res.aligned_b), b"TT");
    }

    #[test]
    fn local_no_similarity_is_empty() {
        let res = align(b"AAAA", b"TTTT", AlignMode::Local, scenario_params()).unwrap();
        assert_eq!(res.score, 0);
        assert!(res.is_empty());
        assert_eq!(res.identity(), 0.0);
        assert_eq!(res.coverage(), 0.0);
    }

    #[test]
    fn empty_inputs_rejected() {
        let mut aligner = Aligner::new(scenario_params());
        assert_eq!(
            aligner.align(b"ACGT", b"", AlignMode::Local).unwrap_err(),
            SfxError::NullOrEmptySequence("second")
        );
        assert_eq!(
            aligner.align(b"", b"ACGT", AlignMode::Global).unwrap_err(),
            SfxError::NullOrEmptySequence("first")
        );
        // 没有分配任何表
        assert_eq!(aligner.table().capacity(), 0);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("local".parse::<AlignMode>().unwrap(), AlignMode::Local);
        assert_eq!("G".parse::<AlignMode>().unwrap(), AlignMode::Global);
        assert_eq!(
            "semi".parse::<AlignMode>().unwrap_err(),
            SfxError::InvalidAlignmentMode("semi".into())
        );
    }

    #[test]
    fn traceback_properties_on_random_pairs() {
        let params = [
            scenario_params(),
            ScoringParams::default(),
            ScoringParams { match_score: 1, mismatch_penalty: -2, gap_open_penalty: -5, gap_extend_penalty: -2 },
        ];
        let mut aligner = Aligner::new(params[0]);
        for seed in 0..30u32 {
            let a = make_text(5 + (seed as usize * 7) % 40, 4, seed * 2 + 1);
            let mut b = a.clone();
            // 制造若干替换与插入删除
            let mut mutated = make_text(b.len() / 3 + 1, 4, seed * 2 + 2);
            b.truncate(b.len() / 2);
            b.append(&mut mutated);
            b.extend_from_slice(&a[a.len() / 2..]);

            for &p in &params {
                aligner = Aligner { params: p, ..aligner };
                for mode in [AlignMode::Local, AlignMode::Global] {
                    let res = aligner.align(&a, &b, mode).unwrap();
                    if mode == AlignMode::Local {
                        assert!(res.score >= 0);
                    } else {
                        assert_eq!(strip_gaps(&res.aligned_a), a);
                        assert_eq!(strip_gaps(&res.aligned_b), b);
                    }
                    assert_eq!(res.len(), res.matches + res.mismatches + res.gaps);
                    assert_eq!(strip_gaps(&res.aligned_a), &a[res.a_start..res.a_end]);
                    assert_eq!(strip_gaps(&res.aligned_b), &b[res.b_start..res.b_end]);
                    assert_eq!(res.recomputed_score(&p), res.score, "seed={} mode={}", seed, mode);
                    for v in [res.identity(), res.coverage(), res.query_coverage()] {
                        assert!((0.0..=100.0).contains(&v));
                    }
                }
            }
        }
    }

    #[test]
    fn buffer_reuse_across_sizes() {
        let mut aligner = Aligner::with_capacity(scenario_params(), 8, 8).unwrap();
        let r1 = aligner.align(b"ACGTACGT", b"ACGTACGT", AlignMode::Local).unwrap();
        assert_eq!(r1.score, 16);
        let r2 = aligner.align(b"ACGT", b"AGGT", AlignMode::Local).unwrap();
        assert_eq!(r2.matches + r2.mismatches, 4);
        let r3 = aligner.align(b"ACGTACGTACGTACGT", b"ACGT", AlignMode::Local).unwrap();
        assert_eq!(r3.score, 8);
        assert_eq!(r3.coverage(), 100.0);
    }

    #[test]
    fn expired_deadline_times_out() {
        let mut aligner = Aligner::new(scenario_params());
        aligner.set_deadline(Some(Instant::now()));
        let err = aligner.align(b"ACGT", b"ACGT", AlignMode::Local).unwrap_err();
        assert!(matches!(err, SfxError::TimedOut { .. }));
        aligner.set_deadline(None);
        assert!(aligner.align(b"ACGT", b"ACGT", AlignMode::Local).is_ok());
    }

    #[test]
    fn ops_to_cigar_runs() {
        assert_eq!(ops_to_cigar(&['M', 'M', 'I', 'D', 'D', 'M']), "2M1I2D1M");
        assert_eq!(ops_to_cigar(&[]), "");
    }
}
