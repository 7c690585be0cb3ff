//! 文本输出：映射结果 TSV、两两比对报告、DP 表转储。

use anyhow::Result;
use std::io::Write;

use crate::align::{Alignment, DpTable, ScoringParams};
use crate::mapping::MapOutcome;

/// 比对报告每行显示的列数
pub const REPORT_WIDTH: usize = 60;

pub fn write_hits<W: Write>(w: &mut W, outcomes: &[MapOutcome]) -> Result<()> {
    for o in outcomes {
        writeln!(w, "{}", o)?;
    }
    Ok(())
}

/// 写出一条比对的汇总和分块对齐图，坐标为 1 起始的闭区间
pub fn write_alignment<W: Write>(
    w: &mut W,
    name_a: &str,
    name_b: &str,
    aln: &Alignment,
    params: &ScoringParams,
) -> Result<()> {
    writeln!(
        w,
        "# mode: {}  match: {}  mismatch: {}  h: {}  g: {}",
        aln.mode, params.match_score, params.mismatch_penalty, params.gap_open_penalty, params.gap_extend_penalty
    )?;
    writeln!(w, "# {}: {}..{} of {}", name_a, aln.a_start + 1, aln.a_end, aln.a_len)?;
    writeln!(w, "# {}: {}..{} of {}", name_b, aln.b_start + 1, aln.b_end, aln.b_len)?;
    writeln!(w, "score:\t{}", aln.score)?;
    writeln!(
        w,
        "matches:\t{}\tmismatches:\t{}\tgaps:\t{}\tgap_opens:\t{}",
        aln.matches, aln.mismatches, aln.gaps, aln.gap_opens
    )?;
    writeln!(w, "identity:\t{:.2}%", aln.identity())?;
    writeln!(w, "coverage:\t{:.2}%", aln.coverage())?;
    writeln!(w, "cigar:\t{}", aln.cigar())?;

    let label_w = name_a.len().max(name_b.len()).max(1);
    let mut pos_a = aln.a_start;
    let mut pos_b = aln.b_start;
    for start in (0..aln.len()).step_by(REPORT_WIDTH) {
        let end = (start + REPORT_WIDTH).min(aln.len());
        let chunk_a = &aln.aligned_a[start..end];
        let chunk_b = &aln.aligned_b[start..end];
        let used_a = chunk_a.iter().filter(|&&c| c != b'-').count();
        let used_b = chunk_b.iter().filter(|&&c| c != b'-').count();

        writeln!(w)?;
        writeln!(w, "{:>lw$} {:>8} {} {}", name_a, pos_a + 1, String::from_utf8_lossy(chunk_a), pos_a + used_a, lw = label_w)?;
        writeln!(w, "{:>lw$} {:>8} {}", "", "", String::from_utf8_lossy(&aln.connector[start..end]), lw = label_w)?;
        writeln!(w, "{:>lw$} {:>8} {} {}", name_b, pos_b + 1, String::from_utf8_lossy(chunk_b), pos_b + used_b, lw = label_w)?;
        pos_a += used_a;
        pos_b += used_b;
    }
    Ok(())
}

/// 转储 DP 表：每格取三个状态中的最大值，列对应 A，行对应 B
pub fn write_table<W: Write>(w: &mut W, a: &[u8], b: &[u8], table: &DpTable) -> Result<()> {
    write!(w, "  ")?;
    for j in 0..table.cols() {
        let c = if j == 0 { '-' } else { a[j - 1] as char };
        write!(w, ". {:>4} ", c)?;
    }
    writeln!(w)?;
    for i in 0..table.rows() {
        let c = if i == 0 { '-' } else { b[i - 1] as char };
        write!(w, "{} ", c)?;
        for j in 0..table.cols() {
            write!(w, "| {:>4} ", table.cell(i, j).best().0)?;
        }
        writeln!(w, "|")?;
    }
    Ok(())
}
