//! 演示如何在 library 模式下使用 sfxmap 建索引、映射 read 并做两两比对。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_align
//! ```

use sfxmap::align::{AlignMode, Aligner, MultiHitOpt, ScoringParams};
use sfxmap::index::SuffixIndex;
use sfxmap::mapping::{find_candidate_linked, MapOpt, MapOutcome, ReadMapper};
use sfxmap::util::alphabet::Alphabet;

fn main() -> anyhow::Result<()> {
    // 1. 参考序列
    let reference = b"ACGTACGTAGCTGATCGTAGCTAGCTAGCTGATCGTAGCTAGCTAGCTGATTTGACCAGGTACCA";
    println!("参考序列: {}", String::from_utf8_lossy(reference));
    println!("参考长度: {} bp", reference.len());

    // 2. 构建后缀树索引
    let idx = SuffixIndex::build("ref1", reference, &Alphabet::dna(), 8)?;
    let tree = &idx.tree;
    println!(
        "后缀树构建完成：{} 个节点（{} 个内部节点，{} 个叶子）",
        tree.num_nodes(),
        tree.num_internal(),
        tree.num_leaves()
    );
    println!("最长重复子串: {}", String::from_utf8_lossy(tree.longest_repeat()));

    // 3. 候选锚点
    let read = b"TAGCTGATCGTAGCTAGC";
    if let Some(cand) = find_candidate_linked(tree, read, idx.min_match_len)? {
        let mut offs = idx.offsets(cand.node).to_vec();
        offs.sort_unstable();
        println!(
            "\n候选锚点: read[{}..{}] 出现在参考位置 {:?}",
            cand.query_start,
            cand.query_start + cand.matched,
            offs
        );
    }

    // 4. 映射
    let mapper = ReadMapper::new(&idx, ScoringParams::default(), MapOpt::default())?;
    let mut aligner = mapper.new_aligner();
    match mapper.map_read("read1", read, &mut aligner)? {
        MapOutcome::Hit(hit) => println!(
            "映射结果: {}..{} score={} identity={:.1}% CIGAR={}",
            hit.genome_start, hit.genome_end, hit.score, hit.identity, hit.cigar
        ),
        MapOutcome::Miss { .. } => println!("映射结果: 未命中"),
    }

    // 5. 两两比对
    let mut aligner = Aligner::new(ScoringParams::default());
    let aln = aligner.align(b"ACGTTGCAAGT", b"ACGTGCAAGT", AlignMode::Global)?;
    println!("\n全局比对 score={} CIGAR={}", aln.score, aln.cigar());
    println!("  {}", String::from_utf8_lossy(&aln.aligned_a));
    println!("  {}", String::from_utf8_lossy(&aln.connector));
    println!("  {}", String::from_utf8_lossy(&aln.aligned_b));

    let hits = aligner.align_disjoint(b"AAAAAAAATTTTGGGGGGGG", b"AAAAAAAACCCCGGGGGGGG", MultiHitOpt::default())?;
    println!("\n不重叠局部比对 {} 条", hits.len());
    for h in &hits {
        println!("  A[{}..{}] ~ B[{}..{}] score={}", h.a_start, h.a_end, h.b_start, h.b_end, h.score);
    }
    Ok(())
}
