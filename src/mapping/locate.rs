//! 在后缀树上为 query 定位候选锚点。
//!
//! 两种实现返回相同的结果：逐起点从根匹配的朴素版本（作为正确性参照），
//! 以及沿后缀链接跳转、近线性时间计算匹配统计量的版本。

use crate::error::{Result, SfxError};
use crate::index::tree::{NodeId, SuffixTree, ROOT};
use crate::util::alphabet::SENTINEL;

/// 候选锚点：query[query_start .. query_start + matched] 在参考中出现，
/// `node` 是匹配终点所在的节点（恰好停在节点上则为该节点，否则为所在边的下端节点）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeId,
    pub matched: usize,
    pub query_start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocatorKind {
    #[default]
    Linked,
    BruteForce,
}

impl LocatorKind {
    pub fn locate(self, tree: &SuffixTree, query: &[u8], min_match_len: usize) -> Result<Option<Candidate>> {
        match self {
            LocatorKind::Linked => find_candidate_linked(tree, query, min_match_len),
            LocatorKind::BruteForce => Ok(find_candidate_brute_force(tree, query, min_match_len)),
        }
    }
}

/// 终止符不参与匹配
fn trim_at_sentinel(query: &[u8]) -> &[u8] {
    match query.iter().position(|&b| b == SENTINEL) {
        Some(x) => &query[..x],
        None => query,
    }
}

/// 对 query 的每个起点从根开始匹配，保留匹配长度超过 `min_match_len`
/// 且严格大于此前最优的起点。最坏情况为 query 长度的平方。
pub fn find_candidate_brute_force(tree: &SuffixTree, query: &[u8], min_match_len: usize) -> Option<Candidate> {
    let q = trim_at_sentinel(query);
    let mut best: Option<Candidate> = None;
    let mut best_len = min_match_len;

    for start in 0..q.len() {
        let mut node = ROOT;
        let mut p = start;
        let mut locus = None;
        while p < q.len() {
            let Some(c) = tree.child_by_symbol(node, q[p]) else {
                break;
            };
            let label = tree.edge_label(c);
            let mut k = 0;
            while k < label.len() && p < q.len() && label[k] == q[p] {
                k += 1;
                p += 1;
            }
            locus = Some(c);
            if k < label.len() {
                break;
            }
            node = c;
        }

        let matched = p - start;
        if matched > best_len {
            if let Some(node) = locus {
                best = Some(Candidate { node, matched, query_start: start });
                best_len = matched;
            }
        }
    }
    best
}

fn depth(tree: &SuffixTree, id: NodeId) -> usize {
    tree.node(id).string_depth as usize
}

fn missing_child(node: NodeId, pos: usize) -> SfxError {
    SfxError::InvariantViolation(format!("verified query prefix left the tree at node {} (query pos {})", node, pos))
}

/// 从 `node` 出发按整条边跳跃，走过已知存在的 q[t .. t + target]，
/// 返回串深度不超过 target 的最深节点。只比较每条边的首字符。
fn rescan(tree: &SuffixTree, q: &[u8], t: usize, mut node: NodeId, target: usize) -> Result<NodeId> {
    loop {
        let d = depth(tree, node);
        if d >= target {
            return Ok(node);
        }
        let c = tree.child_by_symbol(node, q[t + d]).ok_or_else(|| missing_child(node, t + d))?;
        if depth(tree, c) > target {
            return Ok(node);
        }
        node = c;
    }
}

/// 线性扫描 query，对每个起点 s 回调 (s, 匹配长度, 匹配终点节点)。
///
/// 维护 (node, matched)：node 是匹配路径上串深度不超过 matched 的最深节点。
/// 换到下一个起点时沿 node 的后缀链接跳转（根则直接去掉首字符），再用 rescan
/// 重走 node 之后已验证过的字符，最后继续逐字符向下匹配。
fn walk_linked<F>(tree: &SuffixTree, q: &[u8], mut visit: F) -> Result<()>
where
    F: FnMut(usize, usize, NodeId),
{
    let n = q.len();
    let mut node = ROOT;
    let mut matched = 0usize;

    for s in 0..n {
        loop {
            if s + matched >= n {
                break;
            }
            let d = depth(tree, node);
            let Some(c) = tree.child_by_symbol(node, q[s + d]) else {
                break;
            };
            let label = tree.edge_label(c);
            let off = matched - d;
            if label[off] != q[s + matched] {
                break;
            }
            matched += 1;
            if off + 1 == label.len() {
                node = c;
            }
        }

        let d = depth(tree, node);
        let locus = if matched == d {
            node
        } else {
            tree.child_by_symbol(node, q[s + d]).ok_or_else(|| missing_child(node, s + d))?
        };
        visit(s, matched, locus);

        if matched == 0 {
            continue;
        }
        let from = if node == ROOT {
            ROOT
        } else {
            tree.node(node).suffix_link.ok_or_else(|| {
                SfxError::InvariantViolation(format!("internal node {} has no suffix link", node))
            })?
        };
        matched -= 1;
        node = rescan(tree, q, s + 1, from, matched)?;
    }
    Ok(())
}

/// 借助后缀链接定位候选锚点，选取规则与 [`find_candidate_brute_force`] 相同
pub fn find_candidate_linked(tree: &SuffixTree, query: &[u8], min_match_len: usize) -> Result<Option<Candidate>> {
    let q = trim_at_sentinel(query);
    let mut best: Option<Candidate> = None;
    let mut best_len = min_match_len;
    walk_linked(tree, q, |s, matched, locus| {
        if matched > best_len {
            best = Some(Candidate { node: locus, matched, query_start: s });
            best_len = matched;
        }
    })?;
    Ok(best)
}

/// 匹配统计量：ms[s] 为 query[s..] 在参考中出现的最长前缀长度
pub fn matching_statistics(tree: &SuffixTree, query: &[u8]) -> Result<Vec<usize>> {
    let q = trim_at_sentinel(query);
    let mut ms = vec![0usize; q.len()];
    walk_linked(tree, q, |s, matched, _| ms[s] = matched)?;
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tree::tests::make_text;

    fn naive_ms(genome: &[u8], q: &[u8]) -> Vec<usize> {
        (0..q.len())
            .map(|s| {
                let mut best = 0;
                for g in 0..genome.len() {
                    let mut k = 0;
                    while s + k < q.len() && g + k < genome.len() && genome[g + k] == q[s + k] {
                        k += 1;
                    }
                    best = best.max(k);
                }
                best
            })
            .collect()
    }

    #[test]
    fn cat_in_agcat() {
        let mut tree = SuffixTree::build(b"AGCAT").unwrap();
        let leaves = tree.prepare(2);
        for cand in [
            find_candidate_brute_force(&tree, b"CAT", 2).unwrap(),
            find_candidate_linked(&tree, b"CAT", 2).unwrap().unwrap(),
        ] {
            assert_eq!(cand.matched, 3);
            assert_eq!(cand.query_start, 0);
            assert!(tree.node(cand.node).string_depth >= 3);
            assert!(tree.subtree_suffixes(cand.node, &leaves).unwrap().contains(&2));
        }
    }

    #[test]
    fn no_candidate_at_or_below_threshold() {
        let tree = SuffixTree::build(b"ACACACAC").unwrap();
        assert_eq!(find_candidate_brute_force(&tree, b"TTTT", 0), None);
        assert_eq!(find_candidate_linked(&tree, b"TTTT", 0).unwrap(), None);
        // 最长匹配 "CA" 长度为 2，不超过阈值 2
        assert_eq!(find_candidate_brute_force(&tree, b"GCAG", 2), None);
        assert_eq!(find_candidate_linked(&tree, b"GCAG", 2).unwrap(), None);
        assert!(find_candidate_linked(&tree, b"GCAG", 1).unwrap().is_some());
        assert_eq!(find_candidate_linked(&tree, b"", 0).unwrap(), None);
    }

    #[test]
    fn match_inside_edge_reports_lower_node() {
        let tree = SuffixTree::build(b"AGCAT").unwrap();
        let cand = find_candidate_linked(&tree, b"GC", 1).unwrap().unwrap();
        // "GC" 落在叶子 1 的入边 "GCAT$" 中间
        assert_eq!(tree.node(cand.node).suffix_index, Some(1));
        assert_eq!(cand.matched, 2);
    }

    #[test]
    fn sentinel_never_matches() {
        let tree = SuffixTree::build(b"ACGT").unwrap();
        let cand = find_candidate_linked(&tree, b"GT$ACGT", 1).unwrap().unwrap();
        assert_eq!((cand.matched, cand.query_start), (2, 0));
        assert_eq!(find_candidate_brute_force(&tree, b"GT$ACGT", 1), Some(cand));
    }

    #[test]
    fn matching_statistics_agree_with_naive() {
        for seed in 1..25u32 {
            let genome = make_text(80 + seed as usize * 3, 2 + seed % 3, seed);
            let tree = SuffixTree::build(&genome).unwrap();
            let mut query = genome[10..40].to_vec();
            query.extend(make_text(15, 4, seed + 1000));
            query.extend_from_slice(&genome[50..70]);
            assert_eq!(matching_statistics(&tree, &query).unwrap(), naive_ms(&genome, &query), "seed={}", seed);
        }
    }

    #[test]
    fn linked_agrees_with_brute_force() {
        for seed in 1..40u32 {
            let genome = make_text(150, 2 + seed % 3, seed * 7);
            let tree = SuffixTree::build(&genome).unwrap();
            for (qs, qlen) in [(0usize, 20usize), (37, 45), (100, 50)] {
                let mut query = genome[qs..(qs + qlen).min(genome.len())].to_vec();
                // 替换几个位置
                for k in (3..query.len()).step_by(9) {
                    query[k] = if query[k] == b'A' { b'C' } else { b'A' };
                }
                for min in [0usize, 3, 8] {
                    let slow = find_candidate_brute_force(&tree, &query, min);
                    let fast = find_candidate_linked(&tree, &query, min).unwrap();
                    assert_eq!(slow, fast, "seed={} qs={} min={}", seed, qs, min);
                }
            }
            let random_query = make_text(60, 4, seed + 5);
            assert_eq!(
                find_candidate_brute_force(&tree, &random_query, 2),
                find_candidate_linked(&tree, &random_query, 2).unwrap()
            );
        }
    }
}
