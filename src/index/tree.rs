//! McCreight 线性时间后缀树构建。
//!
//! 节点存放在一个 arena（`Vec<Node>`）中，父节点、兄弟链表、后缀链接都以
//! [`NodeId`] 下标表示。arena 的下标同时作为节点的唯一 id。

use serde::{Deserialize, Serialize};

use crate::error::{Result, SfxError};
use crate::util::alphabet::SENTINEL;

pub type NodeId = u32;

/// 根节点总是 arena 的第一个元素
pub const ROOT: NodeId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// 叶子对应的后缀起点；内部节点为 None
    pub suffix_index: Option<u32>,
    /// 从根到本节点的路径长度（字符数）
    pub string_depth: u32,
    /// 入边标签在文本中的区间 [start, end)
    pub start: u32,
    pub end: u32,
    pub suffix_link: Option<NodeId>,
    pub parent: Option<NodeId>,
    /// 子节点按入边首字符排序（终止符最小）
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// 叶子数组上的闭区间，由 `prepare` 填写
    pub leaf_interval: Option<(u32, u32)>,
}

impl Node {
    fn new(suffix_index: Option<u32>, start: u32, end: u32, string_depth: u32, parent: Option<NodeId>) -> Self {
        Self {
            suffix_index,
            string_depth,
            start,
            end,
            suffix_link: None,
            parent,
            first_child: None,
            next_sibling: None,
            leaf_interval: None,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.suffix_index.is_some()
    }

    #[inline]
    pub fn edge_len(&self) -> u32 {
        self.end - self.start
    }
}

/// 子节点排序用的字符序：终止符排在所有字母之前
#[inline]
pub(crate) fn symbol_rank(b: u8) -> u16 {
    if b == SENTINEL {
        0
    } else {
        b as u16 + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuffixTree {
    /// 带终止符的文本
    text: Vec<u8>,
    nodes: Vec<Node>,
}

/// McCreight 插入时，按上一片叶子的父节点 u 分四种情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertCase {
    /// u 的后缀链接已知，且 u 不是根
    KnownLink,
    /// u 是根
    KnownLinkRoot,
    /// u 的后缀链接未知，u 的父节点不是根
    UnknownLink,
    /// u 的后缀链接未知，u 的父节点是根
    UnknownLinkRootParent,
}

/// 构建期间的上下文：文本、arena 以及最近插入的叶子
struct Builder {
    text: Vec<u8>,
    nodes: Vec<Node>,
    last_leaf: NodeId,
}

impl Builder {
    fn new(text: Vec<u8>) -> Result<Self> {
        let n = text.len();
        // n 片叶子 + 至多 n-1 个内部节点 + 根
        let cap = 2 * n;
        let mut nodes: Vec<Node> = Vec::new();
        nodes.try_reserve_exact(cap).map_err(SfxError::alloc("suffix tree nodes", cap))?;

        let mut root = Node::new(None, 0, 0, 0, None);
        root.suffix_link = Some(ROOT);
        root.first_child = Some(1);
        nodes.push(root);
        nodes.push(Node::new(Some(0), 0, n as u32, n as u32, Some(ROOT)));

        Ok(Self { text, nodes, last_leaf: 1 })
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    #[inline]
    fn first_symbol(&self, id: NodeId) -> u8 {
        self.text[self.node(id).start as usize]
    }

    fn child_by_symbol(&self, parent: NodeId, c: u8) -> Option<NodeId> {
        child_by_symbol(&self.nodes, &self.text, parent, c)
    }

    /// 按首字符有序插入子节点
    fn insert_child(&mut self, parent: NodeId, child: NodeId) {
        let key = symbol_rank(self.first_symbol(child));
        let mut prev: Option<NodeId> = None;
        let mut cur = self.node(parent).first_child;
        while let Some(c) = cur {
            let rank = symbol_rank(self.first_symbol(c));
            debug_assert_ne!(rank, key, "two children share a leading symbol");
            if rank > key {
                break;
            }
            prev = Some(c);
            cur = self.node(c).next_sibling;
        }
        self.node_mut(child).next_sibling = cur;
        self.node_mut(child).parent = Some(parent);
        match prev {
            Some(p) => self.node_mut(p).next_sibling = Some(child),
            None => self.node_mut(parent).first_child = Some(child),
        }
    }

    fn attach_leaf(&mut self, parent: NodeId, suffix: usize, pos: usize) -> NodeId {
        let n = self.text.len();
        let depth = self.node(parent).string_depth + (n - pos) as u32;
        let leaf = self.push_node(Node::new(Some(suffix as u32), pos as u32, n as u32, depth, Some(parent)));
        self.insert_child(parent, leaf);
        leaf
    }

    /// 在文本位置 `at`（位于 child 入边内部）处断开边，返回新的内部节点
    fn split_edge(&mut self, child: NodeId, at: u32) -> Result<NodeId> {
        let parent = self
            .node(child)
            .parent
            .ok_or_else(|| SfxError::InvariantViolation(format!("split of parentless node {}", child)))?;
        let start = self.node(child).start;
        if at <= start || at >= self.node(child).end {
            return Err(SfxError::InvariantViolation(format!(
                "split point {} outside edge of node {}",
                at, child
            )));
        }
        let depth = self.node(parent).string_depth + (at - start);
        let mid = self.push_node(Node::new(None, start, at, depth, Some(parent)));

        // mid 与 child 首字符相同，直接占据 child 在兄弟链表中的位置
        let next = self.node(child).next_sibling;
        self.node_mut(mid).next_sibling = next;
        if self.node(parent).first_child == Some(child) {
            self.node_mut(parent).first_child = Some(mid);
        } else {
            let mut cur = self.node(parent).first_child;
            while let Some(c) = cur {
                if self.node(c).next_sibling == Some(child) {
                    self.node_mut(c).next_sibling = Some(mid);
                    break;
                }
                cur = self.node(c).next_sibling;
            }
        }

        let c = self.node_mut(child);
        c.next_sibling = None;
        c.start = at;
        c.parent = Some(mid);
        self.node_mut(mid).first_child = Some(child);
        Ok(mid)
    }

    /// 从节点 v、文本位置 pos 开始逐字符向下匹配，在第一个失配处插入叶子
    fn scan(&mut self, suffix: usize, mut v: NodeId, mut pos: usize) -> Result<NodeId> {
        let n = self.text.len();
        loop {
            if pos >= n {
                return Err(SfxError::InvariantViolation(format!(
                    "suffix {} ran past the sentinel while scanning",
                    suffix
                )));
            }
            let c = match self.child_by_symbol(v, self.text[pos]) {
                Some(c) => c,
                None => return Ok(self.attach_leaf(v, suffix, pos)),
            };
            let end = self.node(c).end as usize;
            // 首字符已由 child_by_symbol 匹配
            let mut k = self.node(c).start as usize + 1;
            pos += 1;
            while k < end && pos < n && self.text[k] == self.text[pos] {
                k += 1;
                pos += 1;
            }
            if k == end {
                v = c;
                continue;
            }
            if pos >= n {
                return Err(SfxError::InvariantViolation(format!(
                    "suffix {} is a prefix of another suffix",
                    suffix
                )));
            }
            let mid = self.split_edge(c, k as u32)?;
            return Ok(self.attach_leaf(mid, suffix, pos));
        }
    }

    /// 从 `from` 出发按整条边跳跃消耗 beta，为 u 建立后缀链接并插入叶子。
    /// beta 在 `from` 之下必然存在，只需比较每条边的首字符。
    fn rescan(&mut self, suffix: usize, u: NodeId, from: NodeId, beta_start: usize, beta_len: usize) -> Result<NodeId> {
        let mut v = from;
        let mut r = 0usize;
        while r < beta_len {
            let c = self.child_by_symbol(v, self.text[beta_start + r]).ok_or_else(|| {
                SfxError::InvariantViolation(format!("rescan for suffix {} fell off the tree at node {}", suffix, v))
            })?;
            let e = self.node(c).edge_len() as usize;
            if r + e > beta_len {
                // beta 在边中间结束：断边，新节点即 u 的后缀链接，叶子直接挂在其下
                let at = self.node(c).start as usize + (beta_len - r);
                let mid = self.split_edge(c, at as u32)?;
                self.node_mut(u).suffix_link = Some(mid);
                let pos = suffix + self.node(mid).string_depth as usize;
                return Ok(self.attach_leaf(mid, suffix, pos));
            }
            r += e;
            v = c;
        }
        self.node_mut(u).suffix_link = Some(v);
        let pos = suffix + self.node(v).string_depth as usize;
        self.scan(suffix, v, pos)
    }

    fn classify(&self, u: NodeId) -> InsertCase {
        let node = self.node(u);
        if node.suffix_link.is_some() {
            if u == ROOT {
                InsertCase::KnownLinkRoot
            } else {
                InsertCase::KnownLink
            }
        } else if node.parent == Some(ROOT) {
            InsertCase::UnknownLinkRootParent
        } else {
            InsertCase::UnknownLink
        }
    }

    fn insert_suffix(&mut self, suffix: usize) -> Result<()> {
        let u = self.node(self.last_leaf).parent.ok_or_else(|| {
            SfxError::InvariantViolation(format!("leaf {} has no parent", self.last_leaf))
        })?;

        let leaf = match self.classify(u) {
            InsertCase::KnownLink => {
                let v = self.node(u).suffix_link.unwrap_or(ROOT);
                let pos = suffix + self.node(v).string_depth as usize;
                self.scan(suffix, v, pos)?
            }
            InsertCase::KnownLinkRoot => self.scan(suffix, ROOT, suffix)?,
            InsertCase::UnknownLink => {
                let up = self.node(u).parent.unwrap_or(ROOT);
                let vp = self.node(up).suffix_link.ok_or_else(|| {
                    SfxError::InvariantViolation(format!("grandparent {} of suffix {} has no suffix link", up, suffix))
                })?;
                let (start, len) = (self.node(u).start as usize, self.node(u).edge_len() as usize);
                self.rescan(suffix, u, vp, start, len)?
            }
            InsertCase::UnknownLinkRootParent => {
                // 根的自链接吸收 beta 的第一个字符
                let (start, len) = (self.node(u).start as usize, self.node(u).edge_len() as usize);
                self.rescan(suffix, u, ROOT, start + 1, len - 1)?
            }
        };
        self.last_leaf = leaf;
        Ok(())
    }
}

fn child_by_symbol(nodes: &[Node], text: &[u8], parent: NodeId, c: u8) -> Option<NodeId> {
    let key = symbol_rank(c);
    let mut cur = nodes[parent as usize].first_child;
    while let Some(id) = cur {
        let node = &nodes[id as usize];
        let rank = symbol_rank(text[node.start as usize]);
        if rank == key {
            return Some(id);
        }
        if rank > key {
            return None;
        }
        cur = node.next_sibling;
    }
    None
}

/// 校验终止符位置，必要时在末尾追加终止符
fn terminate(seq: &[u8]) -> Result<Vec<u8>> {
    if let Some(position) = seq.iter().position(|&b| b == SENTINEL) {
        if position + 1 != seq.len() {
            return Err(SfxError::MisplacedSentinel { position });
        }
    }
    let body = seq.strip_suffix(&[SENTINEL]).unwrap_or(seq);
    if body.is_empty() {
        return Err(SfxError::NullOrEmptySequence("genome"));
    }
    let len = body.len() + 1;
    if len > (u32::MAX / 2) as usize {
        return Err(SfxError::AllocationFailure { what: "sequence buffer", requested: len });
    }
    let mut text = Vec::new();
    text.try_reserve_exact(len).map_err(SfxError::alloc("sequence buffer", len))?;
    text.extend_from_slice(body);
    text.push(SENTINEL);
    Ok(text)
}

impl SuffixTree {
    /// 用 McCreight 算法构建后缀树。若序列末尾没有终止符则自动追加。
    pub fn build(seq: &[u8]) -> Result<Self> {
        let text = terminate(seq)?;
        let n = text.len();
        let mut b = Builder::new(text)?;
        for suffix in 1..n {
            b.insert_suffix(suffix)?;
        }
        log::debug!("suffix tree built: text_len={} nodes={}", n, b.nodes.len());
        Ok(Self { text: b.text, nodes: b.nodes })
    }

    /// 带终止符的文本
    #[inline]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// 不含终止符的序列长度
    #[inline]
    pub fn genome_len(&self) -> usize {
        self.text.len() - 1
    }

    pub fn genome(&self) -> &[u8] {
        &self.text[..self.genome_len()]
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        ROOT
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// 内部节点数（含根）
    pub fn num_internal(&self) -> usize {
        self.nodes.len() - self.num_leaves()
    }

    #[inline]
    pub fn child_by_symbol(&self, id: NodeId, c: u8) -> Option<NodeId> {
        child_by_symbol(&self.nodes, &self.text, id, c)
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children { tree: self, next: self.node(id).first_child }
    }

    #[inline]
    pub fn edge_label(&self, id: NodeId) -> &[u8] {
        let n = self.node(id);
        &self.text[n.start as usize..n.end as usize]
    }

    /// 从根到节点的完整路径标签。入边总是某个后缀前缀的末段，
    /// 因此路径标签就是 text[end - depth .. end]。
    pub fn path_label(&self, id: NodeId) -> &[u8] {
        let n = self.node(id);
        let end = n.end as usize;
        &self.text[end - n.string_depth as usize..end]
    }

    /// 串深度最大的内部节点（第一次出现者优先），即最长重复子串的位置
    pub fn deepest_internal(&self) -> NodeId {
        let mut best = ROOT;
        for (id, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() && node.string_depth > self.node(best).string_depth {
                best = id as NodeId;
            }
        }
        best
    }

    pub fn longest_repeat(&self) -> &[u8] {
        self.path_label(self.deepest_internal())
    }
}

pub struct Children<'a> {
    tree: &'a SuffixTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.tree.node(cur).next_sibling;
        Some(cur)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_text(len: usize, sigma: u32, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T', b'N'];
        let mut x: u32 = seed;
        let mut v = Vec::with_capacity(len);
        for _ in 0..len {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            v.push(bases[((x >> 16) % sigma) as usize]);
        }
        v
    }

    fn all_nodes(tree: &SuffixTree) -> impl Iterator<Item = NodeId> {
        0..tree.num_nodes() as NodeId
    }

    #[test]
    fn agcat_has_six_leaves() {
        let tree = SuffixTree::build(b"AGCAT").unwrap();
        assert_eq!(tree.text(), b"AGCAT$");
        assert_eq!(tree.num_leaves(), 6);
        let mut seen = vec![false; 6];
        for id in all_nodes(&tree) {
            if let Some(s) = tree.node(id).suffix_index {
                assert!(!seen[s as usize]);
                seen[s as usize] = true;
            }
        }
        assert!(seen.iter().all(|&b| b));
        // 唯一的非根内部节点是 "A"
        assert_eq!(tree.num_internal(), 2);
        assert_eq!(tree.longest_repeat(), b"A");
    }

    #[test]
    fn root_children_sorted_with_sentinel_first() {
        let tree = SuffixTree::build(b"AGCAT").unwrap();
        let firsts: Vec<u8> = tree.children(ROOT).map(|c| tree.edge_label(c)[0]).collect();
        assert_eq!(firsts, b"$ACGT");
    }

    #[test]
    fn banana_internal_nodes() {
        let tree = SuffixTree::build(b"BANANA").unwrap();
        assert_eq!(tree.num_leaves(), 7);
        let mut labels: Vec<Vec<u8>> = all_nodes(&tree)
            .filter(|&id| id != ROOT && !tree.node(id).is_leaf())
            .map(|id| tree.path_label(id).to_vec())
            .collect();
        labels.sort();
        assert_eq!(labels, vec![b"A".to_vec(), b"ANA".to_vec(), b"NA".to_vec()]);
        assert_eq!(tree.longest_repeat(), b"ANA");
    }

    #[test]
    fn prepared_sentinel_is_kept() {
        let tree = SuffixTree::build(b"ACGT$").unwrap();
        assert_eq!(tree.text(), b"ACGT$");
        assert_eq!(tree.genome_len(), 4);
        assert_eq!(tree.genome(), b"ACGT");
    }

    #[test]
    fn rejects_empty_and_misplaced_sentinel() {
        assert_eq!(SuffixTree::build(b"").unwrap_err(), SfxError::NullOrEmptySequence("genome"));
        assert_eq!(SuffixTree::build(b"$").unwrap_err(), SfxError::NullOrEmptySequence("genome"));
        assert_eq!(
            SuffixTree::build(b"AC$GT").unwrap_err(),
            SfxError::MisplacedSentinel { position: 2 }
        );
    }

    #[test]
    fn single_symbol_genome() {
        let tree = SuffixTree::build(b"A").unwrap();
        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.num_internal(), 1);
    }

    #[test]
    fn structural_invariants_on_random_texts() {
        for (len, sigma, seed) in [(1, 2, 1), (7, 2, 2), (30, 2, 3), (64, 4, 4), (200, 4, 5), (300, 3, 6), (120, 1, 7)] {
            let seq = make_text(len, sigma, seed);
            let tree = SuffixTree::build(&seq).unwrap();
            let text = tree.text().to_vec();
            let n = text.len();
            assert_eq!(tree.num_leaves(), n, "len={}", len);

            let mut seen = vec![false; n];
            for id in all_nodes(&tree) {
                let node = tree.node(id);
                if let Some(s) = node.suffix_index {
                    assert!(!seen[s as usize]);
                    seen[s as usize] = true;
                    assert_eq!(tree.path_label(id), &text[s as usize..]);
                }
                if id != ROOT {
                    let parent = tree.node(node.parent.unwrap());
                    assert_eq!(node.string_depth, parent.string_depth + node.edge_len());
                }
                if id != ROOT && !node.is_leaf() {
                    let link = node.suffix_link.expect("internal node without suffix link");
                    assert_eq!(tree.node(link).string_depth + 1, node.string_depth);
                    assert_eq!(tree.path_label(link), &tree.path_label(id)[1..]);
                    assert!(tree.children(id).count() >= 2);
                }
                let firsts: Vec<u16> = tree.children(id).map(|c| symbol_rank(tree.edge_label(c)[0])).collect();
                for w in firsts.windows(2) {
                    assert!(w[0] < w[1], "children out of order under node {}", id);
                }
            }
            assert!(seen.iter().all(|&b| b));
            assert!(tree.num_nodes() <= 2 * n);
        }
    }

    #[test]
    fn child_lookup_by_symbol() {
        let tree = SuffixTree::build(b"AGCAT").unwrap();
        let a = tree.child_by_symbol(ROOT, b'A').unwrap();
        assert_eq!(tree.edge_label(a), b"A");
        assert!(tree.child_by_symbol(ROOT, b'N').is_none());
        let c = tree.child_by_symbol(ROOT, b'C').unwrap();
        assert_eq!(tree.node(c).suffix_index, Some(2));
    }
}
