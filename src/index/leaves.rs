//! 叶子数组与深度优先遍历。
//!
//! 所有遍历都用显式栈实现，树深可以达到序列长度。

use super::tree::{NodeId, SuffixTree, ROOT};

enum Visit {
    Enter(NodeId),
    /// 离开内部节点，记录进入时叶子数组的长度
    Exit(NodeId, u32),
}

/// 将子节点逆序压栈，使最左（字母序最小）的子节点最先弹出
fn push_children(tree: &SuffixTree, id: NodeId, stack: &mut Vec<Visit>, scratch: &mut Vec<NodeId>) {
    scratch.clear();
    scratch.extend(tree.children(id));
    for &c in scratch.iter().rev() {
        stack.push(Visit::Enter(c));
    }
}

impl SuffixTree {
    /// 按字母序 DFS 生成叶子数组，并为串深度不小于 `min_match_len` 的节点
    /// 填写叶子区间。浅节点的区间被清空。
    pub fn prepare(&mut self, min_match_len: usize) -> Vec<u32> {
        let mut leaves: Vec<u32> = Vec::with_capacity(self.text().len());
        let mut intervals: Vec<(NodeId, (u32, u32))> = Vec::new();
        let mut stack = vec![Visit::Enter(ROOT)];
        let mut scratch = Vec::new();
        let min = min_match_len as u32;

        while let Some(v) = stack.pop() {
            match v {
                Visit::Enter(id) => {
                    let node = self.node(id);
                    if let Some(s) = node.suffix_index {
                        let slot = leaves.len() as u32;
                        leaves.push(s);
                        if node.string_depth >= min {
                            intervals.push((id, (slot, slot)));
                        }
                    } else {
                        stack.push(Visit::Exit(id, leaves.len() as u32));
                        push_children(self, id, &mut stack, &mut scratch);
                    }
                }
                Visit::Exit(id, first) => {
                    if self.node(id).string_depth >= min && !leaves.is_empty() {
                        intervals.push((id, (first, leaves.len() as u32 - 1)));
                    }
                }
            }
        }

        let nodes = self.nodes_mut();
        for node in nodes.iter_mut() {
            node.leaf_interval = None;
        }
        let marked = intervals.len();
        for (id, iv) in intervals {
            nodes[id as usize].leaf_interval = Some(iv);
        }
        log::info!(
            "prepared suffix tree: {} leaves, {} nodes with depth >= {}",
            leaves.len(),
            marked,
            min_match_len
        );
        leaves
    }

    /// 后序遍历各节点的串深度
    pub fn postorder_depths(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.num_nodes());
        let mut stack = vec![Visit::Enter(ROOT)];
        let mut scratch = Vec::new();
        while let Some(v) = stack.pop() {
            match v {
                Visit::Enter(id) => {
                    if self.node(id).is_leaf() {
                        out.push(self.node(id).string_depth);
                    } else {
                        stack.push(Visit::Exit(id, 0));
                        push_children(self, id, &mut stack, &mut scratch);
                    }
                }
                Visit::Exit(id, _) => out.push(self.node(id).string_depth),
            }
        }
        out
    }

    /// 节点子树下的全部后缀起点（需先 `prepare`）
    pub fn subtree_suffixes<'a>(&self, id: NodeId, leaves: &'a [u32]) -> Option<&'a [u32]> {
        let (s, e) = self.node(id).leaf_interval?;
        leaves.get(s as usize..=e as usize)
    }
}
