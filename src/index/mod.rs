pub mod bwt;
pub mod leaves;
pub mod sa;
pub mod tree;

use std::io::Write;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::SfxError;
use crate::util::alphabet::Alphabet;
use tree::{NodeId, SuffixTree};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 准备好的参考索引：后缀树 + 叶子数组 + 构建参数
#[derive(Debug, Serialize, Deserialize)]
pub struct SuffixIndex {
    /// 参考序列名称
    pub name: String,
    /// 字母表字符（序列化时只保存字符本身）
    pub alphabet: Vec<u8>,
    pub tree: SuffixTree,
    pub leaves: Vec<u32>,
    pub min_match_len: usize,
    pub meta: IndexMeta,
}

impl SuffixIndex {
    /// 构建并准备索引
    pub fn build(name: &str, genome: &[u8], alphabet: &Alphabet, min_match_len: usize) -> Result<Self, SfxError> {
        alphabet.validate(genome)?;
        let mut tree = SuffixTree::build(genome)?;
        let leaves = tree.prepare(min_match_len);
        Ok(Self {
            name: name.to_string(),
            alphabet: alphabet.symbols().to_vec(),
            tree,
            leaves,
            min_match_len,
            meta: IndexMeta::default(),
        })
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn alphabet(&self) -> Result<Alphabet> {
        Alphabet::new(&self.alphabet)
    }

    /// 以新的最小匹配长度重新标记叶子区间
    pub fn reprepare(&mut self, min_match_len: usize) {
        if min_match_len != self.min_match_len {
            self.leaves = self.tree.prepare(min_match_len);
            self.min_match_len = min_match_len;
        }
    }

    /// 节点子树下所有后缀在参考上的起点
    pub fn offsets(&self, node: NodeId) -> &[u32] {
        self.tree.subtree_suffixes(node, &self.leaves).unwrap_or(&[])
    }

    pub fn genome(&self) -> &[u8] {
        self.tree.genome()
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let f = std::fs::File::create(path)?;
        let mut w = std::io::BufWriter::new(f);
        bincode::serialize_into(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        let idx: Self = bincode::deserialize_from(std::io::BufReader::new(f))?;
        Ok(idx)
    }
}
