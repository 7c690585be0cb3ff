use anyhow::{anyhow, Result};
use std::io::Read;

use crate::error::SfxError;

/// 终止符，不属于任何字母表，排序时位于所有字符之前
pub const SENTINEL: u8 = b'$';

/// 有限字母表。字符统一转为大写。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<u8>,
    member: [bool; 256],
}

impl Alphabet {
    pub fn new(symbols: &[u8]) -> Result<Self> {
        let mut member = [false; 256];
        let mut uniq = Vec::with_capacity(symbols.len());
        for &b in symbols {
            if b.is_ascii_whitespace() {
                continue;
            }
            let up = b.to_ascii_uppercase();
            if up == SENTINEL {
                return Err(anyhow!("alphabet must not contain the sentinel '$'"));
            }
            if !member[up as usize] {
                member[up as usize] = true;
                uniq.push(up);
            }
        }
        if uniq.is_empty() {
            return Err(anyhow!("alphabet is empty"));
        }
        uniq.sort_unstable();
        Ok(Self { symbols: uniq, member })
    }

    /// 默认 DNA 字母表 {A, C, G, T}
    pub fn dna() -> Self {
        let mut member = [false; 256];
        for &b in b"ACGT" {
            member[b as usize] = true;
        }
        Self { symbols: b"ACGT".to_vec(), member }
    }

    /// 读取字母表文件：空白分隔（或直接相连）的字符
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::new(&buf)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let fh = std::fs::File::open(path)
            .map_err(|e| anyhow!("cannot open alphabet file '{}': {}", path, e))?;
        Self::from_reader(std::io::BufReader::new(fh))
    }

    #[inline]
    pub fn contains(&self, b: u8) -> bool {
        self.member[b as usize]
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// 丢弃字母表之外的字符，返回 (过滤后的序列, 丢弃数)
    pub fn filter(&self, seq: &[u8]) -> (Vec<u8>, usize) {
        let mut out = Vec::with_capacity(seq.len());
        for &b in seq {
            let up = b.to_ascii_uppercase();
            if self.contains(up) {
                out.push(up);
            }
        }
        let dropped = seq.len() - out.len();
        (out, dropped)
    }

    /// 校验序列中的每个字符都属于字母表
    pub fn validate(&self, seq: &[u8]) -> Result<(), SfxError> {
        match seq.iter().position(|&b| !self.contains(b)) {
            Some(position) => Err(SfxError::InvalidSymbol {
                symbol: seq[position] as char,
                position,
            }),
            None => Ok(()),
        }
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::dna()
    }
}
