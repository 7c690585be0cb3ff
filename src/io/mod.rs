//! 序列文件与参数文件读取、结果输出。

pub mod fasta;
pub mod fastq;
pub mod params;
pub mod report;

use anyhow::{anyhow, Result};
use std::io::BufRead;

/// 一条序列记录（FASTA 或 FASTQ）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeqRecord {
    pub name: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

impl SeqRecord {
    pub fn new(name: &str, seq: &[u8]) -> Self {
        Self { name: name.to_string(), desc: None, seq: seq.to_vec() }
    }
}

/// 逐条产出序列记录的来源
pub trait RecordSource {
    fn next_record(&mut self) -> Result<Option<SeqRecord>>;

    /// 读完剩余全部记录
    fn read_all(&mut self) -> Result<Vec<SeqRecord>> {
        let mut out = Vec::new();
        while let Some(rec) = self.next_record()? {
            out.push(rec);
        }
        Ok(out)
    }
}

/// 根据第一个非空白字符选择格式：'@' 为 FASTQ，其余按 FASTA 读取
pub fn records_from_reader<R: BufRead + 'static>(mut reader: R) -> Result<Box<dyn RecordSource>> {
    let first = reader.fill_buf()?.iter().copied().find(|b| !b.is_ascii_whitespace());
    if first == Some(b'@') {
        Ok(Box::new(fastq::FastqReader::new(reader)))
    } else {
        Ok(Box::new(fasta::FastaReader::new(reader)))
    }
}

pub fn open_records(path: &str) -> Result<Box<dyn RecordSource>> {
    let fh = std::fs::File::open(path).map_err(|e| anyhow!("cannot open sequence file '{}': {}", path, e))?;
    records_from_reader(std::io::BufReader::new(fh))
}
