use anyhow::{anyhow, Result};
use std::io::BufRead;

use super::{RecordSource, SeqRecord};

/// 四行一条的 FASTQ 读取器；质量值只用于校验长度，不保留
pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    line_no: usize,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, line_no: 0 }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n > 0 {
            self.line_no += 1;
        }
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        if self.done {
            return Ok(None);
        }

        // 标题行，允许记录之间有空行
        loop {
            if !self.read_line()? {
                self.done = true;
                return Ok(None);
            }
            if !self.buf.trim().is_empty() {
                break;
            }
        }
        let header = self
            .buf
            .strip_prefix('@')
            .ok_or_else(|| anyhow!("line {}: FASTQ header not starting with '@'", self.line_no))?
            .trim_end()
            .to_string();
        let mut parts = header.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if !self.read_line()? {
            return Err(anyhow!("unexpected EOF after header of '{}'", name));
        }
        let seq: Vec<u8> = self.buf.trim_end().bytes().map(|b| b.to_ascii_uppercase()).collect();

        if !self.read_line()? || !self.buf.starts_with('+') {
            return Err(anyhow!("line {}: missing '+' line for '{}'", self.line_no, name));
        }

        if !self.read_line()? {
            return Err(anyhow!("missing quality line for '{}'", name));
        }
        let qual_len = self.buf.trim_end().len();
        if qual_len != seq.len() {
            return Err(anyhow!("'{}': sequence length {} but quality length {}", name, seq.len(), qual_len));
        }

        Ok(Some(SeqRecord { name, desc, seq }))
    }
}

impl<R: BufRead> RecordSource for FastqReader<R> {
    fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        FastqReader::next_record(self)
    }
}
