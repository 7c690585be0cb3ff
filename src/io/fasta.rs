use anyhow::Result;
use std::io::BufRead;

use super::{RecordSource, SeqRecord};

/// 多行 FASTA 读取器；序列中的空白被去掉，字符统一转为大写
pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    peek_header: Option<String>,
}

/// 标题行第一个空白之前为名称，其余为描述
fn split_header(header: &str) -> (String, Option<String>) {
    let mut parts = header.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_string();
    let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    (name, desc)
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, peek_header: None }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n == 0 {
            self.done = true;
        }
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        if self.done && self.peek_header.is_none() {
            return Ok(None);
        }

        // 跳过第一条标题之前的内容
        let header = match self.peek_header.take() {
            Some(h) => h,
            None => loop {
                if !self.read_line()? {
                    return Ok(None);
                }
                if let Some(rest) = self.buf.strip_prefix('>') {
                    break rest.trim().to_string();
                }
            },
        };
        let (name, desc) = split_header(&header);

        let mut seq: Vec<u8> = Vec::new();
        while self.read_line()? {
            if let Some(rest) = self.buf.strip_prefix('>') {
                self.peek_header = Some(rest.trim().to_string());
                break;
            }
            seq.extend(
                self.buf
                    .bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(|b| b.to_ascii_uppercase()),
            );
        }

        Ok(Some(SeqRecord { name, desc, seq }))
    }
}

impl<R: BufRead> RecordSource for FastaReader<R> {
    fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        FastaReader::next_record(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_simple_fasta() {
        let data = b">chr1 first\nACgTNN\n>chr2\nAAA\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.name, "chr1");
        assert_eq!(r1.desc.as_deref(), Some("first"));
        assert_eq!(r1.seq, b"ACGTNN");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.name, "chr2");
        assert_eq!(r2.desc, None);
        assert_eq!(r2.seq, b"AAA");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn crlf_and_inner_whitespace() {
        let data = b">chr1 desc\r\nAC g t n\r\n acgt\r\n>chr2 \r\n N N N \r\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.name, "chr1");
        assert_eq!(r1.seq, b"ACGTNACGT");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.name, "chr2");
        assert_eq!(r2.seq, b"NNN");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn last_record_without_newline() {
        let data = b"\n\n>r1\nACGT\n>r2\nTT";
        let mut r = FastaReader::new(Cursor::new(&data[..]));
        assert_eq!(r.next_record().unwrap().unwrap().seq, b"ACGT");
        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!((r2.name.as_str(), r2.seq.as_slice()), ("r2", &b"TT"[..]));
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn empty_record_kept() {
        let data = b">empty\n>full\nAC\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));
        let e = r.next_record().unwrap().unwrap();
        assert_eq!(e.name, "empty");
        assert!(e.seq.is_empty());
        assert_eq!(r.next_record().unwrap().unwrap().seq, b"AC");
    }
}
