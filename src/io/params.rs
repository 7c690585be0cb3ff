//! 打分参数文件：`match <n>`、`mismatch <n>`、`h <n>`（开启）、`g <n>`（延伸），
//! 以空白分隔，顺序任意，未出现的键保留原值。

use anyhow::{anyhow, bail, Result};

use crate::align::ScoringParams;

pub fn parse_params(text: &str, base: ScoringParams) -> Result<ScoringParams> {
    let mut p = base;
    let mut tokens = text.split_whitespace();
    while let Some(key) = tokens.next() {
        let raw = tokens.next().ok_or_else(|| anyhow!("parameter '{}' has no value", key))?;
        let value: i32 = raw
            .parse()
            .map_err(|e| anyhow!("invalid value '{}' for parameter '{}': {}", raw, key, e))?;
        match key {
            "match" => p.match_score = value,
            "mismatch" => p.mismatch_penalty = value,
            "h" | "gap_open" => p.gap_open_penalty = value,
            "g" | "gap_extend" => p.gap_extend_penalty = value,
            other => bail!(
                "unknown parameter '{}'; expected lines of the form 'match <n>', 'mismatch <n>', 'h <n>', 'g <n>'",
                other
            ),
        }
    }
    Ok(p)
}

pub fn read_params(path: &str, base: ScoringParams) -> Result<ScoringParams> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("cannot read parameter file '{}': {}", path, e))?;
    parse_params(&text, base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file() {
        let p = parse_params("match 1\nmismatch -2\nh -5\ng -2\n", ScoringParams::default()).unwrap();
        assert_eq!(
            p,
            ScoringParams { match_score: 1, mismatch_penalty: -2, gap_open_penalty: -5, gap_extend_penalty: -2 }
        );
    }

    #[test]
    fn partial_file_keeps_base() {
        let p = parse_params("gap_open -3", ScoringParams::default()).unwrap();
        assert_eq!(p.gap_open_penalty, -3);
        assert_eq!(p.match_score, ScoringParams::default().match_score);
    }

    #[test]
    fn bad_input_rejected() {
        assert!(parse_params("match", ScoringParams::default()).is_err());
        assert!(parse_params("match two", ScoringParams::default()).is_err());
        assert!(parse_params("bonus 3", ScoringParams::default()).is_err());
    }
}
