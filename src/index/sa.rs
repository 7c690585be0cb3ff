//! 独立的后缀数组构建（倍增法，O(n log n) 排序），用于交叉验证叶子数组。

use super::tree::symbol_rank;

/// 构建带终止符文本的后缀数组，终止符排在所有字符之前。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<i32> = text.iter().map(|&b| symbol_rank(b) as i32).collect();
    let mut tmp: Vec<i32> = vec![0; n];

    let mut k = 1usize;
    loop {
        let key = |i: usize, rank: &[i32]| (rank[i], if i + k < n { rank[i + k] } else { -1 });
        sa.sort_unstable_by(|&i, &j| key(i, &rank).cmp(&key(j, &rank)));

        tmp[sa[0]] = 0;
        for w in 1..n {
            let (a, b) = (sa[w - 1], sa[w]);
            tmp[b] = tmp[a] + i32::from(key(a, &rank) != key(b, &rank));
        }
        rank.copy_from_slice(&tmp);
        if rank[sa[n - 1]] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }

    sa.into_iter().map(|x| x as u32).collect()
}

/// 比较叶子数组与独立构建的后缀数组，返回第一个不一致的位置
pub fn first_mismatch(text: &[u8], leaves: &[u32]) -> Option<usize> {
    let sa = build_sa(text);
    if sa.len() != leaves.len() {
        return Some(sa.len().min(leaves.len()));
    }
    sa.iter().zip(leaves).position(|(a, b)| a != b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tree::tests::make_text;
    use crate::index::tree::SuffixTree;

    fn naive_sa(text: &[u8]) -> Vec<u32> {
        let n = text.len();
        let mut suffixes: Vec<(usize, &[u8])> = (0..n).map(|i| (i, &text[i..])).collect();
        suffixes.sort_by(|a, b| a.1.cmp(b.1));
        suffixes.into_iter().map(|(i, _)| i as u32).collect()
    }

    #[test]
    fn sa_basic() {
        assert_eq!(build_sa(b"ACGT$"), vec![4, 0, 1, 2, 3]);
    }

    #[test]
    fn sa_matches_naive_on_small_random_texts() {
        for len in 1..=20 {
            let mut text = make_text(len, 4, 1_234_567);
            text.push(b'$');
            assert_eq!(build_sa(&text), naive_sa(&text), "mismatch on len={}", len);
        }
    }

    #[test]
    fn sentinel_sorts_before_low_ascii_symbols() {
        // '!' 的 ASCII 码小于 '$'，但终止符仍然最小
        let text = b"!!$";
        assert_eq!(build_sa(text), vec![2, 1, 0]);
    }

    #[test]
    fn leaf_array_agrees_with_sa() {
        let seq = make_text(500, 4, 77);
        let mut tree = SuffixTree::build(&seq).unwrap();
        let leaves = tree.prepare(20);
        assert_eq!(first_mismatch(tree.text(), &leaves), None);
        assert_eq!(first_mismatch(tree.text(), &leaves[1..]), Some(leaves.len() - 1));
    }
}
