use crate::util::alphabet::SENTINEL;

/// 根据叶子数组（即后缀数组）输出 BWT。
/// text 带终止符；后缀 0 的前驱记为终止符。
pub fn bwt_from_leaves(text: &[u8], leaves: &[u32]) -> Vec<u8> {
    let mut bwt = Vec::with_capacity(leaves.len());
    for &p in leaves {
        let i = p as usize;
        bwt.push(if i == 0 { SENTINEL } else { text[i - 1] });
    }
    bwt
}
