use rayon::prelude::*;

use super::features::Descriptor;

/// 一对互为最近邻的描述子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

/// 暴力欧氏距离匹配 + 交叉校验：只保留双方互为最近邻的对应关系。
/// 距离相同时取索引较小者。
pub fn cross_check_matches(query: &[Descriptor], train: &[Descriptor]) -> Vec<DescriptorMatch> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let forward: Vec<(usize, f32)> = query.par_iter().map(|q| nearest(q, train)).collect();
    let backward: Vec<usize> = train.par_iter().map(|t| nearest(t, query).0).collect();

    forward
        .into_iter()
        .enumerate()
        .filter(|&(qi, (ti, _))| backward[ti] == qi)
        .map(|(qi, (ti, dist_sq))| DescriptorMatch {
            query_idx: qi,
            train_idx: ti,
            distance: dist_sq.sqrt(),
        })
        .collect()
}

/// 返回 (索引, 距离平方)
fn nearest(needle: &Descriptor, haystack: &[Descriptor]) -> (usize, f32) {
    haystack
        .iter()
        .enumerate()
        .fold((0, f32::INFINITY), |best, (i, candidate)| {
            let d = squared_distance(needle, candidate);
            if d < best.1 {
                (i, d)
            } else {
                best
            }
        })
}

fn squared_distance(a: &Descriptor, b: &Descriptor) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
