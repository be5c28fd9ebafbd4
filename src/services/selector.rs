// 随机抽取未练习题目

use crate::models::{PracticedMap, Problem};
use rand::Rng;

/// 从未练习的题目中等概率随机抽取一道
///
/// 全部已练习时返回 `None`，这不是错误。
pub fn pick_random_unpracticed<'a, R>(
    problems: &'a [Problem],
    practiced: &PracticedMap,
    rng: &mut R,
) -> Option<&'a Problem>
where
    R: Rng + ?Sized,
{
    let unpracticed: Vec<&Problem> = problems
        .iter()
        .filter(|p| !practiced.contains_key(&p.id))
        .collect();

    if unpracticed.is_empty() {
        return None;
    }

    let index = rng.gen_range(0..unpracticed.len());
    Some(unpracticed[index])
}
