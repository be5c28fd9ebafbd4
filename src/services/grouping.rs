// 按主题分组

use crate::models::{GroupedView, Problem};

/// 将题目按主题分组
///
/// 主题按首次出现的顺序排列，同一主题内保持输入顺序。空字符串与缺失主题各自成组。
pub fn group_by_topic(problems: &[Problem]) -> GroupedView {
    let mut grouped = GroupedView::new();
    for problem in problems {
        grouped
            .entry(problem.topic.clone())
            .or_default()
            .push(problem.clone());
    }
    grouped
}
