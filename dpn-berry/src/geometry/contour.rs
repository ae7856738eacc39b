//! 二值掩膜在 0.5 等值线处的 marching squares 轮廓提取.
//!
//! 掩膜值只有 `0` 和 `1`, 因此等值点总是落在相邻像素中心连线的中点上.
//! 内部以 "两倍坐标" 表示顶点, 使所有顶点都是整数, 可以精确比较和哈希.

use crate::mask::MaskSlice;
use crate::{Idx2dF, Idx2dI64};
use std::collections::{HashMap, HashSet};

/// 两倍坐标下的轮廓, 首尾不重复.
pub(crate) type Contour2x = Vec<Idx2dI64>;

/// 一个单元格的四条边中点 (两倍坐标). 单元格左上角像素为 `(y, x)`.
#[derive(Copy, Clone)]
struct Cell {
    y: i64,
    x: i64,
}

impl Cell {
    #[inline]
    fn top(&self) -> Idx2dI64 {
        (2 * self.y, 2 * self.x + 1)
    }

    #[inline]
    fn bottom(&self) -> Idx2dI64 {
        (2 * self.y + 2, 2 * self.x + 1)
    }

    #[inline]
    fn left(&self) -> Idx2dI64 {
        (2 * self.y + 1, 2 * self.x)
    }

    #[inline]
    fn right(&self) -> Idx2dI64 {
        (2 * self.y + 1, 2 * self.x + 2)
    }
}

/// 单元格内的等值线段. 至多两段.
fn cell_segments(cell: Cell, ul: bool, ur: bool, ll: bool, lr: bool) -> [Option<(Idx2dI64, Idx2dI64)>; 2] {
    let (t, b, l, r) = (cell.top(), cell.bottom(), cell.left(), cell.right());
    match (ul, ur, ll, lr) {
        (false, false, false, false) | (true, true, true, true) => [None, None],

        // 单角.
        (true, false, false, false) | (false, true, true, true) => [Some((t, l)), None],
        (false, true, false, false) | (true, false, true, true) => [Some((t, r)), None],
        (false, false, true, false) | (true, true, false, true) => [Some((l, b)), None],
        (false, false, false, true) | (true, true, true, false) => [Some((b, r)), None],

        // 半边.
        (true, true, false, false) | (false, false, true, true) => [Some((l, r)), None],
        (true, false, true, false) | (false, true, false, true) => [Some((t, b)), None],

        // 鞍点: 前景按 8-连通处理, 保持高值对角相连.
        (true, false, false, true) => [Some((t, r)), Some((l, b))],
        (false, true, true, false) => [Some((t, l)), Some((b, r))],
    }
}

/// 收集所有等值线段. 掩膜四周视为补了一圈背景, 因此所有轮廓都是闭合的.
///
/// 只扫描前景外接矩形向外扩展一个像素的范围.
fn segments(mask: &MaskSlice<'_>) -> Vec<(Idx2dI64, Idx2dI64)> {
    let Some((y1, x1, y2, x2)) = mask.bounds() else {
        return vec![];
    };
    let at = |y: i64, x: i64| -> bool {
        y >= 0 && x >= 0 && mask.is_foreground_at((y as usize, x as usize))
    };

    let mut ans = Vec::with_capacity(4 * (y2 - y1 + x2 - x1));
    for y in (y1 as i64 - 1)..(y2 as i64) {
        for x in (x1 as i64 - 1)..(x2 as i64) {
            let cell = Cell { y, x };
            let segs = cell_segments(cell, at(y, x), at(y, x + 1), at(y + 1, x), at(y + 1, x + 1));
            ans.extend(segs.into_iter().flatten());
        }
    }
    ans
}

/// 将线段首尾相连为闭合轮廓 (两倍坐标).
///
/// 轮廓的起点与走向由线段的生成顺序 (行优先扫描) 决定, 因此结果是确定的.
pub(crate) fn contours_2x(mask: &MaskSlice<'_>) -> Vec<Contour2x> {
    let segs = segments(mask);
    let mut adj: HashMap<Idx2dI64, Vec<Idx2dI64>> = HashMap::with_capacity(segs.len());
    for &(a, b) in segs.iter() {
        adj.entry(a).or_default().push(b);
        adj.entry(b).or_default().push(a);
    }
    debug_assert!(adj.values().all(|v| v.len() == 2));

    let mut vis: HashSet<Idx2dI64> = HashSet::with_capacity(adj.len());
    let mut ans = Vec::with_capacity(1);
    for &(start, _) in segs.iter() {
        if vis.contains(&start) {
            continue;
        }
        let mut contour = Contour2x::with_capacity(16);
        let mut cur = start;
        loop {
            vis.insert(cur);
            contour.push(cur);
            let next = adj
                .get(&cur)
                .and_then(|ns| ns.iter().copied().find(|n| !vis.contains(n)));
            match next {
                Some(n) => cur = n,
                None => break,
            }
        }
        ans.push(contour);
    }
    ans
}

/// 提取掩膜前景在 0.5 等值线处的全部闭合轮廓.
///
/// 顶点坐标为 `(高, 宽)` 的像素坐标, 取值为整数或半整数.
/// 前景按 8-连通处理. 全背景时返回空列表.
pub fn find_contours(mask: &MaskSlice<'_>) -> Vec<Vec<Idx2dF>> {
    contours_2x(mask)
        .into_iter()
        .map(|c| {
            c.into_iter()
                .map(|(y, x)| (y as f64 / 2.0, x as f64 / 2.0))
                .collect()
        })
        .collect()
}
