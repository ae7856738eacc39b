//! 像素中心的凸包及其光栅化.

use crate::error::{PsdError, PsdResult};
use crate::mask::{is_foreground, MaskSlice, OwnedMask, FOREGROUND};
use crate::Idx2dI64;

/// 叉积 `(a - o) x (b - o)`. 坐标为 `(高, 宽)`.
#[inline]
fn cross(o: Idx2dI64, a: Idx2dI64, b: Idx2dI64) -> i64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Andrew 单调链算法求凸包.
///
/// 返回的顶点首尾不重复, 共线点被剔除, 相邻三点的叉积均为正.
/// 点数少于 3 或全部共线时, 返回去重后的端点 (至多 2 个).
pub(crate) fn convex_hull(mut pts: Vec<Idx2dI64>) -> Vec<Idx2dI64> {
    pts.sort_unstable();
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Idx2dI64> = Vec::with_capacity(pts.len());
    for &p in pts.iter() {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Idx2dI64> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// 凸多边形 (逆时针, 即 `convex_hull` 的输出) 是否包含点 `p` (含边界).
#[inline]
fn contains(hull: &[Idx2dI64], p: Idx2dI64) -> bool {
    let n = hull.len();
    (0..n).all(|i| cross(hull[i], hull[(i + 1) % n], p) >= 0)
}

/// 凸包候选点: 每一行最左侧与最右侧的前景像素中心.
///
/// 凸包只可能由这些点构成, 因此无需把全部前景像素交给 `convex_hull`.
fn hull_candidates(mask: &MaskSlice<'_>) -> Vec<Idx2dI64> {
    let mut pts = Vec::with_capacity(2 * mask.height());
    for (y, row) in mask.array_view().outer_iter().enumerate() {
        let mut it = row.indexed_iter().filter(|(_, p)| is_foreground(**p)).map(|(x, _)| x);
        if let Some(first) = it.next() {
            let last = it.last().unwrap_or(first);
            pts.push((y as i64, first as i64));
            pts.push((y as i64, last as i64));
        }
    }
    pts
}

/// 求前景像素中心的凸包顶点.
///
/// 凸包顶点少于 3 个 (单像素, 或全部像素共线) 时返回
/// [`PsdError::DegenerateGeometry`].
pub fn hull_vertices(mask: &MaskSlice<'_>) -> PsdResult<Vec<Idx2dI64>> {
    let hull = convex_hull(hull_candidates(mask));
    if hull.len() < 3 {
        return Err(PsdError::DegenerateGeometry {
            pixels: mask.area(),
        });
    }
    Ok(hull)
}

/// 将凸包光栅化为实心区域: 像素中心位于凸包内部或边界上的像素为前景.
///
/// 凸包只由像素中心构成, 不向外扩展半个像素, 因此斜边附近的像素
/// 少于按像素角点计算的凸包.
///
/// 返回与 `mask` 同形状的掩膜. 退化情形同 [`hull_vertices`].
pub fn convex_hull_image(mask: &MaskSlice<'_>) -> PsdResult<OwnedMask> {
    let hull = hull_vertices(mask)?;
    let (y_min, y_max) = hull
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
    let (x_min, x_max) = hull
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));

    let mut ans = OwnedMask::zeros(mask.shape());
    let inside = (y_min..=y_max)
        .flat_map(|y| (x_min..=x_max).map(move |x| (y, x)))
        .filter(|&p| contains(&hull, p))
        .map(|(y, x)| (y as usize, x as usize));
    ans.fill_batch(inside, FOREGROUND);
    Ok(ans)
}
