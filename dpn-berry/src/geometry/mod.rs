//! 几何测量量.
//!
//! 包括由面积推出的等效直径, 包围盒最大边长, 以及基于凸包轮廓的最大 Feret 直径.

mod contour;
mod hull;
mod region;

pub use contour::find_contours;
pub use hull::{convex_hull_image, hull_vertices};
pub use region::RegionProps;

pub(crate) use region::{convex_area, major_axis_length};

use crate::error::{InvalidArgument, PsdResult};
use crate::mask::MaskSlice;
use crate::BBox;
use std::f64::consts::PI;

/// 由面积计算等效直径 `sqrt(4 * area / π)`, 即等面积圆的直径.
///
/// 面积为负数或不是有限值时返回 [`InvalidArgument::NegativeArea`].
#[inline]
pub fn equivalent_diameter(area: f64) -> PsdResult<f64> {
    if !area.is_finite() || area < 0.0 {
        return Err(InvalidArgument::NegativeArea(area).into());
    }
    Ok((4.0 * area / PI).sqrt())
}

/// 对一组面积逐个计算等效直径. 任意一个面积非法则整体失败.
pub fn equivalent_diameters(areas: &[f64]) -> PsdResult<Vec<f64>> {
    areas.iter().map(|&a| equivalent_diameter(a)).collect()
}

/// 包围盒的最大边长 `max(x2 - x1, y2 - y1)`. 宽高相等时取宽.
#[inline]
pub fn major_bbox_side_length(bbox: &BBox) -> f64 {
    let (h, w) = (bbox.height(), bbox.width());
    if w >= h {
        w as f64
    } else {
        h as f64
    }
}

/// 对一组包围盒逐个计算最大边长.
#[inline]
pub fn major_bbox_side_lengths(bboxes: &[BBox]) -> Vec<f64> {
    bboxes.iter().map(major_bbox_side_length).collect()
}

/// 最大 Feret 直径.
///
/// 算法流程依次为:
///
/// 1. 求前景像素中心的凸包, 并将其光栅化为实心区域;
/// 2. 在四周补一圈背景后, 以 marching squares 提取实心凸包在 0.5
///   等值线处的轮廓 (前景按 8-连通处理);
/// 3. 穷举轮廓顶点两两之间的平方距离, 取最大值后开方一次.
///
/// # 注意
///
/// 凸包顶点少于 3 个 (单像素, 单行, 单列, 或全部共线) 时返回
/// [`crate::PsdError::DegenerateGeometry`], 调用方应跳过该实例并记录.
pub fn maximum_feret_diameter(mask: &MaskSlice<'_>) -> PsdResult<f64> {
    let filled = convex_hull_image(mask)?;
    let contours = contour::contours_2x(&filled.view());
    // 凸包区域只有一条外轮廓; 保险起见取最长者.
    let Some(contour) = contours.iter().max_by_key(|c| c.len()) else {
        return Err(crate::PsdError::DegenerateGeometry { pixels: mask.area() });
    };

    let mut max_d2 = 0i64;
    for (i, a) in contour.iter().enumerate() {
        for b in contour[i + 1..].iter() {
            let (dy, dx) = (a.0 - b.0, a.1 - b.1);
            max_d2 = max_d2.max(dy * dy + dx * dx);
        }
    }
    // 两倍坐标.
    Ok((max_d2 as f64).sqrt() / 2.0)
}
