//! 单个实例掩膜的区域属性.

use super::hull::convex_hull_image;
use crate::error::{InvalidArgument, PsdResult};
use crate::mask::MaskSlice;
use crate::{BBox, Idx2dF};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 区域属性. 掩膜的全部前景被视为同一个区域.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionProps {
    /// 前景像素个数.
    pub area: usize,

    /// 前景外接矩形, 左闭右开.
    pub bbox: BBox,

    /// 填充空洞后的像素个数.
    pub filled_area: usize,

    /// 凸包光栅化后的像素个数. 凸包退化时等于 `area`.
    pub convex_area: usize,

    /// 像素中心坐标的均值 `(高, 宽)`.
    pub centroid: Idx2dF,

    /// 与区域具有相同二阶中心矩的椭圆的长轴长度.
    pub major_axis_length: f64,

    /// 与区域具有相同二阶中心矩的椭圆的短轴长度.
    pub minor_axis_length: f64,
}

impl RegionProps {
    /// 分析 `mask` 的区域属性.
    ///
    /// 全背景掩膜返回 [`InvalidArgument::EmptyMask`].
    pub fn analyze(mask: &MaskSlice<'_>) -> PsdResult<Self> {
        let bbox = mask.extract_bbox().ok_or(InvalidArgument::EmptyMask)?;
        let (area, centroid, cov) = moments(mask);
        let convex_area = convex_area_or(mask, area)?;
        let (major, minor) = axis_lengths(cov);

        Ok(Self {
            area,
            bbox,
            filled_area: mask.filled_area(),
            convex_area,
            centroid,
            major_axis_length: major,
            minor_axis_length: minor,
        })
    }
}

/// 凸包光栅化后的像素个数. 凸包退化时返回 `area`.
fn convex_area_or(mask: &MaskSlice<'_>, area: usize) -> PsdResult<usize> {
    match convex_hull_image(mask) {
        Ok(hull) => Ok(hull.view().area()),
        Err(e) if e.is_degenerate() => Ok(area),
        Err(e) => Err(e),
    }
}

/// 凸包面积, 同 [`RegionProps::convex_area`]. 全背景掩膜返回 `0`.
pub(crate) fn convex_area(mask: &MaskSlice<'_>) -> PsdResult<usize> {
    convex_area_or(mask, mask.area())
}

/// 长轴长度, 同 [`RegionProps::major_axis_length`]. 全背景掩膜返回 `NaN`.
pub(crate) fn major_axis_length(mask: &MaskSlice<'_>) -> f64 {
    let (_, _, cov) = moments(mask);
    axis_lengths(cov).0
}

/// 像素个数, 质心, 以及 (总体) 协方差矩阵 `(cov_yy, cov_xx, cov_yx)`.
fn moments(mask: &MaskSlice<'_>) -> (usize, Idx2dF, (f64, f64, f64)) {
    let (mut n, mut sy, mut sx) = (0usize, 0.0, 0.0);
    for (y, x) in mask.foreground_positions() {
        n += 1;
        sy += y as f64;
        sx += x as f64;
    }
    if n == 0 {
        return (0, (f64::NAN, f64::NAN), (f64::NAN, f64::NAN, f64::NAN));
    }
    let (cy, cx) = (sy / n as f64, sx / n as f64);

    let (mut yy, mut xx, mut yx) = (0.0, 0.0, 0.0);
    for (y, x) in mask.foreground_positions() {
        let (dy, dx) = (y as f64 - cy, x as f64 - cx);
        yy += dy * dy;
        xx += dx * dx;
        yx += dy * dx;
    }
    let nf = n as f64;
    (n, (cy, cx), (yy / nf, xx / nf, yx / nf))
}

/// 二阶中心矩对应椭圆的 (长轴, 短轴) 长度, 即 `4 * sqrt(特征值)`.
fn axis_lengths((a, c, b): (f64, f64, f64)) -> (f64, f64) {
    let mid = (a + c) / 2.0;
    let delta = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let (l1, l2) = (mid + delta, (mid - delta).max(0.0));
    (4.0 * l1.sqrt(), 4.0 * l2.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::testing::{ascii, disk, rect};
    use crate::mask::OwnedMask;

    #[test]
    fn test_disk_props() {
        let d = disk((100, 100), (50.0, 50.0), 10.0);
        let p = RegionProps::analyze(&d.view()).unwrap();
        assert_eq!(p.area, 317);
        assert_eq!(p.filled_area, p.area);
        assert!(p.convex_area >= p.area);
        assert!((p.centroid.0 - 50.0).abs() < 1e-9);
        assert!((p.centroid.1 - 50.0).abs() < 1e-9);
        assert!((p.major_axis_length - 20.0).abs() < 1.0, "{}", p.major_axis_length);
        assert!((p.major_axis_length - p.minor_axis_length).abs() < 1e-9);
        assert_eq!(p.bbox, BBox::new(40, 40, 61, 61).unwrap());
    }

    #[test]
    fn test_elongated_axes() {
        let bar = rect((40, 60), (10, 5, 14, 45));
        let p = RegionProps::analyze(&bar.view()).unwrap();
        // 长为 L 的均匀线段方差为 (L^2 - 1) / 12.
        let expect = 4.0 * ((40.0f64 * 40.0 - 1.0) / 12.0).sqrt();
        assert!((p.major_axis_length - expect).abs() < 1e-9);
        assert!(p.minor_axis_length < p.major_axis_length);
        assert_eq!(p.convex_area, p.area);
    }

    #[test]
    fn test_ring_filled_area() {
        let ring = ascii(&[
            ".......", //
            ".#####.", //
            ".#...#.", //
            ".#...#.", //
            ".#...#.", //
            ".#####.", //
            ".......", //
        ]);
        let p = RegionProps::analyze(&ring.view()).unwrap();
        assert_eq!(p.area, 16);
        assert_eq!(p.filled_area, 25);
        assert_eq!(p.convex_area, 25);
    }

    #[test]
    fn test_single_value_helpers() {
        let shapes = [
            disk((60, 60), (30.0, 25.0), 12.0),
            rect((40, 60), (10, 5, 14, 45)),
            rect((5, 5), (2, 2, 3, 3)),
        ];
        for m in shapes {
            let p = RegionProps::analyze(&m.view()).unwrap();
            assert_eq!(convex_area(&m.view()).unwrap(), p.convex_area);
            assert_eq!(major_axis_length(&m.view()), p.major_axis_length);
        }
    }

    #[test]
    fn test_degenerate_and_empty() {
        let dot = rect((5, 5), (2, 2, 3, 3));
        let p = RegionProps::analyze(&dot.view()).unwrap();
        assert_eq!(p.convex_area, 1);
        assert_eq!(p.major_axis_length, 0.0);

        assert!(RegionProps::analyze(&OwnedMask::zeros((3, 3)).view()).is_err());
    }
}
