//! 单个颗粒实例.

use crate::consts::{class, GROUND_TRUTH_SCORE};
use crate::error::{InvalidArgument, PsdResult};
use crate::geometry::RegionProps;
use crate::mask::{MaskSlice, OwnedMask};
use crate::ClassId;
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 轴对齐包围盒 `(y1, x1, y2, x2)`, 左闭右开, 保证 `y2 > y1` 且 `x2 > x1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BBox {
    y1: i32,
    x1: i32,
    y2: i32,
    x2: i32,
}

impl BBox {
    /// 构造包围盒. 不满足 `y2 > y1 && x2 > x1` 时返回
    /// [`InvalidArgument::InvalidBBox`].
    pub fn new(y1: i32, x1: i32, y2: i32, x2: i32) -> PsdResult<Self> {
        if y2 <= y1 || x2 <= x1 {
            return Err(InvalidArgument::InvalidBBox([y1, x1, y2, x2]).into());
        }
        Ok(Self { y1, x1, y2, x2 })
    }

    /// 以 `[y1, x1, y2, x2]` 的形式获得坐标.
    #[inline]
    pub fn to_array(&self) -> [i32; 4] {
        [self.y1, self.x1, self.y2, self.x2]
    }

    /// 高 `y2 - y1`.
    #[inline]
    pub fn height(&self) -> u32 {
        self.y2.abs_diff(self.y1)
    }

    /// 宽 `x2 - x1`.
    #[inline]
    pub fn width(&self) -> u32 {
        self.x2.abs_diff(self.x1)
    }
}

impl TryFrom<[i32; 4]> for BBox {
    type Error = crate::PsdError;

    #[inline]
    fn try_from([y1, x1, y2, x2]: [i32; 4]) -> Result<Self, Self::Error> {
        Self::new(y1, x1, y2, x2)
    }
}

/// 拥有所有权的颗粒实例.
///
/// 通常只在构造 [`crate::Detection`] 时使用; 实例一旦进入
/// `Detection` 便被拆分存储, 之后以 [`InstanceRef`] 的形式访问.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub(crate) mask: OwnedMask,
    pub(crate) class_id: ClassId,
    pub(crate) bbox: BBox,
    pub(crate) score: f32,
}

impl Instance {
    /// 构造实例.
    ///
    /// # 注意
    ///
    /// 以下情形返回 [`InvalidArgument`]:
    ///
    /// 1. 掩膜不含前景像素;
    /// 2. 类别为背景;
    /// 3. 置信度不在 `[0, 1]` 内 (包括 `NaN`).
    pub fn new(mask: OwnedMask, class_id: ClassId, bbox: BBox, score: f32) -> PsdResult<Self> {
        if !mask.view().has_foreground() {
            return Err(InvalidArgument::EmptyMask.into());
        }
        if !class::is_instance_class(class_id) {
            return Err(InvalidArgument::UnknownClass(class_id.to_string()).into());
        }
        if !(0.0..=1.0).contains(&score) {
            return Err(InvalidArgument::ScoreOutOfRange(score).into());
        }
        Ok(Self {
            mask,
            class_id,
            bbox,
            score,
        })
    }

    /// 由真值掩膜构造实例. 包围盒由掩膜提取, 置信度为 `1`.
    pub fn from_mask(mask: OwnedMask, class_id: ClassId) -> PsdResult<Self> {
        let bbox = mask.view().extract_bbox().ok_or(InvalidArgument::EmptyMask)?;
        Self::new(mask, class_id, bbox, GROUND_TRUTH_SCORE)
    }

    /// 获得借用视图.
    #[inline]
    pub fn view(&self) -> InstanceRef<'_> {
        InstanceRef {
            mask: self.mask.view(),
            class_id: self.class_id,
            bbox: self.bbox,
            score: self.score,
        }
    }

    /// 拆分为 `(掩膜, 类别, 包围盒, 置信度)`.
    #[inline]
    pub fn into_parts(self) -> (OwnedMask, ClassId, BBox, f32) {
        (self.mask, self.class_id, self.bbox, self.score)
    }
}

/// 借用的颗粒实例.
#[derive(Copy, Clone)]
pub struct InstanceRef<'a> {
    mask: MaskSlice<'a>,
    class_id: ClassId,
    bbox: BBox,
    score: f32,
}

impl<'a> InstanceRef<'a> {
    #[inline]
    pub(crate) fn new(mask: MaskSlice<'a>, class_id: ClassId, bbox: BBox, score: f32) -> Self {
        Self {
            mask,
            class_id,
            bbox,
            score,
        }
    }

    /// 实例掩膜.
    #[inline]
    pub fn mask(&self) -> MaskSlice<'a> {
        self.mask
    }

    /// 实例类别.
    #[inline]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// 包围盒.
    #[inline]
    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    /// 置信度.
    #[inline]
    pub fn score(&self) -> f32 {
        self.score
    }

    /// 面积, 即前景像素个数.
    #[inline]
    pub fn area(&self) -> usize {
        self.mask.area()
    }

    /// 周长, 即 `mask XOR erode(mask)` 的像素个数.
    #[inline]
    pub fn perimeter(&self) -> usize {
        self.mask.perimeter()
    }

    /// 圆度 `4π * 面积 / 周长^2`.
    ///
    /// 周长为 0 (掩膜铺满整幅图像) 时结果为正无穷.
    #[inline]
    pub fn circularity(&self) -> f64 {
        circularity(self.area(), self.perimeter())
    }

    /// 区域属性分析.
    #[inline]
    pub fn region_props(&self) -> PsdResult<RegionProps> {
        RegionProps::analyze(&self.mask)
    }

    /// 清除接触图像边缘的 8-连通区域后, 实例是否还有剩余像素?
    #[inline]
    pub fn survives_border_clearing(&self) -> bool {
        self.mask.has_interior_component()
    }
}

/// 圆度 `4π * area / perimeter^2`.
#[inline]
pub(crate) fn circularity(area: usize, perimeter: usize) -> f64 {
    let p = perimeter as f64;
    4.0 * PI * area as f64 / (p * p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::testing::{disk, rect};
    use crate::PsdError;

    #[test]
    fn test_bbox() {
        let b = BBox::new(1, 2, 4, 9).unwrap();
        assert_eq!((b.height(), b.width()), (3, 7));
        assert_eq!(BBox::try_from(b.to_array()).unwrap(), b);
        for bad in [[0, 0, 0, 5], [3, 0, 2, 5], [0, 5, 3, 5]] {
            assert!(matches!(
                BBox::try_from(bad),
                Err(PsdError::InvalidArgument(InvalidArgument::InvalidBBox(_)))
            ));
        }
    }

    #[test]
    fn test_instance_validation() {
        let m = rect((10, 10), (2, 2, 5, 5));
        let b = BBox::new(2, 2, 5, 5).unwrap();
        assert!(Instance::new(m.clone(), class::SPHERE, b, 0.7).is_ok());
        assert!(Instance::new(OwnedMask::zeros((10, 10)), class::SPHERE, b, 0.7).is_err());
        assert!(Instance::new(m.clone(), class::BACKGROUND, b, 0.7).is_err());
        assert!(Instance::new(m.clone(), class::CUBE, b, 1.5).is_err());
        assert!(Instance::new(m.clone(), class::CUBE, b, f32::NAN).is_err());

        let gt = Instance::from_mask(m, class::CUBE).unwrap();
        assert_eq!(gt.view().bbox(), b);
        assert_eq!(gt.view().score(), 1.0);
        assert!(Instance::from_mask(OwnedMask::zeros((3, 3)), class::CUBE).is_err());
    }

    #[test]
    fn test_derived_properties() {
        let sq = Instance::from_mask(rect((10, 10), (2, 2, 6, 6)), class::CUBE).unwrap();
        let r = sq.view();
        assert_eq!(r.area(), 16);
        assert_eq!(r.perimeter(), 12);
        assert!((r.circularity() - 4.0 * PI * 16.0 / 144.0).abs() < 1e-12);
        assert!(r.survives_border_clearing());

        let big = Instance::from_mask(rect((64, 64), (10, 10, 30, 30)), class::CUBE).unwrap();
        assert_eq!(big.view().perimeter(), 76);
        let d = Instance::from_mask(disk((64, 64), (32.0, 32.0), 20.0), class::SPHERE).unwrap();
        assert!(d.view().circularity() > big.view().circularity());
    }
}
