//! 粒径测量量.

use crate::error::{InvalidArgument, PsdResult};
use crate::geometry::{
    convex_area, equivalent_diameter, major_axis_length, major_bbox_side_length,
    maximum_feret_diameter,
};
use crate::InstanceRef;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 由单个实例计算粒径的方式.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Measurand {
    /// 填充空洞后面积的等效直径.
    EquivalentDiameter,

    /// 凸包面积的等效直径.
    EquivalentDiameterConvex,

    /// 包围盒的最大边长.
    MajorBboxSideLength,

    /// 等二阶矩椭圆的长轴长度.
    MajorAxisLength,

    /// 最大 Feret 直径.
    MaximumFeretDiameter,
}

impl Measurand {
    /// 全部测量量.
    pub const ALL: [Measurand; 5] = [
        Measurand::EquivalentDiameter,
        Measurand::EquivalentDiameterConvex,
        Measurand::MajorBboxSideLength,
        Measurand::MajorAxisLength,
        Measurand::MaximumFeretDiameter,
    ];

    /// snake_case 名称.
    pub const fn name(&self) -> &'static str {
        match self {
            Measurand::EquivalentDiameter => "equivalent_diameter",
            Measurand::EquivalentDiameterConvex => "equivalent_diameter_convex",
            Measurand::MajorBboxSideLength => "major_bbox_side_length",
            Measurand::MajorAxisLength => "major_axis_length",
            Measurand::MaximumFeretDiameter => "maximum_feret_diameter",
        }
    }

    /// 测量单个实例的粒径 (像素).
    ///
    /// # 注意
    ///
    /// 只有 [`Measurand::MaximumFeretDiameter`] 可能返回
    /// [`crate::PsdError::DegenerateGeometry`]; 其余测量量对合法实例总是成功.
    pub fn measure(&self, instance: &InstanceRef<'_>) -> PsdResult<f64> {
        match self {
            Measurand::EquivalentDiameter => {
                equivalent_diameter(instance.mask().filled_area() as f64)
            }
            Measurand::EquivalentDiameterConvex => {
                equivalent_diameter(convex_area(&instance.mask())? as f64)
            }
            Measurand::MajorBboxSideLength => Ok(major_bbox_side_length(&instance.bbox())),
            Measurand::MajorAxisLength => Ok(major_axis_length(&instance.mask())),
            Measurand::MaximumFeretDiameter => maximum_feret_diameter(&instance.mask()),
        }
    }
}

impl FromStr for Measurand {
    type Err = InvalidArgument;

    /// 不区分大小写地解析 snake_case 名称.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Measurand::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| InvalidArgument::UnknownMeasurand(s.to_string()))
    }
}

impl Display for Measurand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::class;
    use crate::mask::testing::{disk, rect};
    use crate::{BBox, Instance};

    #[test]
    fn test_parse() {
        for m in Measurand::ALL {
            assert_eq!(m.name().parse::<Measurand>(), Ok(m));
            assert_eq!(m.to_string().to_uppercase().parse::<Measurand>(), Ok(m));
        }
        let e = "feret".parse::<Measurand>().unwrap_err();
        assert_eq!(e, InvalidArgument::UnknownMeasurand("feret".to_string()));
        assert!(e.to_string().contains("maximum_feret_diameter"));
    }

    #[test]
    fn test_measure_disk() {
        let inst = Instance::from_mask(disk((100, 100), (50.0, 50.0), 10.0), class::SPHERE).unwrap();
        let r = inst.view();
        let d = Measurand::EquivalentDiameter.measure(&r).unwrap();
        assert!((d - 20.0).abs() < 1.0, "{d}");
        let dc = Measurand::EquivalentDiameterConvex.measure(&r).unwrap();
        assert!(dc >= d);
        assert_eq!(Measurand::MajorBboxSideLength.measure(&r).unwrap(), 21.0);
        let ma = Measurand::MajorAxisLength.measure(&r).unwrap();
        assert!((ma - 20.0).abs() < 1.0, "{ma}");
        let feret = Measurand::MaximumFeretDiameter.measure(&r).unwrap();
        assert!((feret - 21.0).abs() < 1.5, "{feret}");
    }

    #[test]
    fn test_measure_matches_region_props() {
        let inst = Instance::from_mask(disk((64, 64), (30.0, 34.0), 9.0), class::CUBE).unwrap();
        let r = inst.view();
        let p = r.region_props().unwrap();
        assert_eq!(
            Measurand::EquivalentDiameterConvex.measure(&r).unwrap(),
            equivalent_diameter(p.convex_area as f64).unwrap()
        );
        assert_eq!(Measurand::MajorAxisLength.measure(&r).unwrap(), p.major_axis_length);
        assert_eq!(
            Measurand::EquivalentDiameter.measure(&r).unwrap(),
            equivalent_diameter(p.filled_area as f64).unwrap()
        );
    }

    #[test]
    fn test_measure_degenerate() {
        let dot = Instance::new(
            rect((8, 8), (3, 3, 4, 4)),
            class::CUBE,
            BBox::new(3, 3, 4, 4).unwrap(),
            0.9,
        )
        .unwrap();
        let r = dot.view();
        assert!(Measurand::MaximumFeretDiameter.measure(&r).unwrap_err().is_degenerate());
        for m in &Measurand::ALL[..4] {
            assert!(m.measure(&r).is_ok());
        }
    }
}
