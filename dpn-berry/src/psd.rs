//! 颗粒粒径分布 (PSD).

use crate::error::{InvalidArgument, PsdResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 粒径单位.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Unit {
    /// 像素, `"px"`.
    Pixel,

    /// 米, `"m"`.
    Meter,
}

impl Unit {
    /// 单位的字符串表示.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Unit::Pixel => "px",
            Unit::Meter => "m",
        }
    }
}

impl FromStr for Unit {
    type Err = InvalidArgument;

    /// 不区分大小写地解析 `"px"` 或 `"m"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "px" => Ok(Unit::Pixel),
            "m" => Ok(Unit::Meter),
            _ => Err(InvalidArgument::UnknownUnit(s.to_string())),
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一组带单位的粒径测量值.
///
/// 所有粒径保证为非负有限值; 单位只能通过 [`SizeDistribution::to_meter`]
/// 和 [`SizeDistribution::to_pixel`] 显式改变.
///
/// 反序列化时同样校验粒径, 不合法的数据解码失败.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawSizeDistribution"))]
pub struct SizeDistribution {
    sizes: Vec<f64>,
    unit: Unit,
}

/// 未经校验的 [`SizeDistribution`], 仅用于反序列化.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawSizeDistribution {
    sizes: Vec<f64>,
    unit: Unit,
}

#[cfg(feature = "serde")]
impl TryFrom<RawSizeDistribution> for SizeDistribution {
    type Error = InvalidArgument;

    fn try_from(raw: RawSizeDistribution) -> Result<Self, Self::Error> {
        SizeDistribution::checked(raw.sizes, raw.unit)
    }
}

impl SizeDistribution {
    /// 构造粒径分布. 任意粒径为负数或不是有限值时返回
    /// [`InvalidArgument::InvalidSize`].
    pub fn new(sizes: Vec<f64>, unit: Unit) -> PsdResult<Self> {
        Ok(Self::checked(sizes, unit)?)
    }

    fn checked(sizes: Vec<f64>, unit: Unit) -> Result<Self, InvalidArgument> {
        if let Some(&bad) = sizes.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(InvalidArgument::InvalidSize(bad));
        }
        Ok(Self { sizes, unit })
    }

    /// 空的粒径分布.
    #[inline]
    pub fn empty(unit: Unit) -> Self {
        Self {
            sizes: vec![],
            unit,
        }
    }

    /// 全部粒径.
    #[inline]
    pub fn sizes(&self) -> &[f64] {
        &self.sizes
    }

    /// 单位.
    #[inline]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> (Vec<f64>, Unit) {
        (self.sizes, self.unit)
    }

    /// 颗粒个数.
    #[inline]
    pub fn number_of_particles(&self) -> usize {
        self.sizes.len()
    }

    /// 所有粒径的自然对数的 (均值, 总体标准差).
    fn log_moments(&self) -> (f64, f64) {
        let n = self.sizes.len() as f64;
        let mean = self.sizes.iter().map(|s| s.ln()).sum::<f64>() / n;
        let var = self
            .sizes
            .iter()
            .map(|s| {
                let d = s.ln() - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }

    /// 几何平均值 `exp(mean(ln(sizes)))`.
    ///
    /// # 注意
    ///
    /// 不做特殊处理: 含 `0` 时结果为 `0`, 空分布的结果为 `NaN`.
    #[inline]
    pub fn geometric_mean(&self) -> f64 {
        self.log_moments().0.exp()
    }

    /// 几何标准差 `exp(std(ln(sizes)))`, 其中 `std` 为总体标准差.
    ///
    /// # 注意
    ///
    /// 不做特殊处理: 含 `0` 或空分布时结果为 `NaN`.
    #[inline]
    pub fn geometric_standard_deviation(&self) -> f64 {
        self.log_moments().1.exp()
    }

    /// 以比例 `scale` (米/像素) 将全部粒径乘以 `scale`, 单位置为米.
    ///
    /// 不检查当前单位. `scale` 不是正的有限值时返回 [`InvalidArgument::InvalidScale`].
    pub fn to_meter(self, scale: f64) -> PsdResult<Self> {
        check_scale(scale)?;
        self.rescale(|s| s * scale, Unit::Meter)
    }

    /// 以比例 `scale` (米/像素) 将全部粒径除以 `scale`, 单位置为像素.
    ///
    /// 不检查当前单位. `scale` 不是正的有限值时返回 [`InvalidArgument::InvalidScale`].
    pub fn to_pixel(self, scale: f64) -> PsdResult<Self> {
        check_scale(scale)?;
        self.rescale(|s| s / scale, Unit::Pixel)
    }

    fn rescale(self, f: impl Fn(f64) -> f64, unit: Unit) -> PsdResult<Self> {
        let sizes = self.sizes.into_iter().map(f).collect();
        // 极端比例可能溢出为无穷.
        Self::new(sizes, unit)
    }

    /// 按顺序拼接多个粒径分布.
    ///
    /// 列表为空返回 [`InvalidArgument::EmptyConcatenation`];
    /// 单位不一致返回 [`InvalidArgument::UnitMismatch`].
    pub fn concatenate(list: &[SizeDistribution]) -> PsdResult<Self> {
        let first = list.first().ok_or(InvalidArgument::EmptyConcatenation)?;
        if let Some(other) = list.iter().find(|d| d.unit != first.unit) {
            return Err(unit_mismatch(first.unit, other.unit).into());
        }
        let sizes = list
            .iter()
            .flat_map(|d| d.sizes.iter().copied())
            .collect();
        Ok(Self {
            sizes,
            unit: first.unit,
        })
    }

    /// 以 `ground_truth` 为真值进行比较.
    ///
    /// 单位不一致返回 [`InvalidArgument::UnitMismatch`]. 任何统计量为 `NaN`
    /// 时以 `warn` 级别记录日志, 并可通过 [`PsdComparison::has_anomaly`] 检查.
    pub fn compare(&self, ground_truth: &SizeDistribution) -> PsdResult<PsdComparison> {
        if self.unit != ground_truth.unit {
            return Err(unit_mismatch(self.unit, ground_truth.unit).into());
        }
        let ans = PsdComparison {
            unit: self.unit,
            d_g: self.geometric_mean(),
            d_g_gt: ground_truth.geometric_mean(),
            s_g: self.geometric_standard_deviation(),
            s_g_gt: ground_truth.geometric_standard_deviation(),
            n: self.number_of_particles(),
            n_gt: ground_truth.number_of_particles(),
        };
        if ans.has_anomaly() {
            log::warn!(
                "Comparison of size distributions ({} vs {} particles) has undefined statistics.",
                ans.n,
                ans.n_gt
            );
        }
        Ok(ans)
    }
}

#[inline]
fn check_scale(scale: f64) -> Result<(), InvalidArgument> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(InvalidArgument::InvalidScale(scale))
    }
}

#[inline]
fn unit_mismatch(a: Unit, b: Unit) -> InvalidArgument {
    InvalidArgument::UnitMismatch(a.to_string(), b.to_string())
}

/// 两个粒径分布的比较结果.
///
/// 相对误差的约定为 `测量值 / 真值 - 1`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PsdComparison {
    unit: Unit,
    d_g: f64,
    d_g_gt: f64,
    s_g: f64,
    s_g_gt: f64,
    n: usize,
    n_gt: usize,
}

impl PsdComparison {
    /// 几何平均值 (测量值, 真值).
    #[inline]
    pub fn geometric_means(&self) -> (f64, f64) {
        (self.d_g, self.d_g_gt)
    }

    /// 几何标准差 (测量值, 真值).
    #[inline]
    pub fn geometric_standard_deviations(&self) -> (f64, f64) {
        (self.s_g, self.s_g_gt)
    }

    /// 颗粒个数 (测量值, 真值).
    #[inline]
    pub fn numbers_of_particles(&self) -> (usize, usize) {
        (self.n, self.n_gt)
    }

    /// 几何平均值的相对误差 `d_g / d_g_gt - 1`.
    #[inline]
    pub fn error_geometric_mean(&self) -> f64 {
        self.d_g / self.d_g_gt - 1.0
    }

    /// 几何标准差的相对误差 `s_g / s_g_gt - 1`.
    #[inline]
    pub fn error_geometric_standard_deviation(&self) -> f64 {
        self.s_g / self.s_g_gt - 1.0
    }

    /// 颗粒个数的相对误差 `N / N_gt - 1`.
    #[inline]
    pub fn error_number_of_particles(&self) -> f64 {
        self.n as f64 / self.n_gt as f64 - 1.0
    }

    /// 三个相对误差 `(errD, errS, errN)`.
    #[inline]
    pub fn errors(&self) -> (f64, f64, f64) {
        (
            self.error_geometric_mean(),
            self.error_geometric_standard_deviation(),
            self.error_number_of_particles(),
        )
    }

    /// 是否有统计量或误差无定义 (`NaN`)?
    ///
    /// 空分布的统计量为 `NaN`, 这种比较结果不应被当作有效数值使用.
    pub fn has_anomaly(&self) -> bool {
        let (d, s, n) = self.errors();
        [self.d_g, self.d_g_gt, self.s_g, self.s_g_gt, d, s, n]
            .iter()
            .any(|v| v.is_nan())
    }
}

impl Display for PsdComparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (err_d, err_s, err_n) = self.errors();
        writeln!(f, "d_g = {:.3} {}", self.d_g, self.unit)?;
        writeln!(f, "d_g_gt = {:.3} {}", self.d_g_gt, self.unit)?;
        writeln!(f, "error_d_g = {err_d:.3}")?;
        writeln!(f)?;
        writeln!(f, "s_g = {:.3}", self.s_g)?;
        writeln!(f, "s_g_gt = {:.3}", self.s_g_gt)?;
        writeln!(f, "error_s_g = {err_s:.3}")?;
        writeln!(f)?;
        writeln!(f, "N = {}", self.n)?;
        writeln!(f, "N_gt = {}", self.n_gt)?;
        write!(f, "error_N = {err_n:.3}")
    }
}
