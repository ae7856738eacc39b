//! 运行时错误.

use crate::Idx2d;
use std::fmt::{Display, Formatter};

/// 测量与统计流程的运行时错误.
#[derive(Debug)]
pub enum PsdError {
    /// 调用方违反了接口约定.
    InvalidArgument(InvalidArgument),

    /// 掩膜过小或形状退化, 无法构造凸包轮廓.
    ///
    /// 参数为该掩膜的前景像素个数.
    DegenerateGeometry {
        /// 前景像素个数.
        pixels: usize,
    },

    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// 图像解码错误.
    Image(image::ImageError),

    /// 读取 npz 文件错误.
    Npz(ndarray_npy::ReadNpzError),

    /// 序列化/反序列化错误.
    Codec(bincode::Error),
}

/// 具体的接口约定违反类型.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidArgument {
    /// 两个粒径分布的单位不同. 参数依次为左值单位和右值单位.
    UnitMismatch(String, String),

    /// 不支持的单位字符串.
    UnknownUnit(String),

    /// 不支持的测量量名称.
    UnknownMeasurand(String),

    /// 不支持的类别名称.
    UnknownClass(String),

    /// 不支持的真值粒径模式名称.
    UnknownMode(String),

    /// 拼接了空的粒径分布列表.
    EmptyConcatenation,

    /// 粒径值为负数或不是有限值.
    InvalidSize(f64),

    /// 面积为负数或不是有限值.
    NegativeArea(f64),

    /// 单位换算比例不是正的有限值.
    InvalidScale(f64),

    /// 包围盒 `(y1, x1, y2, x2)` 不满足 `y2 > y1 && x2 > x1`.
    InvalidBBox([i32; 4]),

    /// 掩膜不含任何前景像素.
    EmptyMask,

    /// 置信度不在 `[0, 1]` 内.
    ScoreOutOfRange(f32),

    /// 阈值不在允许范围内.
    ThresholdOutOfRange(f64),

    /// 两组数据的长度不一致. 参数依次为期望长度和实际长度.
    LengthMismatch(usize, usize),

    /// 两个二维网格的形状不一致. 参数依次为期望形状和实际形状.
    ShapeMismatch(Idx2d, Idx2d),

    /// 没有任何真值实例, 平均精度无定义.
    EmptyGroundTruth,
}

impl Display for InvalidArgument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnitMismatch(a, b) => write!(f, "unit mismatch: `{a}` vs `{b}`"),
            Self::UnknownUnit(u) => write!(f, "expected unit to be \"px\" or \"m\", got `{u}`"),
            Self::UnknownMeasurand(m) => write!(
                f,
                "expected measurand to be one of {}, got `{m}`",
                crate::Measurand::ALL.map(|m| m.name()).join(", ")
            ),
            Self::UnknownClass(c) => write!(f, "unknown class name `{c}`"),
            Self::UnknownMode(m) => write!(f, "expected mode to be \"mask\" or \"bbox\", got `{m}`"),
            Self::EmptyConcatenation => write!(f, "nothing to concatenate"),
            Self::InvalidSize(s) => write!(f, "invalid size {s}"),
            Self::NegativeArea(a) => write!(f, "invalid area {a}"),
            Self::InvalidScale(s) => write!(f, "scale must be positive and finite, got {s}"),
            Self::InvalidBBox(b) => write!(f, "invalid bounding box {b:?}"),
            Self::EmptyMask => write!(f, "mask has no foreground pixel"),
            Self::ScoreOutOfRange(s) => write!(f, "score {s} is not within [0, 1]"),
            Self::ThresholdOutOfRange(t) => write!(f, "threshold {t} is out of range"),
            Self::LengthMismatch(a, b) => write!(f, "expected length {a}, got {b}"),
            Self::ShapeMismatch(a, b) => write!(f, "expected shape {a:?}, got {b:?}"),
            Self::EmptyGroundTruth => write!(f, "ground truth has no instance"),
        }
    }
}

impl Display for PsdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(e) => write!(f, "invalid argument: {e}"),
            Self::DegenerateGeometry { pixels } => {
                write!(f, "degenerate convex hull ({pixels} foreground pixels)")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Image(e) => write!(f, "image error: {e}"),
            Self::Npz(e) => write!(f, "npz error: {e}"),
            Self::Codec(e) => write!(f, "codec error: {e}"),
        }
    }
}

impl std::error::Error for PsdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Image(e) => Some(e),
            Self::Npz(e) => Some(e),
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InvalidArgument> for PsdError {
    #[inline]
    fn from(value: InvalidArgument) -> Self {
        Self::InvalidArgument(value)
    }
}

impl From<std::io::Error> for PsdError {
    #[inline]
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<image::ImageError> for PsdError {
    #[inline]
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<ndarray_npy::ReadNpzError> for PsdError {
    #[inline]
    fn from(value: ndarray_npy::ReadNpzError) -> Self {
        Self::Npz(value)
    }
}

impl From<bincode::Error> for PsdError {
    #[inline]
    fn from(value: bincode::Error) -> Self {
        Self::Codec(value)
    }
}

impl PsdError {
    /// 是否是 [`PsdError::DegenerateGeometry`]?
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateGeometry { .. })
    }
}

/// 测量与统计流程的返回值.
pub type PsdResult<T> = Result<T, PsdError>;
