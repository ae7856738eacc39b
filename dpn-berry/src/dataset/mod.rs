//! 数据集操作.

use crate::error::InvalidArgument;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod particles;

pub use particles::{GroundTruthDataset, GroundTruthSample};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 由真值计算粒径的方式.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GtMode {
    /// 掩膜像素个数的等效直径.
    Mask,

    /// 包围盒的最大边长.
    Bbox,
}

impl GtMode {
    /// 小写名称.
    pub const fn name(&self) -> &'static str {
        match self {
            GtMode::Mask => "mask",
            GtMode::Bbox => "bbox",
        }
    }
}

impl FromStr for GtMode {
    type Err = InvalidArgument;

    /// 不区分大小写.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mask" => Ok(GtMode::Mask),
            "bbox" => Ok(GtMode::Bbox),
            _ => Err(InvalidArgument::UnknownMode(s.to_string())),
        }
    }
}

impl Display for GtMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
