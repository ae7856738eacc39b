//! 对 `dpn-berry::dataset` 的更一层封装. 提供更直接的数据集加载器.

use dpn_berry::dataset::{self, GroundTruthDataset};
use dpn_berry::PsdResult;
use std::env;
use std::path::{Path, PathBuf};

/// 默认子集.
pub const DEFAULT_SUBSET: &str = "validation";

/// 获取颗粒数据集根路径.
///
/// 1. 若环境变量 `$DPN_DATASET_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/particles`.
pub fn dataset_dir_from_env_or_home() -> PathBuf {
    match env::var("DPN_DATASET_DIR") {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => dataset::home_dataset_dir_with(["particles"]).expect("Cannot locate home directory"),
    }
}

/// 获取子集名称.
///
/// 1. 若环境变量 `$DPN_SUBSET` 非空, 则返回其值;
/// 2. 否则, 返回 [`DEFAULT_SUBSET`].
pub fn subset_from_env() -> String {
    match env::var("DPN_SUBSET") {
        Ok(s) if !s.is_empty() => s,
        _ => DEFAULT_SUBSET.to_string(),
    }
}

/// 若环境变量 `$DPN_RESULTS` 非空, 返回检测结果文件 (`ResultSet`) 的路径.
pub fn results_path_from_env() -> Option<PathBuf> {
    env::var("DPN_RESULTS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// 获取真值数据集加载器.
#[inline]
pub fn ground_truth_loader<P: AsRef<Path>>(root: P, subset: &str) -> PsdResult<GroundTruthDataset> {
    GroundTruthDataset::open(root, subset, None)
}

/// 从 `$DPN_DATASET_DIR` (或 `$HOME/dataset/particles`) 下加载 `$DPN_SUBSET`
/// (或 `validation`) 子集的真值数据集加载器.
#[inline]
pub fn ground_truth_loader_from_env_or_home() -> PsdResult<GroundTruthDataset> {
    ground_truth_loader(dataset_dir_from_env_or_home(), &subset_from_env())
}
