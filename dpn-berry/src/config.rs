//! 运行配置与 PSD 后处理过滤配置.

use crate::consts::NUM_CLASSES;
use crate::error::PsdResult;
use crate::ClassId;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 文本形式配置的文件名.
pub const CONFIG_TEXT_FILE: &str = "config.txt";

/// 二进制形式配置的文件名.
pub const CONFIG_BINARY_FILE: &str = "config.bin";

/// 检测结果后处理的过滤配置. `None` 表示不启用对应过滤.
///
/// 参见 [`crate::Detection::apply_filters`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterSpec {
    /// 最小置信度.
    pub minimum_score: Option<f32>,

    /// 只保留该类别.
    pub class_id: Option<ClassId>,

    /// 最小面积 (像素).
    pub minimum_area: Option<usize>,

    /// 最大面积 (像素).
    pub maximum_area: Option<usize>,

    /// 最小圆度.
    pub minimum_circularity: Option<f64>,

    /// 是否删除接触图像边缘的实例.
    pub clear_border: bool,
}

/// 运行配置.
///
/// 训练相关的字段只作记录之用. 派生量 (批大小, 每轮步数) 由
/// [`Config::batch_size`] 等方法实时计算, 不单独存储.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// 配置名称.
    pub name: String,

    /// 数据集根目录.
    pub dataset_path: Option<PathBuf>,

    /// 训练集样本个数.
    pub number_of_samples_train: usize,

    /// 验证集样本个数.
    pub number_of_samples_val: usize,

    /// 每个 GPU 同时处理的图像个数.
    pub images_per_gpu: usize,

    /// GPU 个数.
    pub gpu_count: usize,

    /// 单幅图像最多检测的实例个数.
    pub detection_max_instances: usize,

    /// 类别个数 (含背景).
    pub num_classes: usize,

    /// 预训练权重, 例如 `"coco"` 或权重文件路径.
    pub pretrained_weights: Option<String>,

    /// 单幅图像最多使用的真值实例个数.
    pub max_gt_instances: usize,

    /// 参与训练的网络层.
    pub layers: String,

    /// 学习率.
    pub learning_rate: f64,

    /// 训练轮数.
    pub epochs: usize,

    /// 自定义回调名称. 每个配置独有一份.
    pub callbacks: Vec<String>,

    /// PSD 后处理过滤配置.
    pub filter: FilterSpec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "dpn".to_string(),
            dataset_path: None,
            number_of_samples_train: 100,
            number_of_samples_val: 10,
            images_per_gpu: 2,
            gpu_count: 1,
            detection_max_instances: 100,
            num_classes: NUM_CLASSES,
            pretrained_weights: None,
            max_gt_instances: 200,
            layers: "all".to_string(),
            learning_rate: 0.01,
            epochs: 10000,
            callbacks: Vec::new(),
            filter: FilterSpec::default(),
        }
    }
}

impl Config {
    /// 以名称 `name` 创建默认配置.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 有效批大小.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.images_per_gpu * self.gpu_count
    }

    /// 每轮训练步数, 使得每个训练样本每轮恰好用到一次 (四舍五入).
    #[inline]
    pub fn steps_per_epoch(&self) -> usize {
        round_div(self.number_of_samples_train, self.batch_size())
    }

    /// 每轮验证步数, 至少为 1.
    #[inline]
    pub fn validation_steps(&self) -> usize {
        round_div(self.number_of_samples_val, self.batch_size()).max(1)
    }

    /// 按 `{name:30} {value}` 的格式逐行列出全部配置项 (含派生量), 按名称排序.
    pub fn describe(&self) -> String {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "None".to_string());
        let f = &self.filter;
        let mut items = vec![
            ("BATCH_SIZE", self.batch_size().to_string()),
            ("CALLBACKS", format!("{:?}", self.callbacks)),
            (
                "DATASET_PATH",
                opt(self.dataset_path.as_ref().map(|p| p.display().to_string())),
            ),
            ("DETECTION_MAX_INSTANCES", self.detection_max_instances.to_string()),
            ("EPOCHS", self.epochs.to_string()),
            ("FILTER_CLASS_ID", opt(f.class_id.map(|v| v.to_string()))),
            ("FILTER_CLEAR_BORDER", f.clear_border.to_string()),
            ("FILTER_MAXIMUM_AREA", opt(f.maximum_area.map(|v| v.to_string()))),
            ("FILTER_MINIMUM_AREA", opt(f.minimum_area.map(|v| v.to_string()))),
            (
                "FILTER_MINIMUM_CIRCULARITY",
                opt(f.minimum_circularity.map(|v| v.to_string())),
            ),
            ("FILTER_MINIMUM_SCORE", opt(f.minimum_score.map(|v| v.to_string()))),
            ("GPU_COUNT", self.gpu_count.to_string()),
            ("IMAGES_PER_GPU", self.images_per_gpu.to_string()),
            ("LAYERS", self.layers.clone()),
            ("LEARNING_RATE", self.learning_rate.to_string()),
            ("MAX_GT_INSTANCES", self.max_gt_instances.to_string()),
            ("NAME", self.name.clone()),
            ("NUMBER_OF_SAMPLES_TRAIN", self.number_of_samples_train.to_string()),
            ("NUMBER_OF_SAMPLES_VAL", self.number_of_samples_val.to_string()),
            ("NUM_CLASSES", self.num_classes.to_string()),
            ("PRETRAINED_WEIGHTS", opt(self.pretrained_weights.clone())),
            ("STEPS_PER_EPOCH", self.steps_per_epoch().to_string()),
            ("VALIDATION_STEPS", self.validation_steps().to_string()),
        ];
        items.sort_by_key(|(k, _)| *k);

        let mut s = String::new();
        for (k, v) in items {
            // 写入 String 不会失败.
            let _ = writeln!(s, "{k:30} {v}");
        }
        s
    }

    /// 将配置写入目录 `dir` (不存在时创建): 文本形式写入 `config.txt`,
    /// 启用 `serde` 时另以 bincode 写入 `config.bin`.
    pub fn dump<P: AsRef<Path>>(&self, dir: P) -> PsdResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        fs::write(dir.join(CONFIG_TEXT_FILE), self.describe())?;

        #[cfg(feature = "serde")]
        crate::Storable::save(self, dir.join(CONFIG_BINARY_FILE))?;

        log::debug!("Config '{}' dumped to {}", self.name, dir.display());
        Ok(())
    }

    /// 从目录 `dir` 中的 `config.bin` 读回配置.
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<Path>>(dir: P) -> PsdResult<Self> {
        let path = dir.as_ref().join(CONFIG_BINARY_FILE);
        let cfg: Self = crate::Storable::load(&path)?;
        log::debug!("Config '{}' loaded from {}", cfg.name, path.display());
        Ok(cfg)
    }
}

/// 四舍五入的整数除法. `b == 0` 时返回 0.
#[inline]
fn round_div(a: usize, b: usize) -> usize {
    if b == 0 {
        0
    } else {
        (a + b / 2) / b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let c = Config::default();
        assert_eq!(c.batch_size(), 2);
        assert_eq!(c.steps_per_epoch(), 50);
        assert_eq!(c.validation_steps(), 5);
        assert_eq!(c.num_classes, 3);

        let c = Config {
            number_of_samples_val: 1,
            images_per_gpu: 4,
            ..Config::new("tiny")
        };
        assert_eq!(c.validation_steps(), 1);
        assert_eq!(c.steps_per_epoch(), 25);
    }

    #[test]
    fn test_callbacks_not_shared() {
        let mut a = Config::new("a");
        let b = Config::new("b");
        a.callbacks.push("early_stopping".to_string());
        assert!(b.callbacks.is_empty());
    }

    #[test]
    fn test_describe() {
        let text = Config::new("probe").describe();
        let names: Vec<&str> = text.lines().map(|l| l[..30].trim_end()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(text.lines().any(|l| l.starts_with("NAME") && l.ends_with(" probe")));
        assert!(text.contains("STEPS_PER_EPOCH"));
        assert!(text.lines().all(|l| l.len() > 31 && &l[30..31] == " "));
    }

    #[test]
    fn test_dump_writes_text() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("run").join("01");
        Config::default().dump(&sub).unwrap();
        let text = fs::read_to_string(sub.join(CONFIG_TEXT_FILE)).unwrap();
        assert!(text.contains("LEARNING_RATE"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_dump_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = Config::new("round");
        c.dataset_path = Some(dir.path().to_path_buf());
        c.filter.minimum_score = Some(0.7);
        c.filter.clear_border = true;
        c.callbacks.push("tensorboard".to_string());
        c.dump(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), c);
    }
}
