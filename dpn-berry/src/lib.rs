#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 从实例分割网络 (Mask R-CNN) 检测到的颗粒实例掩膜出发,
//! 计算经过标定的颗粒粒径分布 (PSD), 并与真值进行统计学比较.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 检测网络本身不在该 crate 的范围内. 网络被抽象为 [`Detector`] trait,
//!   只需提供 `detect(image) -> RawInstances` 即可接入.
//! 2. 非法输入 (空掩膜, 颠倒的包围盒, 数量不一致的实例属性等) 会以
//!   [`PsdError::InvalidArgument`] 尽早失败, 而不会产生静默错误的几何结果.
//!
//! # 开发计划
//!
//! ### 几何测量 ✅
//!
//! 等效直径, 包围盒最大边长, 最大 Feret 直径 (凸包 + 0.5 等值线 + 两两最大距离).
//!
//! 实现位于 `dpn-berry/src/geometry`.
//!
//! ### 区域属性 ✅
//!
//! 面积, 填充面积, 凸包面积, 椭圆拟合长轴长度.
//!
//! 实现位于 `dpn-berry/src/geometry/region.rs`.
//!
//! ### 实例过滤 ✅
//!
//! 按置信度, 类别, 面积, 圆度过滤, 以及清除接触图像边缘的实例.
//!
//! 实现位于 `dpn-berry/src/detection.rs` 和 `dpn-berry/src/results.rs`.
//!
//! ### 粒径分布统计 ✅
//!
//! 几何平均值, 几何标准差, 单位换算, 拼接, 与真值比较.
//!
//! 实现位于 `dpn-berry/src/psd.rs`.
//!
//! ### 检测精度 ✅
//!
//! 与 Mask R-CNN `compute_ap` 语义一致的单阈值 AP.
//!
//! 实现位于 `dpn-berry/src/accuracy.rs`.
//!
//! ### 真值数据集加载 ✅
//!
//! 每图像一个目录, 每实例一个掩膜文件, 每实例一行标注.
//!
//! 实现位于 `dpn-berry/src/dataset`.
//!
//! ### 持久化 ✅
//!
//! 基于 `serde` + `bincode`, 掩膜以 zlib 压缩存储.
//!
//! 实现位于 `dpn-berry/src/storable.rs`.

/// 二维索引 `(高, 宽)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 高精度通用二维坐标 `(高, 宽)`.
type Idx2dF = (f64, f64);

/// 有符号二维坐标. 凸包等需要叉积的场合使用.
type Idx2dI64 = (i64, i64);

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

/// 实例类别编号.
pub type ClassId = u32;

pub mod consts;

mod error;

pub use error::{InvalidArgument, PsdError, PsdResult};

pub mod mask;

pub use mask::{CompactMask, MaskSlice, OwnedMask};

pub mod geometry;

mod instance;

pub use instance::{BBox, Instance, InstanceRef};

mod detection;

pub use detection::Detection;

mod results;

pub use results::{Measured, ResultSet};

mod measurand;

pub use measurand::Measurand;

mod psd;

pub use psd::{PsdComparison, SizeDistribution, Unit};

pub mod accuracy;

pub mod config;

pub mod dataset;

mod detector;

pub use detector::{analyze, Detector, RawInstances};

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        mod storable;

        pub use storable::Storable;
    }
}

pub mod prelude;
