//! 实例分割模型的接口, 以及模型原始输出到 [`Detection`] 的转换.

use crate::error::{InvalidArgument, PsdResult};
use crate::mask::OwnedMask;
use crate::{BBox, ClassId, Detection, ResultSet};
use ndarray::{Array, Array1, Array2, Array3, Axis, Dimension, Ix1, Ix2, Ix3, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpzError, ReadableElement};
use std::fs::File;
use std::path::Path;

/// 实例分割模型的原始输出 (Mask R-CNN 格式).
#[derive(Clone, Debug, PartialEq)]
pub struct RawInstances {
    /// 掩膜栈, 形状 `(高, 宽, 实例数)`.
    pub masks: Array3<bool>,

    /// 类别编号, 长度为实例数.
    pub class_ids: Array1<i32>,

    /// 包围盒 `(y1, x1, y2, x2)`, 形状 `(实例数, 4)`.
    pub rois: Array2<i32>,

    /// 置信度, 长度为实例数.
    pub scores: Array1<f32>,
}

impl RawInstances {
    /// 实例个数 (以掩膜栈为准).
    #[inline]
    pub fn len(&self) -> usize {
        self.masks.len_of(Axis(2))
    }

    /// 是否没有任何实例?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 从 `numpy.savez` 保存的模型输出中读取, 要求含有
    /// `masks`, `class_ids`, `rois`, `scores` 四个数组.
    pub fn read_npz<P: AsRef<Path>>(path: P) -> PsdResult<Self> {
        let mut npz = NpzReader::new(File::open(path.as_ref())?)?;
        let masks = by_key::<bool, Ix3>(&mut npz, "masks")?;
        let class_ids = by_key::<i32, Ix1>(&mut npz, "class_ids")?;
        let rois = by_key::<i32, Ix2>(&mut npz, "rois")?;
        let scores = by_key::<f32, Ix1>(&mut npz, "scores")?;
        Ok(Self {
            masks,
            class_ids,
            rois,
            scores,
        })
    }

    /// 按实例轴拆分掩膜栈, 与图像 `image` 一起构造 [`Detection`].
    ///
    /// # 注意
    ///
    /// 1. 各数组的实例数不一致, 或 `rois` 不是 `N x 4` 时返回
    ///   [`InvalidArgument::LengthMismatch`];
    /// 2. 负的类别编号返回 [`InvalidArgument::UnknownClass`];
    /// 3. 单个实例的其余校验同 [`crate::Instance::new`].
    pub fn into_detection(self, image: Array3<u8>) -> PsdResult<Detection> {
        let n = self.len();
        for len in [self.class_ids.len(), self.rois.nrows(), self.scores.len()] {
            if len != n {
                return Err(InvalidArgument::LengthMismatch(n, len).into());
            }
        }
        if n != 0 && self.rois.ncols() != 4 {
            return Err(InvalidArgument::LengthMismatch(4, self.rois.ncols()).into());
        }

        let masks = self
            .masks
            .axis_iter(Axis(2))
            .map(OwnedMask::from_bools)
            .collect();
        let class_ids = self
            .class_ids
            .iter()
            .map(|&c| ClassId::try_from(c).map_err(|_| InvalidArgument::UnknownClass(c.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let bboxes = self
            .rois
            .rows()
            .into_iter()
            .map(|r| BBox::try_from([r[0], r[1], r[2], r[3]]))
            .collect::<PsdResult<Vec<_>>>()?;
        Detection::from_parts(image, masks, class_ids, bboxes, self.scores.to_vec())
    }
}

/// 按键名读取数组. 依次尝试 `{key}.npy` 与 `{key}`.
fn by_key<A, D>(npz: &mut NpzReader<File>, key: &str) -> Result<Array<A, D>, ReadNpzError>
where
    A: ReadableElement,
    D: Dimension,
{
    match npz.by_name::<OwnedRepr<A>, D>(&format!("{key}.npy")) {
        Ok(a) => Ok(a),
        Err(_) => npz.by_name::<OwnedRepr<A>, D>(key),
    }
}

/// 实例分割模型.
///
/// 模型本身 (网络结构, 权重, 推理) 不属于本库; 调用方通过实现该 trait 接入.
pub trait Detector {
    /// 对单幅图像 `(高, 宽, 通道)` 做实例分割.
    fn detect(&mut self, image: &Array3<u8>) -> PsdResult<RawInstances>;
}

/// 依次用 `detector` 处理 `images`, 按输入顺序收集为 [`ResultSet`].
///
/// 任一图像处理失败即返回该错误.
pub fn analyze<D, I>(detector: &mut D, images: I) -> PsdResult<ResultSet>
where
    D: Detector + ?Sized,
    I: IntoIterator<Item = Array3<u8>>,
{
    let mut ans = ResultSet::new();
    for (i, image) in images.into_iter().enumerate() {
        let raw = detector.detect(&image)?;
        log::debug!("Image #{i}: {} instances detected.", raw.len());
        ans.push(raw.into_detection(image)?);
    }
    Ok(ans)
}
