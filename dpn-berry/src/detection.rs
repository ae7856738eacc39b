//! 单幅图像的检测结果.

use crate::config::FilterSpec;
use crate::error::{InvalidArgument, PsdResult};
use crate::mask::OwnedMask;
use crate::{BBox, ClassId, Instance, InstanceRef, Measurand, Measured, SizeDistribution, Unit};
use ndarray::Array3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 单幅图像中的全部颗粒实例, 以及图像本身和少量元数据.
///
/// 实例的四个属性 (掩膜, 类别, 包围盒, 置信度) 分别存储在四个等长且下标对齐的
/// `Vec` 中. 所有过滤操作都就地删除实例并保持剩余实例的相对顺序.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Detection {
    /// 原始图像 `(高, 宽, 通道)`.
    image: Array3<u8>,

    // 使用 `Vec<Instance>` 会让按属性的批量访问变得笨重,
    // 故使用四个 `Vec` 分离存储.
    masks: Vec<OwnedMask>,
    class_ids: Vec<ClassId>,
    bboxes: Vec<BBox>,
    scores: Vec<f32>,

    data_set: Option<String>,
    image_file_name: Option<String>,
    comment: Option<String>,
}

impl Detection {
    /// 由原始图像和实例列表构造.
    ///
    /// 任一实例掩膜的形状与图像的 `(高, 宽)` 不符时, 返回
    /// [`InvalidArgument::ShapeMismatch`].
    pub fn new(image: Array3<u8>, instances: Vec<Instance>) -> PsdResult<Self> {
        let (h, w, _) = image.dim();
        let n = instances.len();
        let mut ans = Self {
            image,
            masks: Vec::with_capacity(n),
            class_ids: Vec::with_capacity(n),
            bboxes: Vec::with_capacity(n),
            scores: Vec::with_capacity(n),
            data_set: None,
            image_file_name: None,
            comment: None,
        };
        for inst in instances {
            let sh = inst.mask.view().shape();
            if sh != (h, w) {
                return Err(InvalidArgument::ShapeMismatch((h, w), sh).into());
            }
            let (mask, class_id, bbox, score) = inst.into_parts();
            ans.masks.push(mask);
            ans.class_ids.push(class_id);
            ans.bboxes.push(bbox);
            ans.scores.push(score);
        }
        Ok(ans)
    }

    /// 由四个下标对齐的属性列表构造.
    ///
    /// 列表长度不一致时返回 [`InvalidArgument::LengthMismatch`];
    /// 单个实例的校验同 [`Instance::new`].
    pub fn from_parts(
        image: Array3<u8>,
        masks: Vec<OwnedMask>,
        class_ids: Vec<ClassId>,
        bboxes: Vec<BBox>,
        scores: Vec<f32>,
    ) -> PsdResult<Self> {
        let n = masks.len();
        for len in [class_ids.len(), bboxes.len(), scores.len()] {
            if len != n {
                return Err(InvalidArgument::LengthMismatch(n, len).into());
            }
        }
        let instances = itertools::izip!(masks, class_ids, bboxes, scores)
            .map(|(m, c, b, s)| Instance::new(m, c, b, s))
            .collect::<PsdResult<Vec<_>>>()?;
        Self::new(image, instances)
    }

    /// 设置数据集名称.
    #[inline]
    pub fn with_data_set(mut self, name: impl Into<String>) -> Self {
        self.data_set = Some(name.into());
        self
    }

    /// 设置图像文件名.
    #[inline]
    pub fn with_image_file_name(mut self, name: impl Into<String>) -> Self {
        self.image_file_name = Some(name.into());
        self
    }

    /// 设置备注.
    #[inline]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// 原始图像.
    #[inline]
    pub fn image(&self) -> &Array3<u8> {
        &self.image
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn image_shape(&self) -> (usize, usize) {
        let (h, w, _) = self.image.dim();
        (h, w)
    }

    /// 全部实例掩膜.
    #[inline]
    pub fn masks(&self) -> &[OwnedMask] {
        &self.masks
    }

    /// 全部实例类别.
    #[inline]
    pub fn class_ids(&self) -> &[ClassId] {
        &self.class_ids
    }

    /// 全部包围盒.
    #[inline]
    pub fn bboxes(&self) -> &[BBox] {
        &self.bboxes
    }

    /// 全部置信度.
    #[inline]
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// 数据集名称.
    #[inline]
    pub fn data_set(&self) -> Option<&str> {
        self.data_set.as_deref()
    }

    /// 图像文件名.
    #[inline]
    pub fn image_file_name(&self) -> Option<&str> {
        self.image_file_name.as_deref()
    }

    /// 备注.
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// 实例个数.
    #[inline]
    pub fn number_of_instances(&self) -> usize {
        self.masks.len()
    }

    /// 是否没有任何实例?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// 获得第 `index` 个实例. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<InstanceRef<'_>> {
        (index < self.number_of_instances()).then(|| self.at(index))
    }

    /// 获得第 `index` 个实例. 越界时 panic.
    #[inline]
    fn at(&self, index: usize) -> InstanceRef<'_> {
        InstanceRef::new(
            self.masks[index].view(),
            self.class_ids[index],
            self.bboxes[index],
            self.scores[index],
        )
    }

    /// 按顺序迭代全部实例.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = InstanceRef<'_>> + '_ {
        (0..self.number_of_instances()).map(|i| self.at(i))
    }

    /// 全部实例的面积.
    pub fn areas(&self) -> Vec<usize> {
        self.iter().map(|i| i.area()).collect()
    }

    /// 全部实例的周长.
    pub fn perimeters(&self) -> Vec<usize> {
        self.iter().map(|i| i.perimeter()).collect()
    }

    /// 全部实例的圆度.
    pub fn circularities(&self) -> Vec<f64> {
        self.iter().map(|i| i.circularity()).collect()
    }
}

/// 过滤操作.
impl Detection {
    /// 保留 `keep[i] == true` 的实例, 返回被删除的实例个数.
    ///
    /// `keep` 长度与实例个数不符时返回 [`InvalidArgument::LengthMismatch`].
    pub fn filter_by_list(&mut self, keep: &[bool]) -> PsdResult<usize> {
        if keep.len() != self.number_of_instances() {
            return Err(InvalidArgument::LengthMismatch(self.number_of_instances(), keep.len()).into());
        }
        Ok(self.retain_by(keep))
    }

    /// 保留 `score >= minimum_score` 的实例, 返回被删除的实例个数.
    pub fn filter_by_minimum_score(&mut self, minimum_score: f32) -> usize {
        let keep: Vec<bool> = self.scores.iter().map(|&s| s >= minimum_score).collect();
        self.retain_by(&keep)
    }

    /// 保留类别恰好为 `class_id` 的实例, 返回被删除的实例个数.
    pub fn filter_by_class(&mut self, class_id: ClassId) -> usize {
        let keep: Vec<bool> = self.class_ids.iter().map(|&c| c == class_id).collect();
        self.retain_by(&keep)
    }

    /// 保留 `area >= minimum_area` 的实例, 返回被删除的实例个数.
    pub fn filter_by_minimum_area(&mut self, minimum_area: usize) -> usize {
        let keep: Vec<bool> = self.iter().map(|i| i.area() >= minimum_area).collect();
        self.retain_by(&keep)
    }

    /// 保留 `area <= maximum_area` 的实例, 返回被删除的实例个数.
    pub fn filter_by_maximum_area(&mut self, maximum_area: usize) -> usize {
        let keep: Vec<bool> = self.iter().map(|i| i.area() <= maximum_area).collect();
        self.retain_by(&keep)
    }

    /// 保留 `circularity >= minimum_circularity` 的实例, 返回被删除的实例个数.
    pub fn filter_by_minimum_circularity(&mut self, minimum_circularity: f64) -> usize {
        let keep: Vec<bool> = self
            .iter()
            .map(|i| i.circularity() >= minimum_circularity)
            .collect();
        self.retain_by(&keep)
    }

    /// 删除清除接触图像边缘的 8-连通区域后不再有任何像素的实例,
    /// 返回被删除的实例个数.
    ///
    /// # 注意
    ///
    /// 保留下来的实例的掩膜不会被修改.
    pub fn clear_border_objects(&mut self) -> usize {
        let keep: Vec<bool> = self.iter().map(|i| i.survives_border_clearing()).collect();
        self.retain_by(&keep)
    }

    /// 按 分数 -> 类别 -> 最小面积 -> 最大面积 -> 圆度 -> 边缘 的顺序
    /// 应用 `spec` 中配置的全部过滤, 返回被删除的实例总数.
    pub fn apply_filters(&mut self, spec: &FilterSpec) -> usize {
        let mut removed = 0;
        if let Some(th) = spec.minimum_score {
            removed += self.filter_by_minimum_score(th);
        }
        if let Some(c) = spec.class_id {
            removed += self.filter_by_class(c);
        }
        if let Some(a) = spec.minimum_area {
            removed += self.filter_by_minimum_area(a);
        }
        if let Some(a) = spec.maximum_area {
            removed += self.filter_by_maximum_area(a);
        }
        if let Some(th) = spec.minimum_circularity {
            removed += self.filter_by_minimum_circularity(th);
        }
        if spec.clear_border {
            removed += self.clear_border_objects();
        }
        removed
    }

    /// 内部方法. 保留 `keep[i] == true` 的实例并记录日志.
    fn retain_by(&mut self, keep: &[bool]) -> usize {
        debug_assert_eq!(keep.len(), self.number_of_instances());
        let total = self.number_of_instances();
        let kept = keep.iter().filter(|k| **k).count();
        let removed = total - kept;
        let pct = if total == 0 {
            0.0
        } else {
            removed as f64 / total as f64 * 100.0
        };
        log::info!("Filtered {removed} of {total} instances (~{pct:.1} %).");

        if removed != 0 {
            compress(&mut self.masks, keep);
            compress(&mut self.class_ids, keep);
            compress(&mut self.bboxes, keep);
            compress(&mut self.scores, keep);
        }
        removed
    }
}

/// 按 `keep` 就地筛选 `v`, 保持相对顺序.
fn compress<T>(v: &mut Vec<T>, keep: &[bool]) {
    let old = std::mem::take(v);
    *v = old
        .into_iter()
        .zip(keep.iter())
        .filter_map(|(x, &k)| k.then_some(x))
        .collect();
}

/// 测量.
impl Detection {
    /// 对每个实例以 `measurand` 测量粒径, 结果与实例一一对应.
    ///
    /// 借助 `rayon` 并行计算, 结果顺序不变.
    #[cfg(feature = "rayon")]
    pub fn measure_each(&self, measurand: Measurand) -> Vec<PsdResult<f64>> {
        (0..self.number_of_instances())
            .into_par_iter()
            .map(|i| measurand.measure(&self.at(i)))
            .collect()
    }

    /// 对每个实例以 `measurand` 测量粒径, 结果与实例一一对应.
    #[cfg(not(feature = "rayon"))]
    pub fn measure_each(&self, measurand: Measurand) -> Vec<PsdResult<f64>> {
        self.iter().map(|i| measurand.measure(&i)).collect()
    }

    /// 以 `measurand` 计算粒径分布 (单位为像素).
    ///
    /// 凸包退化的实例被跳过, 以 `warn` 级别记录, 并以 `(0, 实例下标)`
    /// 的形式出现在返回值的 `skipped` 中. 其它错误直接返回.
    pub fn to_size_distribution(&self, measurand: Measurand) -> PsdResult<Measured> {
        let mut sizes = Vec::with_capacity(self.number_of_instances());
        let mut skipped = Vec::new();
        for (i, r) in self.measure_each(measurand).into_iter().enumerate() {
            match r {
                Ok(v) => sizes.push(v),
                Err(e) if e.is_degenerate() => {
                    log::warn!(
                        "Skipped instance {i} of {} ({measurand}): {e}",
                        self.image_file_name().unwrap_or("<unnamed>")
                    );
                    skipped.push((0, i));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Measured {
            psd: SizeDistribution::new(sizes, Unit::Pixel)?,
            skipped,
        })
    }
}
