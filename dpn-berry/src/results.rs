//! 多幅图像的检测结果集合.

use crate::config::FilterSpec;
use crate::error::PsdResult;
use crate::{ClassId, Detection, Idx2d, InstanceRef, Measurand, SizeDistribution, Unit};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 以某个测量量计算得到的粒径分布, 以及因几何退化被跳过的实例.
#[derive(Clone, Debug, PartialEq)]
pub struct Measured {
    /// 粒径分布, 单位为像素.
    pub psd: SizeDistribution,

    /// 被跳过的实例, 以 `(图像下标, 实例下标)` 表示.
    pub skipped: Vec<Idx2d>,
}

/// 按处理顺序排列的多幅图像检测结果. 独占所有 [`Detection`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResultSet {
    detections: Vec<Detection>,
}

impl ResultSet {
    /// 空集合.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一幅图像的检测结果.
    #[inline]
    pub fn push(&mut self, detection: Detection) {
        self.detections.push(detection);
    }

    /// 将 `other` 的全部检测结果按顺序追加到末尾.
    #[inline]
    pub fn append(&mut self, other: ResultSet) {
        self.detections.extend(other.detections);
    }

    /// 全部检测结果.
    #[inline]
    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
    }

    /// 图像个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// 是否没有任何图像?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// 全部图像的实例总数.
    #[inline]
    pub fn number_of_instances(&self) -> usize {
        self.detections.iter().map(Detection::number_of_instances).sum()
    }

    /// 先按图像顺序, 再按图像内实例顺序, 迭代全部实例.
    #[inline]
    pub fn instances(&self) -> impl Iterator<Item = InstanceRef<'_>> + '_ {
        self.detections.iter().flat_map(Detection::iter)
    }

    /// 全部实例的类别 (扁平化).
    pub fn class_ids(&self) -> Vec<ClassId> {
        self.detections
            .iter()
            .flat_map(|d| d.class_ids().iter().copied())
            .collect()
    }

    /// 全部实例的置信度 (扁平化).
    pub fn scores(&self) -> Vec<f32> {
        self.detections
            .iter()
            .flat_map(|d| d.scores().iter().copied())
            .collect()
    }

    /// 全部实例的面积 (扁平化).
    pub fn areas(&self) -> Vec<usize> {
        self.instances().map(|i| i.area()).collect()
    }

    /// 对每幅图像执行 `op`, 返回 `op` 返回值之和.
    fn sum_each(&mut self, mut op: impl FnMut(&mut Detection) -> usize) -> usize {
        self.detections.iter_mut().map(|d| op(d)).sum()
    }

    /// 见 [`Detection::filter_by_minimum_score`]. 返回全部图像被删除的实例总数.
    pub fn filter_by_minimum_score(&mut self, minimum_score: f32) -> usize {
        self.sum_each(|d| d.filter_by_minimum_score(minimum_score))
    }

    /// 见 [`Detection::filter_by_class`]. 返回全部图像被删除的实例总数.
    pub fn filter_by_class(&mut self, class_id: ClassId) -> usize {
        self.sum_each(|d| d.filter_by_class(class_id))
    }

    /// 见 [`Detection::filter_by_minimum_area`]. 返回全部图像被删除的实例总数.
    pub fn filter_by_minimum_area(&mut self, minimum_area: usize) -> usize {
        self.sum_each(|d| d.filter_by_minimum_area(minimum_area))
    }

    /// 见 [`Detection::filter_by_maximum_area`]. 返回全部图像被删除的实例总数.
    pub fn filter_by_maximum_area(&mut self, maximum_area: usize) -> usize {
        self.sum_each(|d| d.filter_by_maximum_area(maximum_area))
    }

    /// 见 [`Detection::filter_by_minimum_circularity`]. 返回全部图像被删除的实例总数.
    pub fn filter_by_minimum_circularity(&mut self, minimum_circularity: f64) -> usize {
        self.sum_each(|d| d.filter_by_minimum_circularity(minimum_circularity))
    }

    /// 见 [`Detection::clear_border_objects`]. 返回全部图像被删除的实例总数.
    pub fn clear_border_objects(&mut self) -> usize {
        self.sum_each(Detection::clear_border_objects)
    }

    /// 见 [`Detection::apply_filters`]. 返回全部图像被删除的实例总数.
    pub fn apply_filters(&mut self, spec: &FilterSpec) -> usize {
        self.sum_each(|d| d.apply_filters(spec))
    }

    /// 以 `measurand` 计算全部实例的粒径分布 (单位为像素).
    ///
    /// 粒径按图像顺序, 再按图像内实例顺序排列. 凸包退化的实例被跳过,
    /// 以 `(图像下标, 实例下标)` 的形式记录在返回值的 `skipped` 中.
    pub fn to_size_distribution(&self, measurand: Measurand) -> PsdResult<Measured> {
        let each = self.measure_each(measurand);
        let mut sizes = Vec::with_capacity(self.number_of_instances());
        let mut skipped = Vec::new();
        for (k, m) in each.into_iter().enumerate() {
            let m = m?;
            sizes.extend_from_slice(m.psd.sizes());
            skipped.extend(m.skipped.into_iter().map(|(_, i)| (k, i)));
        }
        if !skipped.is_empty() {
            log::warn!(
                "{measurand}: skipped {} of {} instances with degenerate geometry.",
                skipped.len(),
                self.number_of_instances()
            );
        }
        Ok(Measured {
            psd: SizeDistribution::new(sizes, Unit::Pixel)?,
            skipped,
        })
    }
}

/// 逐图像测量.
impl ResultSet {
    /// 借助 `rayon`, 并行地对每幅图像计算粒径分布, 结果顺序不变.
    #[cfg(feature = "rayon")]
    fn measure_each(&self, measurand: Measurand) -> Vec<PsdResult<Measured>> {
        self.detections
            .par_iter()
            .map(|d| d.to_size_distribution(measurand))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn measure_each(&self, measurand: Measurand) -> Vec<PsdResult<Measured>> {
        self.detections
            .iter()
            .map(|d| d.to_size_distribution(measurand))
            .collect()
    }
}

impl FromIterator<Detection> for ResultSet {
    fn from_iter<T: IntoIterator<Item = Detection>>(iter: T) -> Self {
        Self {
            detections: iter.into_iter().collect(),
        }
    }
}

impl Extend<Detection> for ResultSet {
    fn extend<T: IntoIterator<Item = Detection>>(&mut self, iter: T) {
        self.detections.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::class;
    use crate::detection::tests::sample;
    use crate::mask::testing::disk;
    use crate::{BBox, Instance};
    use ndarray::Array3;

    fn single_disk() -> Detection {
        let m = disk((100, 100), (50.0, 50.0), 10.0);
        let b: BBox = m.view().extract_bbox().unwrap();
        let inst = Instance::new(m, class::SPHERE, b, 1.0).unwrap();
        Detection::new(Array3::zeros((100, 100, 3)), vec![inst]).unwrap()
    }

    #[test]
    fn test_end_to_end_disk() {
        let mut rs: ResultSet = std::iter::once(single_disk()).collect();
        assert_eq!(rs.filter_by_minimum_score(0.5), 0);
        assert_eq!(rs.filter_by_minimum_area(100), 0);
        let m = rs.to_size_distribution(Measurand::EquivalentDiameter).unwrap();
        assert_eq!(m.psd.number_of_particles(), 1);
        assert!((m.psd.sizes()[0] - 20.0).abs() <= 1.0);
        assert_eq!(m.psd.unit(), Unit::Pixel);
    }

    #[test]
    fn test_flattened_order() {
        let rs: ResultSet = vec![sample(), single_disk(), sample()].into_iter().collect();
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.number_of_instances(), 11);
        let scores = rs.scores();
        assert_eq!(&scores[..6], &[0.95, 0.40, 0.80, 0.60, 0.99, 1.0]);
        assert_eq!(rs.class_ids().len(), 11);
        assert_eq!(rs.areas()[5], 317);
        assert_eq!(rs.instances().count(), 11);
    }

    #[test]
    fn test_filters_apply_to_every_member() {
        let mut rs: ResultSet = vec![sample(), sample()].into_iter().collect();
        assert_eq!(rs.filter_by_minimum_score(0.6), 2);
        assert_eq!(rs.filter_by_minimum_score(0.6), 0);
        assert_eq!(rs.clear_border_objects(), 2);
        assert_eq!(rs.filter_by_class(class::SPHERE), 0);
        assert_eq!(rs.filter_by_maximum_area(1000), 2);
        assert_eq!(rs.filter_by_minimum_circularity(0.5), 2);
        for d in rs.detections() {
            assert_eq!(d.scores(), &[0.95]);
        }
        assert_eq!(rs.apply_filters(&FilterSpec::default()), 0);
    }

    #[test]
    fn test_skipped_indices() {
        // 可能已被其他测试初始化.
        let _ = simple_logger::init_with_level(log::Level::Debug);
        let mut rs = ResultSet::new();
        rs.push(single_disk());
        rs.append(vec![sample(), sample()].into_iter().collect());
        let m = rs.to_size_distribution(Measurand::MaximumFeretDiameter).unwrap();
        assert_eq!(m.skipped, vec![(1, 1), (2, 1)]);
        assert_eq!(m.psd.number_of_particles(), 9);

        let eq = rs.to_size_distribution(Measurand::EquivalentDiameter).unwrap();
        let per_image: Vec<f64> = rs
            .detections()
            .iter()
            .flat_map(|d| d.to_size_distribution(Measurand::EquivalentDiameter).unwrap().psd.into_raw().0)
            .collect();
        assert_eq!(eq.psd.sizes(), per_image.as_slice());
    }

    #[test]
    fn test_empty_set() {
        let rs = ResultSet::new();
        assert!(rs.is_empty());
        let m = rs.to_size_distribution(Measurand::MajorAxisLength).unwrap();
        assert_eq!(m.psd.number_of_particles(), 0);
        assert!(m.psd.geometric_mean().is_nan());
    }
}
