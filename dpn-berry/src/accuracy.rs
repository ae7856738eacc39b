//! 检测精度: 基于掩膜 IoU 的单阈值平均精度 (AP).
//!
//! 匹配与积分规则与 Mask R-CNN 的 `compute_matches` / `compute_ap` 一致:
//!
//! 1. 检测实例按置信度从高到低 (稳定) 排序;
//! 2. 每个检测实例按 IoU 从高到低扫描真值实例: 已匹配的真值跳过,
//!   IoU 低于阈值即停止, 类别相同才匹配;
//! 3. 累计得到每个位置的精度与召回率, 两端分别补上 `(召回 0, 精度 0)`
//!   与 `(召回 1, 精度 0)`, 精度从右向左取单调包络,
//!   最后在召回率变化处累加 `Δ召回 * 精度`.

use crate::error::{InvalidArgument, PsdResult};
use crate::mask::MaskSlice;
use crate::{Detection, ResultSet};
use ndarray::Array2;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

pub use crate::consts::DEFAULT_IOU_THRESHOLD;

/// 两个掩膜的 IoU. 两者都为空时返回 `0`.
///
/// 形状不同时返回 [`InvalidArgument::ShapeMismatch`].
pub fn mask_iou(a: &MaskSlice<'_>, b: &MaskSlice<'_>) -> PsdResult<f64> {
    if a.shape() != b.shape() {
        return Err(InvalidArgument::ShapeMismatch(a.shape(), b.shape()).into());
    }
    let (inter, union) = a.intersection_union(b);
    Ok(if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    })
}

/// IoU 矩阵, 形状为 `(检测实例数, 真值实例数)`.
///
/// 两幅图像的分辨率不同时返回 [`InvalidArgument::ShapeMismatch`].
pub fn compute_overlaps(pred: &Detection, gt: &Detection) -> PsdResult<Array2<f64>> {
    if pred.image_shape() != gt.image_shape() {
        return Err(InvalidArgument::ShapeMismatch(gt.image_shape(), pred.image_shape()).into());
    }
    let mut ans = Array2::zeros((pred.number_of_instances(), gt.number_of_instances()));
    for (i, p) in pred.masks().iter().enumerate() {
        for (j, g) in gt.masks().iter().enumerate() {
            ans[(i, j)] = mask_iou(&p.view(), &g.view())?;
        }
    }
    Ok(ans)
}

/// 检测实例与真值实例的匹配结果.
#[derive(Clone, Debug)]
pub struct Matches {
    /// 按置信度从高到低排列的检测实例下标.
    pub order: Vec<usize>,

    /// `pred_match[k]`: 第 `k` 个 (排序后) 检测实例匹配到的真值下标.
    pub pred_match: Vec<Option<usize>>,

    /// `gt_match[j]`: 第 `j` 个真值实例匹配到的检测实例下标 (排序前).
    pub gt_match: Vec<Option<usize>>,

    /// IoU 矩阵, 行按排序前的检测实例下标排列.
    pub overlaps: Array2<f64>,
}

#[inline]
fn check_threshold(iou_threshold: f64) -> Result<(), InvalidArgument> {
    if (0.0..=1.0).contains(&iou_threshold) {
        Ok(())
    } else {
        Err(InvalidArgument::ThresholdOutOfRange(iou_threshold))
    }
}

/// 以 IoU 阈值 `iou_threshold` 贪心匹配检测实例与真值实例.
pub fn compute_matches(pred: &Detection, gt: &Detection, iou_threshold: f64) -> PsdResult<Matches> {
    check_threshold(iou_threshold)?;
    let overlaps = compute_overlaps(pred, gt)?;

    let mut order: Vec<usize> = (0..pred.number_of_instances()).collect();
    order.sort_by_key(|&i| Reverse(OrderedFloat(pred.scores()[i])));

    let mut pred_match = vec![None; order.len()];
    let mut gt_match = vec![None; gt.number_of_instances()];
    let mut gt_order: Vec<usize> = (0..gt.number_of_instances()).collect();

    for (k, &i) in order.iter().enumerate() {
        gt_order.sort_by_key(|&j| Reverse(OrderedFloat(overlaps[(i, j)])));
        for &j in gt_order.iter() {
            if gt_match[j].is_some() {
                continue;
            }
            if overlaps[(i, j)] < iou_threshold {
                break;
            }
            if pred.class_ids()[i] == gt.class_ids()[j] {
                gt_match[j] = Some(i);
                pred_match[k] = Some(j);
                break;
            }
        }
    }

    Ok(Matches {
        order,
        pred_match,
        gt_match,
        overlaps,
    })
}

/// 单幅图像的 AP 计算明细.
#[derive(Clone, Debug)]
pub struct ApReport {
    /// 平均精度, 位于 `[0, 1]`.
    pub ap: f64,

    /// 补齐两端并取单调包络后的精度.
    pub precisions: Vec<f64>,

    /// 补齐两端后的召回率.
    pub recalls: Vec<f64>,

    /// 匹配结果.
    pub matches: Matches,
}

/// 计算单幅图像的 AP 及其明细.
///
/// # 注意
///
/// 1. 没有真值实例时返回 [`InvalidArgument::EmptyGroundTruth`];
/// 2. 没有检测实例时 AP 为 `0`;
/// 3. `iou_threshold` 不在 `[0, 1]` 内时返回 [`InvalidArgument::ThresholdOutOfRange`].
pub fn compute_ap(pred: &Detection, gt: &Detection, iou_threshold: f64) -> PsdResult<ApReport> {
    if gt.is_empty() {
        return Err(InvalidArgument::EmptyGroundTruth.into());
    }
    let matches = compute_matches(pred, gt, iou_threshold)?;
    let n_gt = gt.number_of_instances() as f64;

    let n = matches.pred_match.len();
    let mut precisions = Vec::with_capacity(n + 2);
    let mut recalls = Vec::with_capacity(n + 2);
    precisions.push(0.0);
    recalls.push(0.0);
    let mut hit = 0usize;
    for (k, m) in matches.pred_match.iter().enumerate() {
        hit += usize::from(m.is_some());
        precisions.push(hit as f64 / (k + 1) as f64);
        recalls.push(hit as f64 / n_gt);
    }
    precisions.push(0.0);
    recalls.push(1.0);

    for i in (0..precisions.len() - 1).rev() {
        precisions[i] = precisions[i].max(precisions[i + 1]);
    }

    let ap = (1..recalls.len())
        .filter(|&i| recalls[i] != recalls[i - 1])
        .map(|i| (recalls[i] - recalls[i - 1]) * precisions[i])
        .sum();

    Ok(ApReport {
        ap,
        precisions,
        recalls,
        matches,
    })
}

/// 单幅图像的 AP.
#[inline]
pub fn average_precision(pred: &Detection, gt: &Detection, iou_threshold: f64) -> PsdResult<f64> {
    compute_ap(pred, gt, iou_threshold).map(|r| r.ap)
}

/// 逐图像计算 AP, 返回 `(每幅图像的 AP, 平均值)`.
///
/// 两个集合的图像个数不同时返回 [`InvalidArgument::LengthMismatch`].
/// 空集合的平均值为 `NaN`.
pub fn average_precisions(
    pred: &ResultSet,
    gt: &ResultSet,
    iou_threshold: f64,
) -> PsdResult<(Vec<f64>, f64)> {
    if pred.len() != gt.len() {
        return Err(InvalidArgument::LengthMismatch(gt.len(), pred.len()).into());
    }
    let aps = pred
        .detections()
        .iter()
        .zip(gt.detections())
        .map(|(p, g)| average_precision(p, g, iou_threshold))
        .collect::<PsdResult<Vec<_>>>()?;
    let mean = aps.iter().sum::<f64>() / aps.len() as f64;
    log::debug!("mAP@{iou_threshold} over {} images: {mean:.4}", aps.len());
    Ok((aps, mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::class;
    use crate::mask::testing::rect;
    use crate::{ClassId, Instance, PsdError};
    use ndarray::Array3;

    const SH: (usize, usize) = (64, 64);

    fn detection(items: &[((usize, usize, usize, usize), ClassId, f32)]) -> Detection {
        let instances = items
            .iter()
            .map(|&(r, c, s)| {
                let m = rect(SH, r);
                let b = m.view().extract_bbox().unwrap();
                Instance::new(m, c, b, s).unwrap()
            })
            .collect();
        Detection::new(Array3::zeros((SH.0, SH.1, 1)), instances).unwrap()
    }

    const A: (usize, usize, usize, usize) = (0, 0, 20, 20);
    const B: (usize, usize, usize, usize) = (30, 30, 50, 50);
    const NOWHERE: (usize, usize, usize, usize) = (55, 0, 60, 5);

    #[test]
    fn test_mask_iou() {
        let a = rect(SH, (10, 10, 30, 30));
        let b = rect(SH, (10, 20, 30, 40));
        let iou = mask_iou(&a.view(), &b.view()).unwrap();
        assert!((iou - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(mask_iou(&a.view(), &a.view()).unwrap(), 1.0);
        let other = rect((8, 8), (0, 0, 2, 2));
        assert!(mask_iou(&a.view(), &other.view()).is_err());
    }

    #[test]
    fn test_perfect_detection() {
        let gt = detection(&[(A, class::SPHERE, 1.0), (B, class::CUBE, 1.0)]);
        let r = compute_ap(&gt, &gt, DEFAULT_IOU_THRESHOLD).unwrap();
        assert_eq!(r.ap, 1.0);
        assert_eq!(r.matches.gt_match, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_false_positive_in_between() {
        let gt = detection(&[(A, class::SPHERE, 1.0), (B, class::SPHERE, 1.0)]);
        let pred = detection(&[
            (B, class::SPHERE, 0.7),
            (NOWHERE, class::SPHERE, 0.8),
            (A, class::SPHERE, 0.9),
        ]);
        let r = compute_ap(&pred, &gt, 0.5).unwrap();
        assert_eq!(r.matches.order, vec![2, 1, 0]);
        assert_eq!(r.matches.pred_match, vec![Some(0), None, Some(1)]);
        assert_eq!(r.recalls, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!((r.ap - (0.5 + 0.5 * 2.0 / 3.0)).abs() < 1e-12);
        // 精度包络单调不增.
        assert!(r.precisions.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_class_and_threshold() {
        let gt = detection(&[(A, class::SPHERE, 1.0)]);
        let wrong_class = detection(&[(A, class::CUBE, 0.9)]);
        assert_eq!(average_precision(&wrong_class, &gt, 0.5).unwrap(), 0.0);

        let gt = detection(&[((10, 10, 30, 30), class::SPHERE, 1.0)]);
        let shifted = detection(&[((10, 20, 30, 40), class::SPHERE, 0.9)]);
        assert_eq!(average_precision(&shifted, &gt, 0.5).unwrap(), 0.0);
        assert_eq!(average_precision(&shifted, &gt, 0.3).unwrap(), 1.0);
        assert!(matches!(
            average_precision(&shifted, &gt, 1.5),
            Err(PsdError::InvalidArgument(InvalidArgument::ThresholdOutOfRange(_)))
        ));
    }

    #[test]
    fn test_each_ground_truth_matched_once() {
        let gt = detection(&[(A, class::SPHERE, 1.0), (B, class::SPHERE, 1.0)]);
        let pred = detection(&[(A, class::SPHERE, 0.9), (A, class::SPHERE, 0.8)]);
        let r = compute_ap(&pred, &gt, 0.5).unwrap();
        assert_eq!(r.matches.pred_match, vec![Some(0), None]);
        assert!((r.ap - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_cases() {
        let gt = detection(&[(A, class::SPHERE, 1.0)]);
        let none = detection(&[]);
        assert_eq!(average_precision(&none, &gt, 0.5).unwrap(), 0.0);
        assert!(matches!(
            average_precision(&gt, &none, 0.5),
            Err(PsdError::InvalidArgument(InvalidArgument::EmptyGroundTruth))
        ));
    }

    #[test]
    fn test_result_set_mean() {
        let gt_a = detection(&[(A, class::SPHERE, 1.0)]);
        let gt_b = detection(&[(B, class::CUBE, 1.0)]);
        let pred: ResultSet = vec![gt_a.clone(), detection(&[])].into_iter().collect();
        let gt: ResultSet = vec![gt_a, gt_b].into_iter().collect();
        let (aps, mean) = average_precisions(&pred, &gt, 0.5).unwrap();
        assert_eq!(aps, vec![1.0, 0.0]);
        assert_eq!(mean, 0.5);

        let short: ResultSet = pred.detections()[..1].iter().cloned().collect();
        assert!(average_precisions(&short, &gt, 0.5).is_err());
    }
}
