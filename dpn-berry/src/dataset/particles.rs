//! 颗粒图像真值数据集加载器.
//!
//! 目录约定:
//!
//! ```text
//! {root}/{subset}/{image_id}/images/{image_id}.png
//! {root}/{subset}/{image_id}/masks/*.png        每个实例一张, 按文件名排序
//! {root}/{subset}/{image_id}/annotations.txt    每行一个类别名, 与掩膜顺序一致
//! ```
//!
//! 提供迭代器风格的数据集获取模式.

use super::GtMode;
use crate::consts::class_id_of;
use crate::error::{InvalidArgument, PsdError, PsdResult};
use crate::geometry::{equivalent_diameter, major_bbox_side_length};
use crate::mask::OwnedMask;
use crate::{ClassId, Detection, Instance, ResultSet, SizeDistribution, Unit};
use ndarray::{Array2, Array3};
use std::fs;
use std::path::{Path, PathBuf};

/// 标注文件名.
const ANNOTATION_FILE: &str = "annotations.txt";

/// 单幅图像的真值.
#[derive(Clone, Debug)]
pub struct GroundTruthSample {
    /// 图像编号 (目录名).
    pub image_id: String,

    /// 子集名称.
    pub subset: String,

    /// RGB 图像 `(高, 宽, 3)`.
    pub image: Array3<u8>,

    /// 实例掩膜, 按文件名排序.
    pub masks: Vec<OwnedMask>,

    /// 实例类别, 与 `masks` 下标对齐.
    pub class_ids: Vec<ClassId>,
}

impl GroundTruthSample {
    /// 转换为 [`Detection`]. 包围盒由掩膜提取, 置信度均为 `1`.
    pub fn into_detection(self) -> PsdResult<Detection> {
        let file_name = format!("{}.png", self.image_id);
        let instances = self
            .masks
            .into_iter()
            .zip(self.class_ids)
            .map(|(m, c)| Instance::from_mask(m, c))
            .collect::<PsdResult<Vec<_>>>()?;
        Ok(Detection::new(self.image, instances)?
            .with_data_set(self.subset)
            .with_image_file_name(file_name))
    }

    /// 按 `mode` 计算全部实例的粒径 (像素).
    ///
    /// [`GtMode::Mask`] 使用掩膜像素个数 (不填充空洞) 的等效直径;
    /// [`GtMode::Bbox`] 使用由掩膜提取的包围盒的最大边长.
    pub fn sizes(&self, mode: GtMode) -> PsdResult<Vec<f64>> {
        self.masks
            .iter()
            .map(|m| match mode {
                GtMode::Mask => equivalent_diameter(m.view().area() as f64),
                GtMode::Bbox => m
                    .view()
                    .extract_bbox()
                    .map(|b| major_bbox_side_length(&b))
                    .ok_or_else(|| PsdError::from(InvalidArgument::EmptyMask)),
            })
            .collect()
    }
}

/// 真值数据集加载器. 按图像编号的字典序迭代 `(图像编号, 真值)`.
#[derive(Debug)]
pub struct GroundTruthDataset {
    path: PathBuf,
    subset: String,
    ids_rev: Vec<String>,
    monoclass: Option<ClassId>,
}

impl GroundTruthDataset {
    /// 打开 `root` 下的子集 `subset`, 至多加载前 `limit` 幅图像.
    ///
    /// # 注意
    ///
    /// 子集目录不存在或不可读时返回 [`PsdError::Io`].
    /// 文件内容在迭代时才读取, 读取错误由迭代器逐项返回.
    pub fn open<P: AsRef<Path>>(root: P, subset: &str, limit: Option<usize>) -> PsdResult<Self> {
        let path = root.as_ref().join(subset);
        let mut ids = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort_unstable();
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        log::debug!("Found {} images under {}", ids.len(), path.display());
        ids.reverse();

        Ok(Self {
            path,
            subset: subset.to_string(),
            ids_rev: ids,
            monoclass: None,
        })
    }

    /// 单类别数据集: 不读取标注文件, 全部实例的类别为 `class_name`.
    pub fn with_monoclass(mut self, class_name: &str) -> PsdResult<Self> {
        let id = class_id_of(class_name)
            .ok_or_else(|| InvalidArgument::UnknownClass(class_name.to_string()))?;
        self.monoclass = Some(id);
        Ok(self)
    }

    /// 子集名称.
    #[inline]
    pub fn subset(&self) -> &str {
        &self.subset
    }

    /// 读取图像 `image_id` 的真值.
    pub fn load(&self, image_id: &str) -> PsdResult<GroundTruthSample> {
        let dir = self.path.join(image_id);
        let image = read_rgb(&dir.join("images").join(format!("{image_id}.png")))?;

        let mut mask_files: Vec<PathBuf> = fs::read_dir(dir.join("masks"))?
            .map(|e| e.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        mask_files.retain(|p| {
            p.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("png"))
        });
        mask_files.sort_unstable();
        let masks = mask_files
            .iter()
            .map(|p| read_mask(p))
            .collect::<PsdResult<Vec<_>>>()?;

        let class_ids = match self.monoclass {
            Some(id) => vec![id; masks.len()],
            None => read_annotations(&dir.join(ANNOTATION_FILE))?,
        };
        if class_ids.len() != masks.len() {
            return Err(InvalidArgument::LengthMismatch(masks.len(), class_ids.len()).into());
        }

        Ok(GroundTruthSample {
            image_id: image_id.to_string(),
            subset: self.subset.clone(),
            image,
            masks,
            class_ids,
        })
    }

    /// 将剩余图像的真值全部转换为 [`ResultSet`].
    pub fn into_result_set(self) -> PsdResult<ResultSet> {
        self.map(|(_, s)| s.and_then(GroundTruthSample::into_detection))
            .collect()
    }

    /// 剩余图像全部真值实例的粒径分布, 单位为像素.
    pub fn ground_truth_size_distribution(self, mode: GtMode) -> PsdResult<SizeDistribution> {
        let mut sizes = Vec::new();
        for (_, sample) in self {
            sizes.extend(sample?.sizes(mode)?);
        }
        SizeDistribution::new(sizes, Unit::Pixel)
    }
}

impl Iterator for GroundTruthDataset {
    type Item = (String, PsdResult<GroundTruthSample>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids_rev.pop()?;
        let data = self.load(&id);
        Some((id, data))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.ids_rev.len(), Some(self.ids_rev.len()))
    }
}

impl ExactSizeIterator for GroundTruthDataset {
    #[inline]
    fn len(&self) -> usize {
        self.ids_rev.len()
    }
}

fn read_rgb(path: &Path) -> PsdResult<Array3<u8>> {
    let img = image::open(path)?.to_rgb8();
    let (w, h) = img.dimensions();
    let sh = (h as usize, w as usize, 3);
    let raw = img.into_raw();
    let len = raw.len();
    Array3::from_shape_vec(sh, raw)
        .map_err(|_| InvalidArgument::LengthMismatch(sh.0 * sh.1 * sh.2, len).into())
}

/// 非零像素为前景.
fn read_mask(path: &Path) -> PsdResult<OwnedMask> {
    let img = image::open(path)?.to_luma8();
    let (w, h) = img.dimensions();
    let sh = (h as usize, w as usize);
    let raw = img.into_raw();
    let len = raw.len();
    let data = Array2::from_shape_vec(sh, raw)
        .map_err(|_| PsdError::from(InvalidArgument::LengthMismatch(sh.0 * sh.1, len)))?;
    Ok(OwnedMask::from_raw(data))
}

/// 空行被忽略.
fn read_annotations(path: &Path) -> PsdResult<Vec<ClassId>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            class_id_of(l)
                .ok_or_else(|| PsdError::from(InvalidArgument::UnknownClass(l.trim().to_string())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::class;
    use image::{GrayImage, Luma, RgbImage};

    /// 在 `root/subset/{id}` 下写入一幅 32x32 图像及若干正方形实例.
    fn write_sample(root: &Path, subset: &str, id: &str, squares: &[(u32, u32, u32)], names: Option<&[&str]>) {
        let dir = root.join(subset).join(id);
        fs::create_dir_all(dir.join("images")).unwrap();
        fs::create_dir_all(dir.join("masks")).unwrap();
        RgbImage::new(32, 32)
            .save(dir.join("images").join(format!("{id}.png")))
            .unwrap();
        for (k, &(y, x, s)) in squares.iter().enumerate() {
            let mut m = GrayImage::new(32, 32);
            for yy in y..y + s {
                for xx in x..x + s {
                    m.put_pixel(xx, yy, Luma([255]));
                }
            }
            m.save(dir.join("masks").join(format!("m{k:02}.png"))).unwrap();
        }
        fs::write(dir.join("masks").join("notes.txt"), "ignored").unwrap();
        if let Some(names) = names {
            fs::write(dir.join(ANNOTATION_FILE), names.join("\n") + "\n").unwrap();
        }
    }

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        write_sample(root.path(), "validation", "b", &[(2, 2, 4)], Some(&["cube"]));
        write_sample(
            root.path(),
            "validation",
            "a",
            &[(1, 1, 10), (20, 20, 5)],
            Some(&["sphere", "Cube"]),
        );
        root
    }

    #[test]
    fn test_iterate_in_order() {
        let root = fixture();
        let ds = GroundTruthDataset::open(root.path(), "validation", None).unwrap();
        assert_eq!(ds.len(), 2);
        let items: Vec<_> = ds.collect();
        assert_eq!(items[0].0, "a");
        assert_eq!(items[1].0, "b");

        let a = items[0].1.as_ref().unwrap();
        assert_eq!(a.image.dim(), (32, 32, 3));
        assert_eq!(a.class_ids, vec![class::SPHERE, class::CUBE]);
        assert_eq!(a.masks[0].view().area(), 100);
        assert_eq!(a.masks[1].view().area(), 25);
    }

    #[test]
    fn test_limit_and_missing_subset() {
        let root = fixture();
        let ds = GroundTruthDataset::open(root.path(), "validation", Some(1)).unwrap();
        assert_eq!(ds.len(), 1);
        assert!(GroundTruthDataset::open(root.path(), "train", None).is_err());
    }

    #[test]
    fn test_into_detection() {
        let root = fixture();
        let rs = GroundTruthDataset::open(root.path(), "validation", None)
            .unwrap()
            .into_result_set()
            .unwrap();
        assert_eq!(rs.len(), 2);
        let d = &rs.detections()[0];
        assert_eq!(d.scores(), &[1.0, 1.0]);
        assert_eq!(d.bboxes()[0].to_array(), [1, 1, 11, 11]);
        assert_eq!(d.data_set(), Some("validation"));
        assert_eq!(d.image_file_name(), Some("a.png"));
    }

    #[test]
    fn test_ground_truth_size_distribution() {
        let root = fixture();
        let open = || GroundTruthDataset::open(root.path(), "validation", None).unwrap();

        let psd = open().ground_truth_size_distribution(GtMode::Bbox).unwrap();
        assert_eq!(psd.sizes(), &[10.0, 5.0, 4.0]);
        assert_eq!(psd.unit(), Unit::Pixel);

        let psd = open().ground_truth_size_distribution(GtMode::Mask).unwrap();
        let expected = (4.0 * 100.0 / std::f64::consts::PI).sqrt();
        assert!((psd.sizes()[0] - expected).abs() < 1e-9);
        assert_eq!(psd.number_of_particles(), 3);
    }

    #[test]
    fn test_annotation_errors() {
        let root = tempfile::tempdir().unwrap();
        write_sample(root.path(), "val", "x", &[(1, 1, 3), (8, 8, 3)], Some(&["sphere"]));
        write_sample(root.path(), "val", "y", &[(1, 1, 3)], Some(&["pyramid"]));
        write_sample(root.path(), "val", "z", &[(1, 1, 3)], None);

        let items: Vec<_> = GroundTruthDataset::open(root.path(), "val", None).unwrap().collect();
        assert!(matches!(
            items[0].1,
            Err(PsdError::InvalidArgument(InvalidArgument::LengthMismatch(2, 1)))
        ));
        assert!(matches!(
            items[1].1,
            Err(PsdError::InvalidArgument(InvalidArgument::UnknownClass(_)))
        ));
        assert!(matches!(items[2].1, Err(PsdError::Io(_))));

        let mono = GroundTruthDataset::open(root.path(), "val", None)
            .unwrap()
            .with_monoclass("sphere")
            .unwrap();
        let sample = mono.load("z").unwrap();
        assert_eq!(sample.class_ids, vec![class::SPHERE]);
        assert!(GroundTruthDataset::open(root.path(), "val", None)
            .unwrap()
            .with_monoclass("pyramid")
            .is_err());
    }
}
