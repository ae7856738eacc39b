use super::{is_background, is_foreground, Connectivity, BACKGROUND, FOREGROUND};
use crate::error::{InvalidArgument, PsdError, PsdResult};
use crate::{Area2d, Areas2d, BBox, Idx2d};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::iter::Iter;
use ndarray::{Array2, ArrayView2, Ix2};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::ops::Index;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 不可变、借用的二维实例掩膜.
#[derive(Copy, Clone)]
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图. 非零像素即前景.
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for MaskSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> MaskSlice<'a> {
    /// 直接初始化. `data` 中的非零像素被视为前景.
    #[inline]
    pub fn new(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<'a, u8> {
        self.data
    }

    /// 获取可以迭代图像像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'a, u8, Ix2> {
        self.data.into_iter()
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&u8> {
        self.data.get(pos)
    }

    /// 给定位置是否是前景? 越界位置视为背景.
    #[inline]
    pub fn is_foreground_at(&self, pos: Idx2d) -> bool {
        matches!(self.get(pos), Some(&v) if is_foreground(v))
    }

    /// 掩膜的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 掩膜的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 获得掩膜的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得掩膜的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 判断一个索引是否合法 (未越界).
    #[inline]
    pub fn check(&self, (h, w): Idx2d) -> bool {
        let (h_len, w_len) = self.shape();
        h < h_len && w < w_len
    }

    /// 前景像素总数, 即实例面积.
    #[inline]
    pub fn area(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 是否含有前景像素?
    #[inline]
    pub fn has_foreground(&self) -> bool {
        self.data.iter().copied().any(is_foreground)
    }

    /// 判断一个索引是否位于掩膜的边缘.
    #[inline]
    pub fn is_at_border(&self, (h, w): Idx2d) -> bool {
        h == 0 || h.saturating_add(1) == self.height() || w == 0 || w.saturating_add(1) == self.width()
    }

    /// 获得 `pos` 的 4-邻域像素索引. 保证返回的索引都不越界.
    pub fn n4_positions(&self, pos: Idx2d) -> Vec<Idx2d> {
        super::neighbour4(pos)
            .into_iter()
            .filter(|p| self.check(*p))
            .collect()
    }

    /// 获得 `pos` 的 8-邻域像素索引. 保证返回的索引都不越界.
    pub fn n8_positions(&self, pos: Idx2d) -> Vec<Idx2d> {
        super::neighbour8(pos)
            .into_iter()
            .filter(|p| self.check(*p))
            .collect()
    }

    /// 判断 `(h, w)` 的 4-邻域 (不含越界部分) 是否有满足谓词 `pred` 的像素.
    pub fn is_n4_having(&self, (h, w): Idx2d, mut pred: impl FnMut(u8) -> bool) -> bool {
        matches!(self.get((h.wrapping_sub(1), w)), Some(&v) if pred(v))
            || matches!(self.get((h.saturating_add(1), w)), Some(&v) if pred(v))
            || matches!(self.get((h, w.wrapping_sub(1))), Some(&v) if pred(v))
            || matches!(self.get((h, w.saturating_add(1))), Some(&v) if pred(v))
    }

    /// 以行优先规则, 获取能迭代图像所有索引的迭代器.
    #[inline]
    pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> {
        super::iter::PosIter::new(self.shape())
    }

    /// 以行优先规则, 获取所有前景像素索引.
    #[inline]
    pub fn foreground_positions(&self) -> impl Iterator<Item = Idx2d> + 'a {
        let data = self.data;
        super::iter::PosIter::new(self.shape()).filter(move |&pos| is_foreground(data[pos]))
    }

    /// 前景的最小外接矩形 `(y1, x1, y2, x2)`, 左闭右开. 全背景时返回 `None`.
    pub(crate) fn bounds(&self) -> Option<(usize, usize, usize, usize)> {
        self.foreground_positions().fold(None, |acc, (y, x)| match acc {
            None => Some((y, x, y + 1, x + 1)),
            Some((y1, x1, y2, x2)) => Some((y1.min(y), x1.min(x), y2.max(y + 1), x2.max(x + 1))),
        })
    }

    /// 提取前景的包围盒. 全背景时返回 `None`.
    ///
    /// 包围盒为左闭右开区间, 与检测网络输出的 `rois` 约定一致.
    #[inline]
    pub fn extract_bbox(&self) -> Option<BBox> {
        self.bounds().and_then(|(y1, x1, y2, x2)| {
            BBox::new(y1 as i32, x1 as i32, y2 as i32, x2 as i32).ok()
        })
    }

    /// 按照 `conn` 相邻规则获取所有区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
    /// 当且仅当存在一条从 `p1` 到 `p2` 的相邻路径, 且路径上的所有像素
    /// (包括 `p1` 和 `p2`) 都满足谓词 `pred`.
    #[inline]
    pub fn areas(&self, conn: Connectivity, pred: impl Fn(u8) -> bool) -> Areas2d {
        self.areas_from_local(self.pos_iter(), conn, pred)
    }

    /// 按照 `conn` 相邻原则获得所有前景区域.
    #[inline]
    pub fn foreground_areas(&self, conn: Connectivity) -> Areas2d {
        self.areas_from_local(self.foreground_positions(), conn, is_foreground)
    }

    /// 同 [`MaskSlice::areas`], 但区域的起点由 `it` 指定.
    pub fn areas_from_local<I: IntoIterator<Item = Idx2d>>(
        &self,
        it: I,
        conn: Connectivity,
        pred: impl Fn(u8) -> bool,
    ) -> Areas2d {
        let mut ans = Areas2d::with_capacity(1);
        let mut bfs_q = VecDeque::with_capacity(4);
        let mut vis = Array2::<bool>::default(self.shape());

        for pos in it.into_iter() {
            if !self.check(pos) || vis[pos] || !pred(self[pos]) {
                continue;
            }
            vis[pos] = true;
            bfs_q.push_back(pos);
            let mut this_area = Area2d::with_capacity(1);
            while let Some(cur) = bfs_q.pop_front() {
                this_area.push(cur);
                let neighbours = match conn {
                    Connectivity::Four => self.n4_positions(cur),
                    Connectivity::Eight => self.n8_positions(cur),
                };
                for next in neighbours {
                    if !vis[next] && pred(self[next]) {
                        vis[next] = true;
                        bfs_q.push_back(next);
                    }
                }
            }
            ans.push(this_area);
        }
        ans
    }

    /// 克隆自己, 获得一个拥有所有权的掩膜对象.
    #[inline]
    pub fn to_owned(&self) -> OwnedMask {
        OwnedMask::from_raw(self.data.to_owned())
    }

    /// 获得行优先存储的序列化数据.
    /// 当原始数据本身就是行优先格式时, 可以避免一次 deepcopy.
    pub fn as_row_major_slice(&self) -> Cow<'a, [u8]> {
        match self.data.to_slice() {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(self.data.iter().copied().collect()),
        }
    }
}

/// 拥有所有权的二维实例掩膜. 像素值仅为 `0` 或 `1`.
///
/// 启用 `serde` 特性时, 序列化经由 [`CompactMask`] 压缩进行.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedMask {
    data: Array2<u8>,
}

impl OwnedMask {
    /// 从任意 `u8` 数组构造, 非零像素被规整为 [`FOREGROUND`].
    pub fn from_raw(mut data: Array2<u8>) -> Self {
        data.mapv_inplace(|p| if is_background(p) { BACKGROUND } else { FOREGROUND });
        Self { data }
    }

    /// 从布尔数组构造.
    pub fn from_bools(data: ArrayView2<'_, bool>) -> Self {
        Self {
            data: data.mapv(u8::from),
        }
    }

    /// 全背景掩膜.
    #[inline]
    pub fn zeros(shape: Idx2d) -> Self {
        Self {
            data: Array2::zeros(shape),
        }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn view(&self) -> MaskSlice<'_> {
        MaskSlice::new(self.data.view())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u8> {
        self.data
    }

    /// 将 `it` 中的所有位置设置为 `value` (规整为 `0` / `1`).
    pub(crate) fn fill_batch<I: IntoIterator<Item = Idx2d>>(&mut self, it: I, value: u8) {
        let value = if is_background(value) { BACKGROUND } else { FOREGROUND };
        for pos in it.into_iter() {
            self.data[pos] = value;
        }
    }

    /// 压缩数据.
    pub fn compress(&self) -> PsdResult<CompactMask> {
        let data = self.view();
        let buf = data.as_row_major_slice();
        let mut e = ZlibEncoder::new(Vec::with_capacity(8), Compression::best());
        e.write_all(buf.as_ref())?;
        Ok(CompactMask {
            buf: e.finish()?,
            sh: data.shape(),
        })
    }
}

/// 压缩存储的 `OwnedMask`; 不透明类型.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompactMask {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状.
    sh: Idx2d,
}

impl CompactMask {
    /// 解压缩数据.
    ///
    /// 解压后的长度与记录的形状不符时, 返回 [`InvalidArgument::LengthMismatch`].
    pub fn decompress(&self) -> PsdResult<OwnedMask> {
        let (h, w) = self.sh;
        let mut d = ZlibDecoder::new(self.buf.as_slice());
        let mut buf = Vec::with_capacity(h * w);
        d.read_to_end(&mut buf)?;
        if buf.len() != h * w {
            return Err(InvalidArgument::LengthMismatch(h * w, buf.len()).into());
        }
        let data = Array2::<u8>::from_shape_vec((h, w), buf)
            .map_err(|_| PsdError::from(InvalidArgument::ShapeMismatch((h, w), (0, 0))))?;
        Ok(OwnedMask::from_raw(data))
    }

    /// 压缩数据的字节数.
    #[inline]
    pub fn compressed_len(&self) -> usize {
        self.buf.len()
    }
}

impl TryFrom<&CompactMask> for OwnedMask {
    type Error = PsdError;

    #[inline]
    fn try_from(value: &CompactMask) -> Result<Self, Self::Error> {
        value.decompress()
    }
}

#[cfg(feature = "serde")]
impl Serialize for OwnedMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error;
        self.compress()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for OwnedMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        CompactMask::deserialize(deserializer)?
            .decompress()
            .map_err(D::Error::custom)
    }
}
