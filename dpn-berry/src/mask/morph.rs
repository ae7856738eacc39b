//! 二值形态学: 腐蚀, 边界像素, 清除边缘连通区域, 空洞填充.

use super::{is_background, is_foreground, Connectivity, MaskSlice, OwnedMask, FOREGROUND};
use crate::Idx2d;
use ndarray::Array2;
use std::collections::VecDeque;

impl MaskSlice<'_> {
    /// 以 3x3 十字形结构元进行二值腐蚀.
    ///
    /// # 注意
    ///
    /// 图像外的像素被视为前景, 因此贴着图像边缘的前景不会仅因越界而被腐蚀.
    pub fn erode(&self) -> OwnedMask {
        let mut ans = OwnedMask::zeros(self.shape());
        let kept = self
            .foreground_positions()
            .filter(|&pos| !self.is_n4_having(pos, is_background));
        ans.fill_batch(kept, FOREGROUND);
        ans
    }

    /// 边界像素, 即 `mask XOR erode(mask)` 中的前景像素 (行优先).
    ///
    /// 由于腐蚀结果是原掩膜的子集, 边界像素即为 4-邻域内 (不含越界部分)
    /// 存在背景像素的前景像素.
    pub fn boundary_positions(&self) -> Vec<Idx2d> {
        self.foreground_positions()
            .filter(|&pos| self.is_n4_having(pos, is_background))
            .collect()
    }

    /// 周长, 即边界像素的个数.
    #[inline]
    pub fn perimeter(&self) -> usize {
        self.foreground_positions()
            .filter(|&pos| self.is_n4_having(pos, is_background))
            .count()
    }

    /// 清除所有接触图像边缘的 8-连通前景区域, 返回剩余部分.
    pub fn clear_border(&self) -> OwnedMask {
        let mut ans = OwnedMask::zeros(self.shape());
        for area in self.foreground_areas(Connectivity::Eight) {
            if !area.iter().any(|&p| self.is_at_border(p)) {
                ans.fill_batch(area, FOREGROUND);
            }
        }
        ans
    }

    /// 清除接触图像边缘的 8-连通前景区域后, 是否仍有前景像素?
    #[inline]
    pub fn has_interior_component(&self) -> bool {
        self.foreground_areas(Connectivity::Eight)
            .iter()
            .any(|area| !area.iter().any(|&p| self.is_at_border(p)))
    }

    /// 在前景外接矩形内, 不与矩形边缘 8-连通的背景区域 (空洞) 的掩码.
    ///
    /// 返回 `(外接矩形左上角, 矩形内的空洞掩码)`. 全背景时返回 `None`.
    fn holes(&self) -> Option<(Idx2d, Array2<bool>)> {
        let (y1, x1, y2, x2) = self.bounds()?;
        let (h, w) = (y2 - y1, x2 - x1);
        let mut outside = Array2::<bool>::default((h, w));
        let mut q: VecDeque<Idx2d> = VecDeque::with_capacity(2 * (h + w));

        let local_bg = |(y, x): Idx2d| is_background(self[(y + y1, x + x1)]);
        for pos in super::iter::PosIter::new((h, w)) {
            let (y, x) = pos;
            let at_edge = y == 0 || x == 0 || y + 1 == h || x + 1 == w;
            if at_edge && local_bg(pos) {
                outside[pos] = true;
                q.push_back(pos);
            }
        }
        while let Some(cur) = q.pop_front() {
            for next in super::neighbour8(cur) {
                let (ny, nx) = next;
                if ny < h && nx < w && !outside[next] && local_bg(next) {
                    outside[next] = true;
                    q.push_back(next);
                }
            }
        }

        let holes = Array2::from_shape_fn((h, w), |pos| !outside[pos] && local_bg(pos));
        Some(((y1, x1), holes))
    }

    /// 填充空洞后的掩膜.
    ///
    /// 空洞定义为: 在前景外接矩形内, 不与矩形边缘 8-连通的背景区域.
    pub fn fill_holes(&self) -> OwnedMask {
        let mut ans = self.to_owned();
        if let Some(((y1, x1), holes)) = self.holes() {
            let it = holes
                .indexed_iter()
                .filter_map(|((y, x), &hole)| hole.then_some((y + y1, x + x1)));
            ans.fill_batch(it, FOREGROUND);
        }
        ans
    }

    /// 填充空洞后的面积.
    pub fn filled_area(&self) -> usize {
        let holes = self
            .holes()
            .map_or(0, |(_, holes)| holes.iter().filter(|h| **h).count());
        self.area() + holes
    }

    /// 两个掩膜的交集与并集像素数. 形状必须相同, 否则程序 panic.
    pub(crate) fn intersection_union(&self, other: &MaskSlice<'_>) -> (usize, usize) {
        assert_eq!(self.shape(), other.shape());
        self.iter()
            .zip(other.iter())
            .fold((0, 0), |(i, u), (&a, &b)| {
                let (a, b) = (is_foreground(a), is_foreground(b));
                (i + usize::from(a && b), u + usize::from(a || b))
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::mask::testing::{ascii, disk, rect};
    use crate::mask::OwnedMask;

    #[test]
    fn test_perimeter_matches_xor_erosion() {
        for m in [
            disk((40, 40), (20.0, 20.0), 9.0),
            rect((20, 20), (0, 0, 20, 7)),
            ascii(&["##..", "####", ".#.#"]),
        ] {
            let v = m.view();
            let eroded = v.erode();
            let xor = v
                .iter()
                .zip(eroded.view().iter())
                .filter(|(a, b)| a != b)
                .count();
            assert_eq!(v.perimeter(), xor);
            assert_eq!(v.boundary_positions().len(), xor);
        }
    }

    #[test]
    fn test_erode_border_is_foreground() {
        // 整幅图都是前景时, 腐蚀不改变任何像素.
        let m = rect((5, 5), (0, 0, 5, 5));
        assert_eq!(m.view().erode(), m);
        assert_eq!(m.view().perimeter(), 0);

        // 3x3 方块在图像内部时只剩中心.
        let m = rect((7, 7), (2, 2, 5, 5));
        assert_eq!(m.view().erode().view().area(), 1);
        assert_eq!(m.view().perimeter(), 8);
    }

    #[test]
    fn test_clear_border() {
        let m = ascii(&[
            "##.....", //
            "..#....", //
            "....##.", //
            "....##.", //
            ".......", //
        ]);
        let v = m.view();
        let cleared = v.clear_border();
        // 左上角的对角链以 8-连通方式接触边缘, 被整体清除.
        assert_eq!(cleared.view().area(), 4);
        assert!(v.has_interior_component());

        let touching = rect((6, 6), (0, 2, 3, 4));
        assert!(!touching.view().clear_border().view().has_foreground());
        assert!(!touching.view().has_interior_component());
    }

    #[test]
    fn test_fill_holes() {
        let ring = ascii(&[
            ".......", //
            ".#####.", //
            ".#...#.", //
            ".#.#.#.", //
            ".#...#.", //
            ".#####.", //
            ".......", //
        ]);
        let v = ring.view();
        assert_eq!(v.area(), 17);
        assert_eq!(v.filled_area(), 25);
        assert_eq!(v.fill_holes().view().area(), 25);

        // 与外部相通的缺口不是空洞.
        let open = ascii(&[
            "#####", //
            "#...#", //
            "#...#", //
            "##.##", //
        ]);
        assert_eq!(open.view().filled_area(), open.view().area());

        // 四周被前景包围的背景是空洞, 即使角上有背景.
        let closed = ascii(&[
            "###.", //
            "#.##", //
            "####", //
        ]);
        assert_eq!(closed.view().filled_area(), 11);
        assert_eq!(OwnedMask::zeros((3, 3)).view().filled_area(), 0);
    }

    #[test]
    fn test_diagonal_leak_is_not_a_hole() {
        let leak = ascii(&[
            "###", //
            "#.#", //
            "##.", //
        ]);
        let v = leak.view();
        assert_eq!(v.area(), 7);
        assert_eq!(v.filled_area(), 7);
        assert_eq!(v.fill_holes(), leak);
    }

    #[test]
    fn test_intersection_union() {
        let a = rect((10, 10), (0, 0, 4, 4));
        let b = rect((10, 10), (2, 2, 6, 6));
        assert_eq!(a.view().intersection_union(&b.view()), (4, 28));
    }
}
