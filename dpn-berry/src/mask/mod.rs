//! 二值实例掩膜及其形态学操作.
//!
//! 掩膜以 `u8` 存储, 非零即前景. 所有对外构造的 [`OwnedMask`]
//! 保证像素值仅为 [`BACKGROUND`] 或 [`FOREGROUND`].

mod core;
mod iter;
mod morph;

pub use core::{CompactMask, MaskSlice, OwnedMask};

use crate::Idx2d;

/// 背景像素值.
pub const BACKGROUND: u8 = 0;

/// 前景像素值.
pub const FOREGROUND: u8 = 1;

/// 像素是否为前景?
#[inline]
pub const fn is_foreground(pixel: u8) -> bool {
    pixel != BACKGROUND
}

/// 像素是否为背景?
#[inline]
pub const fn is_background(pixel: u8) -> bool {
    pixel == BACKGROUND
}

/// 像素连通规则.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// 上下左右.
    Four,

    /// 上下左右以及四个对角.
    Eight,
}

/// 获得 `(h, w)` 的 4-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour4((h, w): Idx2d) -> [Idx2d; 4] {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
}

/// 获得 `(h, w)` 的 8-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour8((h, w): Idx2d) -> [Idx2d; 8] {
    [
        (h.wrapping_sub(1), w.wrapping_sub(1)),
        (h.wrapping_sub(1), w),
        (h.wrapping_sub(1), w.saturating_add(1)),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
        (h.saturating_add(1), w.wrapping_sub(1)),
        (h.saturating_add(1), w),
        (h.saturating_add(1), w.saturating_add(1)),
    ]
}
