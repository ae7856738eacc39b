//! 通用常量.

use crate::ClassId;

/// 实例类别.
pub mod class {
    use crate::ClassId;

    /// 背景. 不会作为任何实例的类别出现.
    pub const BACKGROUND: ClassId = 0;

    /// 球形颗粒.
    pub const SPHERE: ClassId = 1;

    /// 立方体颗粒.
    pub const CUBE: ClassId = 2;

    /// 类别是否是合法的实例类别 (即非背景)?
    #[inline]
    pub const fn is_instance_class(id: ClassId) -> bool {
        id != BACKGROUND
    }
}

/// 类别名与类别编号的对照表. 数据集标注文件按此表解析.
pub const CLASS_NAMES: [(&str, ClassId); 2] = [("sphere", class::SPHERE), ("cube", class::CUBE)];

/// 类别数 (包括背景).
pub const NUM_CLASSES: usize = 1 + CLASS_NAMES.len();

/// 将类别名 (不区分大小写) 转换为类别编号. 未知类别名返回 `None`.
pub fn class_id_of(name: &str) -> Option<ClassId> {
    let name = name.trim();
    CLASS_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
}

/// 计算平均精度时默认的 IoU 阈值.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

/// 真值实例的置信度.
pub const GROUND_TRUTH_SCORE: f32 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names() {
        assert_eq!(class_id_of("sphere"), Some(class::SPHERE));
        assert_eq!(class_id_of(" Cube "), Some(class::CUBE));
        assert_eq!(class_id_of("pyramid"), None);
        assert_eq!(NUM_CLASSES, 3);
        assert!(!class::is_instance_class(class::BACKGROUND));
    }
}
