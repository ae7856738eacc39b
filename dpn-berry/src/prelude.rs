//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{ClassId, Idx2d};

pub use crate::consts::class::{BACKGROUND, CUBE, SPHERE};
pub use crate::consts::{class_id_of, DEFAULT_IOU_THRESHOLD, NUM_CLASSES};

pub use crate::mask::{CompactMask, Connectivity, MaskSlice, OwnedMask};
pub use crate::{BBox, Instance, InstanceRef};
pub use crate::{Detection, Measured, ResultSet};

pub use crate::{Measurand, PsdComparison, SizeDistribution, Unit};
pub use crate::{InvalidArgument, PsdError, PsdResult};

pub use crate::accuracy::{average_precision, average_precisions};
pub use crate::config::{Config, FilterSpec};

pub use crate::dataset::{home_dataset_dir_with, GroundTruthDataset, GtMode};
pub use crate::{analyze, Detector, RawInstances};

#[cfg(feature = "serde")]
pub use crate::Storable;
