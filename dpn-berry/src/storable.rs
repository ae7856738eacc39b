//! 对象的持久化存储 (bincode).

use crate::config::Config;
use crate::error::PsdResult;
use crate::{Detection, ResultSet, SizeDistribution};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// 表明一个可以完整保存到文件, 并从文件原样读回的对象.
///
/// 读回的对象与保存前的对象相等. 掩膜以 zlib 压缩的形式存储.
pub trait Storable: Serialize + DeserializeOwned {
    /// 编码为字节.
    fn to_bytes(&self) -> PsdResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// 由字节解码.
    fn from_bytes(bytes: &[u8]) -> PsdResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// 保存到 `path`. 文件已存在时覆盖.
    fn save<P: AsRef<Path>>(&self, path: P) -> PsdResult<()> {
        let mut w = BufWriter::new(File::create(path.as_ref())?);
        bincode::serialize_into(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    /// 从 `path` 读回.
    fn load<P: AsRef<Path>>(path: P) -> PsdResult<Self> {
        let r = BufReader::new(File::open(path.as_ref())?);
        Ok(bincode::deserialize_from(r)?)
    }
}

impl Storable for SizeDistribution {}

impl Storable for Detection {}

impl Storable for ResultSet {}

impl Storable for Config {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::tests::sample;
    use crate::{PsdError, Unit};

    #[test]
    fn test_size_distribution() {
        let psd = SizeDistribution::new(vec![1.5, 2.0, 40.25], Unit::Meter).unwrap();
        let bytes = psd.to_bytes().unwrap();
        assert_eq!(SizeDistribution::from_bytes(&bytes).unwrap(), psd);
        assert!(matches!(
            SizeDistribution::from_bytes(&bytes[..3]),
            Err(PsdError::Codec(_))
        ));
    }

    #[test]
    fn test_invalid_sizes_are_rejected_on_decode() {
        // 与 `SizeDistribution` 字段顺序相同的未校验数据.
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let bytes = bincode::serialize(&(vec![2.0, bad], Unit::Pixel)).unwrap();
            assert!(matches!(
                SizeDistribution::from_bytes(&bytes),
                Err(PsdError::Codec(_))
            ));
        }
        let bytes = bincode::serialize(&(vec![2.0, 0.0], Unit::Pixel)).unwrap();
        let psd = SizeDistribution::from_bytes(&bytes).unwrap();
        assert_eq!(psd.sizes(), &[2.0, 0.0]);
    }

    #[test]
    fn test_detection_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection.bin");
        let d = sample().with_comment("probe").with_data_set("synthetic");
        d.save(&path).unwrap();
        let back = Detection::load(&path).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.comment(), Some("probe"));
    }

    #[test]
    fn test_result_set_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.bin");
        let rs: ResultSet = vec![sample(), sample()].into_iter().collect();
        rs.save(&path).unwrap();
        assert_eq!(ResultSet::load(&path).unwrap(), rs);
        assert!(matches!(
            ResultSet::load(dir.path().join("missing.bin")),
            Err(PsdError::Io(_))
        ));
    }

    #[test]
    fn test_masks_are_compressed() {
        let d = sample();
        let raw: usize = d.masks().iter().map(|m| m.view().size()).sum();
        assert!(d.to_bytes().unwrap().len() < d.image().len() + raw / 4);
    }
}
