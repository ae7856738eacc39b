mod profile;

use dpn_berry::prelude::*;

pub use profile::Profile;

/// 以 `measurand` 逐图像测量 `results` 的全部实例, 并将汇总后的粒径分布与
/// `reference` 比较.
///
/// 没有测得任何实例时不做比较.
pub fn measure(measurand: Measurand, results: &ResultSet, reference: &SizeDistribution) -> Profile {
    let mut profile = Profile::new();
    let mut parts = Vec::with_capacity(results.len());
    for (k, d) in results.detections().iter().enumerate() {
        if d.is_empty() {
            profile.count_trivial();
            continue;
        }
        profile.count_target();
        let m = d
            .to_size_distribution(measurand)
            .expect("Measuring instances error");
        profile.target_elapsed(m.psd.number_of_particles(), m.skipped.len());
        log::debug!("{measurand}: image #{k}, {} particles", m.psd.number_of_particles());
        parts.push(m.psd);
    }

    let comparison = match SizeDistribution::concatenate(&parts) {
        Ok(psd) if psd.number_of_particles() != 0 => {
            Some(psd.compare(reference).expect("Comparing size distributions error"))
        }
        _ => None,
    };
    profile.finish(comparison)
}
