//! 实验结果.

use crate::algos::Profile;
use dpn_berry::Measurand;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(measurand: Measurand, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Measurand `{measurand}`:")?;
    writeln!(w, "{S4}Images without instances: {}", p.get_trivial())?;
    writeln!(w, "{S4}Images with instances: {}", p.get_target())?;
    writeln!(w, "{S4}Measured instances: {}", p.get_measured())?;
    writeln!(w, "{S4}Skipped instances: {}", p.get_skipped())?;
    writeln!(w, "{S4}Effective total time: {} us", p.get_target_time_us())?;
    writeln!(
        w,
        "{S4}Average time: {} us per instance",
        f64_to_display(p.get_avg_instance_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros() as f64);
    writeln!(w, "{S4}Most time-consuming image costs {} us", f64_to_display(t))?;
    match p.get_comparison() {
        Some(c) => {
            for line in c.to_string().lines() {
                writeln!(w, "{S4}{line}")?;
            }
            if c.has_anomaly() {
                write!(w, "{S4}(anomaly: empty distribution involved)")?;
            }
        }
        None => write!(w, "{S4}Nothing to compare")?,
    }
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(Measurand, Profile)>,
}

impl FromIterator<(Measurand, Profile)> for AblationResult {
    fn from_iter<I: IntoIterator<Item = (Measurand, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }
}

impl AblationResult {
    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (measurand, profile) in self.data.iter() {
            describe_into(*measurand, profile, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf).trim_end());
            buf.clear();

            utils::sep();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_empty_profile() {
        let mut buf = Vec::new();
        let p = Profile::new().finish(None);
        describe_into(Measurand::MaximumFeretDiameter, &p, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Measurand `maximum_feret_diameter`:"));
        assert!(text.contains("Measured instances: 0"));
        assert!(text.ends_with("Nothing to compare"));
    }
}
