//! 程序运行函数.

use crate::algos;
use crate::result::AblationResult;
use dpn_berry::prelude::*;
use std::thread;
use utils::loader;

/// 实际运行.
///
/// 参考分布为真值掩膜像素个数的等效直径 ([`GtMode::Mask`]). 设置了
/// `$DPN_RESULTS` 时测量该文件中保存的检测结果, 否则测量真值实例本身.
pub fn run() -> AblationResult {
    let dataset = loader::ground_truth_loader_from_env_or_home().expect("Loading dataset error");
    println!("Subset `{}`: {} images", dataset.subset(), dataset.len());

    let reference = loader::ground_truth_loader_from_env_or_home()
        .and_then(|d| d.ground_truth_size_distribution(GtMode::Mask))
        .expect("Loading ground truth error");

    let results = match loader::results_path_from_env() {
        Some(p) => {
            println!("Loading detections from {}...", p.display());
            ResultSet::load(p).expect("Loading detections error")
        }
        None => dataset.into_result_set().expect("Loading ground truth error"),
    };

    println!("Running ablation studies...");
    let (results, reference) = (&results, &reference);
    thread::scope(|s| {
        let handles = Measurand::ALL.map(|m| s.spawn(move || algos::measure(m, results, reference)));

        Measurand::ALL
            .into_iter()
            .zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            )
            .collect()
    })
}
