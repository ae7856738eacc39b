//! 比较不同粒径测量量的耗时, 以及其粒径分布与参考分布的偏差.

mod algos;
mod result;
mod runner;

fn main() {
    simple_logger::init_with_level(log::Level::Warn).unwrap();
    runner::run().analyze();
}
