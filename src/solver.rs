mod comm;
mod pibt;

pub use pibt::PIBT;

use crate::common::Solution;
use crate::config::Config;

pub trait Solver {
    fn solve(&mut self, config: &Config) -> Solution;
}
