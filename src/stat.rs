use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub costs: usize,
    pub makespan: usize,
    pub time_us: usize,
    pub kernel_calls: usize,
    pub cycles_resolved: usize,
    pub swaps_triggered: usize,
    pub push_escapes: usize,
}

impl Stats {
    pub fn print(&self, solved: bool) {
        info!(
            "Solved {:?} Cost {:?} Makespan {:?} Time(microseconds) {:?} Kernel calls {:?} Cycles resolved {:?} Swaps triggered {:?} Push escapes {:?}",
            solved,
            self.costs,
            self.makespan,
            self.time_us,
            self.kernel_calls,
            self.cycles_resolved,
            self.swaps_triggered,
            self.push_escapes
        );
    }
}
