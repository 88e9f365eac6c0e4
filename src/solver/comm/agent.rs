use crate::common::Orientation;

// Mutable planning record for one agent. `v_next` and `h_next` stay unset
// until the kernel commits a decision for the current timestep.
#[derive(Debug, Clone)]
pub(crate) struct AgentState {
    pub(crate) v_now: usize,
    pub(crate) v_next: Option<usize>,
    pub(crate) goal: usize,
    pub(crate) h_now: Orientation,
    pub(crate) h_next: Option<Orientation>,
    pub(crate) elapsed: usize,
    pub(crate) init_d: usize,
    pub(crate) tie_breaker: f64,
    pub(crate) swap_completed: bool,
}

// One edge of the request chain built during a top-level kernel invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request {
    pub(crate) agent: usize,
    pub(crate) requested: usize,
}
