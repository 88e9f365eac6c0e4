use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error};

use crate::map::{Graph, Map};

/// One of the four cardinal headings an agent can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    XPlus,
    XMinus,
    YPlus,
    YMinus,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::XPlus,
        Orientation::XMinus,
        Orientation::YPlus,
        Orientation::YMinus,
    ];

    // Index used to address orientation-aware tables (`v.id * 4 + h`).
    pub fn index(self) -> usize {
        match self {
            Orientation::XPlus => 0,
            Orientation::XMinus => 1,
            Orientation::YPlus => 2,
            Orientation::YMinus => 3,
        }
    }

    fn angle(self) -> i32 {
        match self {
            Orientation::XPlus => 0,
            Orientation::YPlus => 90,
            Orientation::XMinus => 180,
            Orientation::YMinus => 270,
        }
    }

    // Angle difference between two headings, one of {0, 90, 180}.
    pub fn angle_diff(a: Orientation, b: Orientation) -> i32 {
        let diff = (a.angle() - b.angle()).abs();
        diff.min(360 - diff)
    }

    pub fn rotate_ccw(self) -> Orientation {
        match self {
            Orientation::XPlus => Orientation::YPlus,
            Orientation::YPlus => Orientation::XMinus,
            Orientation::XMinus => Orientation::YMinus,
            Orientation::YMinus => Orientation::XPlus,
        }
    }

    pub fn rotate_cw(self) -> Orientation {
        match self {
            Orientation::XPlus => Orientation::YMinus,
            Orientation::YMinus => Orientation::XMinus,
            Orientation::XMinus => Orientation::YPlus,
            Orientation::YPlus => Orientation::XPlus,
        }
    }
}

fn default_heading() -> Orientation {
    Orientation::YMinus
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: (usize, usize),
    pub goal: (usize, usize),
    #[serde(default = "default_heading")]
    pub heading: Orientation,
}

impl Agent {
    pub fn verify(&self, map: &Map) -> bool {
        map.is_passable(self.start.0, self.start.1) && map.is_passable(self.goal.0, self.goal.1)
    }
}

/// Sequence of joint configurations, one per timestep, with the heading of
/// every agent at that timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    configs: Vec<Vec<usize>>,
    orientations: Vec<Vec<Orientation>>,
}

impl Plan {
    pub fn new() -> Self {
        Plan::default()
    }

    pub fn add(&mut self, config: Vec<usize>, orientations: Vec<Orientation>) {
        if let Some(first) = self.configs.first() {
            assert_eq!(first.len(), config.len(), "configuration size mismatch");
        }
        assert_eq!(config.len(), orientations.len(), "orientation size mismatch");
        self.configs.push(config);
        self.orientations.push(orientations);
    }

    pub fn get(&self, time_step: usize) -> &[usize] {
        &self.configs[time_step]
    }

    pub fn position(&self, time_step: usize, agent: usize) -> usize {
        self.configs[time_step][agent]
    }

    pub fn orientation(&self, time_step: usize, agent: usize) -> Orientation {
        self.orientations[time_step][agent]
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn size(&self) -> usize {
        self.configs.len()
    }

    pub fn makespan(&self) -> usize {
        self.size().saturating_sub(1)
    }

    // Last timestep the agent is away from its final vertex.
    pub fn path_cost(&self, agent: usize) -> usize {
        let makespan = self.makespan();
        let last = self.position(makespan, agent);
        let mut cost = makespan;
        while cost > 0 && self.position(cost - 1, agent) == last {
            cost -= 1;
        }
        cost
    }

    pub fn sum_of_costs(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (0..self.configs[0].len()).map(|i| self.path_cost(i)).sum()
    }

    pub fn verify(&self, graph: &Graph, agents: &[Agent]) -> bool {
        if self.is_empty() {
            return true;
        }

        if self.configs[0].len() != agents.len() {
            error!("incomplete plan");
            return false;
        }

        for (agent, &v) in agents.iter().zip(self.configs[0].iter()) {
            if graph.vertex_id(agent.start.0, agent.start.1) != Some(v) {
                error!("start failed: agent {} does not begin on its start", agent.id);
                return false;
            }
        }

        for time_step in 0..self.size() {
            let config = &self.configs[time_step];
            if config.len() != agents.len() {
                error!("invalid configuration size at t={time_step}");
                return false;
            }

            let mut seen_positions = HashSet::new();
            for (i, &v) in config.iter().enumerate() {
                if !seen_positions.insert(v) {
                    error!("vertex conflict at v={v}, t={time_step}");
                    return false;
                }

                if time_step == 0 {
                    continue;
                }

                let prev = self.position(time_step - 1, i);
                if v != prev && !graph.is_neighbor(prev, v) {
                    error!("agent {i} performs an invalid move at t={time_step}");
                    return false;
                }

                // An agent may only traverse an edge it was already facing.
                if v != prev {
                    let h_rel = graph.direction(prev, v);
                    if self.orientation(time_step, i) != h_rel
                        || self.orientation(time_step - 1, i) != h_rel
                    {
                        error!("agent {i} moves without facing its target at t={time_step}");
                        return false;
                    }
                }
            }

            if time_step >= 1 {
                let prev_config = &self.configs[time_step - 1];
                let mut seen_edges = HashSet::new();
                for (i, &v) in config.iter().enumerate() {
                    let prev = prev_config[i];
                    if prev != v {
                        if seen_edges.contains(&(v, prev)) {
                            error!("swap conflict on edge ({prev}, {v}) at t={time_step}");
                            return false;
                        }
                        seen_edges.insert((prev, v));
                    }
                }
            }
        }

        true
    }

    pub fn log_plan(&self, solver: &str, graph: &Graph) {
        if self.is_empty() {
            debug!("{} produced an empty plan", solver);
            return;
        }
        let mut formatted = String::new();
        for i in 0..self.configs[0].len() {
            formatted.push_str(&format!(" agent{}:\n", i));
            for t in 0..self.size() {
                let (x, y) = graph.vertex(self.position(t, i)).pos;
                formatted.push_str(&format!(
                    "   - x: {}\n     y: {}\n     h: {:?}\n     t: {}\n",
                    x,
                    y,
                    self.orientation(t, i),
                    t
                ));
            }
        }
        debug!("{} plan:\n{}", solver, formatted);
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub plan: Plan,
    pub solved: bool,
}

impl Solution {
    pub fn verify(&self, graph: &Graph, agents: &[Agent]) -> bool {
        if !self.plan.verify(graph, agents) {
            return false;
        }

        if self.solved {
            let makespan = self.plan.makespan();
            for agent in agents {
                let goal = graph.vertex_id(agent.goal.0, agent.goal.1);
                if goal != Some(self.plan.position(makespan, agent.id)) {
                    error!("goal failed: agent {} does not end on its goal", agent.id);
                    return false;
                }
            }
        }

        true
    }
}
