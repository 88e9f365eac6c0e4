use super::comm::{AgentState, DistanceTable, Request, UNREACHABLE};
use super::Solver;
use crate::common::{Agent, Orientation, Plan, Solution};
use crate::config::Config;
use crate::map::Graph;
use crate::stat::Stats;

use anyhow::{anyhow, bail, Result};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

#[derive(Debug)]
pub struct PIBT {
    graph: Graph,
    starts: Vec<usize>,
    goals: Vec<usize>,
    headings: Vec<Orientation>,
    dist: DistanceTable,
    states: Vec<AgentState>,
    // vertex-indexed reservation tables
    occupied_now: Vec<Option<usize>>,
    occupied_next: Vec<Option<usize>>,
    // R[i]: vertex agent i booked to enter once its rotation completes
    reserved: Vec<Option<usize>>,
    // [pushed][pusher] = times pushed through inheritance
    push_count: Vec<Vec<u32>>,
    request_chain: Vec<Request>,
    cycle_handled: bool,
    initial_requester: usize,
    push_escape_threshold: u32,
    rng: StdRng,
    stats: Stats,
}

impl PIBT {
    pub fn new(agents: &[Agent], graph: &Graph, config: &Config) -> Result<Self> {
        if agents.is_empty() {
            bail!("invalid agent count: 0");
        }

        let mut starts = Vec::with_capacity(agents.len());
        let mut goals = Vec::with_capacity(agents.len());
        let mut headings = Vec::with_capacity(agents.len());
        let mut start_owner: HashMap<usize, usize> = HashMap::new();

        for agent in agents {
            let start = graph.vertex_id(agent.start.0, agent.start.1).ok_or_else(|| {
                anyhow!(
                    "agent {}: start {:?} is not a passable vertex",
                    agent.id,
                    agent.start
                )
            })?;
            let goal = graph.vertex_id(agent.goal.0, agent.goal.1).ok_or_else(|| {
                anyhow!(
                    "agent {}: goal {:?} is not a passable vertex",
                    agent.id,
                    agent.goal
                )
            })?;
            if let Some(&other) = start_owner.get(&start) {
                bail!("agents {} and {} share start vertex {}", other, agent.id, start);
            }
            start_owner.insert(start, agent.id);
            starts.push(start);
            goals.push(goal);
            headings.push(agent.heading);
        }

        let dist = DistanceTable::build(graph, &goals);
        for (i, &start) in starts.iter().enumerate() {
            if dist.min_dist_all_headings(i, start) == UNREACHABLE {
                bail!("agent {i}: goal unreachable from start");
            }
        }

        Ok(PIBT {
            graph: graph.clone(),
            occupied_now: vec![None; graph.size()],
            occupied_next: vec![None; graph.size()],
            reserved: vec![None; agents.len()],
            push_count: vec![vec![0; agents.len()]; agents.len()],
            request_chain: Vec::new(),
            cycle_handled: false,
            initial_requester: 0,
            push_escape_threshold: config.push_escape_threshold,
            rng: StdRng::seed_from_u64(config.seed),
            stats: Stats::default(),
            states: Vec::new(),
            starts,
            goals,
            headings,
            dist,
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    // Cost of moving to candidate u: distance conditioned on the heading the
    // move would leave the agent with, plus a penalty for the turn it takes
    // to get there. Ties prefer currently unoccupied vertices.
    fn candidate_key(&self, i: usize, u: usize) -> (usize, bool) {
        let state = &self.states[i];
        let cost = if u == state.v_now {
            self.dist.dist(i, u, state.h_now).saturating_add(1)
        } else {
            let h_rel = self.graph.direction(state.v_now, u);
            let turn = match Orientation::angle_diff(state.h_now, h_rel) {
                0 => 1,
                90 => 2,
                _ => 3,
            };
            self.dist.dist(i, u, h_rel).saturating_add(turn)
        };
        (cost, self.occupied_now[u].is_some())
    }

    // Result of priority inheritance: true -> valid, false -> invalid.
    fn func_pibt(&mut self, i: usize, pusher: Option<usize>, is_initial: bool) -> bool {
        self.stats.kernel_calls += 1;
        if is_initial {
            self.request_chain.clear();
            self.cycle_handled = false;
            self.initial_requester = i;
        }

        let v_now = self.states[i].v_now;
        let h_now = self.states[i].h_now;

        let mut candidates: Vec<usize> = self.graph.neighbors(v_now).to_vec();
        candidates.push(v_now);
        candidates.shuffle(&mut self.rng);
        candidates.sort_by_key(|&u| self.candidate_key(i, u));

        if let Some(p) = pusher {
            self.push_escape(&mut candidates, i, p);
        }

        let swap_agent = self.swap_possible_and_required(i, &candidates);
        if let Some(partner) = swap_agent {
            // yield: taking the worst candidate lets the partner pass through
            candidates.reverse();
            self.stats.swaps_triggered += 1;
            debug!("agent {i} yields to swap partner {partner}");
        }

        if let Some(r) = self.reserved[i] {
            if let Some(pos) = candidates.iter().position(|&u| u == r) {
                candidates.remove(pos);
                candidates.insert(0, r);
            }
        }

        let mut skipped = 0;
        for u in candidates {
            trace!("agent {i} tries vertex {u}");

            // avoid conflicts
            if self.occupied_next[u].is_some() {
                skipped += 1;
                continue;
            }
            if pusher.is_some_and(|p| u == self.states[p].v_now) {
                skipped += 1;
                continue;
            }

            // reserve
            self.occupied_next[u] = Some(i);
            self.states[i].v_next = Some(u);

            // a request back into the initial requester closes a rotation ring
            if !is_initial && u == self.states[self.initial_requester].v_now {
                debug!(
                    "cycle detected: agent {i} requests the vertex of initial requester {}",
                    self.initial_requester
                );
                self.request_chain.push(Request {
                    agent: i,
                    requested: u,
                });
                self.handle_cycle();
                self.cycle_handled = true;
                return true;
            }

            let occupant = self.occupied_now[u];
            if let Some(k) = occupant {
                if self.states[k].v_next.is_none() {
                    self.request_chain.push(Request {
                        agent: i,
                        requested: u,
                    });
                    if !self.func_pibt(k, Some(i), false) {
                        self.request_chain.pop();
                        if self.occupied_next[u] == Some(i) {
                            self.occupied_next[u] = None;
                        }
                        self.states[i].v_next = None;
                        skipped += 1;
                        continue;
                    }
                }
            }

            // the cycle handler already assigned this agent's next state
            if self.cycle_handled {
                return true;
            }

            let (v_out, h_out) = self.graph.compute_action(v_now, u, h_now);
            if v_out == v_now {
                // cannot enter u yet: hold the vertex and adjust the heading
                self.states[i].v_next = Some(v_now);
                if u != v_now && self.occupied_next[u] == Some(i) {
                    self.occupied_next[u] = None;
                }
                self.occupied_next[v_now] = Some(i);
                self.states[i].h_next = Some(h_out);
                if self.states[i].swap_completed {
                    self.reserved[i] = None;
                }
                if h_out != h_now {
                    // book the vertex we will enter once the rotation is done
                    self.reserved[i] = Some(u);
                }
            } else {
                self.states[i].v_next = Some(v_out);
                self.states[i].h_next = Some(h_out);
                self.occupied_next[v_out] = Some(i);
                self.reserved[i] = None;
                if let Some(p) = pusher {
                    self.push_count[i][p] += 1;
                }
            }

            if let Some(k) = occupant {
                if self.states[k].v_next == Some(self.states[k].v_now) && v_out != v_now {
                    // the occupant stays to rotate, so the edge is not free yet
                    self.occupied_next[u] = Some(k);
                    self.occupied_next[v_now] = Some(i);
                    self.states[i].v_next = Some(v_now);
                    self.states[i].h_next = Some(h_now);
                    self.reserved[i] = Some(u);
                }
            }

            if skipped == 0 {
                if let Some(partner) = swap_agent {
                    if self.states[partner].v_next.is_none()
                        && (self.occupied_next[v_now].is_none()
                            || self.occupied_next[v_now] == Some(i))
                    {
                        self.complete_swap(i, partner);
                    }
                }
            }

            return true;
        }

        // failed to secure a vertex: stay put and report failure upward
        self.occupied_next[v_now] = Some(i);
        self.states[i].v_next = Some(v_now);
        self.states[i].h_next = Some(h_now);
        false
    }

    // The partner steps into our vertex; mirrors the action logic above.
    fn complete_swap(&mut self, i: usize, partner: usize) {
        debug!("compute action for swap partner {partner}");
        let v_now_i = self.states[i].v_now;
        let pv_now = self.states[partner].v_now;
        let ph_now = self.states[partner].h_now;

        self.states[partner].swap_completed = false;
        self.states[partner].v_next = Some(v_now_i);
        self.occupied_next[v_now_i] = Some(partner);

        let (pv_out, ph_out) = self.graph.compute_action(pv_now, v_now_i, ph_now);
        if pv_out == pv_now {
            // partner has to rotate before it can follow us
            self.occupied_next[v_now_i] = if self.states[i].v_next == Some(v_now_i) {
                Some(i)
            } else {
                None
            };
            self.states[partner].v_next = Some(pv_now);
            self.occupied_next[pv_now] = Some(partner);
            self.states[partner].h_next = Some(ph_out);
            self.reserved[partner] = None;
            if ph_out != ph_now {
                self.reserved[partner] = Some(v_now_i);
            }
        } else {
            self.states[partner].v_next = Some(pv_out);
            self.states[partner].h_next = Some(ph_out);
            self.occupied_next[pv_out] = Some(partner);
            self.reserved[partner] = None;
            self.states[partner].swap_completed = true;
        }

        // if we stay, the partner cannot enter our vertex this timestep
        if self.states[i].v_next == Some(v_now_i) && pv_out != pv_now {
            self.occupied_next[v_now_i] = Some(i);
            self.occupied_next[pv_now] = Some(partner);
            self.states[partner].v_next = Some(pv_now);
            self.states[partner].h_next = Some(ph_now);
            self.reserved[partner] = Some(v_now_i);
        }
    }

    // Check whether every agent in the ring already faces its requested
    // vertex. If so the ring rotates one step forward in this timestep;
    // otherwise everyone stays and the misaligned agents turn toward their
    // request.
    fn handle_cycle(&mut self) {
        self.stats.cycles_resolved += 1;
        if self.request_chain.is_empty() {
            error!("empty request chain during cycle resolution");
            return;
        }

        let chain = self.request_chain.clone();
        let mut aligned = Vec::with_capacity(chain.len());
        for request in &chain {
            let target = self
                .graph
                .direction(self.states[request.agent].v_now, request.requested);
            aligned.push(self.states[request.agent].h_now == target);
        }

        if aligned.iter().all(|&ok| ok) {
            for request in &chain {
                let a = request.agent;
                self.states[a].v_next = Some(request.requested);
                self.states[a].h_next = Some(self.states[a].h_now);
                self.occupied_next[request.requested] = Some(a);
            }
        } else {
            for (request, ok) in chain.iter().zip(aligned.iter()) {
                let a = request.agent;
                let v_now = self.states[a].v_now;
                let h_next = if *ok {
                    self.states[a].h_now
                } else {
                    let (_, h_out) =
                        self.graph
                            .compute_action(v_now, request.requested, self.states[a].h_now);
                    h_out
                };
                self.states[a].v_next = Some(v_now);
                self.states[a].h_next = Some(h_next);
                self.occupied_next[v_now] = Some(a);
            }
        }
    }

    // Once an agent has been pushed often enough by the same pusher, its
    // candidate order is randomized once and the counter starts over.
    fn push_escape(&mut self, candidates: &mut [usize], pushed: usize, pusher: usize) {
        if self.push_count[pushed][pusher] >= self.push_escape_threshold && candidates.len() > 1 {
            debug!("push escape: agent {pushed} reshuffles after repeated pushes by {pusher}");
            candidates.shuffle(&mut self.rng);
            self.push_count[pushed][pusher] = 0;
            self.stats.push_escapes += 1;
        }
    }

    fn swap_possible_and_required(&self, i: usize, candidates: &[usize]) -> Option<usize> {
        let v_now = self.states[i].v_now;
        if candidates[0] == v_now {
            return None;
        }

        if let Some(j) = self.occupied_now[candidates[0]] {
            if self.states[j].v_next.is_none()
                && self.is_swap_required(i, j, v_now, self.states[j].v_now)
                && self.is_swap_possible(self.states[j].v_now, v_now)
            {
                return Some(j);
            }
        }

        for &u in self.graph.neighbors(v_now) {
            let Some(k) = self.occupied_now[u] else { continue };
            if candidates[0] == self.states[k].v_now {
                continue;
            }
            if self.is_swap_required(k, i, v_now, candidates[0])
                && self.is_swap_possible(candidates[0], v_now)
            {
                return Some(k);
            }
        }

        None
    }

    // Walk the corridor from the puller's side. Swap is required iff the
    // puller gains by taking the pusher's origin while the pusher gains (or
    // already sits on its goal) by giving it up.
    fn is_swap_required(
        &self,
        pusher: usize,
        puller: usize,
        v_pusher_origin: usize,
        v_puller_origin: usize,
    ) -> bool {
        let mut v_pusher = v_pusher_origin;
        let mut v_puller = v_puller_origin;

        while self.dist.min_dist_all_headings(pusher, v_puller)
            < self.dist.min_dist_all_headings(pusher, v_pusher)
        {
            let (n, next) = self.corridor_step(v_pusher, v_puller);
            if n >= 2 {
                return false;
            }
            let Some(next) = next else { break };
            if n == 0 {
                break;
            }
            v_pusher = v_puller;
            v_puller = next;
        }

        self.dist.min_dist_all_headings(puller, v_pusher)
            < self.dist.min_dist_all_headings(puller, v_puller)
            && (self.dist.min_dist_all_headings(pusher, v_pusher) == 0
                || self.dist.min_dist_all_headings(pusher, v_puller)
                    < self.dist.min_dist_all_headings(pusher, v_pusher))
    }

    // Same walk; the exchange is physically possible iff a branching vertex
    // is reachable from the puller's side without passing the pusher.
    fn is_swap_possible(&self, v_pusher_origin: usize, v_puller_origin: usize) -> bool {
        let mut v_pusher = v_pusher_origin;
        let mut v_puller = v_puller_origin;

        while v_puller != v_pusher_origin {
            let (n, next) = self.corridor_step(v_pusher, v_puller);
            if n >= 2 {
                return true;
            }
            let Some(next) = next else { break };
            if n == 0 {
                break;
            }
            v_pusher = v_puller;
            v_puller = next;
        }
        false
    }

    // Count the usable exits of v_puller, ignoring the way back and dead-end
    // goals already held by their owner; return one of them for the walk.
    fn corridor_step(&self, v_pusher: usize, v_puller: usize) -> (usize, Option<usize>) {
        let mut n = self.graph.neighbors(v_puller).len();
        let mut next = None;
        for &u in self.graph.neighbors(v_puller) {
            let held_dead_end = self.graph.neighbors(u).len() == 1
                && self
                    .occupied_now[u]
                    .is_some_and(|a| self.states[a].goal == u);
            if u == v_pusher || held_dead_end {
                n -= 1;
            } else {
                next = Some(u);
            }
        }
        (n, next)
    }
}

impl Solver for PIBT {
    fn solve(&mut self, config: &Config) -> Solution {
        let total_solve_start_time = Instant::now();
        let time_limit = Duration::from_millis(config.time_limit_ms);
        let num_agents = self.starts.len();

        // initialize agent records
        self.states.clear();
        self.occupied_now.fill(None);
        self.occupied_next.fill(None);
        self.reserved.fill(None);
        self.request_chain.clear();
        for row in self.push_count.iter_mut() {
            row.fill(0);
        }
        for i in 0..num_agents {
            let init_d = if config.disable_dist_init {
                0
            } else {
                self.dist.dist(i, self.starts[i], self.headings[i])
            };
            let tie_breaker = self.rng.gen::<f64>();
            self.states.push(AgentState {
                v_now: self.starts[i],
                v_next: None,
                goal: self.goals[i],
                h_now: self.headings[i],
                h_next: None,
                elapsed: 0,
                init_d,
                tie_breaker,
                swap_completed: true,
            });
            self.occupied_now[self.starts[i]] = Some(i);
        }

        let mut plan = Plan::new();
        plan.add(self.starts.clone(), self.headings.clone());

        let mut timestep = 0;
        let solved = loop {
            debug!(
                "timestep {timestep}, elapsed {:?}",
                total_solve_start_time.elapsed()
            );

            // planning
            let mut order: Vec<usize> = (0..num_agents).collect();
            order.sort_by(|&i, &j| {
                let a = &self.states[i];
                let b = &self.states[j];
                b.elapsed
                    .cmp(&a.elapsed)
                    .then_with(|| b.init_d.cmp(&a.init_d))
                    .then_with(|| b.tie_breaker.total_cmp(&a.tie_breaker))
            });
            for i in order {
                if self.states[i].v_next.is_none() {
                    self.func_pibt(i, None, true);
                }
            }

            // commit
            let mut check_goal_cond = true;
            let mut next_config = vec![0; num_agents];
            let mut next_orients = vec![Orientation::YMinus; num_agents];
            for i in 0..num_agents {
                let v_next = self.states[i]
                    .v_next
                    .unwrap_or_else(|| panic!("agent {i} has no next vertex at timestep {timestep}"));
                let h_next = self.states[i].h_next.unwrap_or_else(|| {
                    panic!("agent {i} has no next orientation at timestep {timestep}")
                });

                let v_now = self.states[i].v_now;
                if self.occupied_now[v_now] == Some(i) {
                    self.occupied_now[v_now] = None;
                }
                self.occupied_now[v_next] = Some(i);

                next_config[i] = v_next;
                next_orients[i] = h_next;

                check_goal_cond &= v_next == self.states[i].goal;
                self.states[i].elapsed = if v_next == self.states[i].goal {
                    0
                } else {
                    self.states[i].elapsed + 1
                };
                self.states[i].v_now = v_next;
                self.states[i].v_next = None;
                self.states[i].h_now = h_next;
                self.states[i].h_next = None;
            }
            self.occupied_next.fill(None);

            plan.add(next_config, next_orients);
            timestep += 1;

            if check_goal_cond {
                break true;
            }
            if timestep >= config.max_timestep {
                info!("reached max timestep {timestep} without solving");
                break false;
            }
            if total_solve_start_time.elapsed() >= time_limit {
                info!("exceeded the time limit after {timestep} timesteps");
                break false;
            }
        };

        self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
        self.stats.costs = plan.sum_of_costs();
        self.stats.makespan = plan.makespan();
        self.stats.print(solved);
        plan.log_plan("pibt", &self.graph);

        Solution { plan, solved }
    }
}
