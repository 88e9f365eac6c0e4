use std::collections::VecDeque;

use crate::common::Orientation;
use crate::map::Graph;

pub(crate) const UNREACHABLE: usize = usize::MAX;

/// Orientation-aware distance table, one row per agent, addressed by
/// `v.id * 4 + h`. Entry `(v, h)` is the minimum number of timesteps needed
/// to reach the agent's goal from `v` with outgoing heading `h`, where a
/// forward move and a 90 degree rotation each cost one timestep. Immutable
/// after preprocessing.
#[derive(Debug, Clone)]
pub(crate) struct DistanceTable {
    table: Vec<Vec<usize>>,
}

impl DistanceTable {
    pub(crate) fn build(graph: &Graph, goals: &[usize]) -> Self {
        let table = goals
            .iter()
            .map(|&goal| Self::backward_bfs(graph, goal))
            .collect();
        DistanceTable { table }
    }

    // Multi-source BFS from the goal over (vertex, heading) states, expanding
    // reverse edges. Rotation edges are symmetric; a move into `v` with
    // heading `h` originates from the neighbor `u` with direction(u, v) = h.
    fn backward_bfs(graph: &Graph, goal: usize) -> Vec<usize> {
        let mut dist = vec![UNREACHABLE; graph.size() * 4];
        let mut queue = VecDeque::new();

        for h in Orientation::ALL {
            dist[goal * 4 + h.index()] = 0;
            queue.push_back((goal, h));
        }

        while let Some((v, h)) = queue.pop_front() {
            let d = dist[v * 4 + h.index()];

            let mut relax = |state: (usize, Orientation), queue: &mut VecDeque<_>| {
                let idx = state.0 * 4 + state.1.index();
                if dist[idx] == UNREACHABLE {
                    dist[idx] = d + 1;
                    queue.push_back(state);
                }
            };

            relax((v, h.rotate_ccw()), &mut queue);
            relax((v, h.rotate_cw()), &mut queue);

            for &u in graph.neighbors(v) {
                if graph.direction(u, v) == h {
                    relax((u, h), &mut queue);
                }
            }
        }

        dist
    }

    pub(crate) fn dist(&self, agent: usize, v: usize, h: Orientation) -> usize {
        self.table[agent][v * 4 + h.index()]
    }

    pub(crate) fn min_dist_all_headings(&self, agent: usize, v: usize) -> usize {
        Orientation::ALL
            .iter()
            .map(|&h| self.dist(agent, v, h))
            .min()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::graph_from_ascii;

    #[test]
    fn test_straight_corridor_distances() {
        let graph = graph_from_ascii(&["....."]);
        let goal = graph.vertex_id(0, 4).unwrap();
        let table = DistanceTable::build(&graph, &[goal]);

        // facing down the corridor: pure forward moves
        assert_eq!(table.dist(0, graph.vertex_id(0, 0).unwrap(), Orientation::YPlus), 4);
        assert_eq!(table.dist(0, graph.vertex_id(0, 3).unwrap(), Orientation::YPlus), 1);
        // facing away: two rotations before the first move
        assert_eq!(
            table.dist(0, graph.vertex_id(0, 3).unwrap(), Orientation::YMinus),
            3
        );
        // facing sideways: one rotation
        assert_eq!(
            table.dist(0, graph.vertex_id(0, 3).unwrap(), Orientation::XPlus),
            2
        );
        // any heading is fine on the goal itself
        assert_eq!(table.min_dist_all_headings(0, goal), 0);
        assert_eq!(table.dist(0, goal, Orientation::XMinus), 0);
    }

    #[test]
    fn test_turn_costs_one_step() {
        // L-shaped corridor, goal around the corner
        let graph = graph_from_ascii(&["..", "@."]);
        let v0 = graph.vertex_id(0, 0).unwrap();
        let corner = graph.vertex_id(0, 1).unwrap();
        let goal = graph.vertex_id(1, 1).unwrap();
        let table = DistanceTable::build(&graph, &[goal]);

        // move, rotate, move
        assert_eq!(table.dist(0, v0, Orientation::YPlus), 3);
        assert_eq!(table.dist(0, corner, Orientation::XPlus), 1);
        assert_eq!(table.dist(0, corner, Orientation::YPlus), 2);
    }

    #[test]
    fn test_unreachable_region() {
        let graph = graph_from_ascii(&[".@."]);
        let left = graph.vertex_id(0, 0).unwrap();
        let right = graph.vertex_id(0, 2).unwrap();
        let table = DistanceTable::build(&graph, &[right]);

        assert_eq!(table.min_dist_all_headings(0, left), UNREACHABLE);
        assert_eq!(table.min_dist_all_headings(0, right), 0);
    }
}
