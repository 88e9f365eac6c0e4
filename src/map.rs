use std::fs::File;
use std::io::{self, BufRead, BufReader};

use crate::common::Orientation;

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    grid: Vec<Vec<bool>>,
}

impl Map {
    pub fn from_file(path: &str) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut lines = reader.lines();

        let _type = lines.next().unwrap()?;
        let height = lines
            .next()
            .unwrap()?
            .split_whitespace()
            .last()
            .unwrap()
            .parse::<usize>()
            .unwrap();
        let width = lines
            .next()
            .unwrap()?
            .split_whitespace()
            .last()
            .unwrap()
            .parse::<usize>()
            .unwrap();
        let _map = lines.next().unwrap()?;

        let mut grid = Vec::with_capacity(height);
        for line in lines.take(height) {
            let row: Vec<bool> = line?.chars().map(|ch| ch == '.').collect();
            grid.push(row);
        }

        Ok(Map {
            height,
            width,
            grid,
        })
    }

    pub fn is_passable(&self, x: usize, y: usize) -> bool {
        x < self.height && y < self.width && self.grid[x][y]
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: usize,
    pub pos: (usize, usize),
    pub neighbors: Vec<usize>,
}

/// Undirected graph of passable cells with dense vertex ids. Coordinates are
/// kept only to derive the cardinal direction between adjacent vertices.
#[derive(Debug, Clone)]
pub struct Graph {
    vertices: Vec<Vertex>,
    ids: Vec<Vec<Option<usize>>>,
}

impl Graph {
    pub fn from_map(map: &Map) -> Self {
        let mut ids = vec![vec![None; map.width]; map.height];
        let mut vertices = Vec::new();

        for x in 0..map.height {
            for y in 0..map.width {
                if map.is_passable(x, y) {
                    ids[x][y] = Some(vertices.len());
                    vertices.push(Vertex {
                        id: vertices.len(),
                        pos: (x, y),
                        neighbors: Vec::new(),
                    });
                }
            }
        }

        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        for x in 0..map.height {
            for y in 0..map.width {
                let Some(id) = ids[x][y] else { continue };
                for &(dx, dy) in &directions {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= map.height as i32 || ny >= map.width as i32 {
                        continue;
                    }
                    if let Some(neighbor) = ids[nx as usize][ny as usize] {
                        vertices[id].neighbors.push(neighbor);
                    }
                }
            }
        }

        Graph { vertices, ids }
    }

    pub fn size(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, id: usize) -> &Vertex {
        &self.vertices[id]
    }

    pub fn vertex_id(&self, x: usize, y: usize) -> Option<usize> {
        self.ids.get(x).and_then(|row| row.get(y)).copied().flatten()
    }

    pub fn neighbors(&self, id: usize) -> &[usize] {
        &self.vertices[id].neighbors
    }

    pub fn is_neighbor(&self, v: usize, u: usize) -> bool {
        self.vertices[v].neighbors.contains(&u)
    }

    // Cardinal direction from a vertex to an adjacent vertex.
    pub fn direction(&self, from: usize, to: usize) -> Orientation {
        if !self.is_neighbor(from, to) {
            panic!("vertex {to} is not adjacent to vertex {from}");
        }
        let (x1, y1) = self.vertices[from].pos;
        let (x2, y2) = self.vertices[to].pos;
        if x2 > x1 {
            Orientation::XPlus
        } else if x2 < x1 {
            Orientation::XMinus
        } else if y2 > y1 {
            Orientation::YPlus
        } else {
            Orientation::YMinus
        }
    }

    /// One-step action toward a target vertex: either a pure forward move or
    /// a pure rotation. A 180 degree turn resolves as a single CCW rotation;
    /// the next invocation faces the target.
    pub fn compute_action(
        &self,
        v_now: usize,
        v_target: usize,
        h_now: Orientation,
    ) -> (usize, Orientation) {
        if v_target == v_now {
            return (v_now, h_now);
        }
        if !self.is_neighbor(v_now, v_target) {
            panic!("move target {v_target} is not adjacent to vertex {v_now}");
        }

        let h_rel = self.direction(v_now, v_target);
        match Orientation::angle_diff(h_now, h_rel) {
            0 => (v_target, h_rel),
            90 => (v_now, h_rel),
            _ => (v_now, h_now.rotate_ccw()),
        }
    }
}

// Test helper shared by the solver tests: build a graph from ascii rows.
#[cfg(test)]
pub(crate) fn graph_from_ascii(rows: &[&str]) -> Graph {
    let height = rows.len();
    let width = rows[0].len();
    let mut text = format!("type octile\nheight {height}\nwidth {width}\nmap\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    let map = Map::from_reader(std::io::Cursor::new(text)).unwrap();
    Graph::from_map(&map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_map() {
        let map = Map::from_reader(Cursor::new(
            "type octile\nheight 3\nwidth 3\nmap\n.@.\n...\n@@.\n",
        ))
        .unwrap();

        assert_eq!(map.height, 3);
        assert_eq!(map.width, 3);
        assert!(map.is_passable(0, 0));
        assert!(!map.is_passable(0, 1));
        assert!(map.is_passable(1, 1));
        assert!(!map.is_passable(2, 0));
    }

    #[test]
    fn test_graph_from_map() {
        let graph = graph_from_ascii(&[".@.", "...", "@@."]);

        assert_eq!(graph.size(), 6);
        let v0 = graph.vertex_id(0, 0).unwrap();
        let v3 = graph.vertex_id(1, 1).unwrap();
        assert!(graph.vertex_id(0, 1).is_none());

        assert_eq!(graph.vertex(v3).id, v3);
        assert_eq!(graph.vertex(v3).pos, (1, 1));
        assert_eq!(graph.neighbors(v0).len(), 1);
        assert_eq!(graph.neighbors(v3).len(), 2);
        assert!(!graph.is_neighbor(v0, v3));
    }

    #[test]
    fn test_direction() {
        let graph = graph_from_ascii(&["..", ".."]);
        let v00 = graph.vertex_id(0, 0).unwrap();
        let v01 = graph.vertex_id(0, 1).unwrap();
        let v10 = graph.vertex_id(1, 0).unwrap();

        assert_eq!(graph.direction(v00, v01), Orientation::YPlus);
        assert_eq!(graph.direction(v01, v00), Orientation::YMinus);
        assert_eq!(graph.direction(v00, v10), Orientation::XPlus);
        assert_eq!(graph.direction(v10, v00), Orientation::XMinus);
    }

    #[test]
    fn test_compute_action() {
        let graph = graph_from_ascii(&["..", ".."]);
        let v00 = graph.vertex_id(0, 0).unwrap();
        let v01 = graph.vertex_id(0, 1).unwrap();
        let v10 = graph.vertex_id(1, 0).unwrap();

        // stay
        assert_eq!(
            graph.compute_action(v00, v00, Orientation::XPlus),
            (v00, Orientation::XPlus)
        );
        // aligned: forward move
        assert_eq!(
            graph.compute_action(v00, v01, Orientation::YPlus),
            (v01, Orientation::YPlus)
        );
        // 90 degrees off: rotate toward the target
        assert_eq!(
            graph.compute_action(v00, v01, Orientation::XPlus),
            (v00, Orientation::YPlus)
        );
        // 180 degrees off: one CCW step, a second call faces the target
        let (v_out, h_out) = graph.compute_action(v00, v10, Orientation::XMinus);
        assert_eq!(v_out, v00);
        assert_eq!(h_out, Orientation::XMinus.rotate_ccw());
        assert_eq!(
            graph.compute_action(v00, v10, h_out),
            (v00, Orientation::XPlus)
        );
    }

    #[test]
    #[should_panic(expected = "not adjacent")]
    fn test_compute_action_rejects_non_neighbor() {
        let graph = graph_from_ascii(&["...", "..."]);
        let v00 = graph.vertex_id(0, 0).unwrap();
        let v02 = graph.vertex_id(0, 2).unwrap();
        graph.compute_action(v00, v02, Orientation::YPlus);
    }
}
