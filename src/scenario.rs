use anyhow::{bail, Result};
use rand::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::info;

use crate::common::{Agent, Orientation};

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

#[derive(Debug)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub routes: Vec<Route>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> io::Result<Scenario> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines().map(|line| line.unwrap());

        // First line is "version x.x" which we can skip
        let _version = lines.next().unwrap();

        let mut scenario = Scenario {
            map: String::new(),
            map_width: 0,
            map_height: 0,
            routes: Vec::new(),
        };

        for line in lines {
            let parts: Vec<&str> = line.split_whitespace().collect();

            let route = Route {
                start_x: parts[5].parse().unwrap(),
                start_y: parts[4].parse().unwrap(),
                goal_x: parts[7].parse().unwrap(),
                goal_y: parts[6].parse().unwrap(),
            };

            if scenario.map.is_empty() {
                // Initialize map details from the first route entry
                scenario.map = parts[1].to_string();
                scenario.map_width = parts[2].parse().unwrap();
                scenario.map_height = parts[3].parse().unwrap();
            }

            scenario.routes.push(route);
        }

        Ok(scenario)
    }

    pub fn generate_agents_randomly<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        if self.routes.len() < num_agents {
            bail!("not enough unique routes available to match the number of agents");
        }

        // Shuffle the available routes to randomize the route selection
        let mut available_routes = self.routes.clone();
        available_routes.shuffle(rng);

        let agents: Vec<Agent> = available_routes
            .into_iter()
            .take(num_agents)
            .enumerate()
            .map(|(agent_id, route)| Agent {
                id: agent_id,
                start: (route.start_x, route.start_y),
                goal: (route.goal_x, route.goal_y),
                heading: Orientation::YMinus,
            })
            .collect();

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_scen(path: &std::path::Path) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "version 1").unwrap();
        writeln!(file, "0\ttiny.map\t4\t4\t1\t0\t1\t3\t3").unwrap();
        writeln!(file, "0\ttiny.map\t4\t4\t2\t0\t2\t3\t3").unwrap();
        writeln!(file, "1\ttiny.map\t4\t4\t3\t0\t3\t3\t3").unwrap();
    }

    #[test]
    fn test_read_scenario() {
        let dir = std::env::temp_dir();
        let path = dir.join("rust_pibt_test.scen");
        write_scen(&path);

        let scen = Scenario::load_from_scen(path.to_str().unwrap()).unwrap();
        assert_eq!(scen.map, "tiny.map");
        assert_eq!(scen.map_width, 4);
        assert_eq!(scen.map_height, 4);
        assert_eq!(scen.routes.len(), 3);
        assert_eq!(
            scen.routes[0],
            Route {
                start_x: 0,
                start_y: 1,
                goal_x: 3,
                goal_y: 1
            }
        );

        let seed = [0u8; 32];
        let mut rng = StdRng::from_seed(seed);
        let agents = scen.generate_agents_randomly(2, &mut rng).unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id, 0);
        assert_eq!(agents[0].heading, Orientation::YMinus);

        assert!(scen.generate_agents_randomly(4, &mut rng).is_err());
    }
}
