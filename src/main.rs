mod common;
mod config;
mod map;
mod scenario;
mod solver;
mod stat;
mod yaml;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config};
use crate::map::{Graph, Map};
use crate::scenario::Scenario;
use crate::solver::{Solver, PIBT};
use crate::yaml::{write_agents_to_yaml, InstanceYaml};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let config_str =
                fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
            Config::from_yaml_str(&config_str)?
        }
        None => Config::default(),
    };
    let config = config.override_from_command_line(&cli)?;
    info!("config: {config:?}");

    let map = Map::from_file(&config.map_path)
        .with_context(|| format!("failed to load map {}", config.map_path))?;
    let graph = Graph::from_map(&map);

    let agents = if let Some(scen_path) = &config.scen_path {
        let scenario = Scenario::load_from_scen(scen_path)
            .with_context(|| format!("failed to load scenario {scen_path}"))?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        scenario.generate_agents_randomly(config.num_agents, &mut rng)?
    } else if let Some(agents_path) = &config.agents_path {
        InstanceYaml::from_yaml(agents_path)
            .with_context(|| format!("failed to load agents {agents_path}"))?
            .to_agents(&map)?
    } else {
        bail!("config must provide either scen_path or agents_path");
    };

    if let Some(dump_path) = &config.dump_agents_path {
        write_agents_to_yaml(dump_path, &agents)?;
    }

    let mut solver = PIBT::new(&agents, &graph, &config)?;
    let solution = solver.solve(&config);

    if !solution.verify(&graph, &agents) {
        bail!("solution verification failed");
    }
    info!(
        "solved: {}, makespan {}, sum of costs {}",
        solution.solved,
        solution.plan.makespan(),
        solution.plan.sum_of_costs()
    );

    Ok(())
}
