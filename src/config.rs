use anyhow::bail;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "rust-pibt",
    about = "Orientation-aware Priority Inheritance with Backtracking for MAPF, implemented in Rust.",
    version = "0.1"
)]
pub struct Cli {
    #[arg(long, short, help = "Path to the YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "PRNG seed, overrides the config file")]
    pub seed: Option<u64>,

    #[arg(long, help = "Number of agents generated from the scenario file")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Maximum number of timesteps before reporting failure")]
    pub max_timestep: Option<usize>,

    #[arg(
        long,
        help = "Disable initialization of priorities using distance from starts to goals"
    )]
    pub disable_dist_init: bool,
}

#[derive(Serialize, Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub map_path: String,
    pub scen_path: Option<String>,
    pub agents_path: Option<String>,
    pub dump_agents_path: Option<String>,
    pub num_agents: usize,
    pub seed: u64,
    pub max_timestep: usize,
    pub time_limit_ms: u64,
    pub disable_dist_init: bool,
    pub push_escape_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_path: "map_file/test/test.map".to_string(),
            scen_path: None,
            agents_path: Some("map_file/test/test.yaml".to_string()),
            dump_agents_path: None,
            num_agents: 10,
            seed: 0,
            max_timestep: 1000,
            time_limit_ms: 30_000,
            disable_dist_init: false,
            push_escape_threshold: 2,
        }
    }
}

impl Config {
    pub fn from_yaml_str(config_str: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(config_str)?;
        config.validate()
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(num_agents) = cli.num_agents {
            self.num_agents = num_agents;
        }
        if let Some(max_timestep) = cli.max_timestep {
            self.max_timestep = max_timestep;
        }
        if cli.disable_dist_init {
            self.disable_dist_init = true;
        }
        self.validate()
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        if self.num_agents == 0 {
            bail!("invalid agent count: 0");
        }
        if self.max_timestep == 0 {
            bail!("max_timestep must be at least 1");
        }
        if self.push_escape_threshold == 0 {
            bail!("push_escape_threshold must be at least 1");
        }
        if self.scen_path.is_none() && self.agents_path.is_none() {
            bail!("config must provide either scen_path or agents_path");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_yaml() {
        let config = Config::from_yaml_str(
            "map_path: maps/corridor.map\nnum_agents: 4\nseed: 7\nmax_timestep: 50\n",
        )
        .unwrap();

        assert_eq!(config.map_path, "maps/corridor.map");
        assert_eq!(config.num_agents, 4);
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_timestep, 50);
        // defaults survive partial configs
        assert_eq!(config.push_escape_threshold, 2);
        assert!(!config.disable_dist_init);
    }

    #[test]
    fn test_config_rejects_zero_agents() {
        assert!(Config::from_yaml_str("num_agents: 0\n").is_err());
    }
}
