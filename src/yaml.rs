use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Write};

use crate::common::{Agent, Orientation};
use crate::map::Map;

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentYaml {
    pub name: String,
    pub start: [usize; 2],
    pub goal: [usize; 2],
    #[serde(default)]
    pub heading: Option<Orientation>,
}

impl AgentYaml {
    pub fn to_agent(&self, id: usize) -> Agent {
        Agent {
            id,
            start: (self.start[0], self.start[1]),
            goal: (self.goal[0], self.goal[1]),
            heading: self.heading.unwrap_or(Orientation::YMinus),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceYaml {
    pub agent: Vec<AgentYaml>,
    pub map: String,
}

impl InstanceYaml {
    pub fn from_yaml(path: &str) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn to_agents(&self, map: &Map) -> Result<Vec<Agent>> {
        let mut agents = Vec::new();
        for (index, agent_yaml) in self.agent.iter().enumerate() {
            let agent = agent_yaml.to_agent(index);
            if !agent.verify(map) {
                bail!("agent {}: start or goal is not passable", index);
            }
            agents.push(agent);
        }
        Ok(agents)
    }
}

pub fn write_agents_to_yaml(path: &str, agents: &[Agent]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    let yaml_data = serde_yaml::to_string(&agents)?;
    writer.write_all(yaml_data.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_instance_yaml() {
        let yaml_str = "\
map: corridor.map
agent:
  - name: agent0
    start: [0, 0]
    goal: [0, 4]
    heading: X_PLUS
  - name: agent1
    start: [0, 4]
    goal: [0, 0]
";
        let instance: InstanceYaml = serde_yaml::from_str(yaml_str).unwrap();
        let map = Map::from_reader(Cursor::new("type octile\nheight 1\nwidth 5\nmap\n.....\n"))
            .unwrap();
        let agents = instance.to_agents(&map).unwrap();

        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].start, (0, 0));
        assert_eq!(agents[0].goal, (0, 4));
        assert_eq!(agents[0].heading, Orientation::XPlus);
        // heading defaults to Y_MINUS when omitted
        assert_eq!(agents[1].heading, Orientation::YMinus);
    }

    #[test]
    fn test_reject_impassable_start() {
        let yaml_str = "\
map: corridor.map
agent:
  - name: agent0
    start: [0, 1]
    goal: [0, 2]
";
        let instance: InstanceYaml = serde_yaml::from_str(yaml_str).unwrap();
        let map = Map::from_reader(Cursor::new("type octile\nheight 1\nwidth 3\nmap\n.@.\n"))
            .unwrap();
        assert!(instance.to_agents(&map).is_err());
    }
}
