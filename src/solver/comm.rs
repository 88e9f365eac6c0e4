mod agent;
mod distance;

pub(crate) use agent::{AgentState, Request};
pub(crate) use distance::{DistanceTable, UNREACHABLE};
