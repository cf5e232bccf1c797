use crate::Pos;
use crate::maps::{self, Map, UnsupportedMapKind};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// A planner-ready description of one sub-problem: the map plus one
/// (start, goal) pair per agent, in block order. This is the only thing the
/// external planner ever sees; agent identities stay on our side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub map: &'static Map,
    pub pairs: Vec<(Pos, Pos)>,
}

impl Scenario {
    /// Builds a scenario for a registered map. Unknown map names fail with
    /// `UnsupportedMapKind` before anything is written anywhere.
    pub fn new(map_name: &str, pairs: Vec<(Pos, Pos)>) -> Result<Self, UnsupportedMapKind> {
        let map = maps::get_map(map_name)?;
        Ok(Self { map, pairs })
    }

    /// Projects one block of an instance onto a scenario. `block` holds local
    /// agent indices into `starts`/`goals`; row order follows block order, so
    /// the planner's answer comes back in the same order.
    pub fn project(map: &'static Map, block: &[usize], starts: &[Pos], goals: &[Pos]) -> Self {
        let pairs = block.iter().map(|&i| (starts[i], goals[i])).collect();
        Self { map, pairs }
    }

    pub fn num_agents(&self) -> usize {
        self.pairs.len()
    }

    /// Renders the scenario in the planner's row format: one tab-separated
    /// row per agent carrying bucket, map file, map dimensions, start, goal
    /// and unit cost.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for &((sx, sy), (gx, gy)) in &self.pairs {
            out.push_str(&format!(
                "1\t{}.map\t{}\t{}\t{}\t{}\t{}\t{}\t1\n",
                self.map.map_name, self.map.width, self.map.height, sx, sy, gx, gy
            ));
        }
        out
    }

    /// Writes the scenario to the location the external planner reads from.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .with_context(|| format!("failed to write scenario to {}", path.display()))
    }
}
