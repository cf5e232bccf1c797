use crate::scenario::Scenario;
use crate::{Pos, SetMinMax};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A time-indexed plan: `steps[t][i]` is agent `i`'s position at step `t`,
/// in scenario agent order. Step 0 is the start configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub steps: Vec<Vec<Pos>>,
}

impl Plan {
    pub fn makespan(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanResult {
    Solved(Plan),
    /// The planner gave up on this scenario. Not an error: the caller treats
    /// the enclosing partition candidate as failed and moves on.
    Unsolved,
}

/// The sole interface to the path planner. Implementations may shell out to
/// an external solver or plan in memory; the search cannot tell the
/// difference.
pub trait Planner {
    fn solve(&mut self, scenario: &Scenario) -> Result<PlanResult>;
}

// ------------------------- external subprocess -------------------------

/// Runs an external MAPF solver through its file protocol: write the
/// scenario, invoke the command, parse the result file it leaves behind.
pub struct SubprocessPlanner {
    command: String,
    map_dir: PathBuf,
    scen_path: PathBuf,
    result_path: PathBuf,
}

impl SubprocessPlanner {
    /// `map_dir` holds one directory per map (`<name>/<name>.map`);
    /// `work_dir` receives the temporary scenario and the result file.
    pub fn new(command: &str, map_dir: &Path, work_dir: &Path) -> Self {
        Self {
            command: command.to_string(),
            map_dir: map_dir.to_path_buf(),
            scen_path: work_dir.join("temp_scenario.scen"),
            result_path: work_dir.join("result.txt"),
        }
    }
}

impl Planner for SubprocessPlanner {
    fn solve(&mut self, scenario: &Scenario) -> Result<PlanResult> {
        scenario.write_to(&self.scen_path)?;
        let map_name = scenario.map.map_name;
        let map_path = self
            .map_dir
            .join(map_name)
            .join(format!("{}.map", map_name));
        let status = Command::new(&self.command)
            .arg("-i")
            .arg(&self.scen_path)
            .arg("-m")
            .arg(&map_path)
            .arg("-N")
            .arg(scenario.num_agents().to_string())
            .arg("-v")
            .arg("0")
            .arg("-f")
            .arg("no")
            .arg("-sp")
            .arg("no")
            .status()
            .with_context(|| format!("failed to run planner command {:?}", self.command))?;
        if !status.success() {
            bail!("planner command {:?} exited with {}", self.command, status);
        }
        let text = std::fs::read_to_string(&self.result_path)
            .with_context(|| format!("failed to read {}", self.result_path.display()))?;
        parse_result(&text)
    }
}

/// Parses the solver's result file: `key=value` header lines, then a
/// `solution=` section of `t:(x,y),(x,y),...` rows.
pub fn parse_result(text: &str) -> Result<PlanResult> {
    let mut solved = None;
    let mut rows: Vec<(usize, Vec<Pos>)> = Vec::new();
    let mut in_solution = false;
    for line in text.lines() {
        let line = line.trim();
        if line == "solution=" {
            in_solution = true;
            continue;
        }
        if in_solution {
            let Some((step, positions)) = line.split_once(':') else {
                continue;
            };
            let step: usize = step.trim().parse().context("bad step index")?;
            rows.push((step, parse_pos_list(positions)?));
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "solved" {
                solved = Some(value.trim() == "1");
            }
        }
    }
    match solved {
        Some(false) => Ok(PlanResult::Unsolved),
        Some(true) => {
            let mut steps = vec![Vec::new(); rows.len()];
            for (step, positions) in rows {
                if step >= steps.len() || !steps[step].is_empty() {
                    bail!("malformed solution section: bad step {}", step);
                }
                steps[step] = positions;
            }
            if steps.is_empty() {
                bail!("result marked solved but has no solution rows");
            }
            Ok(PlanResult::Solved(Plan { steps }))
        }
        None => bail!("result file has no solved= line"),
    }
}

fn parse_pos_list(s: &str) -> Result<Vec<Pos>> {
    let mut out = Vec::new();
    for chunk in s.trim().split("),") {
        let chunk = chunk.trim().trim_matches(|c| c == '(' || c == ')');
        if chunk.is_empty() {
            continue;
        }
        let (x, y) = chunk
            .split_once(',')
            .with_context(|| format!("bad position {:?}", chunk))?;
        out.push((x.trim().parse()?, y.trim().parse()?));
    }
    Ok(out)
}

// --------------------------- in-memory grid ----------------------------

/// In-memory planner: prioritized space-time A* on the open grid of the
/// scenario's map. Deterministic for a fixed seed; when the initial agent
/// order fails, a bounded number of seeded shuffles of the priority order is
/// tried before reporting `Unsolved`. Meant for tests and for running the
/// oracle without the external solver; it knows nothing about obstacles.
pub struct GridPlanner {
    seed: u64,
    retries: usize,
}

impl GridPlanner {
    pub fn new(seed: u64) -> Self {
        Self { seed, retries: 8 }
    }
}

impl Planner for GridPlanner {
    fn solve(&mut self, scenario: &Scenario) -> Result<PlanResult> {
        let n = scenario.num_agents();
        let mut order: Vec<usize> = (0..n).collect();
        for attempt in 0..=self.retries {
            if attempt > 0 {
                let mut rng =
                    rand_chacha::ChaCha20Rng::seed_from_u64(self.seed.wrapping_add(attempt as u64));
                order.shuffle(&mut rng);
            }
            if let Some(paths) = plan_in_order(scenario, &order) {
                return Ok(PlanResult::Solved(assemble_plan(paths)));
            }
        }
        Ok(PlanResult::Unsolved)
    }
}

/// Space-time cells claimed by already-planned agents. Agents planned later
/// route around these; an agent that cannot (boxed in, or forced off its own
/// start too late) fails the whole priority order.
#[derive(Default)]
struct Reservations {
    /// (step, cell) occupied.
    vertex: FxHashSet<(usize, Pos)>,
    /// (arrival step, from, to) for each move taken.
    edge: FxHashSet<(usize, Pos, Pos)>,
    /// cell -> step from which an agent sits on it forever.
    parked: FxHashMap<Pos, usize>,
}

fn plan_in_order(scenario: &Scenario, order: &[usize]) -> Option<Vec<Vec<Pos>>> {
    let map = scenario.map;
    let horizon = map.width + map.height + 2 * scenario.num_agents() + 2;
    let mut res = Reservations::default();
    let mut paths: Vec<Vec<Pos>> = vec![Vec::new(); scenario.num_agents()];
    for &i in order {
        let (start, goal) = scenario.pairs[i];
        let path = space_time_astar(map, start, goal, horizon, &res)?;
        for (t, &p) in path.iter().enumerate() {
            res.vertex.insert((t, p));
            if t > 0 {
                res.edge.insert((t, path[t - 1], p));
            }
        }
        res.parked.insert(goal, path.len() - 1);
        paths[i] = path;
    }
    Some(paths)
}

/// A* over (cell, step) states with unit step cost and Manhattan heuristic.
/// Neighbor generation order is fixed and heap ties break by insertion
/// order, so the result is fully deterministic.
fn space_time_astar(
    map: &crate::maps::Map,
    start: Pos,
    goal: Pos,
    horizon: usize,
    res: &Reservations,
) -> Option<Vec<Pos>> {
    if res.parked.contains_key(&goal) {
        return None;
    }
    // Parking at the goal is only safe once nobody passes through it later.
    let goal_blocked_until = res
        .vertex
        .iter()
        .filter(|&&(_, p)| p == goal)
        .map(|&(t, _)| t)
        .max();

    let manhattan = |p: Pos| {
        (p.0 - goal.0).unsigned_abs() as usize + (p.1 - goal.1).unsigned_abs() as usize
    };
    let in_bounds = |p: Pos| {
        p.0 >= 0 && (p.0 as usize) < map.width && p.1 >= 0 && (p.1 as usize) < map.height
    };

    // states[i] = (cell, step, parent state index)
    let mut states: Vec<(Pos, usize, usize)> = vec![(start, 0, usize::MAX)];
    let mut visited: FxHashSet<(Pos, usize)> = FxHashSet::default();
    visited.insert((start, 0));
    let mut heap = BinaryHeap::new();
    heap.push(std::cmp::Reverse((manhattan(start), 0usize)));

    const MOVES: [(i32, i32); 5] = [(1, 0), (-1, 0), (0, 1), (0, -1), (0, 0)];

    while let Some(std::cmp::Reverse((_, si))) = heap.pop() {
        let (pos, t, _) = states[si];
        if pos == goal && goal_blocked_until.is_none_or(|last| t > last) {
            let mut path = Vec::with_capacity(t + 1);
            let mut cur = si;
            while cur != usize::MAX {
                path.push(states[cur].0);
                cur = states[cur].2;
            }
            path.reverse();
            return Some(path);
        }
        if t == horizon {
            continue;
        }
        for (dx, dy) in MOVES {
            let np = (pos.0 + dx, pos.1 + dy);
            if !in_bounds(np)
                || visited.contains(&(np, t + 1))
                || res.vertex.contains(&(t + 1, np))
                || res.edge.contains(&(t + 1, np, pos))
                || res.parked.get(&np).is_some_and(|&from| t + 1 >= from)
            {
                continue;
            }
            visited.insert((np, t + 1));
            let si2 = states.len();
            states.push((np, t + 1, si));
            heap.push(std::cmp::Reverse((t + 1 + manhattan(np), si2)));
        }
    }
    None
}

/// Pads every path to the longest arrival: finished agents wait at their
/// goal.
fn assemble_plan(paths: Vec<Vec<Pos>>) -> Plan {
    let mut makespan = 0;
    for path in &paths {
        makespan.setmax(path.len() - 1);
    }
    let steps = (0..=makespan)
        .map(|t| paths.iter().map(|p| p[t.min(p.len() - 1)]).collect())
        .collect();
    Plan { steps }
}
