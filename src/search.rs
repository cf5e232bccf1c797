use crate::maps::{self, Map};
use crate::merge::{self, LocalSolution};
use crate::partitions::{self, Block, Partition};
use crate::planner::{Plan, PlanResult, Planner};
use crate::scenario::Scenario;
use crate::validate;
use crate::{Pos, mat};
use anyhow::{Context, Result, bail};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One pending sub-problem on the search stack. Immutable once pushed.
/// `enabled` maps local agent indices (the indexing of `starts`/`goals`)
/// back to global agent ids.
#[derive(Debug, Clone)]
pub struct Instance {
    pub starts: Vec<Pos>,
    pub goals: Vec<Pos>,
    pub enabled: Vec<usize>,
    pub time_start: usize,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Instances with more agents than this are not decomposed at all:
    /// candidate count is Bell(k) - 1, so enumeration has to be bounded
    /// somewhere.
    pub max_split_agents: usize,
    /// Print accepted/exhausted notices to stderr.
    pub verbose: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_split_agents: 10,
            verbose: false,
        }
    }
}

/// A block whose instance no candidate partition validated for. Its agents
/// keep the unsplit plan of their parent from `time_start` on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExhaustedBlock {
    pub time_start: usize,
    pub agents: Vec<usize>,
}

/// The oracle's product: a complete global plan, the accepted partitions
/// keyed by the absolute time step where they took effect, and every block
/// the search had to give up on.
#[derive(Debug, Clone, Serialize)]
pub struct Factorization {
    /// `solution[t][agent]` for every global agent, `t` absolute.
    pub solution: Vec<Vec<Pos>>,
    /// Blocks of global agent ids; only steps where the partition changed.
    pub partitions: BTreeMap<usize, Vec<Block>>,
    pub exhausted: Vec<ExhaustedBlock>,
}

impl Factorization {
    pub fn makespan(&self) -> usize {
        self.solution.len().saturating_sub(1)
    }

    /// Writes the partitions-per-timestep record for the downstream scoring
    /// consumer.
    pub fn save_partitions(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.partitions)
            .context("failed to serialize partitions record")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Partitions-per-timestep record. Consecutive identical partitions collapse
/// into one entry; sibling splits landing on the same timestep extend it.
#[derive(Default)]
struct PartitionRecord {
    entries: BTreeMap<usize, Vec<Block>>,
    last: Option<Vec<Block>>,
}

impl PartitionRecord {
    fn push(&mut self, ts: usize, blocks: Vec<Block>) {
        if self.last.as_ref() == Some(&blocks) {
            return;
        }
        self.entries
            .entry(ts)
            .or_default()
            .extend(blocks.iter().cloned());
        self.last = Some(blocks);
    }
}

/// Runs the decomposition search: solve the whole instance once for the
/// baseline, then repeatedly pop a pending instance and try to split it,
/// finest candidate first, accepting the first partition whose merged
/// per-block plans validate.
///
/// An unknown map name is fatal. A planner that cannot solve the root
/// instance is fatal. A planner that cannot solve one block only fails that
/// candidate partition.
pub fn run(
    map_name: &str,
    starts: &[Pos],
    goals: &[Pos],
    planner: &mut dyn Planner,
    config: SearchConfig,
) -> Result<Factorization> {
    let map = maps::get_map(map_name)?;
    if starts.is_empty() {
        bail!("instance has no agents");
    }
    if starts.len() != goals.len() {
        bail!(
            "instance has {} starts but {} goals",
            starts.len(),
            goals.len()
        );
    }
    let n = starts.len();
    let all: Vec<usize> = (0..n).collect();

    let baseline = match planner.solve(&Scenario::project(map, &all, starts, goals))? {
        PlanResult::Solved(plan) => plan,
        PlanResult::Unsolved => bail!("planner could not solve the {}-agent root instance", n),
    };

    let mut search = DecompositionSearch {
        map,
        config,
        n,
        goals: goals.to_vec(),
        baseline: Some(baseline),
        global: BTreeMap::new(),
        record: PartitionRecord::default(),
        exhausted: Vec::new(),
        stack: vec![Instance {
            starts: starts.to_vec(),
            goals: goals.to_vec(),
            enabled: all,
            time_start: 0,
        }],
    };
    while let Some(ins) = search.stack.pop() {
        match search.try_partitions(planner, &ins)? {
            Some((partition, local)) => search.accept(&ins, &partition, &local),
            None => search.exhaust(&ins)?,
        }
    }
    Ok(search.finish())
}

struct DecompositionSearch {
    map: &'static Map,
    config: SearchConfig,
    n: usize,
    /// Global goals, indexed by global agent id.
    goals: Vec<Pos>,
    /// The root's own unsplit plan, kept for the exhaustion fallback.
    baseline: Option<Plan>,
    /// step -> one cell per global agent; each cell written at most once.
    global: BTreeMap<usize, Vec<Option<Pos>>>,
    record: PartitionRecord,
    exhausted: Vec<ExhaustedBlock>,
    stack: Vec<Instance>,
}

impl DecompositionSearch {
    /// Iterates candidate partitions finest first and returns the first one
    /// whose merged plan validates, with that plan.
    fn try_partitions(
        &mut self,
        planner: &mut dyn Planner,
        ins: &Instance,
    ) -> Result<Option<(Partition, LocalSolution)>> {
        let k = ins.enabled.len();
        if k > self.config.max_split_agents {
            if self.config.verbose {
                eprintln!(
                    "t={}: {} agents exceed the split bound of {}, not decomposing",
                    ins.time_start, k, self.config.max_split_agents
                );
            }
            return Ok(None);
        }
        for partition in partitions::all_partitions(k) {
            if let Some(local) = self.try_candidate(planner, ins, &partition)? {
                return Ok(Some((partition, local)));
            }
        }
        Ok(None)
    }

    /// Plans every block of the candidate independently, merges and pads the
    /// results, and validates the combined plan. `None` means the candidate
    /// failed (a block was unsolvable or the merge does not validate).
    fn try_candidate(
        &mut self,
        planner: &mut dyn Planner,
        ins: &Instance,
        partition: &Partition,
    ) -> Result<Option<LocalSolution>> {
        let n = ins.enabled.len();
        let mut local = LocalSolution::new();
        for block in partition.blocks() {
            let scenario = Scenario::project(self.map, block, &ins.starts, &ins.goals);
            match planner.solve(&scenario)? {
                PlanResult::Solved(plan) => {
                    merge::update_local_solution(&plan, &mut local, block, n)?;
                }
                PlanResult::Unsolved => return Ok(None),
            }
        }
        merge::pad_local_solution(&mut local, n, &ins.goals);
        if validate::is_valid(&local, self.map) {
            Ok(Some(local))
        } else {
            Ok(None)
        }
    }

    fn accept(&mut self, ins: &Instance, partition: &Partition, local: &LocalSolution) {
        let ts = ins.time_start;
        if self.config.verbose {
            eprintln!(
                "t={}: accepted split into blocks of {:?}",
                ts,
                partition.blocks().iter().map(|b| b.len()).collect_vec()
            );
        }
        self.splice(ts, &ins.enabled, local);

        let blocks_glob: Vec<Block> = partition
            .blocks()
            .iter()
            .map(|b| b.iter().map(|&i| ins.enabled[i]).collect())
            .collect();
        self.record.push(ts, blocks_glob);

        // The generator never emits the whole-set partition; if one ever got
        // here, recursing on it would re-queue the same agent set one step
        // later instead of refining it.
        if partition.is_whole(ins.enabled.len()) {
            return;
        }
        for block in partition.blocks() {
            if block.len() <= 1 {
                continue;
            }
            let enabled: Vec<usize> = block.iter().map(|&i| ins.enabled[i]).collect();
            // A parent plan of makespan 0 has no next step: the block's
            // agents are already at their goals.
            let Some(starts) = self.positions_at(ts + 1, &enabled) else {
                continue;
            };
            let goals = enabled.iter().map(|&g| self.goals[g]).collect();
            self.stack.push(Instance {
                starts,
                goals,
                enabled,
                time_start: ts + 1,
            });
        }
    }

    /// No candidate validated. The root falls back to its own baseline plan
    /// (the coarsest, no-split answer, valid by construction); sub-instances
    /// are already covered by their parent's accepted rows. Either way the
    /// block is reported, not silently dropped.
    fn exhaust(&mut self, ins: &Instance) -> Result<()> {
        if self.config.verbose {
            eprintln!(
                "t={}: no partition of {} agents validated, keeping the unsplit plan",
                ins.time_start,
                ins.enabled.len()
            );
        }
        if ins.time_start == 0 && ins.enabled.len() == self.n {
            if let Some(baseline) = self.baseline.take() {
                let mut local = LocalSolution::new();
                merge::update_local_solution(&baseline, &mut local, &ins.enabled, self.n)?;
                self.splice(0, &ins.enabled, &local);
            }
        }
        self.exhausted.push(ExhaustedBlock {
            time_start: ins.time_start,
            agents: ins.enabled.clone(),
        });
        Ok(())
    }

    /// Splices local rows into the global solution at the instance's time
    /// offset. Cells are write-once: whichever accepted partition produced a
    /// cell first owns it.
    fn splice(&mut self, ts: usize, enabled: &[usize], local: &LocalSolution) {
        for (&step, row) in local {
            let grow = self
                .global
                .entry(ts + step)
                .or_insert_with(|| mat![None; self.n]);
            for (i, &g) in enabled.iter().enumerate() {
                if grow[g].is_none() {
                    grow[g] = row[i];
                }
            }
        }
    }

    fn positions_at(&self, step: usize, agents: &[usize]) -> Option<Vec<Pos>> {
        let row = self.global.get(&step)?;
        agents.iter().map(|&g| row[g]).collect()
    }

    /// Pads cells past an agent's final planned step with its goal and
    /// flattens the global solution into contiguous rows.
    fn finish(self) -> Factorization {
        let max_step = self.global.keys().next_back().copied().unwrap_or(0);
        let mut solution = Vec::with_capacity(max_step + 1);
        for step in 0..=max_step {
            let row = match self.global.get(&step) {
                Some(row) => row
                    .iter()
                    .enumerate()
                    .map(|(g, cell)| cell.unwrap_or(self.goals[g]))
                    .collect(),
                None => self.goals.clone(),
            };
            solution.push(row);
        }
        Factorization {
            solution,
            partitions: self.record.entries,
            exhausted: self.exhausted,
        }
    }
}
