use anyhow::{Context, Result, bail};
use clap::Parser;
use mapf_fact::Pos;
use mapf_fact::planner::{GridPlanner, Planner, SubprocessPlanner};
use mapf_fact::search::{self, SearchConfig};
use std::path::{Path, PathBuf};

/// Runs the factorization oracle on a scenario and writes the
/// partitions-per-timestep record.
#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'm', long = "map", help = "Registered map name")]
    map: String,
    #[arg(
        short = 'i',
        long = "scen",
        help = "Scenario file, one start/goal row per agent"
    )]
    scen: PathBuf,
    #[arg(short = 'N', long = "agents", help = "Use only the first N rows")]
    agents: Option<usize>,
    #[arg(
        long = "planner-cmd",
        help = "External solver command; the in-memory grid planner is used if omitted"
    )]
    planner_cmd: Option<String>,
    #[arg(long = "map-dir", default_value = "assets/maps")]
    map_dir: PathBuf,
    #[arg(long = "work-dir", default_value = "build")]
    work_dir: PathBuf,
    #[arg(short = 'o', long = "out", default_value = "partitions.json")]
    out: PathBuf,
    #[arg(long = "max-split", default_value_t = 10)]
    max_split: usize,
    #[arg(long = "seed", default_value_t = 0)]
    seed: u64,
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (starts, goals) = read_scen_rows(&args.scen, args.agents)?;
    let mut planner: Box<dyn Planner> = match &args.planner_cmd {
        Some(cmd) => Box::new(SubprocessPlanner::new(cmd, &args.map_dir, &args.work_dir)),
        None => Box::new(GridPlanner::new(args.seed)),
    };
    let config = SearchConfig {
        max_split_agents: args.max_split,
        verbose: args.verbose,
    };
    let fact = search::run(&args.map, &starts, &goals, planner.as_mut(), config)?;
    fact.save_partitions(&args.out)?;
    eprintln!(
        "agents={} makespan={} splits={} exhausted={}",
        starts.len(),
        fact.makespan(),
        fact.partitions.len(),
        fact.exhausted.len()
    );
    Ok(())
}

/// Reads start/goal pairs from standard scenario rows
/// (`bucket map w h sx sy gx gy cost`, tab-separated).
fn read_scen_rows(path: &Path, limit: Option<usize>) -> Result<(Vec<Pos>, Vec<Pos>)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    let mut starts = Vec::new();
    let mut goals = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("version") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            bail!("malformed scenario row: {:?}", line);
        }
        let coord = |i: usize| -> Result<i32> {
            fields[i]
                .parse()
                .with_context(|| format!("bad coordinate {:?} in row {:?}", fields[i], line))
        };
        starts.push((coord(4)?, coord(5)?));
        goals.push((coord(6)?, coord(7)?));
        if limit.is_some_and(|n| starts.len() == n) {
            break;
        }
    }
    if starts.is_empty() {
        bail!("scenario {} has no agent rows", path.display());
    }
    Ok((starts, goals))
}
