use crate::Pos;
use crate::mat;
use crate::planner::Plan;
use std::collections::BTreeMap;
use thiserror::Error;

/// A merged plan under construction: step -> one slot per agent of the
/// parent instance. `None` marks a cell no block has written yet.
pub type LocalSolution = BTreeMap<usize, Vec<Option<Pos>>>;

/// Two blocks claimed the same (step, agent) cell in one merge pass. Blocks
/// of a partition are disjoint, so this can only mean the caller handed the
/// planner overlapping blocks; the candidate is aborted, never overwritten.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("merge conflict: cell (step {step}, agent {agent}) written twice")]
pub struct MergeConflict {
    pub step: usize,
    pub agent: usize,
}

/// Folds one block's plan into the shared solution. `block` maps the plan's
/// agent order to parent-local indices; `n` is the parent's agent count.
pub fn update_local_solution(
    plan: &Plan,
    local_solution: &mut LocalSolution,
    block: &[usize],
    n: usize,
) -> Result<(), MergeConflict> {
    for (step, positions) in plan.steps.iter().enumerate() {
        let row = local_solution.entry(step).or_insert_with(|| mat![None; n]);
        for (i, &id_loc) in block.iter().enumerate() {
            if row[id_loc].is_some() {
                return Err(MergeConflict {
                    step,
                    agent: id_loc,
                });
            }
            row[id_loc] = Some(positions[i]);
        }
    }
    Ok(())
}

/// Fills every cell still unset after merging, at steps past 0, with that
/// agent's goal: an agent whose block finished early waits at its goal while
/// the other blocks keep moving. A no-op on a fully populated solution.
pub fn pad_local_solution(local_solution: &mut LocalSolution, n: usize, goals: &[Pos]) {
    for (&step, row) in local_solution.iter_mut() {
        if step == 0 {
            continue;
        }
        for agent in 0..n {
            if row[agent].is_none() {
                row[agent] = Some(goals[agent]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(steps: Vec<Vec<Pos>>) -> Plan {
        Plan { steps }
    }

    #[test]
    fn disjoint_blocks_fill_disjoint_cells() {
        let mut local = LocalSolution::new();
        let a = plan(vec![vec![(0, 0), (1, 0)], vec![(0, 1), (1, 1)]]);
        let b = plan(vec![vec![(4, 4)], vec![(4, 3)], vec![(4, 2)]]);
        update_local_solution(&a, &mut local, &[0, 2], 3).unwrap();
        update_local_solution(&b, &mut local, &[1], 3).unwrap();
        assert_eq!(local[&0], vec![Some((0, 0)), Some((4, 4)), Some((1, 0))]);
        assert_eq!(local[&1], vec![Some((0, 1)), Some((4, 3)), Some((1, 1))]);
        assert_eq!(local[&2], vec![None, Some((4, 2)), None]);
    }

    #[test]
    fn overlapping_blocks_are_a_merge_conflict() {
        let mut local = LocalSolution::new();
        let a = plan(vec![vec![(0, 0)]]);
        let b = plan(vec![vec![(3, 3)]]);
        update_local_solution(&a, &mut local, &[1], 2).unwrap();
        let err = update_local_solution(&b, &mut local, &[1], 2).unwrap_err();
        assert_eq!(err, MergeConflict { step: 0, agent: 1 });
    }

    #[test]
    fn pad_fills_late_steps_with_goals() {
        let mut local = LocalSolution::new();
        let a = plan(vec![vec![(0, 0)], vec![(0, 1)], vec![(0, 2)]]);
        let b = plan(vec![vec![(4, 4)], vec![(4, 3)]]);
        update_local_solution(&a, &mut local, &[0], 2).unwrap();
        update_local_solution(&b, &mut local, &[1], 2).unwrap();
        pad_local_solution(&mut local, 2, &[(0, 2), (4, 3)]);
        assert_eq!(local[&2], vec![Some((0, 2)), Some((4, 3))]);
        for step in 1..=2 {
            assert!(local[&step].iter().all(|c| c.is_some()));
        }
    }

    #[test]
    fn pad_is_idempotent_on_a_full_solution() {
        let mut local = LocalSolution::new();
        let a = plan(vec![vec![(0, 0), (4, 4)], vec![(0, 1), (4, 3)]]);
        update_local_solution(&a, &mut local, &[0, 1], 2).unwrap();
        let before = local.clone();
        pad_local_solution(&mut local, 2, &[(0, 1), (4, 3)]);
        assert_eq!(local, before);
    }
}
