use crate::Pos;
use crate::maps::Map;
use crate::merge::LocalSolution;
use rustc_hash::FxHashMap;

/// Manhattan-adjacency on the 4-connected grid: exactly one step apart,
/// axis-aligned. Diagonal and longer moves are not neighbors.
pub fn is_neighbor(a: Pos, b: Pos) -> bool {
    (a.0 - b.0).abs() + (a.1 - b.1).abs() == 1
}

fn in_bounds(p: Pos, map: &Map) -> bool {
    p.0 >= 0 && (p.0 as usize) < map.width && p.1 >= 0 && (p.1 as usize) < map.height
}

/// Unwraps a row, rejecting sentinel cells: a plan with holes is not valid.
fn full_row(row: &[Option<Pos>]) -> Option<Vec<Pos>> {
    row.iter().copied().collect()
}

/// Checks a merged multi-step plan for vertex collisions, edge (swap)
/// collisions and move connectivity against the grid. Returns false on the
/// first violation found.
pub fn is_valid(local_solution: &LocalSolution, map: &Map) -> bool {
    let Some(first) = local_solution.get(&0) else {
        return true;
    };
    let Some(mut last) = full_row(first) else {
        return false;
    };
    if last.iter().any(|&p| !in_bounds(p, map)) {
        return false;
    }
    let final_step = local_solution.keys().next_back().copied().unwrap_or(0);
    let mut last_index: FxHashMap<Pos, usize> = FxHashMap::default();
    for step in 1..=final_step {
        let Some(cur) = local_solution.get(&step).and_then(|row| full_row(row)) else {
            return false;
        };
        if cur.len() != last.len() {
            return false;
        }
        last_index.clear();
        for (i, &p) in last.iter().enumerate() {
            last_index.insert(p, i);
        }
        let mut occupied: FxHashMap<Pos, usize> = FxHashMap::default();
        for (i, &p) in cur.iter().enumerate() {
            // vertex collision
            if occupied.insert(p, i).is_some() {
                return false;
            }
            // connectivity: wait or a single grid step, on the map
            if !in_bounds(p, map) || (p != last[i] && !is_neighbor(last[i], p)) {
                return false;
            }
            // swap collision: i moved onto j's old cell while j moved onto i's
            if let Some(&j) = last_index.get(&p) {
                if j != i && cur[j] == last[i] {
                    return false;
                }
            }
        }
        last = cur;
    }
    true
}

/// The variant for a freshly produced full solution: everything `is_valid`
/// checks, plus step 0 matching the declared starts and the final step
/// matching the declared goals.
pub fn is_valid_full(
    local_solution: &LocalSolution,
    starts: &[Pos],
    goals: &[Pos],
    map: &Map,
) -> bool {
    let Some(first) = local_solution.get(&0).and_then(|row| full_row(row)) else {
        return false;
    };
    if first != starts {
        return false;
    }
    let Some(last) = local_solution
        .values()
        .next_back()
        .and_then(|row| full_row(row))
    else {
        return false;
    };
    if last != goals {
        return false;
    }
    is_valid(local_solution, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maps;

    fn solution(rows: &[&[Pos]]) -> LocalSolution {
        rows.iter()
            .enumerate()
            .map(|(t, row)| (t, row.iter().map(|&p| Some(p)).collect()))
            .collect()
    }

    fn map() -> &'static Map {
        maps::get_map("test-5-5").unwrap()
    }

    #[test]
    fn accepts_a_clean_two_agent_plan() {
        let s = solution(&[
            &[(0, 0), (4, 4)],
            &[(1, 0), (4, 3)],
            &[(2, 0), (4, 2)],
            &[(2, 0), (4, 2)],
        ]);
        assert!(is_valid(&s, map()));
    }

    #[test]
    fn rejects_vertex_collision() {
        let s = solution(&[&[(0, 0), (2, 0)], &[(1, 0), (1, 0)]]);
        assert!(!is_valid(&s, map()));
    }

    #[test]
    fn rejects_swap_conflict() {
        let s = solution(&[&[(1, 1), (2, 1)], &[(2, 1), (1, 1)]]);
        assert!(!is_valid(&s, map()));
    }

    #[test]
    fn rejects_non_adjacent_jump() {
        let s = solution(&[&[(0, 0)], &[(2, 0)]]);
        assert!(!is_valid(&s, map()));
        let diagonal = solution(&[&[(0, 0)], &[(1, 1)]]);
        assert!(!is_valid(&diagonal, map()));
    }

    #[test]
    fn rejects_out_of_bounds_moves() {
        let s = solution(&[&[(4, 4)], &[(5, 4)]]);
        assert!(!is_valid(&s, map()));
    }

    #[test]
    fn rejects_sentinel_holes() {
        let mut s = solution(&[&[(0, 0)], &[(1, 0)]]);
        s.get_mut(&1).unwrap()[0] = None;
        assert!(!is_valid(&s, map()));
    }

    #[test]
    fn full_variant_checks_endpoints() {
        let s = solution(&[&[(0, 0), (4, 4)], &[(1, 0), (4, 3)]]);
        assert!(is_valid_full(
            &s,
            &[(0, 0), (4, 4)],
            &[(1, 0), (4, 3)],
            map()
        ));
        assert!(!is_valid_full(
            &s,
            &[(0, 0), (4, 4)],
            &[(1, 0), (4, 2)],
            map()
        ));
        assert!(!is_valid_full(
            &s,
            &[(0, 1), (4, 4)],
            &[(1, 0), (4, 3)],
            map()
        ));
    }
}
