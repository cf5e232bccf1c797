// # mapf-fact: a factorization oracle for multi-agent pathfinding
//
// Given a solved MAPF instance, this crate searches for the finest partition
// of the agents, at each time step, into mutually independent sub-groups
// whose separately computed plans merge back into a single collision-free
// global plan. The underlying path planner is an opaque collaborator behind
// the `planner::Planner` trait; everything here is the search around it.

/// Registry of supported maps and their grid dimensions.
pub mod maps;

/// Set-partition enumeration and validated partition types.
pub mod partitions;

/// Projection of agent blocks onto the planner's scenario format.
pub mod scenario;

/// The planner boundary: trait plus subprocess and in-memory backends.
pub mod planner;

/// Folding per-block plans into a shared, sentinel-slotted solution.
pub mod merge;

/// Vertex, swap and connectivity checks for merged plans.
pub mod validate;

/// The stack-based decomposition search driver.
pub mod search;

/// Grid position as `(x, y)` integer coordinates. Equality is exact.
pub type Pos = (i32, i32);

/// A trait for conveniently updating a value to its minimum or maximum.
pub trait SetMinMax {
    /// If `v` is less than `self`, updates `self` to `v` and returns `true`.
    /// Otherwise, returns `false`.
    fn setmin(&mut self, v: Self) -> bool;
    /// If `v` is greater than `self`, updates `self` to `v` and returns `true`.
    /// Otherwise, returns `false`.
    fn setmax(&mut self, v: Self) -> bool;
}
impl<T> SetMinMax for T
where
    T: PartialOrd,
{
    fn setmin(&mut self, v: T) -> bool {
        *self > v && {
            *self = v;
            true
        }
    }
    fn setmax(&mut self, v: T) -> bool {
        *self < v && {
            *self = v;
            true
        }
    }
}

/// A macro for convenient initialization of vectors, including nested vectors for multi-dimensional arrays.
///
/// # Examples
///
/// ```
/// use mapf_fact::mat;
/// // A simple vector
/// let v1 = mat![1, 2, 3];
///
/// // A 2x3 matrix initialized with zeros
/// let m1 = mat![0; 2; 3];
/// assert_eq!(m1, vec![vec![0, 0, 0], vec![0, 0, 0]]);
/// ```
#[macro_export]
macro_rules! mat {
    ($($e:expr),*) => { vec![$($e),*] };
    ($($e:expr,)*) => { vec![$($e),*] };
    ($e:expr; $d:expr) => { vec![$e; $d] };
    ($e:expr; $d:expr $(; $ds:expr)+) => { vec![mat![$e $(; $ds)*]; $d] };
}
