//! Dependency ordering for scene construction.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// The nodes left over when a sort could not finish; they all lie on or
/// behind a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    pub remaining: Vec<T>,
}

/// Kahn's algorithm over `(dependency, dependent)` edges.
///
/// Every dependency is placed before the nodes depending on it. Nodes with
/// no ordering constraint between them keep the order of `nodes`.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let mut dependents: HashMap<T, Vec<T>> = HashMap::new();
    let mut in_degree: HashMap<T, usize> = node_list.iter().map(|node| (*node, 0)).collect();
    for (dependency, dependent) in edges {
        dependents.entry(dependency).or_default().push(dependent);
        if let Some(degree) = in_degree.get_mut(&dependent) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<T> = node_list
        .iter()
        .copied()
        .filter(|node| in_degree.get(node).copied().unwrap_or(0) == 0)
        .collect();

    let mut sorted = Vec::with_capacity(node_list.len());
    while let Some(node) = queue.pop_front() {
        sorted.push(node);
        for dependent in dependents.get(&node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if sorted.len() == node_list.len() {
        Ok(sorted)
    } else {
        let done: HashSet<T> = sorted.into_iter().collect();
        Err(CycleError {
            remaining: node_list.into_iter().filter(|n| !done.contains(n)).collect(),
        })
    }
}

/// Find one cycle among `nodes`, following `successors`. The returned path
/// starts and ends with the same node.
pub fn find_cycle<T, F, I>(nodes: &[T], mut successors: F) -> Option<Vec<T>>
where
    T: Copy + Eq + Hash,
    F: FnMut(T) -> I,
    I: IntoIterator<Item = T>,
{
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    let mut marks: HashMap<T, Mark> = HashMap::new();
    for &start in nodes {
        if marks.contains_key(&start) {
            continue;
        }
        // Iterative DFS; `stack` holds the current path with pending successors.
        let mut stack: Vec<(T, std::vec::IntoIter<T>)> = Vec::new();
        marks.insert(start, Mark::Active);
        stack.push((start, successors(start).into_iter().collect::<Vec<_>>().into_iter()));

        while let Some((_, pending)) = stack.last_mut() {
            match pending.next() {
                Some(next) => match marks.get(&next) {
                    Some(Mark::Active) => {
                        let from = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                        let mut cycle: Vec<T> = stack[from..].iter().map(|(n, _)| *n).collect();
                        cycle.push(next);
                        return Some(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(next, Mark::Active);
                        let successors = successors(next).into_iter().collect::<Vec<_>>();
                        stack.push((next, successors.into_iter()));
                    }
                },
                None => {
                    if let Some((node, _)) = stack.pop() {
                        marks.insert(node, Mark::Done);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_come_first() {
        // 0 depends on 1 and 2, 2 depends on 1.
        let order = topological_sort([0, 1, 2], [(1, 0), (2, 0), (1, 2)]).unwrap();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_unconstrained_nodes_keep_input_order() {
        let order = topological_sort([3, 1, 2], std::iter::empty()).unwrap();
        assert_eq!(order, vec![3, 1, 2]);
        assert!(topological_sort(Vec::<u32>::new(), []).unwrap().is_empty());
    }

    #[test]
    fn test_cycle_reports_remaining_nodes() {
        // 0 <- 1 <-> 2
        let err = topological_sort([0, 1, 2], [(1, 0), (2, 1), (1, 2)]).unwrap_err();
        assert_eq!(err.remaining, vec![0, 1, 2]);
    }

    #[test]
    fn test_find_cycle_returns_closed_path() {
        let successors = |n: u32| match n {
            0 => vec![1],
            1 => vec![2],
            2 => vec![1],
            _ => vec![],
        };
        assert_eq!(find_cycle(&[0, 1, 2], successors), Some(vec![1, 2, 1]));
        assert_eq!(find_cycle(&[0, 3], |n: u32| if n == 0 { vec![3] } else { vec![] }), None);
    }
}
