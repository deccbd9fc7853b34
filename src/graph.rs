use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};
use crate::flag::Flag;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// The dependency relation over a set of flags.
///
/// A flag depends on its prerequisites and on every flag named by one of its FEATURE_FLAG
/// clauses. When the set contains the same id twice, references resolve to the first
/// occurrence.
pub struct DependencyGraph<'a> {
    flags: Vec<&'a Flag>,
    index: HashMap<&'a str, usize>,
    dependencies: Vec<Vec<&'a str>>,
    dependents: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new<I: IntoIterator<Item = &'a Flag>>(flags: I) -> Self {
        let flags: Vec<&'a Flag> = flags.into_iter().collect();

        let mut index = HashMap::with_capacity(flags.len());
        for (i, &flag) in flags.iter().enumerate() {
            index.entry(flag.id.as_str()).or_insert(i);
        }

        let dependencies: Vec<Vec<&'a str>> = flags.iter().map(|&f| f.dependency_ids()).collect();

        let mut dependents = vec![Vec::new(); flags.len()];
        for (i, deps) in dependencies.iter().enumerate() {
            for dep in deps {
                if let Some(&j) = index.get(dep) {
                    dependents[j].push(i);
                }
            }
        }

        DependencyGraph {
            flags,
            index,
            dependencies,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn get(&self, flag_id: &str) -> Option<&'a Flag> {
        self.index.get(flag_id).map(|&i| self.flags[i])
    }

    /// All flags ordered so that each one comes after every flag it depends on.
    ///
    /// Fails with [Error::CycleExists] if the dependencies are cyclic and with
    /// [Error::FlagNotFound] if a flag depends on an id outside the set.
    pub fn sorted(&self) -> Result<Vec<&'a Flag>> {
        let mut marks = vec![Mark::Unvisited; self.flags.len()];
        let mut order = Vec::with_capacity(self.flags.len());
        // (node, next dependency to visit)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.flags.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                let deps = &self.dependencies[node];
                if next == deps.len() {
                    stack.pop();
                    marks[node] = Mark::Done;
                    order.push(self.flags[node]);
                    continue;
                }
                top.1 += 1;

                let dep_id = deps[next];
                let dep = match self.index.get(dep_id) {
                    Some(&dep) => dep,
                    None => {
                        return Err(Error::FlagNotFound {
                            flag_id: dep_id.to_string(),
                        })
                    }
                };
                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::InProgress => {
                        return Err(Error::CycleExists {
                            flag_id: dep_id.to_string(),
                        })
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(order)
    }

    /// The targets plus every flag they transitively depend on, in input order. Ids not in
    /// the set are skipped.
    pub fn dependencies_of<S: AsRef<str>>(&self, targets: &[S]) -> Vec<&'a Flag> {
        self.closure(targets, |node, out| {
            out.extend(self.dependencies[node].iter().filter_map(|id| self.index.get(id).copied()))
        })
    }

    /// The targets plus every flag that transitively depends on one of them, in input
    /// order. Ids not in the set are skipped.
    pub fn dependents_of<S: AsRef<str>>(&self, targets: &[S]) -> Vec<&'a Flag> {
        self.closure(targets, |node, out| {
            out.extend(self.dependents[node].iter().copied())
        })
    }

    fn closure<S, F>(&self, targets: &[S], neighbours: F) -> Vec<&'a Flag>
    where
        S: AsRef<str>,
        F: Fn(usize, &mut Vec<usize>),
    {
        let mut seen = vec![false; self.flags.len()];
        let mut queue: VecDeque<usize> = targets
            .iter()
            .filter_map(|id| self.index.get(id.as_ref()).copied())
            .collect();
        for &i in &queue {
            seen[i] = true;
        }

        let mut next = Vec::new();
        while let Some(node) = queue.pop_front() {
            next.clear();
            neighbours(node, &mut next);
            for &n in &next {
                if !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            }
        }

        self.flags
            .iter()
            .zip(seen)
            .filter_map(|(flag, seen)| if seen { Some(*flag) } else { None })
            .collect()
    }
}
