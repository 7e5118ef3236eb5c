//! Named-DAG system scheduling over the work-stealing pool.

use std::sync::Arc;
use std::thread;

use fnv::FnvHashMap;
use log::trace;

use crate::error::ScheduleError;
use crate::pool::{CountLatch, ThreadPool};

type SystemFn = Arc<dyn Fn() + Send + Sync + 'static>;

struct SystemNode {
    func: SystemFn,
    dependencies: Vec<String>,
    dependents: Vec<String>,
}

/// Runs registered systems sequentially, in parallel, or as a dependency
/// DAG executed layer by layer.
///
/// Two independent collections are kept: a flat list of anonymous systems
/// for [`run_sequential`](SystemScheduler::run_sequential) and
/// [`run_parallel`](SystemScheduler::run_parallel), and a named dependency
/// graph for [`run_graph`](SystemScheduler::run_graph).
///
/// The graph executor guarantees that for every declared edge `u → v`, `u`
/// completes before `v` starts. Systems within one layer run concurrently and
/// must not share mutable state through the world unless the caller
/// synchronizes them — no component-access analysis is performed.
pub struct SystemScheduler {
    systems: Vec<SystemFn>,
    graph: FnvHashMap<String, SystemNode>,
    batches: Vec<Vec<String>>,
    dirty: bool,
    pool: ThreadPool,
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemScheduler {
    /// Creates a scheduler with one pool worker per available CPU.
    pub fn new() -> SystemScheduler {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_workers(workers)
    }

    /// Creates a scheduler with an explicit worker count.
    pub fn with_workers(workers: usize) -> SystemScheduler {
        SystemScheduler {
            systems: Vec::new(),
            graph: FnvHashMap::default(),
            batches: Vec::new(),
            dirty: true,
            pool: ThreadPool::new(workers),
        }
    }

    /// The pool this scheduler executes on.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Appends an anonymous system to the flat list.
    pub fn add_system(&mut self, system: impl Fn() + Send + Sync + 'static) {
        self.systems.push(Arc::new(system));
    }

    /// Registers a named system with dependencies for
    /// [`run_graph`](SystemScheduler::run_graph).
    ///
    /// Registration order is free: a dependency may name a system that is
    /// added later, and the edge is completed when that system arrives.
    /// Re-registering a name replaces the previous node.
    pub fn add_named_system(
        &mut self,
        name: impl Into<String>,
        system: impl Fn() + Send + Sync + 'static,
        dependencies: &[&str],
    ) {
        let name = name.into();
        let dependencies: Vec<String> = dependencies.iter().map(|dep| dep.to_string()).collect();

        // complete edges towards dependencies that already exist
        for dep in &dependencies {
            if let Some(node) = self.graph.get_mut(dep) {
                if !node.dependents.contains(&name) {
                    node.dependents.push(name.clone());
                }
            }
        }

        // earlier registrations may already name this system as a dependency
        let dependents: Vec<String> = self
            .graph
            .iter()
            .filter(|(other, node)| **other != name && node.dependencies.contains(&name))
            .map(|(other, _)| other.clone())
            .collect();

        self.graph.insert(
            name,
            SystemNode {
                func: Arc::new(system),
                dependencies,
                dependents,
            },
        );
        self.dirty = true;
    }

    /// Invokes the flat list in insertion order on the calling thread.
    pub fn run_sequential(&self) {
        for system in &self.systems {
            (**system)();
        }
    }

    /// Submits the flat list to the pool and waits for every system to
    /// finish.
    pub fn run_parallel(&self) {
        if self.systems.is_empty() {
            return;
        }

        let latch = Arc::new(CountLatch::new(self.systems.len()));
        for system in &self.systems {
            let system = Arc::clone(system);
            let latch = Arc::clone(&latch);
            self.pool
                .submit(move || {
                    (*system)();
                    latch.count_down();
                })
                .expect("scheduler pool is running");
        }
        latch.wait();
    }

    /// Executes the named graph layer by layer.
    ///
    /// Rebuilds the layered schedule first if the graph changed. A layer with
    /// a single system runs inline on the caller; larger layers are submitted
    /// to the pool and joined on a completion latch before the next layer
    /// starts.
    pub fn run_graph(&mut self) -> Result<(), ScheduleError> {
        if self.graph.is_empty() {
            return Ok(());
        }
        if self.dirty {
            self.rebuild_graph()?;
        }

        for batch in &self.batches {
            if batch.len() == 1 {
                (*self.graph[&batch[0]].func)();
            } else {
                let latch = Arc::new(CountLatch::new(batch.len()));
                for name in batch {
                    let func = Arc::clone(&self.graph[name].func);
                    let latch = Arc::clone(&latch);
                    self.pool
                        .submit(move || {
                            (*func)();
                            latch.count_down();
                        })
                        .expect("scheduler pool is running");
                }
                latch.wait();
            }
        }
        Ok(())
    }

    /// Rebuilds the layered schedule with a batched topological sort.
    ///
    /// Every layer is an antichain: systems with no dependency edges between
    /// them. If the sort emits fewer systems than are registered, the graph
    /// has a cycle or depends on an unregistered name and
    /// [`ScheduleError::CycleOrMissing`] is returned.
    pub fn rebuild_graph(&mut self) -> Result<(), ScheduleError> {
        self.batches.clear();

        let mut in_degree: FnvHashMap<&str, usize> = FnvHashMap::default();
        let mut current: Vec<String> = Vec::new();
        for (name, node) in &self.graph {
            in_degree.insert(name.as_str(), node.dependencies.len());
            if node.dependencies.is_empty() {
                current.push(name.clone());
            }
        }

        let mut batches = Vec::new();
        while !current.is_empty() {
            let mut next = Vec::new();
            for name in &current {
                for dependent in &self.graph[name].dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }
            batches.push(std::mem::replace(&mut current, next));
        }

        let emitted: usize = batches.iter().map(Vec::len).sum();
        if emitted < self.graph.len() {
            return Err(ScheduleError::CycleOrMissing);
        }

        trace!(
            "rebuilt system graph: {} systems in {} layers",
            emitted,
            batches.len()
        );
        self.batches = batches;
        self.dirty = false;
        Ok(())
    }

    /// Fires a bag of one-shot closures through the pool and joins them all.
    pub fn frame(&self, systems: Vec<Box<dyn FnOnce() + Send>>) {
        if systems.is_empty() {
            return;
        }

        let latch = Arc::new(CountLatch::new(systems.len()));
        for system in systems {
            let latch = Arc::clone(&latch);
            self.pool
                .submit(move || {
                    system();
                    latch.count_down();
                })
                .expect("scheduler pool is running");
        }
        latch.wait();
    }
}
