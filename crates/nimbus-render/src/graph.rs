//! Per-frame pass graph.
//!
//! A [`FrameGraph`] is rebuilt every frame. Each pass declares the resources
//! it reads and writes plus a dispatch closure; [`FrameGraph::execute`] orders
//! the passes so that every reader runs after the writers of what it reads,
//! then invokes the closures against a shared context (usually a
//! `wgpu::CommandEncoder`).
//!
//! Resources are either transient (must be written by some pass in the same
//! graph before being read) or imported (produced outside the graph, such as
//! history buffers or last frame's shadow maps).

use std::collections::BTreeSet;

/// Resource identifier local to one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(usize);

/// Pass identifier local to one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(usize);

/// Which queue a pass would prefer to run on.
///
/// This is a scheduling hint: passes are always recorded in dependency order,
/// and a backend without a second queue runs everything on the main queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueHint {
    #[default]
    Main,
    AsyncCompute,
}

/// Errors detected while ordering a frame graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A pass referenced a handle that does not belong to this graph.
    #[error("pass '{pass}' references unknown resource #{resource}")]
    UnknownResource { pass: String, resource: usize },

    /// A transient resource is read but no pass writes it.
    #[error("pass '{pass}' reads transient resource '{resource}' which no pass writes")]
    UnwrittenTransient { pass: String, resource: String },

    /// Pass dependencies form a cycle.
    #[error("frame graph has a dependency cycle through pass '{pass}'")]
    Cycle { pass: String },
}

#[derive(Debug)]
struct ResourceInfo {
    name: String,
    imported: bool,
}

/// Collects the resource accesses of one pass.
#[derive(Debug, Default)]
pub struct PassBuilder {
    reads: Vec<ResourceHandle>,
    writes: Vec<ResourceHandle>,
    queue: QueueHint,
}

impl PassBuilder {
    pub fn read(&mut self, resource: ResourceHandle) -> &mut Self {
        if !self.reads.contains(&resource) {
            self.reads.push(resource);
        }
        self
    }

    pub fn write(&mut self, resource: ResourceHandle) -> &mut Self {
        if !self.writes.contains(&resource) {
            self.writes.push(resource);
        }
        self
    }

    pub fn queue(&mut self, queue: QueueHint) -> &mut Self {
        self.queue = queue;
        self
    }
}

type Dispatch<'a, C> = Box<dyn FnOnce(&mut C) + 'a>;

struct PassNode<'a, C> {
    name: String,
    reads: Vec<ResourceHandle>,
    writes: Vec<ResourceHandle>,
    queue: QueueHint,
    dispatch: Dispatch<'a, C>,
}

/// A pass that ran during [`FrameGraph::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedPass {
    pub name: String,
    pub queue: QueueHint,
}

/// Directed acyclic graph of passes for one frame.
pub struct FrameGraph<'a, C> {
    resources: Vec<ResourceInfo>,
    passes: Vec<PassNode<'a, C>>,
}

impl<C> Default for FrameGraph<'_, C> {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            passes: Vec::new(),
        }
    }
}

impl<'a, C> FrameGraph<'a, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a transient resource produced within this frame.
    pub fn create(&mut self, name: &str) -> ResourceHandle {
        self.add_resource(name, false)
    }

    /// Declare a resource produced outside the graph.
    pub fn import(&mut self, name: &str) -> ResourceHandle {
        self.add_resource(name, true)
    }

    fn add_resource(&mut self, name: &str, imported: bool) -> ResourceHandle {
        let handle = ResourceHandle(self.resources.len());
        self.resources.push(ResourceInfo {
            name: name.to_string(),
            imported,
        });
        handle
    }

    /// Add a pass. `setup` declares accesses; `dispatch` records the work.
    pub fn add_pass(
        &mut self,
        name: &str,
        setup: impl FnOnce(&mut PassBuilder),
        dispatch: impl FnOnce(&mut C) + 'a,
    ) -> PassHandle {
        let mut builder = PassBuilder::default();
        setup(&mut builder);
        let handle = PassHandle(self.passes.len());
        self.passes.push(PassNode {
            name: name.to_string(),
            reads: builder.reads,
            writes: builder.writes,
            queue: builder.queue,
            dispatch: Box::new(dispatch),
        });
        handle
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn pass_name(&self, pass: PassHandle) -> Option<&str> {
        self.passes.get(pass.0).map(|p| p.name.as_str())
    }

    pub fn resource_name(&self, resource: ResourceHandle) -> Option<&str> {
        self.resources.get(resource.0).map(|r| r.name.as_str())
    }

    /// Validate the graph and return passes in execution order.
    ///
    /// A reader depends on every writer of the resource it reads; two
    /// writers of the same resource run in insertion order. Ties are broken
    /// by insertion order.
    pub fn compile(&self) -> Result<Vec<PassHandle>, GraphError> {
        let pass_count = self.passes.len();
        let mut writers: Vec<Vec<usize>> = vec![Vec::new(); self.resources.len()];

        for (index, pass) in self.passes.iter().enumerate() {
            for resource in pass.reads.iter().chain(pass.writes.iter()) {
                if resource.0 >= self.resources.len() {
                    return Err(GraphError::UnknownResource {
                        pass: pass.name.clone(),
                        resource: resource.0,
                    });
                }
            }
            for resource in &pass.writes {
                writers[resource.0].push(index);
            }
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); pass_count];
        let mut in_degree = vec![0usize; pass_count];
        let mut add_edge = |from: usize, to: usize| {
            if from != to && !dependents[from].contains(&to) {
                dependents[from].push(to);
                in_degree[to] += 1;
            }
        };

        for (index, pass) in self.passes.iter().enumerate() {
            for resource in &pass.reads {
                let info = &self.resources[resource.0];
                let resource_writers = &writers[resource.0];
                if resource_writers.is_empty() && !info.imported {
                    return Err(GraphError::UnwrittenTransient {
                        pass: pass.name.clone(),
                        resource: info.name.clone(),
                    });
                }
                for &writer in resource_writers {
                    add_edge(writer, index);
                }
            }
            for resource in &pass.writes {
                for &writer in writers[resource.0].iter().filter(|&&w| w < index) {
                    add_edge(writer, index);
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..pass_count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(pass_count);
        while let Some(next) = ready.pop_first() {
            order.push(PassHandle(next));
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != pass_count {
            let stuck = (0..pass_count)
                .find(|&i| in_degree[i] > 0)
                .map(|i| self.passes[i].name.clone())
                .unwrap_or_default();
            return Err(GraphError::Cycle { pass: stuck });
        }

        Ok(order)
    }

    /// Compile and run every pass's dispatch in order.
    pub fn execute(self, context: &mut C) -> Result<Vec<ExecutedPass>, GraphError> {
        let order = self.compile()?;
        let mut slots: Vec<Option<PassNode<'a, C>>> = self.passes.into_iter().map(Some).collect();
        let mut executed = Vec::with_capacity(order.len());
        for handle in order {
            let Some(pass) = slots[handle.0].take() else {
                continue;
            };
            log::trace!("Executing pass '{}' ({:?})", pass.name, pass.queue);
            (pass.dispatch)(context);
            executed.push(ExecutedPass {
                name: pass.name,
                queue: pass.queue,
            });
        }
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Vec<&'static str>;

    fn names(executed: &[ExecutedPass]) -> Vec<&str> {
        executed.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_linear_chain_runs_in_dependency_order() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let trace = graph.create("trace");
        let recon = graph.create("recon");
        let scene = graph.import("scene");

        // Inserted out of order on purpose.
        graph.add_pass(
            "compose",
            |b| {
                b.read(recon).write(scene);
            },
            |log: &mut Log| log.push("compose"),
        );
        graph.add_pass(
            "reconstruct",
            |b| {
                b.read(trace).write(recon);
            },
            |log: &mut Log| log.push("reconstruct"),
        );
        graph.add_pass(
            "trace",
            |b| {
                b.write(trace);
            },
            |log: &mut Log| log.push("trace"),
        );

        let mut log = Log::new();
        let executed = graph.execute(&mut log).unwrap();
        assert_eq!(log, vec!["trace", "reconstruct", "compose"]);
        assert_eq!(names(&executed), vec!["trace", "reconstruct", "compose"]);
    }

    #[test]
    fn test_independent_passes_keep_insertion_order() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let a = graph.create("a");
        let b = graph.create("b");
        graph.add_pass(
            "first",
            |p| {
                p.write(a);
            },
            |log: &mut Log| log.push("first"),
        );
        graph.add_pass(
            "second",
            |p| {
                p.write(b);
            },
            |log: &mut Log| log.push("second"),
        );
        let mut log = Log::new();
        graph.execute(&mut log).unwrap();
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn test_imported_resource_may_be_read_without_writer() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let history = graph.import("history");
        let out = graph.create("out");
        graph.add_pass(
            "reconstruct",
            |p| {
                p.read(history).write(out);
            },
            |_| {},
        );
        assert_eq!(graph.compile().unwrap().len(), 1);
    }

    #[test]
    fn test_unwritten_transient_is_rejected() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let missing = graph.create("tracing-color");
        graph.add_pass(
            "reconstruct",
            |p| {
                p.read(missing);
            },
            |_| {},
        );
        assert_eq!(
            graph.compile(),
            Err(GraphError::UnwrittenTransient {
                pass: "reconstruct".to_string(),
                resource: "tracing-color".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let mut other: FrameGraph<'_, Log> = FrameGraph::new();
        other.create("x");
        let foreign = other.create("y");

        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        graph.add_pass(
            "p",
            |b| {
                b.read(foreign);
            },
            |_| {},
        );
        assert!(matches!(
            graph.compile(),
            Err(GraphError::UnknownResource { resource: 1, .. })
        ));
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let x = graph.create("x");
        let y = graph.create("y");
        graph.add_pass(
            "a",
            |p| {
                p.read(x).write(y);
            },
            |_| {},
        );
        graph.add_pass(
            "b",
            |p| {
                p.read(y).write(x);
            },
            |_| {},
        );
        let err = graph.compile().unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_failed_compile_runs_nothing() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let missing = graph.create("missing");
        graph.add_pass(
            "p",
            |b| {
                b.read(missing);
            },
            |log: &mut Log| log.push("p"),
        );
        let mut log = Log::new();
        assert!(graph.execute(&mut log).is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_multiple_writers_run_in_insertion_order() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let scene = graph.import("scene");
        graph.add_pass(
            "opaque",
            |p| {
                p.write(scene);
            },
            |log: &mut Log| log.push("opaque"),
        );
        graph.add_pass(
            "clouds",
            |p| {
                p.write(scene);
            },
            |log: &mut Log| log.push("clouds"),
        );
        let mut log = Log::new();
        graph.execute(&mut log).unwrap();
        assert_eq!(log, vec!["opaque", "clouds"]);
    }

    #[test]
    fn test_queue_hint_is_reported() {
        let mut graph: FrameGraph<'_, Log> = FrameGraph::new();
        let t = graph.create("t");
        graph.add_pass(
            "trace",
            |p| {
                p.write(t).queue(QueueHint::AsyncCompute);
            },
            |_| {},
        );
        let executed = graph.execute(&mut Log::new()).unwrap();
        assert_eq!(executed[0].queue, QueueHint::AsyncCompute);
    }

    #[test]
    fn test_closures_borrow_external_state() {
        let label = String::from("borrowed");
        let mut graph: FrameGraph<'_, Vec<String>> = FrameGraph::new();
        let r = graph.create("r");
        graph.add_pass(
            "p",
            |b| {
                b.write(r);
            },
            |out: &mut Vec<String>| out.push(label.clone()),
        );
        assert_eq!(graph.pass_name(PassHandle(0)), Some("p"));
        assert_eq!(graph.resource_name(r), Some("r"));
        let mut out = Vec::new();
        graph.execute(&mut out).unwrap();
        assert_eq!(out, vec!["borrowed".to_string()]);
    }
}
