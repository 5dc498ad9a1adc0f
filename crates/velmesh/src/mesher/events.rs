//! Event types and sinks for observing mesh builds.
//!
//! [`crate::mesher::MeshGenerator::build_with_events`] reports progress as [`MeshEvent`]s.
//! Only the coordinating worker sends them, after the global reductions of each iteration,
//! so iteration events carry whole-mesh totals.
use crate::mesher::BuildOptions;

/// Describes events emitted by mesh builds.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// Emitted once the initial point set is distributed.
    BuildStarted {
        /// Number of worker threads.
        workers: usize,
        /// Number of starting points.
        points: usize,
        /// Whether the build runs in mesh improvement mode.
        mesh_improvement: bool,
        /// Iteration budget of the build.
        max_iter: usize,
    },

    /// Emitted after every relaxation iteration.
    IterationFinished {
        /// Zero-based iteration index.
        iteration: usize,
        /// Global point count after the iteration.
        points: usize,
        /// Largest point displacement relative to the local desired size.
        max_displacement: f64,
        /// Points inserted by density control.
        inserted: usize,
        /// Points deleted by density control.
        deleted: usize,
        /// Points that moved to another worker.
        migrated: usize,
    },

    /// Emitted when density control changed the point set.
    DensityAdjusted {
        iteration: usize,
        inserted: usize,
        deleted: usize,
    },

    /// Emitted when sliver vertices were perturbed during mesh improvement.
    SliversPerturbed {
        iteration: usize,
        /// Number of sliver cells found.
        slivers: usize,
    },

    /// Emitted when the movement tolerance was reached before the iteration budget.
    Converged {
        /// Number of iterations run.
        iterations: usize,
    },

    /// Emitted when the final mesh is assembled.
    BuildFinished {
        points: usize,
        cells: usize,
        iterations: usize,
        converged: bool,
    },

    /// Non-fatal warning generated during the build.
    Warning {
        /// Build phase that raised the warning.
        context: String,
        /// What went wrong, for logs.
        message: String,
    },
}

impl MeshEvent {
    pub fn kind(&self) -> MeshEventKind {
        match self {
            MeshEvent::BuildStarted { .. } => MeshEventKind::BuildStarted,
            MeshEvent::IterationFinished { .. } => MeshEventKind::IterationFinished,
            MeshEvent::DensityAdjusted { .. } => MeshEventKind::DensityAdjusted,
            MeshEvent::SliversPerturbed { .. } => MeshEventKind::SliversPerturbed,
            MeshEvent::Converged { .. } => MeshEventKind::Converged,
            MeshEvent::BuildFinished { .. } => MeshEventKind::BuildFinished,
            MeshEvent::Warning { .. } => MeshEventKind::Warning,
        }
    }

    pub(crate) fn build_started(workers: usize, points: usize, options: &BuildOptions) -> Self {
        MeshEvent::BuildStarted {
            workers,
            points,
            mesh_improvement: options.mesh_improvement,
            max_iter: options.max_iter,
        }
    }
}

/// Discriminant of a [`MeshEvent`], used to skip building events nobody listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshEventKind {
    BuildStarted,
    IterationFinished,
    DensityAdjusted,
    SliversPerturbed,
    Converged,
    BuildFinished,
    Warning,
}

/// Receiver of [`MeshEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: MeshEvent);

    /// Whether events of `kind` should be produced at all.
    fn wants(&self, _kind: MeshEventKind) -> bool {
        true
    }
}

/// Discards everything and asks for nothing, so no events are built.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: MeshEvent) {}

    #[inline]
    fn wants(&self, _kind: MeshEventKind) -> bool {
        false
    }
}

/// Calls a closure for every event.
pub struct FnSink<F>
where
    F: FnMut(MeshEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(MeshEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(MeshEvent),
{
    #[inline]
    fn send(&mut self, event: MeshEvent) {
        (self.f)(event);
    }
}

/// Records every event in arrival order.
#[derive(Default)]
pub struct VecSink {
    events: Vec<MeshEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<MeshEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[MeshEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of collected events of `kind`.
    pub fn count(&self, kind: MeshEventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: MeshEvent) {
        self.events.push(event);
    }
}

/// Broadcasts every event to a list of sinks of one type.
///
/// An event kind is wanted when at least one inner sink wants it.
pub struct MultiSink<S: EventSink> {
    sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn sinks(&self) -> &[S] {
        &self.sinks
    }

    pub fn into_sinks(self) -> Vec<S> {
        self.sinks
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: MeshEvent) {
        let Some((last, rest)) = self.sinks.split_last_mut() else {
            return;
        };
        for sink in rest {
            sink.send(event.clone());
        }
        last.send(event);
    }

    fn wants(&self, kind: MeshEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }
}
