//! Annotators: passes that read some layers of a graph and write others.
//!
//! # Lifecycle
//!
//! ```text
//!   set_schema ──► set_task_parameters ──► required_layers / output_layers
//!                                                   │
//!                         transform(graph) ◄────────┘
//!                         transform_fragments(fragments, consumer)
//! ```
//!
//! `set_task_parameters` may add the layers the annotator will write to the
//! schema it was given; callers copy those layers into their graphs'
//! schemas (see [`Annotator::prepare_graph`]).
//!
//! An annotator is `Send + Sync` and transforms through `&self`, so the
//! default [`Annotator::transform_fragments`] can hand fragments to worker
//! threads. Each graph is touched by one worker at a time.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use annograph_core::{Graph, Schema};

use crate::error::{Error, Result};
use crate::sync::{lock, Mutex};

/// Shared cancel flag.
///
/// Clones observe the same flag, so a UI thread can cancel a batch that a
/// worker pool is running.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// New, not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running work to stop at its next safe point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`Self::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before reusing the annotator.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// `Err(Error::Cancelled)` if cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress, status and cancellation of a running task.
#[derive(Debug, Clone, Default)]
pub struct TaskMonitor {
    cancellation: Cancellation,
    percent: Arc<AtomicU8>,
    status: Arc<Mutex<String>>,
}

impl TaskMonitor {
    /// Fresh monitor at 0%.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for cancelling from elsewhere.
    #[must_use]
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// 0..=100.
    #[must_use]
    pub fn percent_complete(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }

    /// Record progress, clamped to 100.
    pub fn set_percent_complete(&self, percent: u8) {
        self.percent.store(percent.min(100), Ordering::SeqCst);
    }

    /// Last status message.
    #[must_use]
    pub fn status(&self) -> String {
        lock(&self.status).clone()
    }

    /// Replace the status message.
    pub fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        log::info!("{status}");
        *lock(&self.status) = status;
    }

    /// Back to 0%, not cancelled, no status.
    pub fn reset(&self) {
        self.cancellation.reset();
        self.set_percent_complete(0);
        lock(&self.status).clear();
    }
}

/// A graph transformation pass.
pub trait Annotator: Send + Sync {
    /// Short identifier, e.g. `"aligner"`.
    fn id(&self) -> &str;

    /// Provide the layer schema. Must precede [`Self::set_task_parameters`].
    fn set_schema(&mut self, schema: Schema);

    /// The schema, including any layers added by the task parameters.
    fn schema(&self) -> Option<&Schema>;

    /// Parameters used when none are given. `None` makes them mandatory.
    fn default_task_parameters(&self) -> Option<&str> {
        None
    }

    /// Validate and apply the task parameters.
    ///
    /// `None` is only accepted when [`Self::default_task_parameters`] gives
    /// a default. May add the output layers to the schema.
    fn set_task_parameters(&mut self, params: Option<&str>) -> Result<()>;

    /// Layers the transform reads.
    fn required_layers(&self) -> Result<Vec<String>>;

    /// Layers the transform creates, updates or deletes.
    fn output_layers(&self) -> Result<Vec<String>>;

    /// Transform one graph in place.
    ///
    /// Not atomic: on error, changes made before the failure remain.
    fn transform(&self, graph: &mut Graph) -> Result<()>;

    /// Progress and cancellation.
    fn monitor(&self) -> &TaskMonitor;

    /// Check that `graph` has the layers this annotator reads, and add the
    /// ones it writes from the annotator's schema.
    fn prepare_graph(&self, graph: &mut Graph) -> Result<()> {
        for layer_id in self.required_layers()? {
            if !graph.schema().contains(&layer_id) {
                return Err(Error::configuration(format!(
                    "{} needs layer '{layer_id}', which graph '{}' does not have",
                    self.id(),
                    graph.id()
                )));
            }
        }
        let Some(schema) = self.schema() else {
            return Err(Error::configuration(format!("{}: schema not set", self.id())));
        };
        for layer_id in self.output_layers()? {
            if graph.schema().contains(&layer_id) {
                continue;
            }
            let layer = schema.require(&layer_id)?.clone();
            graph.schema_mut().add_layer(layer)?;
        }
        Ok(())
    }

    /// Transform fragments in parallel, handing each to `consumer` when done.
    ///
    /// Cancellation is checked before each fragment; fragments already
    /// handed over stay handed over. Returns how many were transformed.
    fn transform_fragments<F>(&self, fragments: Vec<Graph>, consumer: F) -> Result<usize>
    where
        Self: Sized,
        F: Fn(Graph) + Send + Sync,
    {
        let monitor = self.monitor();
        let total = fragments.len().max(1);
        let done = AtomicUsize::new(0);
        monitor.set_percent_complete(0);

        fragments.into_par_iter().try_for_each(|mut fragment| -> Result<()> {
            monitor.cancellation().check()?;
            self.transform(&mut fragment)
                .map_err(|e| e.in_fragment(&fragment))?;
            consumer(fragment);
            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            monitor.set_percent_complete(u8::try_from(finished * 100 / total).unwrap_or(100));
            Ok(())
        })?;

        monitor.set_percent_complete(100);
        let finished = done.into_inner();
        log::debug!("{}: transformed {finished} fragments", self.id());
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annograph_core::{Confidence, Layer};

    /// Copies each word's label, uppercased, onto a tag layer.
    struct Shouter {
        schema: Option<Schema>,
        layer: String,
        monitor: TaskMonitor,
    }

    impl Shouter {
        fn new() -> Self {
            Self {
                schema: None,
                layer: String::new(),
                monitor: TaskMonitor::new(),
            }
        }
    }

    impl Annotator for Shouter {
        fn id(&self) -> &str {
            "shouter"
        }

        fn set_schema(&mut self, schema: Schema) {
            self.schema = Some(schema);
        }

        fn schema(&self) -> Option<&Schema> {
            self.schema.as_ref()
        }

        fn set_task_parameters(&mut self, params: Option<&str>) -> Result<()> {
            let params = crate::config::TaskParameters::resolve(params, self.default_task_parameters())?;
            let layer = params.require("layer")?.to_string();
            let schema = self
                .schema
                .as_mut()
                .ok_or_else(|| Error::configuration("schema not set"))?;
            if !schema.contains(&layer) {
                schema.add_layer(Layer::tag(layer.as_str()).with_parent("word"))?;
            }
            self.layer = layer;
            Ok(())
        }

        fn required_layers(&self) -> Result<Vec<String>> {
            Ok(vec!["word".to_string()])
        }

        fn output_layers(&self) -> Result<Vec<String>> {
            Ok(vec![self.layer.clone()])
        }

        fn transform(&self, graph: &mut Graph) -> Result<()> {
            for word in graph.list("word") {
                let label = graph.require(word)?.label().to_uppercase();
                graph.create_tag(word, &self.layer, label)?;
            }
            Ok(())
        }

        fn monitor(&self) -> &TaskMonitor {
            &self.monitor
        }
    }

    fn graph(id: &str, words: &[&str]) -> Graph {
        let mut g = Graph::new(id, Schema::conventional());
        let a = g.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap();
        let end = g
            .get_or_create_anchor_at(words.len() as f64, Confidence::Manual)
            .unwrap();
        let who = g.create_annotation("participant", "p", a, a, None).unwrap();
        let turn = g.create_annotation("turn", "p", a, end, Some(who)).unwrap();
        for (i, w) in words.iter().enumerate() {
            let s = g.get_or_create_anchor_at(i as f64, Confidence::Default).unwrap();
            let e = g.get_or_create_anchor_at(i as f64 + 1.0, Confidence::Default).unwrap();
            g.create_annotation("word", *w, s, e, Some(turn)).unwrap();
        }
        g
    }

    fn configured() -> Shouter {
        let mut a = Shouter::new();
        a.set_schema(Schema::conventional());
        a.set_task_parameters(Some("layer=loud")).unwrap();
        a
    }

    #[test]
    fn parameters_required_without_default() {
        let mut a = Shouter::new();
        a.set_schema(Schema::conventional());
        assert!(a.set_task_parameters(None).unwrap_err().is_configuration());
    }

    #[test]
    fn parameters_add_output_layer() {
        let a = configured();
        assert!(a.schema().unwrap().contains("loud"));
        assert_eq!(a.output_layers().unwrap(), vec!["loud"]);
    }

    #[test]
    fn transform_after_prepare() {
        let a = configured();
        let mut g = graph("g", &["hi", "there"]);
        a.prepare_graph(&mut g).unwrap();
        a.transform(&mut g).unwrap();
        assert_eq!(g.labels("loud"), vec!["HI", "THERE"]);
    }

    #[test]
    fn fragments_processed_in_parallel() {
        let a = configured();
        let fragments: Vec<Graph> = (0..8)
            .map(|i| {
                let mut g = graph(&format!("g{i}"), &["a", "b"]);
                a.prepare_graph(&mut g).unwrap();
                g
            })
            .collect();
        let out = Mutex::new(Vec::new());
        let n = a
            .transform_fragments(fragments, |g| lock(&out).push(g))
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(a.monitor().percent_complete(), 100);
        let out = crate::sync::into_inner(out);
        assert!(out.iter().all(|g| g.labels("loud") == vec!["A", "B"]));
    }

    #[test]
    fn cancelled_before_start() {
        let a = configured();
        a.monitor().cancel();
        let fragments = vec![graph("g", &["a"])];
        let err = a.transform_fragments(fragments, |_| {}).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        a.monitor().reset();
        assert!(!a.monitor().is_cancelled());
    }

    #[test]
    fn status_is_kept() {
        let m = TaskMonitor::new();
        m.set_status("aligning utterance 3");
        m.set_percent_complete(250);
        assert_eq!(m.status(), "aligning utterance 3");
        assert_eq!(m.percent_complete(), 100);
    }
}
