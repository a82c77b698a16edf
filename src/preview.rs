use crate::{
	block_index::BlockIndex,
	config::PreviewConfig,
	diagram::DiagramRegistry,
	diff::{MergeReport, Reconciler},
	dom::Document,
	error::{Error, LoadError},
	load,
	message::Message,
	pipeline::{DiagramPipeline, RenderJob, RenderOutcome},
	scroll::{ScrollSync, ScrollTarget, SourceMeta},
	viewport::Viewport,
};
use std::time::Instant;
use tracing::{debug, error, instrument, trace};

/// All view state of one preview page, with a single owner.
///
/// Feed it [`Message`]s and viewport changes. Diagram rendering is driven from outside:
/// call [`Preview::poll_diagrams`] at [`Preview::next_deadline`], await the returned jobs
/// and hand each outcome back to [`Preview::complete`].
#[derive(Debug)]
pub struct Preview<V: Viewport> {
	config: PreviewConfig,
	document: Document,
	reconciler: Reconciler,
	pipeline: DiagramPipeline,
	index: Option<BlockIndex>,
	source: Option<SourceMeta>,
	scroll: ScrollSync,
	base: Option<String>,
	viewport: V,
}
impl<V: Viewport> Preview<V> {
	#[must_use]
	pub fn new(config: PreviewConfig, registry: DiagramRegistry, viewport: V) -> Self {
		Self {
			pipeline: DiagramPipeline::new(registry, &config),
			config,
			document: Document::new(),
			reconciler: Reconciler::new(),
			index: None,
			source: None,
			scroll: ScrollSync::new(),
			base: None,
			viewport,
		}
	}

	/// Dispatches one inbound event.
	///
	/// # Errors
	///
	/// Iff a `show` event carries markup that can't be loaded. The previous document stays in place.
	pub fn handle(&mut self, message: Message, now: Instant) -> Result<(), Error> {
		match message {
			Message::Show { html, lcount } => {
				self.show(&html, lcount, now)?;
			}
			Message::Scroll { line } => {
				self.scroll(line);
			}
			Message::Base { base } => self.base = Some(base),
			Message::Unknown => trace!("Ignoring unknown message."),
		}
		Ok(())
	}

	/// Merges a newly rendered document into the live tree and schedules scans for new diagrams.
	///
	/// # Errors
	///
	/// Iff `html` can't be loaded. Nothing is changed in that case.
	#[instrument(skip(self, html, now), fields(len = html.len()))]
	pub fn show(&mut self, html: &str, line_count: u32, now: Instant) -> Result<MergeReport, LoadError> {
		let fragment = load::parse_fragment(html).map_err(|error| {
			error!("Could not load document: {}", error);
			error
		})?;

		self.source = Some(SourceMeta::new(line_count));
		let report = self.reconciler.merge(&mut self.document, &fragment, self.pipeline.registry());
		for &(kind, _) in &report.added_diagrams {
			self.pipeline.request_scan(kind, now);
		}

		let stale = self.index.as_ref().map_or(true, |index| !index.is_current(&self.document));
		if report.child_list_changed || stale {
			self.rebuild_index();
		}
		self.resync();
		Ok(report)
	}

	/// Scrolls so that source `line` is centered, now and after every later reflow.
	pub fn scroll(&mut self, line: u32) -> Option<f64> {
		self.scroll.scroll_to(line, self.index.as_ref(), self.source, &self.document, &mut self.viewport)
	}

	/// To be called whenever the viewport or the rendered content changed size.
	pub fn resize(&mut self) -> Option<f64> {
		self.resync()
	}

	fn resync(&mut self) -> Option<f64> {
		self.scroll.resync(self.index.as_ref(), self.source, &self.document, &mut self.viewport)
	}

	fn rebuild_index(&mut self) {
		let index = BlockIndex::rebuild(&self.document, self.document.root(), &self.config.line_attribute);
		debug!("Rebuilt block index with {} block(s).", index.len());
		self.index = Some(index);
	}

	/// When [`Preview::poll_diagrams`] should be called next.
	#[must_use]
	pub fn next_deadline(&self) -> Option<Instant> {
		self.pipeline.next_deadline()
	}

	/// Starts renders for every diagram kind whose debounced scan is due.
	pub fn poll_diagrams(&mut self, now: Instant) -> Vec<RenderJob> {
		self.pipeline.poll(&self.document, now)
	}

	/// Splices a finished render into the tree and keeps the scroll target in view.
	///
	/// Returns whether the tree was changed.
	pub fn complete(&mut self, outcome: RenderOutcome) -> bool {
		let changed = self.pipeline.complete(&mut self.document, &self.viewport, outcome);
		if changed {
			self.resync();
		}
		changed
	}

	#[must_use]
	pub fn config(&self) -> &PreviewConfig {
		&self.config
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	#[must_use]
	pub fn block_index(&self) -> Option<&BlockIndex> {
		self.index.as_ref()
	}

	#[must_use]
	pub fn source(&self) -> Option<SourceMeta> {
		self.source
	}

	#[must_use]
	pub fn scroll_target(&self) -> Option<ScrollTarget> {
		self.scroll.target()
	}

	#[must_use]
	pub fn base(&self) -> Option<&str> {
		self.base.as_deref()
	}

	#[must_use]
	pub fn pipeline(&self) -> &DiagramPipeline {
		&self.pipeline
	}

	#[must_use]
	pub fn viewport(&self) -> &V {
		&self.viewport
	}

	/// For hosts whose viewport caches state. Call [`Preview::resize`] after changing geometry.
	pub fn viewport_mut(&mut self) -> &mut V {
		&mut self.viewport
	}
}
