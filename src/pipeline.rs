//! Finds unrendered diagram placeholders and splices renderer output into them.
//!
//! Rendering is split around the only suspension point: [`DiagramPipeline::scan`] hands out [`RenderJob`]s without
//! holding on to the [`Document`], and [`DiagramPipeline::complete`] looks the placeholder up again once a job resolves.
//! A placeholder reconciled away in the meantime simply doesn't receive the result.

use crate::{
	config::PreviewConfig,
	debounce::Debouncer,
	diagram::{DiagramConfig, DiagramRegistry, HeightPolicy, RenderRequest},
	dom::{Document, Element, NodeId},
	error::RenderError,
	load,
	viewport::Viewport,
};
use core::{
	future::Future,
	pin::Pin,
	task::{Context, Poll},
	time::Duration,
};
use futures::{future::LocalBoxFuture, FutureExt};
use hashbrown::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, error, instrument, trace, trace_span};

/// The settled result of one renderer call.
#[derive(Debug)]
pub struct RenderOutcome {
	pub kind: &'static str,
	pub container: NodeId,
	pub result: Result<Option<String>, RenderError>,
}

/// One in-flight renderer call. Resolves to a [`RenderOutcome`] to pass to [`DiagramPipeline::complete`].
#[must_use = "Render jobs do nothing unless polled."]
pub struct RenderJob {
	kind: &'static str,
	container: NodeId,
	future: LocalBoxFuture<'static, RenderOutcome>,
}
impl RenderJob {
	#[must_use]
	pub fn kind(&self) -> &'static str {
		self.kind
	}

	#[must_use]
	pub fn container(&self) -> NodeId {
		self.container
	}
}
impl core::fmt::Debug for RenderJob {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("RenderJob").field("kind", &self.kind).field("container", &self.container).finish_non_exhaustive()
	}
}
impl Future for RenderJob {
	type Output = RenderOutcome;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.future.poll_unpin(cx)
	}
}

#[derive(Debug)]
pub struct DiagramPipeline {
	registry: DiagramRegistry,
	scans: HashMap<&'static str, Debouncer>,
	in_flight: HashSet<NodeId>,
	delay: Duration,
	loader_class: String,
	error_class: String,
}
impl DiagramPipeline {
	#[must_use]
	pub fn new(registry: DiagramRegistry, config: &PreviewConfig) -> Self {
		Self {
			registry,
			scans: HashMap::new(),
			in_flight: HashSet::new(),
			delay: config.scan_debounce(),
			loader_class: config.loader_class.clone(),
			error_class: config.error_class.clone(),
		}
	}

	#[must_use]
	pub fn registry(&self) -> &DiagramRegistry {
		&self.registry
	}

	/// Number of renders started but not yet [completed](`DiagramPipeline::complete`).
	#[must_use]
	pub fn in_flight(&self) -> usize {
		self.in_flight.len()
	}

	/// Requests a scan for `kind`, coalesced with any other request within the debounce delay.
	pub fn request_scan(&mut self, kind: &str, now: Instant) {
		let Some(config) = self.registry.config(kind) else {
			debug!("Ignoring scan request for unregistered diagram kind {:?}.", kind);
			return;
		};
		let delay = self.delay;
		self.scans.entry(config.kind).or_insert_with(|| Debouncer::new(delay)).schedule(now);
	}

	pub fn request_scan_all(&mut self, now: Instant) {
		let kinds: Vec<_> = self.registry.kinds().collect();
		for kind in kinds {
			self.request_scan(kind, now);
		}
	}

	/// When the earliest requested scan is due.
	#[must_use]
	pub fn next_deadline(&self) -> Option<Instant> {
		self.scans.values().filter_map(Debouncer::deadline).min()
	}

	/// Runs the scans that are due at `now`.
	pub fn poll(&mut self, document: &Document, now: Instant) -> Vec<RenderJob> {
		let due: Vec<&'static str> = self.scans.iter_mut().filter_map(|(&kind, scan)| scan.fire(now).then_some(kind)).collect();
		due.into_iter().flat_map(|kind| self.scan_kind(document, kind)).collect()
	}

	/// Scans for every registered kind immediately, bypassing the debounce.
	pub fn scan(&mut self, document: &Document) -> Vec<RenderJob> {
		let kinds: Vec<_> = self.registry.kinds().collect();
		kinds.into_iter().flat_map(|kind| self.scan_kind(document, kind)).collect()
	}

	/// Starts a render for each placeholder of `kind` that is neither handled nor already being rendered.
	#[instrument(skip(self, document))]
	pub fn scan_kind(&mut self, document: &Document, kind: &str) -> Vec<RenderJob> {
		let (Some(config), Some(renderer)) = (self.registry.config(kind).copied(), self.registry.renderer(kind)) else {
			return Vec::new();
		};

		self.in_flight.retain(|&node| document.contains(node));
		let pending: Vec<NodeId> = document
			.descendants(document.root())
			.filter(|&node| config.selector.matches(document, node))
			.filter(|node| !self.in_flight.contains(node))
			.filter(|&node| !self.is_handled(document, node, &config))
			.collect();

		let mut jobs = Vec::with_capacity(pending.len());
		for container in pending {
			let Some(source) = config.source(document, container) else {
				trace!("Skipping {:?} placeholder {:?} without source.", config.kind, container);
				continue;
			};
			let id = format!("{}-render", document.element(container).and_then(Element::id).unwrap_or_default());
			if cfg!(feature = "dangerous-logging") {
				trace!("Rendering {:?} as {}: {:?}", container, id, source);
			} else {
				trace!("Rendering {:?} as {}.", container, id);
			}

			self.in_flight.insert(container);
			let kind = config.kind;
			let future = renderer.render(RenderRequest {
				id,
				source: source.to_owned(),
				container,
			});
			jobs.push(RenderJob {
				kind,
				container,
				future: future.map(move |result| RenderOutcome { kind, container, result }).boxed_local(),
			});
		}
		debug!("Started {} {:?} render(s).", jobs.len(), kind);
		jobs
	}

	/// Whether `placeholder` holds rendered output or an error marker from an earlier attempt.
	#[must_use]
	pub fn is_handled(&self, document: &Document, placeholder: NodeId, config: &DiagramConfig) -> bool {
		self.error_marker(document, placeholder).is_some() || (config.has_rendered)(document, placeholder)
	}

	fn error_marker(&self, document: &Document, placeholder: NodeId) -> Option<NodeId> {
		document
			.children(placeholder)
			.iter()
			.copied()
			.find(|&child| document.element(child).is_some_and(|element| element.has_class(&self.error_class)))
	}

	/// Splices a finished render into its placeholder, if that is still part of the tree.
	///
	/// Failures, including malformed markup, replace the loading indicator with an error marker. They are not retried.
	///
	/// Returns whether the tree was changed.
	#[instrument(skip(self, document, viewport, outcome), fields(kind = outcome.kind, container = ?outcome.container))]
	pub fn complete<V: Viewport + ?Sized>(&mut self, document: &mut Document, viewport: &V, outcome: RenderOutcome) -> bool {
		let RenderOutcome { kind, container, result } = outcome;
		self.in_flight.remove(&container);

		if !document.is_connected(container) {
			debug!("Discarding render result for a placeholder that is no longer in the tree.");
			return false;
		}
		let Some(config) = self.registry.config(kind).copied() else {
			debug!("Discarding render result for unregistered diagram kind.");
			return false;
		};

		let markup = match result {
			Ok(Some(markup)) => markup,
			Ok(None) => {
				trace!("Renderer produced nothing to insert.");
				return false;
			}
			Err(error) => {
				self.fail(document, container, kind, &error);
				return true;
			}
		};
		let fragment = match load::parse_fragment(&markup) {
			Ok(fragment) => fragment,
			Err(error) => {
				self.fail(document, container, kind, &RenderError::Malformed(error));
				return true;
			}
		};

		let span = trace_span!("Splicing rendered diagram");
		let _enter = span.enter();
		self.remove_loader(document, container);
		let mut inserted = Vec::new();
		for &child in fragment.children(fragment.root()) {
			if let Some(node) = document.import(&fragment, child) {
				document.append_child(container, node);
				inserted.push(node);
			}
		}

		let height = match config.height {
			HeightPolicy::Measured => format!("{}px", inserted.iter().map(|&node| viewport.client_height(document, node)).sum::<f64>()),
			HeightPolicy::Auto => "auto".to_owned(),
		};
		if let Some(parent) = document.parent(container).and_then(|parent| document.element_mut(parent)) {
			parent.set_style_property("height", &height);
		}
		trace!("Inserted {} node(s), height hint {}.", inserted.len(), height);
		true
	}

	fn fail(&self, document: &mut Document, container: NodeId, kind: &str, error: &RenderError) {
		error!("{} render error: {}", kind, error);
		self.remove_loader(document, container);

		let marker = document.create_element(Element::new("div").with_attribute("class", &self.error_class));
		let text = document.create_text(format!("Failed to render {} diagram", kind));
		document.append_child(marker, text);
		document.append_child(container, marker);
	}

	fn remove_loader(&self, document: &mut Document, container: NodeId) {
		let loader = document
			.descendants(container)
			.find(|&node| document.element(node).is_some_and(|element| element.has_class(&self.loader_class)));
		if let Some(loader) = loader {
			document.remove_subtree(loader);
		}
	}
}
