//! Maps source lines onto scroll positions in the rendered view.

use crate::{
	block_index::BlockIndex,
	dom::{Document, NodeId},
	viewport::Viewport,
};
use tracing::{instrument, trace};

/// Metadata of the last rendered source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMeta {
	pub line_count: u32,
}
impl SourceMeta {
	/// `line_count` is raised to at least 1.
	#[must_use]
	pub fn new(line_count: u32) -> Self {
		Self { line_count: line_count.max(1) }
	}
}

/// The last scroll request received from the source side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTarget {
	pub line: u32,
}

/// Keeps the rendered view centered on the source cursor line.
///
/// The target line is retained so that it can be re-applied after the tree or the viewport changes.
#[derive(Debug, Default)]
pub struct ScrollSync {
	target: Option<ScrollTarget>,
}
impl ScrollSync {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn target(&self) -> Option<ScrollTarget> {
		self.target
	}

	/// Records `line` as the target and scrolls to it, if possible yet.
	///
	/// Returns the applied scroll position.
	#[instrument(skip(self, index, document, viewport))]
	pub fn scroll_to<V: Viewport + ?Sized>(&mut self, line: u32, index: Option<&BlockIndex>, source: Option<SourceMeta>, document: &Document, viewport: &mut V) -> Option<f64> {
		self.target = Some(ScrollTarget { line });
		self.resync(index, source, document, viewport)
	}

	/// Scrolls to the stored target again, for example after a reflow.
	///
	/// Silently does nothing before the first document or the first scroll request has arrived.
	pub fn resync<V: Viewport + ?Sized>(&self, index: Option<&BlockIndex>, source: Option<SourceMeta>, document: &Document, viewport: &mut V) -> Option<f64> {
		let (Some(target), Some(index), Some(source)) = (self.target, index, source) else {
			trace!("Not synchronizing scroll position yet.");
			return None;
		};
		let top = scroll_offset(target.line, index, source, document, viewport)?;
		viewport.scroll_to(top);
		Some(top)
	}
}

/// The scroll position that centers `line` in the viewport.
///
/// Interpolates linearly between the block starting at or before `line` and its successor.
/// The last block spans to one line past the end of the source.
/// Adjacent blocks with the same anchor degrade to the start of the interval.
///
/// [`None`] iff `index` is empty.
#[must_use]
pub fn scroll_offset<V: Viewport + ?Sized>(line: u32, index: &BlockIndex, source: SourceMeta, document: &Document, viewport: &V) -> Option<f64> {
	let window = index.floor(line)?;
	let target = window.current;

	let offset_begin = block_offset(document, viewport, target.node);
	let offset_end = match window.next {
		Some(next) => block_offset(document, viewport, next.node),
		None => offset_begin + viewport.client_height(document, target.node),
	};

	let line_begin = f64::from(target.line_begin);
	let line_end = window.next.map_or_else(|| f64::from(source.line_count) + 1.0, |next| f64::from(next.line_begin));

	let pixels_per_line = if line_end > line_begin {
		(offset_end - offset_begin) / (line_end - line_begin)
	} else {
		trace!("Degenerate block interval at line {}.", target.line_begin);
		0.0
	};
	let scroll_pixel = offset_begin + (f64::from(line) - line_begin) * pixels_per_line;

	Some(scroll_pixel - viewport.inner_height() / 2.0 + pixels_per_line / 2.0)
}

/// Document-space top of `node`.
///
/// Nodes without a box of their own (reporting a top of exactly zero) borrow their nearest boxed ancestor's position.
#[allow(clippy::float_cmp)]
#[must_use]
pub fn block_offset<V: Viewport + ?Sized>(document: &Document, viewport: &V, node: NodeId) -> f64 {
	let mut top = 0.0;
	let mut current = Some(node);
	while top == 0.0 {
		let Some(node) = current else { break };
		top = viewport.client_top(document, node);
		current = document.parent(node);
	}
	top + viewport.scroll_y()
}
