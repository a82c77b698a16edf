//! Line-anchored blocks of the rendered document, in document order.

use crate::dom::{Document, NodeId};
use core::iter;
use tracing::{instrument, trace, warn};

/// A rendered node tagged with the first source line it renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
	pub node: NodeId,
	pub line_begin: u32,
}

/// A block and its immediate successor in document order, bounding one interpolation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
	pub current: Block,
	/// [`None`] for the last block.
	pub next: Option<Block>,
}

/// A snapshot of every [`Block`] in a tree, as overlapping [`BlockWindow`]s.
///
/// Goes stale as soon as the tree changes; rebuild it rather than reading anchors off the live tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndex {
	windows: Vec<BlockWindow>,
}
impl BlockIndex {
	/// Collects all descendants of `root` carrying `line_attribute`, in pre-order.
	///
	/// Anchors that don't parse as a line number are skipped.
	#[must_use]
	#[instrument(skip(document))]
	pub fn rebuild(document: &Document, root: NodeId, line_attribute: &str) -> Self {
		let blocks: Vec<Block> = document
			.descendants(root)
			.filter_map(|node| {
				let anchor = document.element(node)?.attribute(line_attribute)?;
				match anchor.trim().parse() {
					Ok(line_begin) => Some(Block { node, line_begin }),
					Err(error) => {
						warn!("Ignoring block {:?} with unparsable line anchor {:?}: {}", node, anchor, error);
						None
					}
				}
			})
			.collect();

		let windows: Vec<BlockWindow> = blocks
			.iter()
			.zip(blocks.iter().skip(1).copied().map(Some).chain(iter::once(None)))
			.map(|(&current, next)| BlockWindow { current, next })
			.collect();
		trace!("Indexed {} block(s).", windows.len());
		Self { windows }
	}

	#[must_use]
	pub fn windows(&self) -> &[BlockWindow] {
		&self.windows
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.windows.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.windows.is_empty()
	}

	/// The last window starting at or before `line`, or the first window if `line` precedes every block.
	#[must_use]
	pub fn floor(&self, line: u32) -> Option<&BlockWindow> {
		self.windows.iter().rev().find(|window| window.current.line_begin <= line).or_else(|| self.windows.first())
	}

	/// Whether every indexed block is still part of `document`'s tree.
	#[must_use]
	pub fn is_current(&self, document: &Document) -> bool {
		self.windows.iter().all(|window| document.is_connected(window.current.node))
	}
}
