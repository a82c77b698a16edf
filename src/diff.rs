use crate::{
	diagram::DiagramRegistry,
	dom::{Attribute, Document, Element, NodeData, NodeId},
};
use hashbrown::HashMap;
use tracing::{debug, error, instrument, trace, trace_span, warn};

/// Attribute of collapsible elements whose state the user controls.
pub const TOGGLE_ATTRIBUTE: &str = "open";

/// Recursion limit for [`Reconciler::merge`], generous for documents.
pub const DEFAULT_DEPTH_LIMIT: usize = 256;

/// Identifies a diagram placeholder across updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagramKey {
	pub kind: &'static str,
	pub id: String,
}

/// What a [`Reconciler::merge`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
	/// Whether the root's own child list changed (insertions, removals or moves).
	pub child_list_changed: bool,
	/// Freshly inserted diagram placeholders, by kind.
	pub added_diagrams: Vec<(&'static str, NodeId)>,
	/// Placeholders carried over from the previous tree.
	pub kept_diagrams: usize,
	/// Nodes (subtree roots) that were removed and freed.
	pub discarded: usize,
}

/// Merges freshly rendered fragments into a live [`Document`], in place.
///
/// Matching is positional and structural, except for diagram placeholders, which are matched by [`DiagramKey`]
/// wherever they are in the tree, so that their rendered output survives unrelated edits.
///
/// # Identity rules
///
/// - An element's user-controlled [`TOGGLE_ATTRIBUTE`] wins over the incoming fragment's.
/// - Elements sharing a diagram container class keep their established `height` style.
/// - Elements that compare equal (after the two rules above) are left alone entirely.
/// - The children of a matched placeholder are never touched.
///
/// The instance only caches allocations between merges.
#[derive(Debug)]
pub struct Reconciler {
	keyed: HashMap<DiagramKey, NodeId>,
	discarded: Vec<NodeId>,
	depth_limit: usize,
}
impl Default for Reconciler {
	fn default() -> Self {
		Self::new()
	}
}
impl Reconciler {
	#[must_use]
	pub fn new() -> Self {
		Self::with_depth_limit(DEFAULT_DEPTH_LIMIT)
	}

	#[must_use]
	pub fn with_depth_limit(depth_limit: usize) -> Self {
		Self {
			keyed: HashMap::new(),
			discarded: Vec::new(),
			depth_limit,
		}
	}

	/// Makes the children of `document`'s root match the root-level nodes of `fragment`.
	#[instrument(skip(self, document, fragment, registry))]
	pub fn merge(&mut self, document: &mut Document, fragment: &Document, registry: &DiagramRegistry) -> MergeReport {
		self.keyed.clear();
		self.discarded.clear();
		let mut report = MergeReport::default();

		self.index_keyed(document, registry);
		trace!("Found {} keyed placeholder(s).", self.keyed.len());

		let root = document.root();
		self.morph_children(document, root, fragment, fragment.root(), registry, &mut report, self.depth_limit);

		// Placeholders without counterpart, wherever they ended up:
		for (key, node) in self.keyed.drain() {
			trace!("Dropping placeholder {:?}.", key);
			if document.parent(node) == Some(root) {
				report.child_list_changed = true;
			}
			document.detach(node);
			self.discarded.push(node);
		}

		for node in self.discarded.drain(..) {
			// Moved placeholders are connected again, and nodes inside an already freed subtree are gone.
			if document.contains(node) && !document.is_connected(node) {
				document.remove_subtree(node);
				report.discarded += 1;
			}
		}

		debug!(
			"Merged: {} new diagram(s), {} kept, {} subtree(s) discarded, root child list changed: {}.",
			report.added_diagrams.len(),
			report.kept_diagrams,
			report.discarded,
			report.child_list_changed
		);
		trace!("Keyed cache capacity: {}", self.keyed.capacity());
		report
	}

	/// Placeholders nested in other placeholders belong to their rendered output and are not indexed.
	fn index_keyed(&mut self, document: &Document, registry: &DiagramRegistry) {
		let mut stack: Vec<NodeId> = document.children(document.root()).iter().rev().copied().collect();
		while let Some(node) = stack.pop() {
			if let Some(key) = diagram_key(document, node, registry) {
				if let Some(duplicate) = self.keyed.insert(key, node) {
					warn!("Duplicate diagram placeholder id. Only the last one, {:?}, can be kept; {:?} will be re-rendered.", node, duplicate);
				}
				continue;
			}
			stack.extend(document.children(node).iter().rev().copied());
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn morph_children(
		&mut self,
		document: &mut Document,
		live_parent: NodeId,
		fragment: &Document,
		new_parent: NodeId,
		registry: &DiagramRegistry,
		report: &mut MergeReport,
		depth_limit: usize,
	) {
		if depth_limit == 0 {
			return error!("Depth limit reached");
		}
		let is_root = live_parent == document.root();

		let mut cursor = document.first_child(live_parent);
		for &new_child in fragment.children(new_parent) {
			if let Some(key) = diagram_key(fragment, new_child, registry) {
				let span = trace_span!("Matching placeholder", kind = key.kind, id = %key.id);
				let _enter = span.enter();
				match self.keyed.remove(&key).filter(|&live| document.contains(live)) {
					Some(live) => {
						if Some(live) == cursor {
							cursor = document.next_sibling(live);
						} else {
							trace!("Moving placeholder into place.");
							report.child_list_changed |= is_root || document.parent(live) == Some(document.root());
							document.insert_before(live_parent, live, cursor);
						}
						report.kept_diagrams += 1;
						self.morph_element(document, live, fragment, new_child, registry, report, depth_limit - 1);
					}
					None => {
						let created = self.adopt(document, fragment, new_child, registry, report, depth_limit - 1);
						document.insert_before(live_parent, created, cursor);
						report.child_list_changed |= is_root;
					}
				}
				continue;
			}

			// Live placeholders are only ever matched by key, so positional matching passes over them.
			while let Some(live) = cursor.filter(|&live| diagram_key(document, live, registry).is_some()) {
				cursor = document.next_sibling(live);
			}

			match cursor {
				Some(live) if compatible(document, live, fragment, new_child, registry) => {
					cursor = document.next_sibling(live);
					self.morph_node(document, live, fragment, new_child, registry, report, depth_limit - 1);
				}
				_ => {
					let created = self.adopt(document, fragment, new_child, registry, report, depth_limit - 1);
					document.insert_before(live_parent, created, cursor);
					report.child_list_changed |= is_root;
				}
			}
		}

		while let Some(live) = cursor {
			cursor = document.next_sibling(live);
			document.detach(live);
			report.child_list_changed |= is_root;
			// Unmatched placeholders stay indexed and are collected (or moved) separately.
			if !self.keyed.values().any(|&keyed| keyed == live) {
				self.discarded.push(live);
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn morph_node(&mut self, document: &mut Document, live: NodeId, fragment: &Document, new: NodeId, registry: &DiagramRegistry, report: &mut MergeReport, depth_limit: usize) {
		match fragment.data(new) {
			Some(NodeData::Text(text)) => {
				let span = trace_span!("Diffing text node");
				let _enter = span.enter();
				if document.set_character_data(live, text) {
					trace!("Updated text.");
				}
			}
			Some(NodeData::Comment(comment)) => {
				let span = trace_span!("Diffing comment");
				let _enter = span.enter();
				document.set_character_data(live, comment);
			}
			Some(NodeData::Element(_)) => self.morph_element(document, live, fragment, new, registry, report, depth_limit),
			Some(NodeData::Root) | None => error!("Unexpected fragment node {:?}. Skipping.", new),
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn morph_element(&mut self, document: &mut Document, live: NodeId, fragment: &Document, new: NodeId, registry: &DiagramRegistry, report: &mut MergeReport, depth_limit: usize) {
		let (Some(live_element), Some(new_element)) = (document.element(live), fragment.element(new)) else {
			return error!("Expected to morph elements, found {:?} and {:?}.", document.data(live), fragment.data(new));
		};
		let span = trace_span!("Diffing element", tag = new_element.name());
		let _enter = span.enter();

		let attributes = forwarded_attributes(live_element, new_element, registry);
		if live_element.same_attributes(&attributes) && document.children_equal(live, fragment, new) {
			trace!("Equal. Skipping.");
			self.claim_keyed_within(document, live, report);
			return;
		}
		let skip_children = registry.placeholder_config(new_element).is_some();

		if let Some(live_element) = document.element_mut(live) {
			live_element.assign_attributes(&attributes);
		}
		if skip_children {
			trace!("Keeping placeholder content.");
		} else {
			self.morph_children(document, live, fragment, new, registry, report, depth_limit);
		}
	}

	/// Unrendered placeholders inside an unchanged subtree match themselves, so they must not be collected as leftovers.
	fn claim_keyed_within(&mut self, document: &Document, live: NodeId, report: &mut MergeReport) {
		if self.keyed.is_empty() {
			return;
		}
		let before = self.keyed.len();
		self.keyed.retain(|_, &mut node| !document.is_inclusive_ancestor(live, node));
		let claimed = before - self.keyed.len();
		if claimed > 0 {
			trace!("Kept {} placeholder(s) in place.", claimed);
			report.kept_diagrams += claimed;
		}
	}

	/// Creates a live copy of `new`, reusing any matching placeholders from the previous tree.
	fn adopt(&mut self, document: &mut Document, fragment: &Document, new: NodeId, registry: &DiagramRegistry, report: &mut MergeReport, depth_limit: usize) -> NodeId {
		if let Some(key) = diagram_key(fragment, new, registry) {
			if let Some(live) = self.keyed.remove(&key).filter(|&live| document.contains(live)) {
				trace!("Reusing placeholder {:?} in new content.", key);
				document.detach(live);
				report.kept_diagrams += 1;
				self.morph_element(document, live, fragment, new, registry, report, depth_limit);
				return live;
			}
		}

		let data = match fragment.data(new) {
			Some(NodeData::Element(element)) => element.clone(),
			Some(NodeData::Text(text)) => return document.create_text(text.as_str()),
			Some(NodeData::Comment(comment)) => return document.create_comment(comment.as_str()),
			Some(NodeData::Root) | None => {
				error!("Unexpected fragment node {:?}. Inserting an empty comment instead.", new);
				return document.create_comment("");
			}
		};
		let placeholder = registry.placeholder_config(&data).map(|config| config.kind);
		let created = document.create_element(data);
		if let Some(kind) = placeholder {
			report.added_diagrams.push((kind, created));
		}

		if depth_limit == 0 {
			error!("Depth limit reached");
			return created;
		}
		for &child in fragment.children(new) {
			let child = self.adopt(document, fragment, child, registry, report, depth_limit - 1);
			document.append_child(created, child);
		}
		created
	}
}

/// The key of `node` iff it is a placeholder of a registered kind with a non-empty `id`.
#[must_use]
pub fn diagram_key(document: &Document, node: NodeId, registry: &DiagramRegistry) -> Option<DiagramKey> {
	let element = document.element(node)?;
	let config = registry.placeholder_config(element)?;
	Some(DiagramKey {
		kind: config.kind,
		id: element.id()?.to_owned(),
	})
}

/// Whether `live` may be morphed into `new` in place. Keyed placeholders only ever match by key.
fn compatible(document: &Document, live: NodeId, fragment: &Document, new: NodeId, registry: &DiagramRegistry) -> bool {
	match (document.data(live), fragment.data(new)) {
		(Some(NodeData::Element(e_1)), Some(NodeData::Element(e_2))) => e_1.name() == e_2.name() && diagram_key(document, live, registry).is_none(),
		(Some(NodeData::Text(_)), Some(NodeData::Text(_))) | (Some(NodeData::Comment(_)), Some(NodeData::Comment(_))) => true,
		_ => false,
	}
}

/// `new`'s attributes, with the live element's toggle state or container height carried over.
fn forwarded_attributes(live: &Element, new: &Element, registry: &DiagramRegistry) -> Vec<Attribute> {
	let mut forwarded = new.clone();
	if let Some(open) = live.attribute(TOGGLE_ATTRIBUTE) {
		forwarded.set_attribute(TOGGLE_ATTRIBUTE, open);
	} else if registry.shared_container(live, new).is_some() {
		forwarded.set_style_property("height", live.style_property("height").unwrap_or_default());
	}
	forwarded.attributes().to_vec()
}
