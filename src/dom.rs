//! The live document tree the preview renders into.
//!
//! Nodes live in an arena and are addressed by generational [`NodeId`]s.
//! Freeing a node bumps its slot's generation, so an id captured before an asynchronous
//! suspension can always be checked for liveness afterwards instead of dangling.

use core::fmt::Write as _;
use tracing::{trace, warn};

/// Elements that never have content or a closing tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr"];

/// Elements whose text content is serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
	index: u32,
	generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: String,
	pub value: String,
}

/// An element's name and [***Attr***](https://developer.mozilla.org/en-US/docs/Web/API/Attr)ibutes, without its content.
///
/// Names are stored lower-cased. Attribute order is kept but is not significant for equality checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
	name: String,
	attributes: Vec<Attribute>,
}
impl Element {
	#[must_use]
	pub fn new(name: &str) -> Self {
		Self {
			name: name.to_ascii_lowercase(),
			attributes: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
		self.set_attribute(name, value);
		self
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn attributes(&self) -> &[Attribute] {
		&self.attributes
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.iter().find(|a| a.name == name).map(|a| a.value.as_str())
	}

	#[must_use]
	pub fn has_attribute(&self, name: &str) -> bool {
		self.attributes.iter().any(|a| a.name == name)
	}

	/// Returns the previous value, if any.
	pub fn set_attribute(&mut self, name: &str, value: &str) -> Option<String> {
		match self.attributes.iter_mut().find(|a| a.name == name) {
			Some(existing) => Some(core::mem::replace(&mut existing.value, value.to_owned())),
			None => {
				self.attributes.push(Attribute {
					name: name.to_owned(),
					value: value.to_owned(),
				});
				None
			}
		}
	}

	pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
		let position = self.attributes.iter().position(|a| a.name == name)?;
		Some(self.attributes.remove(position).value)
	}

	/// The `id` attribute, unless missing or empty.
	#[must_use]
	pub fn id(&self) -> Option<&str> {
		self.attribute("id").filter(|id| !id.is_empty())
	}

	#[must_use]
	pub fn has_class(&self, class: &str) -> bool {
		self.attribute("class").is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
	}

	/// Reads one declaration from the inline `style` attribute.
	#[must_use]
	pub fn style_property(&self, property: &str) -> Option<&str> {
		self.attribute("style")?
			.split(';')
			.filter_map(|declaration| declaration.split_once(':'))
			.find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
			.map(|(_, value)| value.trim())
	}

	/// Replaces one declaration in the inline `style` attribute.
	///
	/// An empty `value` removes the declaration, and the attribute itself once no declarations remain.
	pub fn set_style_property(&mut self, property: &str, value: &str) {
		let mut style = String::new();
		if let Some(existing) = self.attribute("style") {
			for (name, old_value) in existing.split(';').filter_map(|declaration| declaration.split_once(':')) {
				let name = name.trim();
				if name.is_empty() || name.eq_ignore_ascii_case(property) {
					continue;
				}
				push_declaration(&mut style, name, old_value.trim());
			}
		}
		if !value.is_empty() {
			push_declaration(&mut style, property, value);
		}

		if style.is_empty() {
			self.remove_attribute("style");
		} else {
			self.set_attribute("style", &style);
		}
	}

	/// Order-insensitive attribute comparison, as in [***Node.isEqualNode()***](https://developer.mozilla.org/en-US/docs/Web/API/Node/isEqualNode).
	#[must_use]
	pub fn same_attributes(&self, other: &[Attribute]) -> bool {
		self.attributes.len() == other.len() && other.iter().all(|b| self.attribute(&b.name) == Some(b.value.as_str()))
	}

	/// Replaces all attributes with `attributes`, touching only those that differ.
	pub fn assign_attributes(&mut self, attributes: &[Attribute]) {
		self.attributes.retain(|a| attributes.iter().any(|b| b.name == a.name));
		for Attribute { name, value } in attributes {
			if self.attribute(name) != Some(value.as_str()) {
				self.set_attribute(name, value);
			}
		}
	}
}

fn push_declaration(style: &mut String, name: &str, value: &str) {
	if !style.is_empty() {
		style.push(' ');
	}
	let _ = write!(style, "{}: {};", name, value);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
	Root,
	Element(Element),
	Text(String),
	Comment(String),
}

#[derive(Debug)]
struct Node {
	data: NodeData,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

#[derive(Debug)]
struct Slot {
	generation: u32,
	node: Option<Node>,
}

/// An arena-backed node tree with a single root.
///
/// Detached nodes stay allocated (and can be re-inserted) until [`Document::remove_subtree`] frees them.
#[derive(Debug)]
pub struct Document {
	slots: Vec<Slot>,
	vacant: Vec<u32>,
	root: NodeId,
}
impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}
impl Document {
	#[must_use]
	pub fn new() -> Self {
		let mut document = Self {
			slots: Vec::new(),
			vacant: Vec::new(),
			root: NodeId { index: 0, generation: 0 },
		};
		document.root = document.allocate(NodeData::Root);
		document
	}

	fn allocate(&mut self, data: NodeData) -> NodeId {
		let node = Node { data, parent: None, children: Vec::new() };
		if let Some(index) = self.vacant.pop() {
			let slot = &mut self.slots[index as usize];
			slot.node = Some(node);
			NodeId { index, generation: slot.generation }
		} else {
			let index = u32::try_from(self.slots.len()).expect("peek-sync: More than `u32::MAX` nodes in one document.");
			self.slots.push(Slot { generation: 0, node: Some(node) });
			NodeId { index, generation: 0 }
		}
	}

	fn node(&self, id: NodeId) -> Option<&Node> {
		self.slots.get(id.index as usize).filter(|slot| slot.generation == id.generation)?.node.as_ref()
	}

	fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
		self.slots.get_mut(id.index as usize).filter(|slot| slot.generation == id.generation)?.node.as_mut()
	}

	#[must_use]
	pub fn root(&self) -> NodeId {
		self.root
	}

	/// Number of allocated nodes, including detached ones.
	#[must_use]
	pub fn len(&self) -> usize {
		self.slots.len() - self.vacant.len()
	}

	/// Always `false`, as the root is never freed.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Whether `id` still refers to an allocated node.
	#[must_use]
	pub fn contains(&self, id: NodeId) -> bool {
		self.node(id).is_some()
	}

	#[must_use]
	pub fn data(&self, id: NodeId) -> Option<&NodeData> {
		self.node(id).map(|node| &node.data)
	}

	#[must_use]
	pub fn element(&self, id: NodeId) -> Option<&Element> {
		match self.data(id)? {
			NodeData::Element(element) => Some(element),
			_ => None,
		}
	}

	pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
		match &mut self.node_mut(id)?.data {
			NodeData::Element(element) => Some(element),
			_ => None,
		}
	}

	/// Replaces the data of a text or comment node. Returns whether anything was changed.
	pub fn set_character_data(&mut self, id: NodeId, data: &str) -> bool {
		match self.node_mut(id).map(|node| &mut node.data) {
			Some(NodeData::Text(text) | NodeData::Comment(text)) if text.as_str() != data => {
				data.clone_into(text);
				true
			}
			_ => false,
		}
	}

	/// # Panics
	///
	/// If the document would hold more than [`u32::MAX`] nodes at once.
	/// Preview documents stay many orders of magnitude below that.
	pub fn create_element(&mut self, element: Element) -> NodeId {
		self.allocate(NodeData::Element(element))
	}

	/// # Panics
	///
	/// Like [`Document::create_element`].
	pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
		self.allocate(NodeData::Text(text.into()))
	}

	/// # Panics
	///
	/// Like [`Document::create_element`].
	pub fn create_comment(&mut self, comment: impl Into<String>) -> NodeId {
		self.allocate(NodeData::Comment(comment.into()))
	}

	#[must_use]
	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.node(id)?.parent
	}

	/// Empty for stale ids.
	#[must_use]
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.node(id).map_or(&[][..], |node| node.children.as_slice())
	}

	#[must_use]
	pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
		self.children(id).first().copied()
	}

	#[must_use]
	pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
		let siblings = self.children(self.parent(id)?);
		let position = siblings.iter().position(|&sibling| sibling == id)?;
		siblings.get(position + 1).copied()
	}

	/// Whether `node` is `ancestor` or one of its descendants.
	#[must_use]
	pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut current = Some(node);
		while let Some(id) = current {
			if id == ancestor {
				return true;
			}
			current = self.parent(id);
		}
		false
	}

	/// Whether `id` is alive and reachable from the root.
	#[must_use]
	pub fn is_connected(&self, id: NodeId) -> bool {
		self.contains(id) && self.is_inclusive_ancestor(self.root, id)
	}

	/// Removes `id` from its parent's child list, keeping it allocated.
	/// Returns whether it had a parent.
	pub fn detach(&mut self, id: NodeId) -> bool {
		let Some(parent) = self.parent(id) else { return false };
		if let Some(parent) = self.node_mut(parent) {
			parent.children.retain(|&child| child != id);
		}
		if let Some(node) = self.node_mut(id) {
			node.parent = None;
		}
		true
	}

	/// Inserts (or moves) `child` into `parent` before `reference`, or at the end if `reference` is [`None`].
	///
	/// Returns `false` without changes if the insertion would be invalid.
	pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> bool {
		if !self.contains(parent) || !self.contains(child) || child == self.root || self.is_inclusive_ancestor(child, parent) {
			warn!("Refusing to insert {:?} into {:?}.", child, parent);
			return false;
		}
		if reference == Some(child) {
			return true;
		}

		self.detach(child);
		let Some(parent_node) = self.node_mut(parent) else { return false };
		let position = match reference {
			None => parent_node.children.len(),
			Some(reference) => match parent_node.children.iter().position(|&c| c == reference) {
				Some(position) => position,
				None => {
					warn!("Reference node {:?} is not a child of {:?}. Appending instead.", reference, parent);
					parent_node.children.len()
				}
			},
		};
		parent_node.children.insert(position, child);
		if let Some(child) = self.node_mut(child) {
			child.parent = Some(parent);
		}
		true
	}

	pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
		self.insert_before(parent, child, None)
	}

	/// Detaches and frees `id` and all of its descendants. The root is only emptied.
	pub fn remove_subtree(&mut self, id: NodeId) {
		if id == self.root {
			for child in self.children(id).to_vec() {
				self.remove_subtree(child);
			}
			return;
		}

		self.detach(id);
		let mut stack = vec![id];
		let mut freed = 0_usize;
		while let Some(id) = stack.pop() {
			let Some(slot) = self.slots.get_mut(id.index as usize).filter(|slot| slot.generation == id.generation) else { continue };
			if let Some(node) = slot.node.take() {
				stack.extend(node.children);
				slot.generation = slot.generation.wrapping_add(1);
				self.vacant.push(id.index);
				freed += 1;
			}
		}
		trace!("Freed {} node(s).", freed);
	}

	/// Pre-order traversal of everything below `id`, not including `id` itself.
	#[must_use]
	pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
		Descendants {
			document: self,
			stack: self.children(id).iter().rev().copied().collect(),
		}
	}

	/// Deep-copies `node` out of `source` into this document, detached.
	///
	/// # Panics
	///
	/// Like [`Document::create_element`].
	pub fn import(&mut self, source: &Document, node: NodeId) -> Option<NodeId> {
		let data = match source.data(node)? {
			NodeData::Root => {
				warn!("Cannot import a document root.");
				return None;
			}
			data => data.clone(),
		};
		let copy = self.allocate(data);
		for &child in source.children(node) {
			if let Some(child) = self.import(source, child) {
				self.append_child(copy, child);
			}
		}
		Some(copy)
	}

	/// Structural equality of `a` in this document and `b` in `other`.
	#[must_use]
	pub fn is_equal_node(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
		let same_data = match (self.data(a), other.data(b)) {
			(Some(NodeData::Root), Some(NodeData::Root)) => true,
			(Some(NodeData::Element(e_1)), Some(NodeData::Element(e_2))) => e_1.name == e_2.name && e_1.same_attributes(&e_2.attributes),
			(Some(NodeData::Text(t_1)), Some(NodeData::Text(t_2))) | (Some(NodeData::Comment(t_1)), Some(NodeData::Comment(t_2))) => t_1 == t_2,
			_ => false,
		};
		same_data && self.children_equal(a, other, b)
	}

	#[must_use]
	pub fn children_equal(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
		let (c_1, c_2) = (self.children(a), other.children(b));
		c_1.len() == c_2.len() && c_1.iter().zip(c_2).all(|(&a, &b)| self.is_equal_node(a, other, b))
	}

	#[must_use]
	pub fn inner_html(&self, id: NodeId) -> String {
		let mut html = String::new();
		for &child in self.children(id) {
			self.write_html(&mut html, child);
		}
		html
	}

	#[must_use]
	pub fn outer_html(&self, id: NodeId) -> String {
		let mut html = String::new();
		self.write_html(&mut html, id);
		html
	}

	fn write_html(&self, html: &mut String, id: NodeId) {
		match self.data(id) {
			None => {}
			Some(NodeData::Root) => {
				for &child in self.children(id) {
					self.write_html(html, child);
				}
			}
			Some(NodeData::Text(text)) => escape_into(html, text, false),
			Some(NodeData::Comment(comment)) => {
				let _ = write!(html, "<!--{}-->", comment);
			}
			Some(NodeData::Element(element)) => {
				html.push('<');
				html.push_str(&element.name);
				for Attribute { name, value } in &element.attributes {
					let _ = write!(html, " {}=\"", name);
					escape_into(html, value, true);
					html.push('"');
				}
				html.push('>');
				if VOID_ELEMENTS.contains(&element.name.as_str()) {
					return;
				}
				let raw_text = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
				for &child in self.children(id) {
					match self.data(child) {
						Some(NodeData::Text(text)) if raw_text => html.push_str(text),
						_ => self.write_html(html, child),
					}
				}
				let _ = write!(html, "</{}>", element.name);
			}
		}
	}
}

fn escape_into(html: &mut String, text: &str, attribute: bool) {
	for c in text.chars() {
		match c {
			'&' => html.push_str("&amp;"),
			'<' => html.push_str("&lt;"),
			'>' => html.push_str("&gt;"),
			'"' if attribute => html.push_str("&quot;"),
			c => html.push(c),
		}
	}
}

pub struct Descendants<'a> {
	document: &'a Document,
	stack: Vec<NodeId>,
}
impl<'a> Iterator for Descendants<'a> {
	type Item = NodeId;

	fn next(&mut self) -> Option<Self::Item> {
		let id = self.stack.pop()?;
		self.stack.extend(self.document.children(id).iter().rev().copied());
		Some(id)
	}
}
