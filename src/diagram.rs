//! Diagram kinds and the renderers registered for them.
//!
//! Everything kind-specific lives in one [`DiagramConfig`] per kind.
//! Adding a kind means registering one more entry in a [`DiagramRegistry`].

use crate::{
	dom::{Document, Element, NodeId},
	error::RenderError,
};
use core::fmt::{self, Debug, Formatter};
use futures::future::LocalBoxFuture;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Names the diagram kind of a placeholder.
pub const GRAPH_ATTRIBUTE: &str = "data-graph";

/// Matches `tag[attribute="value"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
	pub tag: &'static str,
	pub attribute: &'static str,
	pub value: &'static str,
}
impl Selector {
	#[must_use]
	pub fn matches(&self, document: &Document, node: NodeId) -> bool {
		document.element(node).is_some_and(|element| element.name() == self.tag && element.attribute(self.attribute) == Some(self.value))
	}
}

/// How the height hint on a placeholder's parent is set after rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightPolicy {
	/// The rendered output's height, in pixels.
	Measured,
	/// `auto`.
	Auto,
}

#[derive(Clone, Copy)]
pub struct DiagramConfig {
	pub kind: &'static str,
	/// Class of the element wrapping a placeholder, whose height is kept stable across updates.
	pub container_class: &'static str,
	/// Attribute holding the raw diagram source.
	pub data_attribute: &'static str,
	pub selector: Selector,
	/// Whether a placeholder already contains rendered output.
	pub has_rendered: fn(&Document, NodeId) -> bool,
	pub height: HeightPolicy,
}
impl Debug for DiagramConfig {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("DiagramConfig")
			.field("kind", &self.kind)
			.field("container_class", &self.container_class)
			.field("data_attribute", &self.data_attribute)
			.field("selector", &self.selector)
			.field("height", &self.height)
			.finish_non_exhaustive()
	}
}
impl DiagramConfig {
	/// The raw diagram source of `placeholder`, unless missing or empty.
	#[must_use]
	pub fn source<'a>(&self, document: &'a Document, placeholder: NodeId) -> Option<&'a str> {
		document.element(placeholder)?.attribute(self.data_attribute).filter(|source| !source.is_empty())
	}
}

pub const MERMAID: DiagramConfig = DiagramConfig {
	kind: "mermaid",
	container_class: "peek-mermaid-container",
	data_attribute: "data-graph-definition",
	selector: Selector {
		tag: "div",
		attribute: GRAPH_ATTRIBUTE,
		value: "mermaid",
	},
	has_rendered: contains_svg,
	height: HeightPolicy::Measured,
};

pub const PLANTUML: DiagramConfig = DiagramConfig {
	kind: "plantuml",
	container_class: "peek-plantuml-container",
	data_attribute: "data-plantuml-content",
	selector: Selector {
		tag: "div",
		attribute: GRAPH_ATTRIBUTE,
		value: "plantuml",
	},
	has_rendered: contains_img,
	height: HeightPolicy::Auto,
};

fn contains_svg(document: &Document, node: NodeId) -> bool {
	contains_element(document, node, "svg")
}

fn contains_img(document: &Document, node: NodeId) -> bool {
	contains_element(document, node, "img")
}

#[must_use]
pub fn contains_element(document: &Document, node: NodeId, name: &str) -> bool {
	document.descendants(node).any(|descendant| document.element(descendant).is_some_and(|element| element.name() == name))
}

/// What a [`Renderer`] is asked to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
	/// Unique per placeholder, derived from its `id`.
	pub id: String,
	pub source: String,
	/// The placeholder the result will be spliced into. May be gone by the time the render finishes.
	pub container: NodeId,
}

/// Turns diagram source into markup, asynchronously.
///
/// `Ok(None)` means there is nothing to insert. Returned markup is parsed as HTML, never executed.
pub trait Renderer {
	fn render(&self, request: RenderRequest) -> LocalBoxFuture<'static, Result<Option<String>, RenderError>>;
}

impl<F> Renderer for F
where
	F: Fn(RenderRequest) -> LocalBoxFuture<'static, Result<Option<String>, RenderError>>,
{
	fn render(&self, request: RenderRequest) -> LocalBoxFuture<'static, Result<Option<String>, RenderError>> {
		self(request)
	}
}

struct Registration {
	config: DiagramConfig,
	renderer: Rc<dyn Renderer>,
}

/// Maps diagram kinds to their [`DiagramConfig`] and [`Renderer`].
#[derive(Default)]
pub struct DiagramRegistry {
	entries: HashMap<&'static str, Registration>,
}
impl Debug for DiagramRegistry {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.entries.keys()).finish()
	}
}
impl DiagramRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces any previous registration of the same kind.
	pub fn register(&mut self, config: DiagramConfig, renderer: impl 'static + Renderer) -> &mut Self {
		let previous = self.entries.insert(
			config.kind,
			Registration {
				config,
				renderer: Rc::new(renderer),
			},
		);
		if previous.is_some() {
			debug!("Replaced the renderer for {:?} diagrams.", config.kind);
		}
		self
	}

	#[must_use]
	pub fn config(&self, kind: &str) -> Option<&DiagramConfig> {
		self.entries.get(kind).map(|registration| &registration.config)
	}

	#[must_use]
	pub fn renderer(&self, kind: &str) -> Option<Rc<dyn Renderer>> {
		self.entries.get(kind).map(|registration| Rc::clone(&registration.renderer))
	}

	pub fn kinds(&self) -> impl '_ + Iterator<Item = &'static str> {
		self.entries.keys().copied()
	}

	pub fn configs(&self) -> impl '_ + Iterator<Item = &DiagramConfig> {
		self.entries.values().map(|registration| &registration.config)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The configuration of the registered kind `element` is a placeholder for, if any.
	#[must_use]
	pub fn placeholder_config(&self, element: &Element) -> Option<&DiagramConfig> {
		self.config(element.attribute(GRAPH_ATTRIBUTE)?)
	}

	/// The configuration whose container class both elements carry, if any.
	#[must_use]
	pub fn shared_container(&self, a: &Element, b: &Element) -> Option<&DiagramConfig> {
		self.configs().find(|config| a.has_class(config.container_class) && b.has_class(config.container_class))
	}
}
