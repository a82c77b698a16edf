use crate::dom::{Document, NodeId};

/// The rendering surface a [`Document`] is laid out on.
///
/// Geometry follows [***Element.getBoundingClientRect()***](https://developer.mozilla.org/en-US/docs/Web/API/Element/getBoundingClientRect):
/// tops are relative to the visible area, so they shift with [`Viewport::scroll_y`].
pub trait Viewport {
	/// Zero for nodes without a box.
	fn client_top(&self, document: &Document, node: NodeId) -> f64;
	fn client_height(&self, document: &Document, node: NodeId) -> f64;
	fn scroll_y(&self) -> f64;
	fn inner_height(&self) -> f64;
	fn scroll_to(&mut self, top: f64);
}

impl<V: Viewport + ?Sized> Viewport for &mut V {
	fn client_top(&self, document: &Document, node: NodeId) -> f64 {
		(**self).client_top(document, node)
	}

	fn client_height(&self, document: &Document, node: NodeId) -> f64 {
		(**self).client_height(document, node)
	}

	fn scroll_y(&self) -> f64 {
		(**self).scroll_y()
	}

	fn inner_height(&self) -> f64 {
		(**self).inner_height()
	}

	fn scroll_to(&mut self, top: f64) {
		(**self).scroll_to(top);
	}
}
