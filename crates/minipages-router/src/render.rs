//! Two-region page rendering.
//!
//! A [`RenderedPage`] keeps two computations alive. The content region reads
//! the committed template and renders it; the layout region reads the
//! committed layout and renders it around [`YIELD_MARKER`]. Changing the
//! template re-renders only the content region and changing the layout only
//! the layout region. [`RenderedPage::html`] stitches the two together.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use minipages_reactive::{Computation, Signal};

use crate::error::MissingTemplateError;
use crate::router::RouterShared;
use crate::template::YIELD_MARKER;

type RegionOutput = Result<String, MissingTemplateError>;

struct Regions {
	content: Signal<RegionOutput>,
	layout: Signal<Option<RegionOutput>>,
	content_renders: Rc<Cell<usize>>,
	layout_renders: Rc<Cell<usize>>,
	_content_region: Computation,
	_layout_region: Computation,
}

/// Output of [`Router::render`](crate::Router::render).
///
/// Clones share the same regions. The regions stop updating once every clone
/// is dropped.
#[derive(Clone)]
pub struct RenderedPage {
	regions: Rc<Regions>,
}

impl RenderedPage {
	pub(crate) fn new(router: Weak<RouterShared>) -> Self {
		let content = Signal::new(Ok(String::new()));
		let layout = Signal::new(None);
		let content_renders = Rc::new(Cell::new(0));
		let layout_renders = Rc::new(Cell::new(0));

		let content_region = {
			let router = router.clone();
			let content = content.clone();
			let renders = content_renders.clone();
			Computation::new(move || {
				let Some(shared) = router.upgrade() else {
					return;
				};
				let output = shared.render_content();
				renders.set(renders.get() + 1);
				content.set_if_changed(output);
			})
		};

		let layout_region = {
			let layout = layout.clone();
			let renders = layout_renders.clone();
			Computation::new(move || {
				let Some(shared) = router.upgrade() else {
					return;
				};
				let output = shared.render_layout();
				renders.set(renders.get() + 1);
				layout.set_if_changed(output);
			})
		};

		Self {
			regions: Rc::new(Regions {
				content,
				layout,
				content_renders,
				layout_renders,
				_content_region: content_region,
				_layout_region: layout_region,
			}),
		}
	}

	/// The whole page: the content inside the layout, or the content alone
	/// when no layout is committed.
	///
	/// Reactive: a computation calling this re-runs when either region
	/// changes.
	///
	/// # Errors
	///
	/// [`MissingTemplateError`] when the committed layout or template is not
	/// defined.
	pub fn html(&self) -> Result<String, MissingTemplateError> {
		let content = self.regions.content.get()?;
		match self.regions.layout.get() {
			None => Ok(content),
			Some(layout) => Ok(layout?.replace(YIELD_MARKER, &content)),
		}
	}

	/// Output of the content region.
	pub fn content(&self) -> Result<String, MissingTemplateError> {
		self.regions.content.get()
	}

	/// Output of the layout region, `None` when no layout is committed.
	pub fn layout(&self) -> Option<Result<String, MissingTemplateError>> {
		self.regions.layout.get()
	}

	/// How many times the content region has rendered.
	pub fn content_renders(&self) -> usize {
		self.regions.content_renders.get()
	}

	/// How many times the layout region has rendered.
	pub fn layout_renders(&self) -> usize {
		self.regions.layout_renders.get()
	}
}

impl std::fmt::Debug for RenderedPage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RenderedPage")
			.field("content_renders", &self.content_renders())
			.field("layout_renders", &self.layout_renders())
			.finish()
	}
}
