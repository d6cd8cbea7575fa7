//! Modal overlay hosting the wizard frame.
//!
//! Fades are not animated; the agent schedules [`Overlay::fade_complete`]
//! once the fade duration has passed. Each open or close starts a new
//! generation so a fade from an earlier transition is ignored.

use crate::dom::{Document, NodeId};
use crate::markup;

/// Viewport widths at or below this render the frame full screen.
pub const MOBILE_BREAKPOINT: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Hidden,
    Showing,
    Visible,
    Hiding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Fills the viewport at the current scroll offset.
    Mobile { scroll_x: u32, scroll_y: u32 },
    /// Centred in the page.
    Desktop,
}

impl Layout {
    #[must_use]
    pub fn for_viewport(doc: &Document) -> Self {
        let viewport = doc.viewport();
        if viewport.width <= MOBILE_BREAKPOINT {
            Layout::Mobile {
                scroll_x: viewport.scroll_x,
                scroll_y: viewport.scroll_y,
            }
        } else {
            Layout::Desktop
        }
    }

    fn frame_style(self) -> String {
        match self {
            Layout::Mobile { scroll_x, scroll_y } => format!(
                "height: 100%; max-height:100vh; width: 100vw; top: {scroll_y}px; left: {scroll_x}px;"
            ),
            Layout::Desktop => "height:100%; max-height:95%; position: absolute; top: 50%; \
                 transform: translate(-50%, -50%); left: 50%;"
                .to_owned(),
        }
    }
}

#[derive(Debug)]
pub struct Overlay {
    overlay: NodeId,
    frame: NodeId,
    phase: OverlayPhase,
    click_to_close: bool,
    generation: u64,
}

impl Overlay {
    /// Appends the hidden overlay, its frame, and the base stylesheet to
    /// the page.
    pub fn mount(doc: &mut Document) -> Self {
        let overlay = doc.create_element("div");
        doc.set_attr(overlay, "id", markup::OVERLAY_ID);

        let frame = doc.create_element("iframe");
        doc.set_attr(frame, "id", markup::FRAME_ID);
        doc.set_attr(frame, "class", "prodigy-wizard");
        doc.set_attr(frame, "frameborder", "0");
        doc.set_attr(frame, "allow", "microphone *; camera *");
        doc.append_child(overlay, frame);

        let body = doc.body();
        doc.append_child(body, overlay);

        if doc.element_by_id(markup::BASE_STYLES_ID).is_none() {
            let styles = doc.create_element("style");
            doc.set_attr(styles, "id", markup::BASE_STYLES_ID);
            let text = doc.create_text(markup::BASE_STYLES);
            doc.append_child(styles, text);
            let head = doc.head();
            doc.append_child(head, styles);
        }

        Self {
            overlay,
            frame,
            phase: OverlayPhase::Hidden,
            click_to_close: true,
            generation: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    #[must_use]
    pub fn click_to_close(&self) -> bool {
        self.click_to_close
    }

    #[must_use]
    pub fn element(&self) -> NodeId {
        self.overlay
    }

    #[must_use]
    pub fn frame(&self) -> NodeId {
        self.frame
    }

    /// Points the frame at `url` and starts showing it. Returns the
    /// generation the fade completion must carry.
    pub fn open(&mut self, doc: &mut Document, url: &str, layout: Layout) -> u64 {
        doc.set_attr(self.frame, "src", url);
        doc.set_attr(self.frame, "style", &layout.frame_style());
        match layout {
            Layout::Desktop => doc.set_attr(self.frame, "width", "98%"),
            Layout::Mobile { .. } => doc.remove_attr(self.frame, "width"),
        }
        doc.set_style(self.frame, "display", "block");
        doc.set_style(self.overlay, "display", "block");

        self.click_to_close = true;
        self.phase = OverlayPhase::Showing;
        self.bump()
    }

    /// Starts hiding. Returns `None` when already hidden or hiding.
    pub fn close(&mut self, doc: &mut Document) -> Option<u64> {
        match self.phase {
            OverlayPhase::Hidden | OverlayPhase::Hiding => None,
            OverlayPhase::Showing | OverlayPhase::Visible => {
                doc.set_style(self.overlay, "opacity", "0");
                self.phase = OverlayPhase::Hiding;
                Some(self.bump())
            }
        }
    }

    /// A click on the overlay background.
    pub fn click_overlay(&mut self, doc: &mut Document) -> Option<u64> {
        if self.click_to_close {
            self.close(doc)
        } else {
            None
        }
    }

    pub fn set_click_to_close(&mut self, enabled: bool) {
        self.click_to_close = enabled;
    }

    /// Finishes the fade started by the transition tagged `generation`.
    /// Returns `false` for stale generations.
    pub fn fade_complete(&mut self, doc: &mut Document, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        let body = doc.body();
        match self.phase {
            OverlayPhase::Showing => {
                doc.set_style(self.overlay, "opacity", "1");
                doc.set_style(body, "overflow", "hidden");
                self.phase = OverlayPhase::Visible;
            }
            OverlayPhase::Hiding => {
                doc.set_style(self.overlay, "display", "none");
                doc.set_style(self.frame, "display", "none");
                doc.set_attr(self.frame, "src", "");
                doc.set_style(body, "overflow", "scroll");
                self.phase = OverlayPhase::Hidden;
            }
            OverlayPhase::Hidden | OverlayPhase::Visible => return false,
        }
        true
    }

    fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}
