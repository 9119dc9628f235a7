//! Client-side visual effects
//!
//! Custom cursor and scroll parallax, modelled as host-independent state
//! machines. The browser bundle (`assets/js/effects.js`) implements the
//! same contract over the DOM; the server uses [`Capabilities`] to pick an
//! [`EffectsMode`] for the first render.
//!
//! Effects are cosmetic. Missing capabilities degrade to a simplified or
//! inert controller, never to an error.

pub mod cursor;
pub mod parallax;
pub mod surface;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

pub use cursor::{CursorConfig, CursorController, CursorState, HoverTarget};
pub use parallax::{ParallaxConfig, ParallaxController};
pub use surface::{Listener, NodeId, NodeKind, RecordingSurface, Surface};

/// What the client can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Has a hovering pointer (false on touch-only devices)
    pub hover: bool,
    pub intersection_observer: bool,
    pub reduced_motion: bool,
    pub document_visible: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            hover: true,
            intersection_observer: true,
            reduced_motion: false,
            document_visible: true,
        }
    }
}

impl Capabilities {
    /// Best guess from client hints: `Sec-CH-Prefers-Reduced-Motion: reduce`
    /// and `Sec-CH-UA-Mobile: ?1`. Absent hints assume a desktop browser.
    pub fn from_client_hints(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().trim_matches('"').to_ascii_lowercase())
        };

        Self {
            hover: header("sec-ch-ua-mobile").as_deref() != Some("?1"),
            reduced_motion: header("sec-ch-prefers-reduced-motion").as_deref() == Some("reduce"),
            ..Self::default()
        }
    }

    pub fn effects_mode(&self) -> EffectsMode {
        if !self.hover {
            EffectsMode::Off
        } else if self.reduced_motion {
            EffectsMode::Simplified
        } else {
            EffectsMode::Full
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EffectsMode {
    #[default]
    Full,
    /// Cursor proxy only: no trail, ripple or animation classes
    Simplified,
    Off,
}

impl EffectsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectsMode::Full => "full",
            EffectsMode::Simplified => "simplified",
            EffectsMode::Off => "off",
        }
    }
}

/// Events forwarded from the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    PointerMove { x: f64, y: f64 },
    PointerDown { now_ms: f64 },
    PointerUp,
    HoverEnter(HoverTarget),
    HoverLeave,
    Scroll { scroll_y: f64, viewport_height: f64 },
    VisibilityChange { visible: bool },
    Frame { now_ms: f64 },
}

/// Per-page owner of the cursor and parallax controllers
#[derive(Debug)]
pub struct PageEffects {
    capabilities: Capabilities,
    cursor: CursorController,
    parallax: ParallaxController,
}

impl PageEffects {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            cursor: CursorController::init(capabilities, CursorConfig::default()),
            parallax: ParallaxController::init(capabilities, ParallaxConfig::default()),
        }
    }

    pub fn mode(&self) -> EffectsMode {
        self.capabilities.effects_mode()
    }

    pub fn cursor(&self) -> &CursorController {
        &self.cursor
    }

    pub fn parallax(&self) -> &ParallaxController {
        &self.parallax
    }

    pub fn parallax_mut(&mut self) -> &mut ParallaxController {
        &mut self.parallax
    }

    pub fn enable(&mut self, surface: &mut impl Surface) {
        self.cursor.enable(surface);
        self.parallax.enable(surface);
    }

    pub fn disable(&mut self, surface: &mut impl Surface) {
        self.cursor.disable(surface);
        self.parallax.disable(surface);
    }

    pub fn destroy(&mut self, surface: &mut impl Surface) {
        self.cursor.destroy(surface);
        self.parallax.destroy(surface);
    }

    pub fn handle(&mut self, surface: &mut impl Surface, event: HostEvent) {
        match event {
            HostEvent::PointerMove { x, y } => self.cursor.pointer_move(surface, x, y),
            HostEvent::PointerDown { now_ms } => self.cursor.pointer_down(surface, now_ms),
            HostEvent::PointerUp => self.cursor.pointer_up(surface),
            HostEvent::HoverEnter(target) => self.cursor.hover_enter(surface, target),
            HostEvent::HoverLeave => self.cursor.hover_leave(surface),
            HostEvent::Scroll {
                scroll_y,
                viewport_height,
            } => self.parallax.on_scroll(surface, scroll_y, viewport_height),
            HostEvent::VisibilityChange { visible } => self.parallax.set_document_visible(surface, visible),
            HostEvent::Frame { now_ms } => self.cursor.on_frame(surface, now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_mode_selection() {
        let full = Capabilities::default();
        assert_eq!(full.effects_mode(), EffectsMode::Full);

        let reduced = Capabilities {
            reduced_motion: true,
            ..full
        };
        assert_eq!(reduced.effects_mode(), EffectsMode::Simplified);

        let touch = Capabilities {
            hover: false,
            reduced_motion: true,
            ..full
        };
        assert_eq!(touch.effects_mode(), EffectsMode::Off);
    }

    #[test]
    fn test_client_hints() {
        let mut headers = HeaderMap::new();
        assert_eq!(Capabilities::from_client_hints(&headers), Capabilities::default());

        headers.insert("sec-ch-prefers-reduced-motion", HeaderValue::from_static("reduce"));
        assert_eq!(Capabilities::from_client_hints(&headers).effects_mode(), EffectsMode::Simplified);

        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?1"));
        assert_eq!(Capabilities::from_client_hints(&headers).effects_mode(), EffectsMode::Off);

        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
        assert!(Capabilities::from_client_hints(&headers).hover);
    }

    #[test]
    fn test_page_effects_lifecycle_leaves_nothing_behind() {
        let mut surface = RecordingSurface::new();
        let section = surface.add_element();
        let mut page = PageEffects::new(Capabilities::default());
        page.parallax_mut().register(&mut surface, section, 0.5, 0.0, 400.0);

        page.enable(&mut surface);
        page.enable(&mut surface);
        assert_eq!(surface.count(NodeKind::CursorProxy), 1);
        assert_eq!(surface.count(NodeKind::CursorTrail), 5);

        page.handle(&mut surface, HostEvent::PointerMove { x: 10.0, y: 20.0 });
        page.handle(&mut surface, HostEvent::PointerDown { now_ms: 0.0 });
        page.handle(&mut surface, HostEvent::Scroll { scroll_y: 100.0, viewport_height: 800.0 });
        page.handle(&mut surface, HostEvent::Frame { now_ms: 16.0 });

        page.disable(&mut surface);
        page.enable(&mut surface);
        page.destroy(&mut surface);
        page.destroy(&mut surface);

        assert_eq!(surface.injected_count(), 0);
        assert_eq!(surface.listener_count(), 0);
        assert!(surface.node(section).unwrap().classes.is_empty());

        page.enable(&mut surface);
        assert_eq!(surface.injected_count(), 0, "destroy is terminal");
    }

    #[test]
    fn test_off_mode_is_inert() {
        let mut surface = RecordingSurface::new();
        let mut page = PageEffects::new(Capabilities {
            hover: false,
            ..Capabilities::default()
        });
        page.enable(&mut surface);
        page.handle(&mut surface, HostEvent::PointerMove { x: 1.0, y: 1.0 });
        assert_eq!(surface.injected_count(), 0);
        assert_eq!(surface.frame_requests, 0);
    }
}
