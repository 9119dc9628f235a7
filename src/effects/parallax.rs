//! Scroll parallax
//!
//! Registered sections are translated by `-scroll_y * speed` while they sit
//! inside the viewport plus a buffer. Sections outside that band are left
//! untouched. While the document is hidden the latest scroll position is
//! held back and applied when it becomes visible again.

use super::surface::{Listener, NodeId, Surface};
use super::{Capabilities, EffectsMode};

pub const ACTIVE_CLASS: &str = "parallax-active";

const LISTENERS: [Listener; 2] = [Listener::Scroll, Listener::VisibilityChange];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParallaxConfig {
    /// Extra distance above and below the viewport that still counts as visible
    pub buffer_px: f64,
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self { buffer_px: 200.0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Section {
    node: NodeId,
    speed: f64,
    top: f64,
    height: f64,
}

impl Section {
    fn intersects(&self, from: f64, to: f64) -> bool {
        self.top <= to && self.top + self.height >= from
    }
}

#[derive(Debug)]
pub struct ParallaxController {
    config: ParallaxConfig,
    /// False when the host lacks intersection tracking or effects are off
    supported: bool,
    reduced_motion: bool,
    document_visible: bool,
    enabled: bool,
    destroyed: bool,
    sections: Vec<Section>,
    pending: Option<(f64, f64)>,
}

impl ParallaxController {
    pub fn init(capabilities: Capabilities, config: ParallaxConfig) -> Self {
        Self {
            config,
            supported: capabilities.intersection_observer && capabilities.effects_mode() != EffectsMode::Off,
            reduced_motion: capabilities.reduced_motion,
            document_visible: capabilities.document_visible,
            enabled: false,
            destroyed: false,
            sections: Vec::new(),
            pending: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Whether sections get classes and transforms at all
    fn animates(&self) -> bool {
        self.enabled && !self.reduced_motion
    }

    /// Track a host element. Registering the same node twice updates it.
    pub fn register(&mut self, surface: &mut impl Surface, node: NodeId, speed: f64, top: f64, height: f64) {
        if self.destroyed || !self.supported {
            return;
        }
        let section = Section { node, speed, top, height };
        match self.sections.iter_mut().find(|s| s.node == node) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
        if self.animates() {
            surface.toggle_class(node, ACTIVE_CLASS, true);
        }
    }

    pub fn enable(&mut self, surface: &mut impl Surface) {
        if self.destroyed || !self.supported || self.enabled {
            return;
        }
        for listener in LISTENERS {
            surface.add_listener(listener);
        }
        self.enabled = true;
        if self.animates() {
            for section in &self.sections {
                surface.toggle_class(section.node, ACTIVE_CLASS, true);
            }
        }
    }

    /// Detach listeners and reset sections to their resting position
    pub fn disable(&mut self, surface: &mut impl Surface) {
        if !self.enabled {
            return;
        }
        self.detach(surface);
        self.pending = None;
    }

    /// Terminal; a destroyed controller ignores every later call
    pub fn destroy(&mut self, surface: &mut impl Surface) {
        if self.destroyed {
            return;
        }
        if self.enabled {
            self.detach(surface);
        }
        self.sections.clear();
        self.pending = None;
        self.destroyed = true;
    }

    fn detach(&mut self, surface: &mut impl Surface) {
        for listener in LISTENERS {
            surface.remove_listener(listener);
        }
        if !self.reduced_motion {
            for section in &self.sections {
                surface.toggle_class(section.node, ACTIVE_CLASS, false);
                surface.set_transform(section.node, None);
            }
        }
        self.enabled = false;
    }

    pub fn on_scroll(&mut self, surface: &mut impl Surface, scroll_y: f64, viewport_height: f64) {
        if !self.animates() {
            return;
        }
        if !self.document_visible {
            self.pending = Some((scroll_y, viewport_height));
            return;
        }
        self.apply(surface, scroll_y, viewport_height);
    }

    pub fn set_document_visible(&mut self, surface: &mut impl Surface, visible: bool) {
        self.document_visible = visible;
        if visible && self.animates() {
            if let Some((scroll_y, viewport_height)) = self.pending.take() {
                self.apply(surface, scroll_y, viewport_height);
            }
        }
    }

    fn apply(&self, surface: &mut impl Surface, scroll_y: f64, viewport_height: f64) {
        let from = scroll_y - self.config.buffer_px;
        let to = scroll_y + viewport_height + self.config.buffer_px;
        for section in self.sections.iter().filter(|s| s.intersects(from, to)) {
            let offset = -scroll_y * section.speed;
            surface.set_transform(section.node, Some(format!("translateY({offset}px)")));
        }
    }
}
