//! Custom cursor controller
//!
//! A proxy node follows the pointer; trail nodes ease toward their
//! predecessor; clicks spawn short-lived ripple nodes. Pointer moves are
//! coalesced: at most one animation frame is pending at any time and the
//! frame commits only the latest coordinates.

use super::surface::{Listener, NodeId, NodeKind, Surface};
use super::{Capabilities, EffectsMode};

pub const CLICKING_CLASS: &str = "is-clicking";

const LISTENERS: [Listener; 5] = [
    Listener::PointerMove,
    Listener::PointerDown,
    Listener::PointerUp,
    Listener::PointerOver,
    Listener::PointerOut,
];

/// Trails closer than this to their target are considered settled
const SETTLE_DISTANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorConfig {
    pub trail_count: usize,
    pub ripple_ms: f64,
    /// Fraction of the remaining distance a trail covers per frame
    pub trail_ease: f64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            trail_count: 5,
            ripple_ms: 600.0,
            trail_ease: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    #[default]
    Default,
    Hover,
    Text,
    Disabled,
}

impl CursorState {
    pub fn class(&self) -> Option<&'static str> {
        match self {
            CursorState::Default => None,
            CursorState::Hover => Some("cursor--hover"),
            CursorState::Text => Some("cursor--text"),
            CursorState::Disabled => Some("cursor--disabled"),
        }
    }
}

/// What the pointer is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverTarget {
    /// Links, buttons and other clickable elements
    Interactive,
    /// Text inputs and text areas
    Text,
    Disabled,
}

impl HoverTarget {
    fn state(self) -> CursorState {
        match self {
            HoverTarget::Interactive => CursorState::Hover,
            HoverTarget::Text => CursorState::Text,
            HoverTarget::Disabled => CursorState::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Enabled,
    Disabled,
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
struct Trail {
    node: NodeId,
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, Copy)]
struct Ripple {
    node: NodeId,
    expires_at: f64,
}

#[derive(Debug)]
pub struct CursorController {
    mode: EffectsMode,
    config: CursorConfig,
    lifecycle: Lifecycle,
    listening: bool,
    proxy: Option<NodeId>,
    trails: Vec<Trail>,
    ripples: Vec<Ripple>,
    /// Latest pointer coordinates, committed on the next frame
    pointer: Option<(f64, f64)>,
    frame_pending: bool,
    state: CursorState,
    clicking: bool,
}

impl CursorController {
    pub fn init(capabilities: Capabilities, config: CursorConfig) -> Self {
        Self {
            mode: capabilities.effects_mode(),
            config,
            lifecycle: Lifecycle::Idle,
            listening: false,
            proxy: None,
            trails: Vec::new(),
            ripples: Vec::new(),
            pointer: None,
            frame_pending: false,
            state: CursorState::Default,
            clicking: false,
        }
    }

    pub fn mode(&self) -> EffectsMode {
        self.mode
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.lifecycle == Lifecycle::Enabled
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    pub fn is_clicking(&self) -> bool {
        self.clicking
    }

    pub fn proxy(&self) -> Option<NodeId> {
        self.proxy
    }

    pub fn active_ripples(&self) -> usize {
        self.ripples.len()
    }

    fn full(&self) -> bool {
        self.mode == EffectsMode::Full
    }

    /// Attach listeners and inject nodes that are not present yet
    pub fn enable(&mut self, surface: &mut impl Surface) {
        if self.mode == EffectsMode::Off || self.lifecycle == Lifecycle::Destroyed {
            return;
        }

        if !self.listening {
            for listener in LISTENERS {
                surface.add_listener(listener);
            }
            self.listening = true;
        }

        let proxy = match self.proxy {
            Some(proxy) => proxy,
            None => {
                let proxy = surface.create_node(NodeKind::CursorProxy);
                self.proxy = Some(proxy);
                proxy
            }
        };
        surface.set_visible(proxy, true);

        if self.full() && self.trails.is_empty() {
            let (x, y) = self.pointer.unwrap_or((0.0, 0.0));
            for _ in 0..self.config.trail_count {
                let node = surface.create_node(NodeKind::CursorTrail);
                self.trails.push(Trail { node, x, y });
            }
        } else {
            for trail in &self.trails {
                surface.set_visible(trail.node, true);
            }
        }

        self.lifecycle = Lifecycle::Enabled;
    }

    /// Detach listeners and hide the proxy. Proxy and trail nodes are kept
    /// for re-enabling; in-flight ripples are removed since no frame will
    /// expire them.
    pub fn disable(&mut self, surface: &mut impl Surface) {
        if self.lifecycle != Lifecycle::Enabled {
            return;
        }
        self.detach(surface);
        self.release_click(surface);
        for ripple in self.ripples.drain(..) {
            surface.remove_node(ripple.node);
        }
        if let Some(proxy) = self.proxy {
            surface.set_visible(proxy, false);
        }
        for trail in &self.trails {
            surface.set_visible(trail.node, false);
        }
        self.frame_pending = false;
        self.lifecycle = Lifecycle::Disabled;
    }

    /// Remove every injected node and listener. Terminal.
    pub fn destroy(&mut self, surface: &mut impl Surface) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.detach(surface);
        for ripple in self.ripples.drain(..) {
            surface.remove_node(ripple.node);
        }
        for trail in self.trails.drain(..) {
            surface.remove_node(trail.node);
        }
        if let Some(proxy) = self.proxy.take() {
            surface.remove_node(proxy);
        }
        self.clicking = false;
        self.state = CursorState::Default;
        self.pointer = None;
        self.frame_pending = false;
        self.lifecycle = Lifecycle::Destroyed;
    }

    fn detach(&mut self, surface: &mut impl Surface) {
        if self.listening {
            for listener in LISTENERS {
                surface.remove_listener(listener);
            }
            self.listening = false;
        }
    }

    fn request_frame(&mut self, surface: &mut impl Surface) {
        if !self.frame_pending {
            self.frame_pending = true;
            surface.request_animation_frame();
        }
    }

    pub fn pointer_move(&mut self, surface: &mut impl Surface, x: f64, y: f64) {
        if !self.is_enabled() {
            return;
        }
        self.pointer = Some((x, y));
        self.request_frame(surface);
    }

    /// Commit the latest pointer position, ease trails and expire ripples
    pub fn on_frame(&mut self, surface: &mut impl Surface, now_ms: f64) {
        self.frame_pending = false;
        if !self.is_enabled() {
            return;
        }

        let mut needs_more = false;

        if let (Some(proxy), Some((x, y))) = (self.proxy, self.pointer) {
            surface.set_position(proxy, x, y);

            let ease = self.config.trail_ease;
            let (mut target_x, mut target_y) = (x, y);
            for trail in &mut self.trails {
                trail.x += (target_x - trail.x) * ease;
                trail.y += (target_y - trail.y) * ease;
                if (target_x - trail.x).abs() < SETTLE_DISTANCE && (target_y - trail.y).abs() < SETTLE_DISTANCE {
                    trail.x = target_x;
                    trail.y = target_y;
                } else {
                    needs_more = true;
                }
                surface.set_position(trail.node, trail.x, trail.y);
                target_x = trail.x;
                target_y = trail.y;
            }
        }

        self.ripples.retain(|ripple| {
            if ripple.expires_at <= now_ms {
                surface.remove_node(ripple.node);
                false
            } else {
                true
            }
        });
        needs_more |= !self.ripples.is_empty();

        if needs_more {
            self.request_frame(surface);
        }
    }

    pub fn pointer_down(&mut self, surface: &mut impl Surface, now_ms: f64) {
        if !self.is_enabled() || !self.full() {
            return;
        }
        let Some(proxy) = self.proxy else { return };

        self.clicking = true;
        surface.toggle_class(proxy, CLICKING_CLASS, true);

        let ripple = surface.create_node(NodeKind::Ripple);
        if let Some((x, y)) = self.pointer {
            surface.set_position(ripple, x, y);
        }
        self.ripples.push(Ripple {
            node: ripple,
            expires_at: now_ms + self.config.ripple_ms,
        });
        self.request_frame(surface);
    }

    pub fn pointer_up(&mut self, surface: &mut impl Surface) {
        if !self.is_enabled() {
            return;
        }
        self.release_click(surface);
    }

    fn release_click(&mut self, surface: &mut impl Surface) {
        if self.clicking {
            if let Some(proxy) = self.proxy {
                surface.toggle_class(proxy, CLICKING_CLASS, false);
            }
            self.clicking = false;
        }
    }

    pub fn hover_enter(&mut self, surface: &mut impl Surface, target: HoverTarget) {
        self.set_state(surface, target.state());
    }

    pub fn hover_leave(&mut self, surface: &mut impl Surface) {
        self.set_state(surface, CursorState::Default);
    }

    /// Last write wins; the proxy carries at most one state class
    fn set_state(&mut self, surface: &mut impl Surface, state: CursorState) {
        if !self.is_enabled() {
            return;
        }
        let Some(proxy) = self.proxy else { return };
        self.state = state;
        surface.set_state_class(proxy, state.class());
    }
}
