//! Input routing - pointer grabs, crossings, touch emulation and keys
//!
//! The host reports raw pointer positions in root coordinates; the router
//! hit-tests them against the surface registry, applies the active grab and
//! synthesizes the enter/leave pairs a real windowing system would send.

use crate::event::{Event, PointerInfo};
use crate::keysym;
use crate::protocol::{masks, CrossingMode, ScrollDirection, TouchPhase};
use crate::surface::SurfaceRegistry;

/// Active pointer grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grab {
    pub surface: u16,
    pub owner_events: bool,
    /// Taken on button press, dropped on the matching release
    pub implicit: bool,
}

#[derive(Debug)]
struct PressedKey {
    code: String,
    key_code: u32,
    /// None until composition resolved it
    keysym: Option<u32>,
}

/// Keys held down, correlating delayed keysym resolution with releases
#[derive(Debug, Default)]
struct Keyboard {
    pressed: Vec<PressedKey>,
}

impl Keyboard {
    /// Emit a press for the newest unresolved key, using the raw fallback
    fn flush_pending(&mut self, state: u32, out: &mut Vec<Event>) {
        if let Some(key) = self.pressed.iter_mut().rev().find(|k| k.keysym.is_none()) {
            let sym = keysym::fallback(&key.code, key.key_code);
            key.keysym = Some(sym);
            out.push(Event::KeyPress { keysym: sym, state });
        }
    }

    fn key_down(&mut self, code: &str, key_code: u32, state: u32, out: &mut Vec<Event>) {
        self.flush_pending(state, out);
        // auto-repeat: drop the stale entry, the new press replaces it
        self.pressed.retain(|k| k.code != code);

        let resolved = keysym::function_key(code);
        if let Some(sym) = resolved {
            out.push(Event::KeyPress { keysym: sym, state });
        }
        self.pressed.push(PressedKey {
            code: code.to_string(),
            key_code,
            keysym: resolved,
        });
    }

    fn key_input(&mut self, text: &str, state: u32, out: &mut Vec<Event>) {
        let Some(c) = text.chars().next() else {
            return;
        };
        let sym = keysym::from_char(c);
        match self.pressed.iter_mut().rev().find(|k| k.keysym.is_none()) {
            Some(key) => {
                key.keysym = Some(sym);
                out.push(Event::KeyPress { keysym: sym, state });
            }
            // composed without a physical key (IME commit)
            None => {
                out.push(Event::KeyPress { keysym: sym, state });
                out.push(Event::KeyRelease { keysym: sym, state });
            }
        }
    }

    fn key_up(&mut self, code: &str, key_code: u32, state: u32, out: &mut Vec<Event>) {
        let Some(index) = self.pressed.iter().position(|k| k.code == code) else {
            let sym = keysym::function_key(code).unwrap_or_else(|| keysym::fallback(code, key_code));
            out.push(Event::KeyRelease { keysym: sym, state });
            return;
        };
        let key = self.pressed.remove(index);
        let sym = match key.keysym {
            Some(sym) => sym,
            None => {
                let sym = keysym::fallback(&key.code, key.key_code);
                out.push(Event::KeyPress { keysym: sym, state });
                sym
            }
        };
        out.push(Event::KeyRelease { keysym: sym, state });
    }
}

/// Pointer, touch and keyboard routing state
#[derive(Debug, Default)]
pub struct InputRouter {
    root_x: i32,
    root_y: i32,
    /// Modifier and button mask
    state: u32,
    grab: Option<Grab>,
    /// Surface physically under the pointer
    real: u16,
    /// Surface pointer events are routed to
    effective: u16,
    /// Touch sequence emulating the pointer
    first_touch: Option<u32>,
    keyboard: Keyboard,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grab(&self) -> Option<Grab> {
        self.grab
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn real_target(&self) -> u16 {
        self.real
    }

    pub fn effective_target(&self) -> u16 {
        self.effective
    }

    /// Where an event physically over `id` (0 = no surface) is routed
    pub fn route(&self, id: u16) -> u16 {
        match self.grab {
            Some(grab) if !grab.owner_events || id == 0 => grab.surface,
            _ => id,
        }
    }

    fn set_modifiers(&mut self, modifiers: u32) {
        self.state = (self.state & !masks::HOST_MODIFIERS) | (modifiers & masks::HOST_MODIFIERS);
    }

    fn info(&self, surfaces: &SurfaceRegistry, real: u16, effective: u16) -> PointerInfo {
        let (win_x, win_y) = surfaces
            .to_surface(effective, self.root_x, self.root_y)
            .unwrap_or((self.root_x, self.root_y));
        PointerInfo {
            real,
            effective,
            root_x: self.root_x,
            root_y: self.root_y,
            win_x,
            win_y,
            state: self.state,
        }
    }

    /// Record the new physical target, crossing if the routed target changed
    fn update_target(&mut self, surfaces: &SurfaceRegistry, real: u16, out: &mut Vec<Event>) {
        let effective = self.route(real);
        if effective != self.effective {
            if self.effective != 0 {
                let info = self.info(surfaces, self.real, self.effective);
                out.push(Event::Leave(info, CrossingMode::Normal));
            }
            if effective != 0 {
                out.push(Event::Enter(
                    self.info(surfaces, real, effective),
                    CrossingMode::Normal,
                ));
            }
        }
        self.real = real;
        self.effective = effective;
    }

    fn pointer_at(&mut self, surfaces: &SurfaceRegistry, x: i32, y: i32, modifiers: u32, out: &mut Vec<Event>) {
        self.root_x = x;
        self.root_y = y;
        self.set_modifiers(modifiers);
        let real = surfaces.surface_at(x, y).unwrap_or(0);
        self.update_target(surfaces, real, out);
    }

    fn current(&self, surfaces: &SurfaceRegistry) -> PointerInfo {
        self.info(surfaces, self.real, self.effective)
    }

    pub fn pointer_motion(
        &mut self,
        surfaces: &SurfaceRegistry,
        x: i32,
        y: i32,
        modifiers: u32,
        out: &mut Vec<Event>,
    ) {
        self.pointer_at(surfaces, x, y, modifiers, out);
        out.push(Event::Motion(self.current(surfaces)));
    }

    pub fn button_press(
        &mut self,
        surfaces: &SurfaceRegistry,
        x: i32,
        y: i32,
        button: u32,
        modifiers: u32,
        out: &mut Vec<Event>,
    ) {
        self.pointer_at(surfaces, x, y, modifiers, out);
        if self.grab.is_none() && self.effective != 0 {
            self.do_grab(surfaces, self.effective, false, true, out);
        }
        out.push(Event::ButtonPress(self.current(surfaces), button));
        self.state |= masks::button(button);
    }

    pub fn button_release(
        &mut self,
        surfaces: &SurfaceRegistry,
        x: i32,
        y: i32,
        button: u32,
        modifiers: u32,
        out: &mut Vec<Event>,
    ) {
        self.pointer_at(surfaces, x, y, modifiers, out);
        out.push(Event::ButtonRelease(self.current(surfaces), button));
        self.state &= !masks::button(button);
        if self.grab.is_some_and(|g| g.implicit) {
            self.do_ungrab(surfaces, out);
        }
    }

    pub fn scroll(
        &mut self,
        surfaces: &SurfaceRegistry,
        x: i32,
        y: i32,
        direction: ScrollDirection,
        modifiers: u32,
        out: &mut Vec<Event>,
    ) {
        self.pointer_at(surfaces, x, y, modifiers, out);
        out.push(Event::Scroll(self.current(surfaces), direction));
    }

    pub fn touch(
        &mut self,
        surfaces: &SurfaceRegistry,
        phase: TouchPhase,
        sequence: u32,
        x: i32,
        y: i32,
        modifiers: u32,
        out: &mut Vec<Event>,
    ) {
        self.set_modifiers(modifiers);
        let real = surfaces.surface_at(x, y).unwrap_or(0);
        let surface = self.route(real);

        if phase == TouchPhase::Begin && self.first_touch.is_none() {
            self.first_touch = Some(sequence);
        }
        let emulated = self.first_touch == Some(sequence);
        if emulated {
            self.root_x = x;
            self.root_y = y;
            self.update_target(surfaces, real, out);
        }

        let (win_x, win_y) = surfaces.to_surface(surface, x, y).unwrap_or((x, y));
        out.push(Event::Touch {
            phase,
            surface,
            sequence,
            emulated,
            root_x: x,
            root_y: y,
            win_x,
            win_y,
            state: self.state,
        });

        if emulated && matches!(phase, TouchPhase::End | TouchPhase::Cancel) {
            self.first_touch = None;
        }
    }

    pub fn key_down(&mut self, code: &str, key_code: u32, modifiers: u32, out: &mut Vec<Event>) {
        self.set_modifiers(modifiers);
        self.keyboard.key_down(code, key_code, self.state, out);
    }

    /// Text produced by composition for the latest key press
    pub fn key_input(&mut self, text: &str, out: &mut Vec<Event>) {
        self.keyboard.key_input(text, self.state, out);
    }

    pub fn key_up(&mut self, code: &str, key_code: u32, modifiers: u32, out: &mut Vec<Event>) {
        self.set_modifiers(modifiers);
        self.keyboard.key_up(code, key_code, self.state, out);
    }

    /// Server-requested grab
    pub fn grab_pointer(
        &mut self,
        surfaces: &SurfaceRegistry,
        surface: u16,
        owner_events: bool,
        out: &mut Vec<Event>,
    ) {
        self.do_grab(surfaces, surface, owner_events, false, out);
    }

    pub fn ungrab_pointer(&mut self, surfaces: &SurfaceRegistry, out: &mut Vec<Event>) {
        if self.grab.is_some() {
            self.do_ungrab(surfaces, out);
        }
    }

    /// A hidden surface cannot keep the grab
    pub fn surface_hidden(&mut self, surfaces: &SurfaceRegistry, id: u16, out: &mut Vec<Event>) {
        if self.grab.is_some_and(|g| g.surface == id) {
            self.do_ungrab(surfaces, out);
        }
    }

    /// Call before the surface leaves the registry
    pub fn surface_destroyed(&mut self, surfaces: &SurfaceRegistry, id: u16, out: &mut Vec<Event>) {
        self.surface_hidden(surfaces, id, out);
        if self.real == id {
            self.real = 0;
        }
        if self.effective == id {
            self.effective = 0;
        }
        if self.real != 0 && self.effective == 0 {
            self.effective = self.route(self.real);
        }
    }

    fn do_grab(
        &mut self,
        surfaces: &SurfaceRegistry,
        surface: u16,
        owner_events: bool,
        implicit: bool,
        out: &mut Vec<Event>,
    ) {
        if self.effective != surface {
            if self.effective != 0 {
                let info = self.info(surfaces, self.real, self.effective);
                out.push(Event::Leave(info, CrossingMode::Grab));
            }
            out.push(Event::Enter(
                self.info(surfaces, self.real, surface),
                CrossingMode::Grab,
            ));
            self.effective = surface;
        }
        self.grab = Some(Grab {
            surface,
            owner_events,
            implicit,
        });
    }

    fn do_ungrab(&mut self, surfaces: &SurfaceRegistry, out: &mut Vec<Event>) {
        if self.real != self.effective {
            if self.effective != 0 {
                let info = self.info(surfaces, self.real, self.effective);
                out.push(Event::Leave(info, CrossingMode::Ungrab));
            }
            if self.real != 0 {
                out.push(Event::Enter(
                    self.info(surfaces, self.real, self.real),
                    CrossingMode::Ungrab,
                ));
            }
            self.effective = self.real;
        }
        self.grab = None;
    }
}
