//! Outbound event records

use crate::protocol::{events, CrossingMode, ScrollDirection, TouchPhase};
use crate::wire::EventWriter;

/// Pointer position and routing shared by all pointer events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerInfo {
    /// Surface physically under the pointer
    pub real: u16,
    /// Surface the event is routed to
    pub effective: u16,
    pub root_x: i32,
    pub root_y: i32,
    pub win_x: i32,
    pub win_y: i32,
    pub state: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Enter(PointerInfo, CrossingMode),
    Leave(PointerInfo, CrossingMode),
    Motion(PointerInfo),
    ButtonPress(PointerInfo, u32),
    ButtonRelease(PointerInfo, u32),
    Scroll(PointerInfo, ScrollDirection),
    Touch {
        phase: TouchPhase,
        surface: u16,
        sequence: u32,
        emulated: bool,
        root_x: i32,
        root_y: i32,
        win_x: i32,
        win_y: i32,
        state: u32,
    },
    KeyPress { keysym: u32, state: u32 },
    KeyRelease { keysym: u32, state: u32 },
    GrabNotify { status: u32 },
    UngrabNotify { status: u32 },
    Configure {
        surface: u16,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Delete { surface: u16 },
    ScreenSize { width: u32, height: u32 },
    Roundtrip { surface: u16, tag: u32 },
}

impl Event {
    pub fn code(&self) -> u8 {
        match self {
            Event::Enter(..) => events::ENTER,
            Event::Leave(..) => events::LEAVE,
            Event::Motion(_) => events::POINTER_MOVE,
            Event::ButtonPress(..) => events::BUTTON_PRESS,
            Event::ButtonRelease(..) => events::BUTTON_RELEASE,
            Event::Scroll(..) => events::SCROLL,
            Event::Touch { .. } => events::TOUCH,
            Event::KeyPress { .. } => events::KEY_PRESS,
            Event::KeyRelease { .. } => events::KEY_RELEASE,
            Event::GrabNotify { .. } => events::GRAB_NOTIFY,
            Event::UngrabNotify { .. } => events::UNGRAB_NOTIFY,
            Event::Configure { .. } => events::CONFIGURE_NOTIFY,
            Event::Delete { .. } => events::DELETE_NOTIFY,
            Event::ScreenSize { .. } => events::SCREEN_SIZE_CHANGED,
            Event::Roundtrip { .. } => events::ROUNDTRIP_NOTIFY,
        }
    }

    /// Surface a pointer event is routed to, if it is one
    pub fn target(&self) -> Option<u16> {
        match self {
            Event::Enter(p, _)
            | Event::Leave(p, _)
            | Event::Motion(p)
            | Event::ButtonPress(p, _)
            | Event::ButtonRelease(p, _)
            | Event::Scroll(p, _) => Some(p.effective),
            Event::Touch { surface, .. } => Some(*surface),
            _ => None,
        }
    }

    pub fn encode(&self, serial: u32, time: u32) -> Vec<u8> {
        let mut w = EventWriter::new(self.code(), serial, time);
        match self {
            Event::Enter(p, mode) | Event::Leave(p, mode) => {
                pointer(&mut w, p).put_u32(*mode as u32);
            }
            Event::Motion(p) => {
                pointer(&mut w, p);
            }
            Event::ButtonPress(p, button) | Event::ButtonRelease(p, button) => {
                pointer(&mut w, p).put_u32(*button);
            }
            Event::Scroll(p, dir) => {
                pointer(&mut w, p).put_u32(*dir as u32);
            }
            Event::Touch {
                phase,
                surface,
                sequence,
                emulated,
                root_x,
                root_y,
                win_x,
                win_y,
                state,
            } => {
                w.put_u32(*phase as u32)
                    .put_u32(*surface as u32)
                    .put_u32(*sequence)
                    .put_u32(*emulated as u32)
                    .put_i32(*root_x)
                    .put_i32(*root_y)
                    .put_i32(*win_x)
                    .put_i32(*win_y)
                    .put_u32(*state);
            }
            Event::KeyPress { keysym, state } | Event::KeyRelease { keysym, state } => {
                w.put_u32(*keysym).put_u32(*state);
            }
            Event::GrabNotify { status } | Event::UngrabNotify { status } => {
                w.put_u32(*status);
            }
            Event::Configure {
                surface,
                x,
                y,
                width,
                height,
            } => {
                w.put_u32(*surface as u32)
                    .put_i32(*x)
                    .put_i32(*y)
                    .put_u32(*width)
                    .put_u32(*height);
            }
            Event::Delete { surface } => {
                w.put_u32(*surface as u32);
            }
            Event::ScreenSize { width, height } => {
                w.put_u32(*width).put_u32(*height);
            }
            Event::Roundtrip { surface, tag } => {
                w.put_u32(*surface as u32).put_u32(*tag);
            }
        }
        w.finish()
    }
}

fn pointer<'w>(w: &'w mut EventWriter, p: &PointerInfo) -> &'w mut EventWriter {
    w.put_u32(p.real as u32)
        .put_u32(p.effective as u32)
        .put_i32(p.root_x)
        .put_i32(p.root_y)
        .put_i32(p.win_x)
        .put_i32(p.win_y)
        .put_u32(p.state)
}
