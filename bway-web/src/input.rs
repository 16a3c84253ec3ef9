//! DOM event fields to Broadway input values

use bway::protocol::{masks, ScrollDirection};
use web_sys::{KeyboardEvent, MouseEvent, WheelEvent};

pub fn modifiers(shift: bool, ctrl: bool, alt: bool) -> u32 {
    let mut state = 0;
    if shift {
        state |= masks::SHIFT;
    }
    if ctrl {
        state |= masks::CONTROL;
    }
    if alt {
        state |= masks::ALT;
    }
    state
}

pub fn mouse_modifiers(e: &MouseEvent) -> u32 {
    modifiers(e.shift_key(), e.ctrl_key(), e.alt_key())
}

pub fn key_modifiers(e: &KeyboardEvent) -> u32 {
    modifiers(e.shift_key(), e.ctrl_key(), e.alt_key())
}

/// DOM buttons count from 0 (left, middle, right); X buttons from 1
pub fn button(dom_button: i16) -> u32 {
    match dom_button {
        0 => 1,
        1 => 2,
        2 => 3,
        other => other.max(0) as u32 + 1,
    }
}

pub fn scroll_direction(e: &WheelEvent) -> Option<ScrollDirection> {
    let dy = e.delta_y();
    if dy < 0.0 {
        Some(ScrollDirection::Up)
    } else if dy > 0.0 {
        Some(ScrollDirection::Down)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers() {
        assert_eq!(modifiers(false, false, false), 0);
        assert_eq!(modifiers(true, false, true), masks::SHIFT | masks::ALT);
        assert_eq!(modifiers(false, true, false), masks::CONTROL);
    }

    #[test]
    fn test_button_numbering() {
        assert_eq!(button(0), 1);
        assert_eq!(button(1), 2);
        assert_eq!(button(2), 3);
        assert_eq!(button(3), 4);
    }
}
