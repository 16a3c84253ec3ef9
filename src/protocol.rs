//! Broadway wire constants

/// Top-level command opcodes (server → client)
pub mod opcodes {
    pub const GRAB_POINTER: u8 = 0;
    pub const UNGRAB_POINTER: u8 = 1;
    pub const NEW_SURFACE: u8 = 2;
    pub const SHOW_SURFACE: u8 = 3;
    pub const HIDE_SURFACE: u8 = 4;
    pub const RAISE_SURFACE: u8 = 5;
    pub const LOWER_SURFACE: u8 = 6;
    pub const DESTROY_SURFACE: u8 = 7;
    pub const MOVE_RESIZE: u8 = 8;
    pub const SET_TRANSIENT_FOR: u8 = 9;
    pub const DISCONNECTED: u8 = 10;
    // 11 was the shm buffer update of the pre-node protocol
    pub const SET_SHOW_KEYBOARD: u8 = 12;
    pub const UPLOAD_TEXTURE: u8 = 13;
    pub const RELEASE_TEXTURE: u8 = 14;
    pub const SET_NODES: u8 = 15;
    pub const ROUNDTRIP: u8 = 16;
}

/// Operations inside a set-nodes sub-stream
pub mod node_ops {
    pub const INSERT_NODE: u32 = 0;
    pub const REMOVE_NODE: u32 = 1;
    pub const MOVE_AFTER_CHILD: u32 = 2;
    pub const PATCH_TEXTURE: u32 = 3;
    pub const PATCH_TRANSFORM: u32 = 4;
}

/// Move-resize flag bits
pub const MOVE_RESIZE_POSITION: u8 = 1 << 0;
pub const MOVE_RESIZE_SIZE: u8 = 1 << 1;

/// Transform encodings inside a node stream
pub const TRANSFORM_TRANSLATE: u32 = 0;
pub const TRANSFORM_MATRIX: u32 = 1;

/// Event codes (client → server)
pub mod events {
    pub const ENTER: u8 = b'e';
    pub const LEAVE: u8 = b'l';
    pub const POINTER_MOVE: u8 = b'm';
    pub const BUTTON_PRESS: u8 = b'b';
    pub const BUTTON_RELEASE: u8 = b'B';
    pub const TOUCH: u8 = b't';
    pub const SCROLL: u8 = b's';
    pub const KEY_PRESS: u8 = b'k';
    pub const KEY_RELEASE: u8 = b'K';
    pub const GRAB_NOTIFY: u8 = b'g';
    pub const UNGRAB_NOTIFY: u8 = b'u';
    pub const CONFIGURE_NOTIFY: u8 = b'w';
    pub const DELETE_NOTIFY: u8 = b'W';
    pub const SCREEN_SIZE_CHANGED: u8 = b'd';
    pub const ROUNDTRIP_NOTIFY: u8 = b'F';
}

/// Modifier and button state bits
pub mod masks {
    pub const SHIFT: u32 = 1 << 0;
    pub const LOCK: u32 = 1 << 1;
    pub const CONTROL: u32 = 1 << 2;
    pub const ALT: u32 = 1 << 3;
    pub const BUTTON1: u32 = 1 << 8;
    pub const BUTTON2: u32 = 1 << 9;
    pub const BUTTON3: u32 = 1 << 10;
    pub const BUTTON4: u32 = 1 << 11;
    pub const BUTTON5: u32 = 1 << 12;

    /// Modifiers the host reports with every event
    pub const HOST_MODIFIERS: u32 = SHIFT | CONTROL | ALT;

    pub fn button(button: u32) -> u32 {
        match button {
            1 => BUTTON1,
            2 => BUTTON2,
            3 => BUTTON3,
            4 => BUTTON4,
            5 => BUTTON5,
            _ => 0,
        }
    }
}

/// Why a crossing event was generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingMode {
    Normal = 0,
    Grab = 1,
    Ungrab = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up = 0,
    Down = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Begin = 0,
    Update = 1,
    End = 2,
    Cancel = 3,
}
