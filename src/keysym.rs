//! Host key codes and characters to X keysyms

/// Keysym for keys that never compose a character (editing, navigation,
/// function and modifier keys). `code` is a DOM `KeyboardEvent.code`.
pub fn function_key(code: &str) -> Option<u32> {
    let sym = match code {
        "Backspace" => 0xff08,
        "Tab" => 0xff09,
        "Enter" => 0xff0d,
        "Pause" => 0xff13,
        "ScrollLock" => 0xff14,
        "Escape" => 0xff1b,
        "Home" => 0xff50,
        "ArrowLeft" => 0xff51,
        "ArrowUp" => 0xff52,
        "ArrowRight" => 0xff53,
        "ArrowDown" => 0xff54,
        "PageUp" => 0xff55,
        "PageDown" => 0xff56,
        "End" => 0xff57,
        "PrintScreen" => 0xff61,
        "Insert" => 0xff63,
        "ContextMenu" => 0xff67,
        "NumLock" => 0xff7f,
        "NumpadEnter" => 0xff8d,
        "F1" => 0xffbe,
        "F2" => 0xffbf,
        "F3" => 0xffc0,
        "F4" => 0xffc1,
        "F5" => 0xffc2,
        "F6" => 0xffc3,
        "F7" => 0xffc4,
        "F8" => 0xffc5,
        "F9" => 0xffc6,
        "F10" => 0xffc7,
        "F11" => 0xffc8,
        "F12" => 0xffc9,
        "ShiftLeft" => 0xffe1,
        "ShiftRight" => 0xffe2,
        "ControlLeft" => 0xffe3,
        "ControlRight" => 0xffe4,
        "CapsLock" => 0xffe5,
        "MetaLeft" => 0xffe7,
        "MetaRight" => 0xffe8,
        "AltLeft" => 0xffe9,
        "AltRight" => 0xffea,
        "Delete" => 0xffff,
        _ => return None,
    };
    Some(sym)
}

/// Keysym for a composed character
pub fn from_char(c: char) -> u32 {
    let cp = c as u32;
    match cp {
        // Latin-1 maps directly
        0x20..=0x7e | 0xa0..=0xff => cp,
        _ => 0x0100_0000 | cp,
    }
}

/// Best guess when composition produced nothing
pub fn fallback(code: &str, key_code: u32) -> u32 {
    if let Some(letter) = code.strip_prefix("Key") {
        if let Some(c) = single_char(letter) {
            return c.to_ascii_lowercase() as u32;
        }
    }
    if let Some(digit) = code
        .strip_prefix("Digit")
        .or_else(|| code.strip_prefix("Numpad"))
    {
        if let Some(c) = single_char(digit).filter(char::is_ascii_digit) {
            return c as u32;
        }
    }
    match code {
        "Space" => 0x20,
        "Minus" => '-' as u32,
        "Equal" => '=' as u32,
        "BracketLeft" => '[' as u32,
        "BracketRight" => ']' as u32,
        "Backslash" => '\\' as u32,
        "Semicolon" => ';' as u32,
        "Quote" => '\'' as u32,
        "Backquote" => '`' as u32,
        "Comma" => ',' as u32,
        "Period" => '.' as u32,
        "Slash" => '/' as u32,
        _ => key_code,
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
