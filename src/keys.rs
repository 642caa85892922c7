//! Common keyboard codes
//!
//! Browser-style `keyCode` values so sequences can be written with names
//! instead of magic numbers.

/// Key identifier as delivered by an input source
pub type KeyCode = u32;

pub const BACKSPACE: KeyCode = 8;
pub const ENTER: KeyCode = 13;
pub const CTRL: KeyCode = 17;
pub const ALT: KeyCode = 18;
pub const CAPSLOCK: KeyCode = 20;
pub const ESC: KeyCode = 27;
pub const SPACEBAR: KeyCode = 32;
pub const PAGEUP: KeyCode = 33;
pub const PAGEDOWN: KeyCode = 34;
pub const END: KeyCode = 35;
pub const HOME: KeyCode = 36;
pub const LEFT: KeyCode = 37;
pub const UP: KeyCode = 38;
pub const RIGHT: KeyCode = 39;
pub const DOWN: KeyCode = 40;
pub const INSERT: KeyCode = 45;
pub const DELETE: KeyCode = 46;
pub const A: KeyCode = 65;
pub const B: KeyCode = 66;
pub const C: KeyCode = 67;
pub const D: KeyCode = 68;
pub const E: KeyCode = 69;
pub const F: KeyCode = 70;
pub const G: KeyCode = 71;
pub const H: KeyCode = 72;
pub const I: KeyCode = 73;
pub const J: KeyCode = 74;
pub const K: KeyCode = 75;
pub const L: KeyCode = 76;
pub const M: KeyCode = 77;
pub const N: KeyCode = 78;
pub const O: KeyCode = 79;
pub const P: KeyCode = 80;
pub const Q: KeyCode = 81;
pub const R: KeyCode = 82;
pub const S: KeyCode = 83;
pub const T: KeyCode = 84;
pub const U: KeyCode = 85;
pub const V: KeyCode = 86;
pub const W: KeyCode = 87;
pub const X: KeyCode = 88;
pub const Y: KeyCode = 89;
pub const Z: KeyCode = 90;
pub const F1: KeyCode = 112;
pub const F2: KeyCode = 113;
pub const F3: KeyCode = 114;
pub const F4: KeyCode = 115;
pub const F5: KeyCode = 116;
pub const F6: KeyCode = 117;
pub const F7: KeyCode = 118;
pub const F8: KeyCode = 119;
pub const F9: KeyCode = 120;
pub const F10: KeyCode = 121;
pub const F11: KeyCode = 122;
pub const F12: KeyCode = 123;
pub const NUMLOCK: KeyCode = 144;
pub const SEMICOLON: KeyCode = 186;
pub const EQUAL: KeyCode = 187;
pub const COMMA: KeyCode = 188;
pub const DASH: KeyCode = 189;
pub const PERIOD: KeyCode = 190;
pub const FORWARDSLASH: KeyCode = 191;
pub const OPENBRACKET: KeyCode = 219;
pub const BACKSLASH: KeyCode = 220;
pub const CLOSEBRACKET: KeyCode = 221;
pub const SINGLEQUOTE: KeyCode = 222;

/// Up, Up, Down, Down, Left, Right, Left, Right, B, A
pub const KONAMI: [KeyCode; 10] = [UP, UP, DOWN, DOWN, LEFT, RIGHT, LEFT, RIGHT, B, A];

const NAMED_KEYS: &[(&str, KeyCode)] = &[
    ("BACKSPACE", BACKSPACE),
    ("ENTER", ENTER),
    ("CTRL", CTRL),
    ("ALT", ALT),
    ("CAPSLOCK", CAPSLOCK),
    ("ESC", ESC),
    ("SPACEBAR", SPACEBAR),
    ("PAGEUP", PAGEUP),
    ("PAGEDOWN", PAGEDOWN),
    ("END", END),
    ("HOME", HOME),
    ("LEFT", LEFT),
    ("UP", UP),
    ("RIGHT", RIGHT),
    ("DOWN", DOWN),
    ("INSERT", INSERT),
    ("DELETE", DELETE),
    ("A", A),
    ("B", B),
    ("C", C),
    ("D", D),
    ("E", E),
    ("F", F),
    ("G", G),
    ("H", H),
    ("I", I),
    ("J", J),
    ("K", K),
    ("L", L),
    ("M", M),
    ("N", N),
    ("O", O),
    ("P", P),
    ("Q", Q),
    ("R", R),
    ("S", S),
    ("T", T),
    ("U", U),
    ("V", V),
    ("W", W),
    ("X", X),
    ("Y", Y),
    ("Z", Z),
    ("F1", F1),
    ("F2", F2),
    ("F3", F3),
    ("F4", F4),
    ("F5", F5),
    ("F6", F6),
    ("F7", F7),
    ("F8", F8),
    ("F9", F9),
    ("F10", F10),
    ("F11", F11),
    ("F12", F12),
    ("NUMLOCK", NUMLOCK),
    ("SEMICOLON", SEMICOLON),
    ("EQUAL", EQUAL),
    ("COMMA", COMMA),
    ("DASH", DASH),
    ("PERIOD", PERIOD),
    ("FORWARDSLASH", FORWARDSLASH),
    ("OPENBRACKET", OPENBRACKET),
    ("BACKSLASH", BACKSLASH),
    ("CLOSEBRACKET", CLOSEBRACKET),
    ("SINGLEQUOTE", SINGLEQUOTE),
];

/// Looks up a key code by its name, ignoring case (`"up"`, `"Up"`, `"UP"`)
pub fn code_for_name(name: &str) -> Option<KeyCode> {
    let name = name.trim();
    NAMED_KEYS
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// Reverse lookup, returns the canonical upper-case name
pub fn name_for_code(code: KeyCode) -> Option<&'static str> {
    NAMED_KEYS
        .iter()
        .find(|(_, candidate)| *candidate == code)
        .map(|(name, _)| *name)
}

/// Renders a sequence for log output, unknown codes are printed as numbers
pub fn describe(sequence: &[KeyCode]) -> String {
    sequence
        .iter()
        .map(|code| match name_for_code(*code) {
            Some(name) => name.to_string(),
            None => code.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
