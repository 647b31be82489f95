//! JointSPACE v6 remote key vocabulary

/// Key names accepted by `POST /6/input/key`
pub const KEYS: &[&str] = &[
    "Standby",
    "Back",
    "Find",
    "RedColour",
    "GreenColour",
    "YellowColour",
    "BlueColour",
    "Home",
    "VolumeUp",
    "VolumeDown",
    "Mute",
    "Options",
    "Dot",
    "Digit0",
    "Digit1",
    "Digit2",
    "Digit3",
    "Digit4",
    "Digit5",
    "Digit6",
    "Digit7",
    "Digit8",
    "Digit9",
    "Info",
    "CursorUp",
    "CursorDown",
    "CursorLeft",
    "CursorRight",
    "Confirm",
    "Next",
    "Previous",
    "Adjust",
    "WatchTV",
    "Viewmode",
    "Teletext",
    "Subtitle",
    "ChannelStepUp",
    "ChannelStepDown",
    "Source",
    "AmbilightOnOff",
    "PlayPause",
    "Pause",
    "FastForward",
    "Stop",
    "Rewind",
    "Record",
    "Online",
    "Play",
];

/// Canonical spelling of a key name, matched case-insensitively
pub fn canonical(key: &str) -> Option<&'static str> {
    let key = key.trim();
    KEYS.iter().copied().find(|k| k.eq_ignore_ascii_case(key))
}
