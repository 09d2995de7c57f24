#![forbid(unsafe_code)]

//! CSS for the sprite tree.
//!
//! Everything here is plain strings so it can be checked natively; the DOM
//! stage only applies what these functions return.

use webuddy_core::{Look, Position, Theme};

/// `id` of the sprite element.
pub const SPRITE_ID: &str = "webuddy";
/// Class of the speech bubble element.
pub const BUBBLE_CLASS: &str = "webuddy-bubble";
/// Class of the portal halo element.
pub const PORTAL_CLASS: &str = "webuddy-portal";
/// Class on the sprite while a teleport runs.
pub const TELEPORTING_CLASS: &str = "teleporting";

/// Transition restored after a relocation jump.
pub const SPRITE_TRANSITION: &str =
    "background-color 0.3s, opacity 0.4s ease-out, transform 0.4s ease-out";

/// A `(property, value)` pair for `style.setProperty`.
pub type Declaration = (&'static str, String);

/// Scoped stylesheet for one instance.
#[must_use]
pub fn stylesheet(theme: &Theme) -> String {
    let Theme {
        portal_color: portal,
        bubble_background: background,
        bubble_text: text,
        bubble_border: border,
    } = theme;

    format!(
        r#"#{SPRITE_ID} {{
    position: absolute;
    top: 50%;
    left: 50%;
    width: 50px;
    height: 50px;
    background-size: contain;
    background-repeat: no-repeat;
    background-position: center;
    z-index: 9999;
    will-change: top, left, transform, opacity;
    transition: {SPRITE_TRANSITION};
    transform: translateX(-50%) scale(1);
}}
#{SPRITE_ID}.{TELEPORTING_CLASS} {{
    transition: opacity 0.3s ease-in, transform 0.3s ease-in;
}}
#{SPRITE_ID} .{BUBBLE_CLASS} {{
    position: absolute;
    bottom: 110%;
    left: 50%;
    transform: translate(-50%, -10px) scale(0.95);
    background-color: {background};
    color: {text};
    padding: 12px 18px;
    border-radius: 12px;
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif;
    font-size: 14px;
    line-height: 1.4;
    max-width: 250px;
    text-align: center;
    opacity: 0;
    transition: opacity 0.3s ease, transform 0.3s ease;
    pointer-events: none;
    box-shadow: 0 4px 12px rgba(0,0,0,0.15);
    border: 1px solid {border};
    white-space: normal;
}}
#{SPRITE_ID} .{BUBBLE_CLASS}::after {{
    content: '';
    position: absolute;
    top: 100%;
    left: 50%;
    transform: translateX(-50%);
    border-width: 8px;
    border-style: solid;
    border-color: {background} transparent transparent transparent;
}}
#{SPRITE_ID} .{PORTAL_CLASS} {{
    position: absolute;
    top: 50%;
    left: 50%;
    width: 100px;
    height: 100px;
    border-radius: 50%;
    background-color: {portal};
    transform: translate(-50%, -50%) scale(0);
    opacity: 0;
    transition: transform 0.5s ease-in-out, opacity 0.5s ease-in-out;
    z-index: -1;
}}
#{SPRITE_ID}.{TELEPORTING_CLASS} .{PORTAL_CLASS} {{
    opacity: 1;
    transform: translate(-50%, -50%) scale(1.5);
    animation: webuddy-portal-pulse 2s infinite;
}}
@keyframes webuddy-portal-pulse {{
    0% {{ box-shadow: 0 0 15px 5px {portal}, 0 0 5px 2px #fff inset; }}
    50% {{ box-shadow: 0 0 30px 10px {portal}, 0 0 10px 4px #fff inset; }}
    100% {{ box-shadow: 0 0 15px 5px {portal}, 0 0 5px 2px #fff inset; }}
}}
"#
    )
}

/// Sprite declarations for a look.
#[must_use]
pub fn paint(look: &Look) -> [Declaration; 4] {
    match look {
        Look::Image { url } => [
            ("background-image", format!("url('{}')", escape_url(url))),
            ("background-color", "transparent".into()),
            ("box-shadow", "none".into()),
            ("border-radius", "0".into()),
        ],
        Look::Orb { color, glow } => [
            ("background-image", "none".into()),
            ("background-color", color.clone()),
            ("box-shadow", format!("0 0 15px {glow}, 0 0 25px {glow}")),
            ("border-radius", "50%".into()),
        ],
    }
}

/// Sprite declarations for a position.
#[must_use]
pub fn placement(position: Position) -> [Declaration; 2] {
    [
        ("top", format!("{}px", position.top)),
        ("left", format!("{}%", position.left_percent)),
    ]
}

/// Bubble declarations for shown / hidden.
#[must_use]
pub fn bubble(visible: bool) -> [Declaration; 2] {
    if visible {
        [
            ("opacity", "1".into()),
            ("transform", "translate(-50%, 0) scale(1)".into()),
        ]
    } else {
        [
            ("opacity", "0".into()),
            ("transform", "translate(-50%, -10px) scale(0.95)".into()),
        ]
    }
}

/// Sprite declarations for fading out (`false`) or back in (`true`).
#[must_use]
pub fn presence(visible: bool) -> [Declaration; 2] {
    if visible {
        [
            ("opacity", "1".into()),
            ("transform", "translateX(-50%) scale(1)".into()),
        ]
    } else {
        [
            ("opacity", "0".into()),
            ("transform", "translateX(-50%) scale(0)".into()),
        ]
    }
}

fn escape_url(url: &str) -> String {
    url.replace('\\', "%5C").replace('\'', "%27")
}
