//! CSS color helpers for annotation styles.

/// Colors handed out to owners in first-seen order.
pub const OWNER_PALETTE: [&str; 8] = [
    "#FF0000", "#FF7F00", "#FFFF00", "#00FF00", "#0000FF", "#4B0082", "#8B00FF", "#000000",
];

pub const UNASSIGNED_COLOR: &str = "rgba(0, 0, 0, 0.5)";

const FALLBACK_RGB: (u8, u8, u8) = (128, 128, 128);

/// Parses `#rgb` / `#rrggbb`.
#[must_use]
pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#').filter(|h| h.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        3 => {
            let short = |i: usize| channel(&hex[i..=i]).map(|v| v * 17);
            Some((short(0)?, short(1)?, short(2)?))
        }
        _ => None,
    }
}

/// Re-expresses `color` with the given alpha. `rgba(..)` keeps its channels,
/// hex is expanded, anything else becomes translucent gray.
#[must_use]
pub fn with_alpha(color: &str, alpha: f32) -> String {
    let trimmed = color.trim();
    if let Some(body) = trimmed
        .strip_prefix("rgba(")
        .or_else(|| trimmed.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let channels: Vec<&str> = body.split(',').map(str::trim).take(3).collect();
        if channels.len() == 3 {
            return format!(
                "rgba({}, {}, {}, {alpha})",
                channels[0], channels[1], channels[2]
            );
        }
    }
    let (r, g, b) = parse_hex(trimmed).unwrap_or(FALLBACK_RGB);
    format!("rgba({r}, {g}, {b}, {alpha})")
}
