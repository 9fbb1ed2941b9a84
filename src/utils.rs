/// Renders a modifier the way a character sheet shows it: `+2`, `+0`, `-1`.
pub fn format_modifier(value: i32) -> String {
    if value >= 0 {
        format!("+{}", value)
    } else {
        value.to_string()
    }
}
