// Display-safe rendering of session credentials
//
// Numan Thabit 2025 Nov

/// Mask a session key for display.
///
/// Keys of up to 20 characters keep their first 5 and last 3 characters,
/// longer keys keep the first 10 and last 5.
pub fn mask_session_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let (head, tail) = if chars.len() <= 20 { (5, 3) } else { (10, 5) };
    if chars.len() <= head + tail {
        // head + tail would cover the whole key
        return "*".repeat(chars.len().min(8));
    }
    let prefix: String = chars[..head].iter().collect();
    let suffix: String = chars[chars.len() - tail..].iter().collect();
    format!("{prefix}...{suffix}")
}
