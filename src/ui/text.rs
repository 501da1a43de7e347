const VOWELS: [char; 10] = ['a', 'e', 'i', 'o', 'u', 'A', 'E', 'I', 'O', 'U'];

/// Drops every ASCII vowel from `text`.
pub fn strip_vowels(text: &str) -> String {
    text.chars().filter(|c| !VOWELS.contains(c)).collect()
}

pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

/// Brightness (0..=2) of each character of a shimmering label at `tick`.
///
/// A bright band sweeps across the label and back again.
pub fn shimmer_levels(len: usize, tick: u64) -> Vec<u8> {
    if len == 0 {
        return Vec::new();
    }

    let len_ticks = len as u64;
    let pos = tick % (len_ticks * 2);
    let center = (if pos < len_ticks {
        pos
    } else {
        len_ticks * 2 - pos - 1
    }) as usize;

    (0..len)
        .map(|i| match i.abs_diff(center) {
            0 => 2,
            1 => 1,
            _ => 0,
        })
        .collect()
}
