//! Title Normalizer
//!
//! Generation output frequently prefixes the song title with the artist name
//! ("Tangerine Dream - Phaedra"). Catalog searches against the combined string
//! miss entries that a search for the bare title finds, so the prefix is
//! stripped before querying.
//!
//! The only transformation applied is the artist-prefix strip. Parenthetical
//! qualifiers like "(Live)" or "(Remastered)" are left alone: they often
//! distinguish real catalog entries, and the tiered matcher already tolerates
//! them on the catalog side.

/// Separators accepted between an artist prefix and the title proper
const PREFIX_SEPARATORS: &[char] = &['-', '\u{2013}', '\u{2014}', ':'];

/// Strip a leading "<artist> - " style prefix from a title.
///
/// The prefix match is case-insensitive and tolerates whitespace on either
/// side of the separator. Returns the remainder when the strip produces a
/// non-empty title, otherwise the trimmed input unchanged.
pub fn normalize_title(title: &str, artist: &str) -> String {
    let trimmed = title.trim();
    let artist = artist.trim();
    if artist.is_empty() {
        return trimmed.to_string();
    }

    // Case-insensitive prefix walk; byte slicing below stays on a char
    // boundary because matched_end tracks the title's own characters.
    let mut title_chars = trimmed.char_indices();
    let mut matched_end = 0usize;
    for artist_char in artist.chars() {
        match title_chars.next() {
            Some((index, title_char))
                if title_char.to_lowercase().eq(artist_char.to_lowercase()) =>
            {
                matched_end = index + title_char.len_utf8();
            }
            _ => return trimmed.to_string(),
        }
    }

    let after_artist = trimmed[matched_end..].trim_start();
    let mut chars = after_artist.chars();
    match chars.next() {
        Some(separator) if PREFIX_SEPARATORS.contains(&separator) => {
            let remainder = chars.as_str().trim_start();
            if remainder.is_empty() {
                trimmed.to_string()
            } else {
                remainder.to_string()
            }
        }
        _ => trimmed.to_string(),
    }
}
