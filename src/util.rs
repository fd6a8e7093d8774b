//! Small helpers shared across the crate.

use rand::{thread_rng, Rng};

// Leaves out glyphs that read alike (l/I/1, o/O/0) so tokens survive
// being read back over voice or logs.
const TOKEN_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random token of `len` characters, never repeating the same
/// character twice in a row. Used for stanza ids.
pub fn random_token(len: usize) -> String {
    let mut rng = thread_rng();
    let mut out = String::with_capacity(len);
    let mut last = 0u8;
    while out.len() < len {
        let c = TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())];
        if c != last {
            out.push(c as char);
            last = c;
        }
    }
    out
}

/// Escape `<`, `>`, `"`, `'` and `&` for use in XML text and attributes.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    out
}
