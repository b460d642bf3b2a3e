//! util - небольшие хелперы для CLI (hex dump, разбор чисел, diff).

/// Hex dump, 16 bytes per row, each row prefixed with its offset
/// (`00000010: ff ff ...`).
pub fn hex_dump_rows(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + bytes.len() / 16 * 11);
    for (row, chunk) in bytes.chunks(16).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{:08x}:", row * 16));
        for b in chunk {
            out.push_str(&format!(" {:02x}", b));
        }
    }
    out
}

/// Префиксы системы счисления для аргументов CLI.
const RADIX_PREFIXES: [(&str, u32); 3] = [("0x", 16), ("0o", 8), ("0b", 2)];

/// Parse a byte given as decimal or with a `0x` / `0o` / `0b` prefix
/// (prefix case-insensitive). Used as a clap `value_parser`.
pub fn parse_u8_byte(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let (digits, radix) = RADIX_PREFIXES
        .iter()
        .find(|(p, _)| lower.starts_with(p))
        .map(|&(p, r)| (&s[p.len()..], r))
        .unwrap_or((s, 10));
    u8::from_str_radix(digits, radix).map_err(|e| format!("bad byte {:?}: {}", s, e))
}

/// Offsets where `a` and `b` differ (over the shorter length).
pub fn diff_offsets(a: &[u8], b: &[u8]) -> Vec<usize> {
    a.iter()
        .zip(b)
        .enumerate()
        .filter_map(|(i, (x, y))| if x != y { Some(i) } else { None })
        .collect()
}
