use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Render bytes as an offset/hex/ASCII dump for trace logging.
pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 16);
    for (line, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:04x}:", line * BYTES_PER_LINE);
        for i in 0..BYTES_PER_LINE {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, " {b:02x}");
                }
                None => out.push_str("   "),
            }
        }
        out.push_str("  ");
        out.extend(chunk.iter().map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                char::from(*b)
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_partial_line() {
        let out = hexdump(b"BJNP\x01");
        assert_eq!(
            out,
            "0000: 42 4a 4e 50 01                                   BJNP.\n"
        );
    }

    #[test]
    fn dumps_multiple_lines() {
        let out = hexdump(&[0u8; 17]);
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().nth(1).unwrap().starts_with("0010: 00"));
    }

    #[test]
    fn empty_input() {
        assert!(hexdump(&[]).is_empty());
    }
}
