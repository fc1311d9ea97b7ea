//! Escape-sequence handling for `"..."`/`'...'` string literals:
//! `\\ \" \' \n \r \t \b \f \/ \uXXXX`.

/// Decodes backslash escapes in `s`. Returns `None` on a malformed escape
/// (dangling backslash, bad `\uXXXX`, lone surrogate).
pub fn unescape(s: &str) -> Option<String> {
	let mut out = String::with_capacity(s.len());
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next()? {
			'"' => out.push('"'),
			'\'' => out.push('\''),
			'\\' => out.push('\\'),
			'/' => out.push('/'),
			'n' => out.push('\n'),
			'r' => out.push('\r'),
			't' => out.push('\t'),
			'b' => out.push('\u{8}'),
			'f' => out.push('\u{c}'),
			'u' => {
				let hex: String = (0..4).map(|_| chars.next()).collect::<Option<String>>()?;
				let cp = u32::from_str_radix(&hex, 16).ok()?;
				match cp {
					0xD800..=0xDBFF => {
						// High surrogate: must be followed by a low surrogate escape.
						let tail: String = chars.by_ref().take(2).collect();
						if tail != "\\u" {
							return None;
						}
						let hex2: String =
							(0..4).map(|_| chars.next()).collect::<Option<String>>()?;
						let low = u32::from_str_radix(&hex2, 16).ok()?;
						if !(0xDC00..=0xDFFF).contains(&low) {
							return None;
						}
						let combined = 0x10000 + (cp - 0xD800) * 0x400 + (low - 0xDC00);
						out.push(char::from_u32(combined)?);
					}
					0xDC00..=0xDFFF => return None,
					_ => out.push(char::from_u32(cp)?),
				}
			}
			_ => return None,
		}
	}
	Some(out)
}

#[cfg(test)]
mod tests {
	use super::unescape;

	#[test]
	fn plain_escapes() {
		assert_eq!(unescape(r#"a\nb\tc"#).unwrap(), "a\nb\tc");
		assert_eq!(unescape(r#"\"q\""#).unwrap(), "\"q\"");
	}

	#[test]
	fn unicode_escape() {
		assert_eq!(unescape("\\u0041").unwrap(), "A");
	}

	#[test]
	fn surrogate_pair() {
		// U+1F600 GRINNING FACE, encoded as a UTF-16 surrogate pair.
		assert_eq!(unescape("\\uD83D\\uDE00").unwrap(), "\u{1F600}");
	}

	#[test]
	fn rejects_dangling_backslash() {
		assert!(unescape("a\\").is_none());
	}
}
