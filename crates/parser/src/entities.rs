//! Character reference decoding
//!
//! Expands named entities like &amp;, &lt;, &gt; and numeric references in
//! literal text. Decoding is total: anything unrecognized or malformed is
//! passed through verbatim.

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Map of entity names to their character values
static ENTITIES: LazyLock<FxHashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = FxHashMap::default();

    // === Essential entities ===
    m.insert("amp", "&");
    m.insert("lt", "<");
    m.insert("gt", ">");
    m.insert("quot", "\"");
    m.insert("apos", "'");

    // === ISO 8859-1 (Latin-1) symbols ===
    m.insert("nbsp", "\u{00A0}");
    m.insert("iexcl", "\u{00A1}");
    m.insert("cent", "\u{00A2}");
    m.insert("pound", "\u{00A3}");
    m.insert("curren", "\u{00A4}");
    m.insert("yen", "\u{00A5}");
    m.insert("brvbar", "\u{00A6}");
    m.insert("sect", "\u{00A7}");
    m.insert("uml", "\u{00A8}");
    m.insert("copy", "\u{00A9}");
    m.insert("ordf", "\u{00AA}");
    m.insert("laquo", "\u{00AB}");
    m.insert("not", "\u{00AC}");
    m.insert("shy", "\u{00AD}");
    m.insert("reg", "\u{00AE}");
    m.insert("macr", "\u{00AF}");
    m.insert("deg", "\u{00B0}");
    m.insert("plusmn", "\u{00B1}");
    m.insert("sup2", "\u{00B2}");
    m.insert("sup3", "\u{00B3}");
    m.insert("acute", "\u{00B4}");
    m.insert("micro", "\u{00B5}");
    m.insert("para", "\u{00B6}");
    m.insert("middot", "\u{00B7}");
    m.insert("cedil", "\u{00B8}");
    m.insert("sup1", "\u{00B9}");
    m.insert("ordm", "\u{00BA}");
    m.insert("raquo", "\u{00BB}");
    m.insert("frac14", "\u{00BC}");
    m.insert("frac12", "\u{00BD}");
    m.insert("frac34", "\u{00BE}");
    m.insert("iquest", "\u{00BF}");
    m.insert("times", "\u{00D7}");
    m.insert("divide", "\u{00F7}");

    // === Typography ===
    m.insert("ndash", "\u{2013}");
    m.insert("mdash", "\u{2014}");
    m.insert("lsquo", "\u{2018}");
    m.insert("rsquo", "\u{2019}");
    m.insert("sbquo", "\u{201A}");
    m.insert("ldquo", "\u{201C}");
    m.insert("rdquo", "\u{201D}");
    m.insert("bdquo", "\u{201E}");
    m.insert("dagger", "\u{2020}");
    m.insert("Dagger", "\u{2021}");
    m.insert("bull", "\u{2022}");
    m.insert("hellip", "\u{2026}");
    m.insert("permil", "\u{2030}");
    m.insert("prime", "\u{2032}");
    m.insert("Prime", "\u{2033}");
    m.insert("lsaquo", "\u{2039}");
    m.insert("rsaquo", "\u{203A}");
    m.insert("oline", "\u{203E}");
    m.insert("frasl", "\u{2044}");
    m.insert("euro", "\u{20AC}");
    m.insert("trade", "\u{2122}");

    // === Arrows and math ===
    m.insert("larr", "\u{2190}");
    m.insert("uarr", "\u{2191}");
    m.insert("rarr", "\u{2192}");
    m.insert("darr", "\u{2193}");
    m.insert("harr", "\u{2194}");
    m.insert("forall", "\u{2200}");
    m.insert("part", "\u{2202}");
    m.insert("exist", "\u{2203}");
    m.insert("empty", "\u{2205}");
    m.insert("nabla", "\u{2207}");
    m.insert("isin", "\u{2208}");
    m.insert("notin", "\u{2209}");
    m.insert("prod", "\u{220F}");
    m.insert("sum", "\u{2211}");
    m.insert("minus", "\u{2212}");
    m.insert("lowast", "\u{2217}");
    m.insert("radic", "\u{221A}");
    m.insert("prop", "\u{221D}");
    m.insert("infin", "\u{221E}");
    m.insert("and", "\u{2227}");
    m.insert("or", "\u{2228}");
    m.insert("cap", "\u{2229}");
    m.insert("cup", "\u{222A}");
    m.insert("int", "\u{222B}");
    m.insert("there4", "\u{2234}");
    m.insert("sim", "\u{223C}");
    m.insert("cong", "\u{2245}");
    m.insert("asymp", "\u{2248}");
    m.insert("ne", "\u{2260}");
    m.insert("equiv", "\u{2261}");
    m.insert("le", "\u{2264}");
    m.insert("ge", "\u{2265}");

    // === Greek letters (lowercase) ===
    m.insert("alpha", "\u{03B1}");
    m.insert("beta", "\u{03B2}");
    m.insert("gamma", "\u{03B3}");
    m.insert("delta", "\u{03B4}");
    m.insert("epsilon", "\u{03B5}");
    m.insert("zeta", "\u{03B6}");
    m.insert("eta", "\u{03B7}");
    m.insert("theta", "\u{03B8}");
    m.insert("iota", "\u{03B9}");
    m.insert("kappa", "\u{03BA}");
    m.insert("lambda", "\u{03BB}");
    m.insert("mu", "\u{03BC}");
    m.insert("nu", "\u{03BD}");
    m.insert("xi", "\u{03BE}");
    m.insert("omicron", "\u{03BF}");
    m.insert("pi", "\u{03C0}");
    m.insert("rho", "\u{03C1}");
    m.insert("sigma", "\u{03C3}");
    m.insert("tau", "\u{03C4}");
    m.insert("upsilon", "\u{03C5}");
    m.insert("phi", "\u{03C6}");
    m.insert("chi", "\u{03C7}");
    m.insert("psi", "\u{03C8}");
    m.insert("omega", "\u{03C9}");

    m
});

/// Windows-1252 remapping for the 0x80..=0x9F numeric range
const WINDOWS_1252: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{009F}',
];

/// Resolve a numeric code point with the replacement rules for NUL,
/// surrogates, out-of-range values and the Windows-1252 range.
fn decode_numeric(code: u32) -> char {
    match code {
        0 => '\u{FFFD}',
        0x80..=0x9F => WINDOWS_1252[(code - 0x80) as usize],
        0xD800..=0xDFFF => '\u{FFFD}',
        c if c > 0x10FFFF => '\u{FFFD}',
        c => char::from_u32(c).unwrap_or('\u{FFFD}'),
    }
}

/// Expand character references in `text`.
///
/// Named references require a terminating `;` and a known name; numeric
/// references are `&#NNN;` or `&#xHH;`. Anything else is left as-is.
pub fn decode_character_references(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'&' {
            let start = i;
            while i < bytes.len() && bytes[i] != b'&' {
                i += 1;
            }
            result.push_str(&text[start..i]);
            continue;
        }

        if let Some((decoded, consumed)) = decode_reference(&text[i..]) {
            result.push_str(&decoded);
            i += consumed;
        } else {
            result.push('&');
            i += 1;
        }
    }

    result
}

/// Try to decode one reference at the start of `text` (which begins with
/// `&`). Returns the replacement and the number of bytes consumed.
fn decode_reference(text: &str) -> Option<(String, usize)> {
    let body = &text[1..];

    if let Some(numeric) = body.strip_prefix('#') {
        let (digits, radix) = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16),
            None => (numeric, 10),
        };
        let len = digits
            .chars()
            .take_while(|c| c.is_digit(radix))
            .count();
        if len == 0 || !digits[len..].starts_with(';') {
            return None;
        }
        // overflowing references degrade to U+FFFD
        let code = u32::from_str_radix(&digits[..len], radix).unwrap_or(u32::MAX);
        let consumed = text.len() - digits.len() + len + 1;
        return Some((decode_numeric(code).to_string(), consumed));
    }

    let len = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .count();
    if len == 0 || !body[len..].starts_with(';') {
        return None;
    }
    let replacement = ENTITIES.get(&body[..len])?;
    Some((replacement.to_string(), 1 + len + 1))
}
