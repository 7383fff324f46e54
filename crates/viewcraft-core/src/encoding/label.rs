use encoding_rs::Encoding;
use std::borrow::Cow;
use std::fmt;

/// An encoding a template source can be declared or tagged in
///
/// WHATWG folds `US-ASCII` and `ISO-8859-1` into windows-1252, which would accept
/// high bytes as ASCII and remap 0x80..=0x9F. Both are kept distinct here.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    /// 7-bit ASCII; any byte above 0x7F is malformed
    Ascii,
    /// ISO-8859-1; every byte is the code point of the same value
    Latin1,
    Whatwg(&'static Encoding),
}

const ASCII_LABELS: &[&str] = &["us-ascii", "ascii", "ansi_x3.4-1968", "iso646-us"];
const LATIN1_LABELS: &[&str] = &["iso-8859-1", "iso8859-1", "iso_8859-1", "latin1", "l1"];

impl SourceEncoding {
    pub const UTF_8: SourceEncoding = SourceEncoding::Whatwg(encoding_rs::UTF_8);

    /// Resolve a label, checking the ASCII and Latin-1 names before WHATWG's table
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let matches = |names: &[&str]| names.iter().any(|name| name.eq_ignore_ascii_case(label));
        if matches(ASCII_LABELS) {
            Some(SourceEncoding::Ascii)
        } else if matches(LATIN1_LABELS) {
            Some(SourceEncoding::Latin1)
        } else {
            Encoding::for_label(label.as_bytes()).map(SourceEncoding::Whatwg)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceEncoding::Ascii => "US-ASCII",
            SourceEncoding::Latin1 => "ISO-8859-1",
            SourceEncoding::Whatwg(encoding) => encoding.name(),
        }
    }

    /// Strictly decode `bytes`, or `None` when they are malformed
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            SourceEncoding::Ascii => bytes
                .is_ascii()
                .then(|| std::str::from_utf8(bytes).ok().map(Cow::Borrowed))
                .flatten(),
            SourceEncoding::Latin1 => match std::str::from_utf8(bytes) {
                Ok(text) if bytes.is_ascii() => Some(Cow::Borrowed(text)),
                _ => Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
            },
            SourceEncoding::Whatwg(encoding) => {
                encoding.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

impl From<&'static Encoding> for SourceEncoding {
    fn from(encoding: &'static Encoding) -> Self {
        SourceEncoding::Whatwg(encoding)
    }
}

impl fmt::Debug for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
