//! Structural region tags for document spans.

/// A structural region of a document that word positions can fall in.
///
/// The one-byte codes are stored in span records on disk and must not
/// be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanTag {
    Title,
    Heading,
    Code,
    Nav,
    Anchor,
    ExternalLinkText,
    Body,
}

impl SpanTag {
    /// All tags the span store records.
    pub const ALL: [SpanTag; 7] = [
        SpanTag::Title,
        SpanTag::Heading,
        SpanTag::Code,
        SpanTag::Nav,
        SpanTag::Anchor,
        SpanTag::ExternalLinkText,
        SpanTag::Body,
    ];

    /// Stable one-byte wire code.
    pub fn code(self) -> u8 {
        match self {
            SpanTag::Title => b't',
            SpanTag::Heading => b'h',
            SpanTag::Code => b'c',
            SpanTag::Nav => b'n',
            SpanTag::Anchor => b'a',
            SpanTag::ExternalLinkText => b'x',
            SpanTag::Body => b'b',
        }
    }

    /// Decode a wire code; unknown codes are skipped by readers rather
    /// than treated as corruption, so this returns an Option.
    pub fn from_code(code: u8) -> Option<SpanTag> {
        match code {
            b't' => Some(SpanTag::Title),
            b'h' => Some(SpanTag::Heading),
            b'c' => Some(SpanTag::Code),
            b'n' => Some(SpanTag::Nav),
            b'a' => Some(SpanTag::Anchor),
            b'x' => Some(SpanTag::ExternalLinkText),
            b'b' => Some(SpanTag::Body),
            _ => None,
        }
    }
}
