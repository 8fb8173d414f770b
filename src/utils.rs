//! Source-location helpers for diagnostics.

use annotate_snippets::snippet::{AnnotationType, Slice, SourceAnnotation};

/// A byte range inside a named source document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span<'a> {
    pub filename: &'a str,
    pub source: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Span<'a> {
    pub fn new(filename: &'a str, source: &'a str, start: usize, end: usize) -> Self {
        Self {
            filename,
            source,
            start,
            end,
        }
    }

    /// The full lines covered by the span, for snippet rendering.
    pub fn lines(&self) -> Option<LinesInfo<'a>> {
        let mut offset = 0;
        let mut first = None;
        let mut end = self.source.len();

        for (i, line) in self.source.split_inclusive('\n').enumerate() {
            let next = offset + line.len();
            if first.is_none() && self.start < next {
                first = Some((i + 1, offset));
            }
            if self.end <= next {
                end = next;
                break;
            }
            offset = next;
        }

        let (line_start, start) = first?;
        Some(LinesInfo {
            filename: self.filename,
            source: &self.source[start..end],
            line_start,
            range: (self.start - start, self.end - start),
        })
    }
}

/// The lines a span falls on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinesInfo<'a> {
    /// Document name
    pub filename: &'a str,
    /// The covered lines, whole
    pub source: &'a str,
    /// Line number of the first covered line
    pub line_start: usize,
    /// The span, relative to `source`
    pub range: (usize, usize),
}

impl<'a> LinesInfo<'a> {
    pub fn as_annotation(&self, message: &'a str, annotation_type: AnnotationType) -> Slice<'a> {
        Slice {
            source: self.source,
            line_start: self.line_start,
            origin: Some(self.filename),
            annotations: vec![SourceAnnotation {
                range: self.range,
                label: message,
                annotation_type,
            }],
            fold: true,
        }
    }
}
