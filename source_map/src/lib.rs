//! Source file tracking and position mapping for multi-file compilation
//!
//! Every diagnostic and declaration in the framework carries a [`SourceSpan`]
//! pointing back into a file registered with a [`SourceMap`]. The map owns the
//! file text and a precomputed line-start table so byte offsets can be turned
//! into line/column pairs cheaply.
//!
//! Declarations with no source text (builtin modules, synthesized entry
//! points) use the reserved builtin file; see [`SourceSpan::builtin`].

use std::fmt;

/// Unique identifier for a registered source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u32);

impl FileId {
    /// The reserved id for locations with no backing source text.
    pub const BUILTIN: FileId = FileId(u32::MAX);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn is_builtin(self) -> bool {
        self == Self::BUILTIN
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_builtin() {
            write!(f, "FileId(builtin)")
        } else {
            write!(f, "FileId({})", self.0)
        }
    }
}

/// A position in source text. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }

    /// The position used for builtin spans.
    pub fn zero() -> Self {
        Self::new(1, 1, 0)
    }
}

/// A contiguous region of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub file: FileId,
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceSpan {
    pub fn new(file: FileId, start: SourcePosition, end: SourcePosition) -> Self {
        Self { file, start, end }
    }

    /// A span for declarations that have no source text.
    pub fn builtin() -> Self {
        Self::new(FileId::BUILTIN, SourcePosition::zero(), SourcePosition::zero())
    }

    pub fn is_builtin(&self) -> bool {
        self.file.is_builtin()
    }

    /// Smallest span covering both `self` and `other`. Spans must come from
    /// the same file; mismatched files keep `self` unchanged.
    pub fn merge(self, other: SourceSpan) -> SourceSpan {
        if self.file != other.file {
            return self;
        }

        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };

        SourceSpan::new(self.file, start, end)
    }
}

/// One registered source file: its display name, full text, and a table of
/// byte offsets where each line begins.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: String, text: String) -> Self {
        let line_starts = line_starts(&text);
        Self { name, text, line_starts }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The file extension of the display name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            None
        } else {
            Some(ext)
        }
    }

    /// Fetch a single line of text, 1-based, without its line terminator.
    pub fn line(&self, number: usize) -> Option<&str> {
        if number == 0 || number > self.line_starts.len() {
            return None;
        }

        let start = self.line_starts[number - 1];
        let end = self
            .line_starts
            .get(number)
            .copied()
            .unwrap_or(self.text.len());

        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Map a byte offset to a 1-based (line, column) pair.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index.saturating_sub(1),
        };

        let line_start = self.line_starts.get(line_index).copied().unwrap_or(0);
        (line_index + 1, offset - line_start + 1)
    }

    pub fn position(&self, offset: usize) -> SourcePosition {
        let (line, column) = self.line_col(offset);
        SourcePosition::new(line, column, offset)
    }
}

/// Owns every source file in a compilation run and mints [`FileId`]s.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its id.
    pub fn add_file(&mut self, name: impl Into<String>, text: impl Into<String>) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile::new(name.into(), text.into()));
        id
    }

    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        if id.is_builtin() {
            return None;
        }
        self.files.get(id.0 as usize)
    }

    pub fn line(&self, id: FileId, number: usize) -> Option<&str> {
        self.file(id)?.line(number)
    }

    /// Build a span from byte offsets into a file. Returns `None` for unknown
    /// files; offsets past the end clamp to the final position.
    pub fn span(&self, id: FileId, start: usize, end: usize) -> Option<SourceSpan> {
        let file = self.file(id)?;
        let limit = file.text.len();
        let start = file.position(start.min(limit));
        let end = file.position(end.min(limit));
        Some(SourceSpan::new(id, start, end))
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.files.len()).map(|index| FileId(index as u32))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (index, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(index + 1);
        }
    }
    starts
}
