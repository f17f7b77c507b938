//! Accumulating diagnostics sink and text renderer
//!
//! Compilation never aborts on the first problem: every subsystem pushes its
//! events into a shared [`Reports`] sink and the pipeline caller decides
//! between stages whether the accumulated severity warrants stopping.
//!
//! Each kind of event a subsystem can raise is described once by a static
//! [`DiagnosticInfo`]. Raising an event with [`Reports::notify`] returns an
//! [`EventId`] handle, letting the caller attach further spans
//! ([`Reports::append`]) or free-form notes ([`Reports::note`]) to the same
//! event — a redefinition, for example, points at both declarations.

use std::fmt;

pub use source_map::{FileId, SourceFile, SourceMap, SourcePosition, SourceSpan};

/// How serious an event is. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Hint => write!(f, "hint"),
        }
    }
}

/// Static descriptor for one kind of event. Subsystems declare these as
/// `static` items and pass them to [`Reports::notify`].
#[derive(Debug)]
pub struct DiagnosticInfo {
    /// Stable identifier, e.g. `"redefinition"`. Shown in rendered output.
    pub id: &'static str,
    pub severity: Severity,
    /// One-line description of what this event means.
    pub brief: &'static str,
}

/// Whether a label marks the event site or supporting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

/// A message attached to a span of source.
#[derive(Debug, Clone)]
pub struct Label {
    pub span: SourceSpan,
    pub message: String,
    pub style: LabelStyle,
}

impl Label {
    pub fn primary(span: SourceSpan, message: impl Into<String>) -> Self {
        Self { span, message: message.into(), style: LabelStyle::Primary }
    }

    pub fn secondary(span: SourceSpan, message: impl Into<String>) -> Self {
        Self { span, message: message.into(), style: LabelStyle::Secondary }
    }
}

/// One reported event: its descriptor, primary location and message, plus any
/// extra labels and notes attached after the fact.
#[derive(Debug)]
pub struct Diagnostic {
    pub info: &'static DiagnosticInfo,
    pub span: SourceSpan,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.info.severity
    }
}

/// Handle to an event already in the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventId(usize);

/// The shared sink. Owned by the compilation run; passed by `&mut` into
/// every operation that can report.
#[derive(Debug, Default)]
pub struct Reports {
    events: Vec<Diagnostic>,
}

impl Reports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and return a handle for attaching further detail.
    pub fn notify(
        &mut self,
        info: &'static DiagnosticInfo,
        span: SourceSpan,
        message: impl Into<String>,
    ) -> EventId {
        let id = EventId(self.events.len());
        self.events.push(Diagnostic {
            info,
            span,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        });
        id
    }

    /// Attach a secondary label to an existing event.
    pub fn append(&mut self, id: EventId, span: SourceSpan, message: impl Into<String>) {
        if let Some(event) = self.events.get_mut(id.0) {
            event.labels.push(Label::secondary(span, message));
        }
    }

    /// Attach a free-form note to an existing event.
    pub fn note(&mut self, id: EventId, message: impl Into<String>) {
        if let Some(event) = self.events.get_mut(id.0) {
            event.notes.push(message.into());
        }
    }

    pub fn get(&self, id: EventId) -> Option<&Diagnostic> {
        self.events.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.events.iter().any(|d| d.severity() == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(Severity::Warning)
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter().filter(move |d| d.severity() == severity)
    }

    /// Count of events raised with the given descriptor. Mostly used by
    /// callers deciding between stages and by tests.
    pub fn count_of(&self, info: &'static DiagnosticInfo) -> usize {
        self.events
            .iter()
            .filter(|d| std::ptr::eq(d.info, info))
            .count()
    }
}

/// Plain or colored text rendering of accumulated diagnostics.
pub struct Renderer {
    use_colors: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self { use_colors: false }
    }

    pub fn with_colors() -> Self {
        Self { use_colors: true }
    }

    pub fn render_all(&self, reports: &Reports, sources: &SourceMap) -> String {
        let mut output = String::new();
        for (index, diagnostic) in reports.iter().enumerate() {
            if index > 0 {
                output.push('\n');
            }
            output.push_str(&self.render(diagnostic, sources));
        }
        output
    }

    pub fn render(&self, diagnostic: &Diagnostic, sources: &SourceMap) -> String {
        let mut output = String::new();

        let severity = diagnostic.severity();
        if self.use_colors {
            let color = match severity {
                Severity::Error => "\x1b[31m",
                Severity::Warning => "\x1b[33m",
                Severity::Info => "\x1b[36m",
                Severity::Hint => "\x1b[32m",
            };
            output.push_str(&format!(
                "{color}{severity}[{}]\x1b[0m: \x1b[1m{}\x1b[0m\n",
                diagnostic.info.id, diagnostic.message
            ));
        } else {
            output.push_str(&format!(
                "{severity}[{}]: {}\n",
                diagnostic.info.id, diagnostic.message
            ));
        }

        self.render_span(&mut output, diagnostic.span, None, sources);

        for label in &diagnostic.labels {
            self.render_span(&mut output, label.span, Some(&label.message), sources);
        }

        for note in &diagnostic.notes {
            output.push_str(&format!("  note: {note}\n"));
        }

        output
    }

    fn render_span(
        &self,
        output: &mut String,
        span: SourceSpan,
        message: Option<&str>,
        sources: &SourceMap,
    ) {
        let Some(file) = sources.file(span.file) else {
            if let Some(message) = message {
                output.push_str(&format!("  --> <builtin>: {message}\n"));
            }
            return;
        };

        output.push_str(&format!(
            "  --> {}:{}:{}\n",
            file.name(),
            span.start.line,
            span.start.column
        ));

        let line_number = span.start.line;
        if let Some(line) = file.line(line_number) {
            let width = line_number.to_string().len();
            output.push_str(&format!("{:width$} |\n", ""));
            output.push_str(&format!("{line_number} | {line}\n"));

            let padding = " ".repeat(width + span.start.column.saturating_sub(1));
            let underline = if span.start.line == span.end.line {
                span.end.column.saturating_sub(span.start.column).max(1)
            } else {
                line.len().saturating_sub(span.start.column - 1).max(1)
            };
            let carets = "^".repeat(underline);
            match message {
                Some(message) => output.push_str(&format!("  {padding}{carets} {message}\n")),
                None => output.push_str(&format!("  {padding}{carets}\n")),
            }
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
