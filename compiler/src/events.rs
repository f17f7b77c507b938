//! Event descriptors for everything the core itself can report
//!
//! Drivers raise their own language-specific events directly through the
//! [`diagnostics::Reports`] sink; this registry covers only the events the
//! shared core produces. Descriptors are static so event identity is pointer
//! identity, which keeps counting and filtering cheap.

use diagnostics::{DiagnosticInfo, Severity};

/// The same `(tag, name)` slot in one module was set twice. Non-fatal; the
/// first registration wins.
pub static REDEFINITION: DiagnosticInfo = DiagnosticInfo {
    id: "redefinition",
    severity: Severity::Error,
    brief: "a name was declared more than once in the same scope",
};

/// A symbol's resolution re-requested its own resolution, directly or
/// transitively. The cyclic symbol is poisoned; the rest of the graph
/// continues.
pub static CYCLIC_DEPENDENCY: DiagnosticInfo = DiagnosticInfo {
    id: "cyclic-dependency",
    severity: Severity::Error,
    brief: "a declaration depends on itself through other declarations",
};

/// A cross-unit import named a unit that was never registered.
pub static IMPORT_NOT_FOUND: DiagnosticInfo = DiagnosticInfo {
    id: "import-not-found",
    severity: Severity::Error,
    brief: "an imported unit is not part of this compilation",
};

/// A name lookup failed in every reachable scope.
pub static UNDEFINED_SYMBOL: DiagnosticInfo = DiagnosticInfo {
    id: "undefined-symbol",
    severity: Severity::Error,
    brief: "a referenced name is not declared in any reachable scope",
};

/// Two drivers claimed the same file extension; the first claimant keeps it.
pub static EXTENSION_CONFLICT: DiagnosticInfo = DiagnosticInfo {
    id: "extension-conflict",
    severity: Severity::Warning,
    brief: "two languages registered the same file extension",
};

/// A compile unit path was registered twice; the first unit is kept.
pub static DUPLICATE_UNIT: DiagnosticInfo = DiagnosticInfo {
    id: "duplicate-unit",
    severity: Severity::Error,
    brief: "two compile units were registered under the same path",
};

/// No registered language handles the file's extension.
pub static UNKNOWN_EXTENSION: DiagnosticInfo = DiagnosticInfo {
    id: "unknown-extension",
    severity: Severity::Error,
    brief: "no registered language can parse this file",
};

/// A driver rejected a file during parsing without producing an AST.
pub static PARSE_FAILED: DiagnosticInfo = DiagnosticInfo {
    id: "parse-failed",
    severity: Severity::Error,
    brief: "the language driver could not parse the file",
};

/// Every core event, for renderers and tooling that enumerate them.
pub static ALL: &[&DiagnosticInfo] = &[
    &REDEFINITION,
    &CYCLIC_DEPENDENCY,
    &IMPORT_NOT_FOUND,
    &UNDEFINED_SYMBOL,
    &EXTENSION_CONFLICT,
    &DUPLICATE_UNIT,
    &UNKNOWN_EXTENSION,
    &PARSE_FAILED,
];

/// Find a core event descriptor by its stable id.
pub fn find(id: &str) -> Option<&'static DiagnosticInfo> {
    ALL.iter().copied().find(|info| info.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        for (index, info) in ALL.iter().enumerate() {
            for other in &ALL[index + 1..] {
                assert_ne!(info.id, other.id);
            }
        }
    }

    #[test]
    fn find_by_id() {
        assert!(std::ptr::eq(find("redefinition").unwrap(), &REDEFINITION));
        assert!(find("no-such-event").is_none());
    }
}
