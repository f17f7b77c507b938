//! Staged compilation pipeline with deferred symbol resolution
//!
//! Language drivers implement [`language::Language`] and register with a
//! [`lifetime::Lifetime`], which owns the source map, the diagnostics sink,
//! the symbol graph, and the compile unit registry for one run. Parsing
//! dispatches on file extension; the stage runner then walks every unit
//! through forward declaration, import binding, and compilation, and
//! [`lifetime::Lifetime::resolve_all`] force-resolves whatever the stages
//! left open.
//!
//! Symbols are forward declared `Open` with a resolver attached and closed
//! lazily on first use through [`resolve::Sema`], which detects resolution
//! cycles via a shared stack and poisons every participant rather than
//! recursing forever.

pub mod events;
pub mod graph;
pub mod language;
pub mod lifetime;
pub mod logging;
pub mod resolve;
pub mod types;
pub mod unit;

pub use graph::{
    Attributes, Linkage, ModuleId, SymbolGraph, SymbolId, SymbolKind, SymbolState, Tag, Visibility,
};
pub use language::{Language, LanguageHandle, LanguageId, LanguageInfo, Scan, Stage, UnitCtx,
    UnitRegistrar};
pub use lifetime::Lifetime;
pub use resolve::{Cookie, ResolveSymbol, Sema};
pub use types::Type;
pub use unit::{CompileUnit, UnitId};
