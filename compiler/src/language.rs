//! The driver contract: languages plug into the core through this trait
//!
//! A language driver owns everything source-language-specific — grammar,
//! AST shape, semantics — and delegates the shared work (scope tables,
//! deferred resolution, diagnostics, unit registry) to the core. The core
//! calls back into the driver at fixed points: session setup, parsing, and
//! one method per pipeline [`Stage`]. Stage methods default to no-ops; a
//! driver that leaves the default body is simply skipped for that stage.

use std::any::Any;
use std::rc::Rc;

use diagnostics::Reports;
use indexmap::IndexMap;
use source_map::{FileId, SourceFile, SourceSpan};

use crate::graph::{ModuleId, SymbolGraph};
use crate::lifetime::{register_unit, Lifetime};
use crate::resolve::Sema;
use crate::unit::{CompileUnit, UnitId};

/// One pass of the compilation pipeline. The order is fixed and global:
/// every driver sees every stage in this sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Populate the unit's module with open symbols.
    ForwardDeclare,
    /// Bind cross-unit references through the unit registry.
    ResolveImports,
    /// Compile declaration bodies, resolving symbols on first reference.
    CompileSymbols,
}

impl Stage {
    /// All stages, in execution order.
    pub const ALL: [Stage; 3] = [Stage::ForwardDeclare, Stage::ResolveImports, Stage::CompileSymbols];

    pub fn name(self) -> &'static str {
        match self {
            Stage::ForwardDeclare => "forward-declare",
            Stage::ResolveImports => "resolve-imports",
            Stage::CompileSymbols => "compile-symbols",
        }
    }
}

/// Static description of a language driver.
#[derive(Debug, Clone, Copy)]
pub struct LanguageInfo {
    /// Unique machine id, e.g. `"toy"`.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    pub version: &'static str,
    /// File extensions this driver parses, without dots.
    pub extensions: &'static [&'static str],
}

/// Index of a registered language within a lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguageId(pub(crate) usize);

impl LanguageId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// The scanner-facing view of one source file handed to `parse`. Lexical
/// analysis itself lives outside the core; drivers get the raw text plus a
/// way to mint spans from byte offsets.
pub struct Scan<'a> {
    file: FileId,
    source: &'a SourceFile,
}

impl<'a> Scan<'a> {
    pub(crate) fn new(file: FileId, source: &'a SourceFile) -> Self {
        Self { file, source }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    /// The display path of the file being scanned.
    pub fn path(&self) -> &str {
        self.source.name()
    }

    pub fn text(&self) -> &str {
        self.source.text()
    }

    /// Build a span from byte offsets; out-of-range offsets clamp.
    pub fn span(&self, start: usize, end: usize) -> SourceSpan {
        let limit = self.source.text().len();
        SourceSpan::new(
            self.file,
            self.source.position(start.min(limit)),
            self.source.position(end.min(limit)),
        )
    }

    /// A span covering the entire file.
    pub fn whole(&self) -> SourceSpan {
        self.span(0, self.source.text().len())
    }
}

/// Session-scoped view handed to [`Language::create`]. Lets a driver build
/// a synthetic runtime module for its builtins before any file is parsed.
pub struct LanguageHandle<'a> {
    pub graph: &'a mut SymbolGraph,
    pub reports: &'a mut Reports,
    pub(crate) runtime: &'a mut Option<ModuleId>,
}

impl LanguageHandle<'_> {
    /// Install the driver's runtime root module. Stage contexts expose it
    /// back to the driver via [`UnitCtx::runtime`].
    pub fn set_runtime(&mut self, module: ModuleId) {
        *self.runtime = Some(module);
    }

    pub fn runtime(&self) -> Option<ModuleId> {
        *self.runtime
    }
}

/// Registration surface handed to [`Language::postparse`]: a driver maps
/// one parsed file to one or more compile units.
pub struct UnitRegistrar<'a> {
    pub(crate) units: &'a mut IndexMap<UnitId, CompileUnit>,
    pub(crate) reports: &'a mut Reports,
    pub(crate) language: LanguageId,
}

impl UnitRegistrar<'_> {
    /// Register a unit under `id`. Duplicate paths keep the prior unit and
    /// report `DuplicateUnit`; returns whether this unit was inserted.
    pub fn add_unit(&mut self, id: UnitId, ast: Rc<dyn Any>) -> bool {
        register_unit(self.units, self.reports, CompileUnit::new(id, self.language, ast))
    }

    pub fn reports(&mut self) -> &mut Reports {
        self.reports
    }
}

/// Per-stage view of one compile unit, handed to the stage methods.
pub struct UnitCtx<'a> {
    pub(crate) lifetime: &'a mut Lifetime,
    pub(crate) id: UnitId,
    pub(crate) ast: Rc<dyn Any>,
    pub(crate) language: LanguageId,
}

impl UnitCtx<'_> {
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// This unit's AST, downcast to the driver's concrete type.
    pub fn ast<T: 'static>(&self) -> Option<&T> {
        self.ast.downcast_ref()
    }

    /// This unit's root module, once forward declaration has installed it.
    pub fn module(&self) -> Option<ModuleId> {
        self.lifetime.units.get(&self.id).and_then(CompileUnit::module)
    }

    /// Install the unit's root module (normally during forward declaration).
    pub fn set_module(&mut self, module: ModuleId) {
        if let Some(unit) = self.lifetime.units.get_mut(&self.id) {
            unit.set_module(module);
        }
    }

    /// The runtime module this unit's language installed at creation.
    pub fn runtime(&self) -> Option<ModuleId> {
        self.lifetime.runtimes[self.language.index()]
    }

    /// Look up another unit for import binding. A miss is silent — the
    /// driver decides whether it is fatal.
    pub fn find_unit(&self, id: &UnitId) -> Option<&CompileUnit> {
        self.lifetime.units.get(id)
    }

    /// The resolve bundle for this lifetime's graph, cookie, and reports.
    pub fn sema(&mut self) -> Sema<'_> {
        self.lifetime.sema()
    }

    pub fn graph(&self) -> &SymbolGraph {
        &self.lifetime.graph
    }

    pub fn graph_mut(&mut self) -> &mut SymbolGraph {
        &mut self.lifetime.graph
    }

    pub fn reports(&mut self) -> &mut Reports {
        &mut self.lifetime.reports
    }

    pub fn sources(&self) -> &source_map::SourceMap {
        &self.lifetime.sources
    }
}

/// A language driver. Stage methods default to no-ops so drivers implement
/// only the stages they need.
pub trait Language {
    fn info(&self) -> &LanguageInfo;

    /// Called once when the driver is registered. Build runtime modules and
    /// session state here.
    fn create(&self, handle: &mut LanguageHandle<'_>) {
        let _ = handle;
    }

    /// Called once when the lifetime is torn down.
    fn destroy(&self) {}

    /// Called before `parse` on each file; drivers with per-file scanner
    /// state hook in here.
    fn preparse(&self, scan: &Scan<'_>, reports: &mut Reports) {
        let _ = (scan, reports);
    }

    /// Parse one file into an AST. `None` means the driver rejected the
    /// file and already reported why; no unit is registered.
    fn parse(&self, scan: &Scan<'_>, reports: &mut Reports) -> Option<Rc<dyn Any>>;

    /// Map a successfully parsed file to one or more compile units.
    fn postparse(&self, scan: &Scan<'_>, ast: Rc<dyn Any>, units: &mut UnitRegistrar<'_>);

    fn forward_decls(&self, ctx: &mut UnitCtx<'_>) {
        let _ = ctx;
    }

    fn process_imports(&self, ctx: &mut UnitCtx<'_>) {
        let _ = ctx;
    }

    fn compile_module(&self, ctx: &mut UnitCtx<'_>) {
        let _ = ctx;
    }
}

/// Dispatch one stage to the matching driver method.
pub(crate) fn run_pass(language: &dyn Language, stage: Stage, ctx: &mut UnitCtx<'_>) {
    match stage {
        Stage::ForwardDeclare => language.forward_decls(ctx),
        Stage::ResolveImports => language.process_imports(ctx),
        Stage::CompileSymbols => language.compile_module(ctx),
    }
}
