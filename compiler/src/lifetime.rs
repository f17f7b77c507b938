//! The lifetime of one compilation run
//!
//! A [`Lifetime`] owns everything a run accumulates: the source map, the
//! diagnostics sink, the symbol graph, the cookie, the unit registry, and
//! the registered language drivers. The stage runner lives here too: each
//! stage visits every unit in registration order and never stops early —
//! diagnostics pile up in the shared sink and the caller decides between
//! stages whether to keep going.

use std::rc::Rc;

use diagnostics::Reports;
use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use log::{debug, info};
use source_map::{FileId, SourceFile, SourceMap, SourceSpan};

use crate::events;
use crate::graph::{ModuleId, SymbolGraph, SymbolId};
use crate::language::{
    run_pass, Language, LanguageHandle, LanguageId, Scan, Stage, UnitCtx, UnitRegistrar,
};
use crate::resolve::{Cookie, Sema};
use crate::unit::{CompileUnit, UnitId};

/// Owns all state for one compilation run.
pub struct Lifetime {
    pub(crate) sources: SourceMap,
    pub(crate) reports: Reports,
    pub(crate) graph: SymbolGraph,
    pub(crate) cookie: Cookie,
    pub(crate) units: IndexMap<UnitId, CompileUnit>,
    pub(crate) languages: Vec<Rc<dyn Language>>,
    pub(crate) extensions: FxHashMap<String, LanguageId>,
    pub(crate) runtimes: Vec<Option<ModuleId>>,
}

impl Lifetime {
    pub fn new() -> Self {
        Self {
            sources: SourceMap::new(),
            reports: Reports::new(),
            graph: SymbolGraph::new(),
            cookie: Cookie::new(),
            units: IndexMap::new(),
            languages: Vec::new(),
            extensions: FxHashMap::default(),
            runtimes: Vec::new(),
        }
    }

    /// Register a language driver. Every extension it lists is claimed;
    /// an extension some earlier driver already claimed stays with that
    /// driver and raises `ExtensionConflict`. The driver's `create` hook
    /// runs before this returns.
    pub fn add_language(&mut self, language: Rc<dyn Language>) -> LanguageId {
        let id = LanguageId(self.languages.len());
        let info = *language.info();
        self.languages.push(Rc::clone(&language));
        self.runtimes.push(None);

        for ext in info.extensions {
            if let Some(&prior) = self.extensions.get(*ext) {
                let prior_id = self.languages[prior.index()].info().id;
                self.reports.notify(
                    &events::EXTENSION_CONFLICT,
                    SourceSpan::builtin(),
                    format!(
                        "language `{}` registered under extension `{ext}` clashes with previously registered language `{prior_id}`",
                        info.id
                    ),
                );
                continue;
            }
            self.extensions.insert((*ext).to_string(), id);
        }

        let Self { graph, reports, runtimes, .. } = self;
        let mut handle = LanguageHandle {
            graph,
            reports,
            runtime: &mut runtimes[id.index()],
        };
        language.create(&mut handle);

        info!("registered language `{}`", info.id);
        id
    }

    pub fn language_for(&self, extension: &str) -> Option<LanguageId> {
        self.extensions.get(extension).copied()
    }

    pub fn language(&self, id: LanguageId) -> Option<&Rc<dyn Language>> {
        self.languages.get(id.index())
    }

    /// Register source text without parsing it yet.
    pub fn add_source(&mut self, name: impl Into<String>, text: impl Into<String>) -> FileId {
        self.sources.add_file(name, text)
    }

    /// Register and immediately parse one file.
    pub fn parse_file(&mut self, name: impl Into<String>, text: impl Into<String>) -> bool {
        let file = self.sources.add_file(name, text);
        self.parse(file)
    }

    /// Parse a registered file: dispatch on its extension, run the driver's
    /// preparse/parse/postparse hooks, and let it register compile units.
    /// Returns whether an AST was produced.
    pub fn parse(&mut self, file: FileId) -> bool {
        let extension = self
            .sources
            .file(file)
            .and_then(SourceFile::extension)
            .map(str::to_string);

        let Some(extension) = extension else {
            let name = self
                .sources
                .file(file)
                .map(|f| f.name().to_string())
                .unwrap_or_default();
            self.reports.notify(
                &events::UNKNOWN_EXTENSION,
                SourceSpan::builtin(),
                format!("`{name}` has no file extension to dispatch on"),
            );
            return false;
        };

        let Some(language_id) = self.language_for(&extension) else {
            self.reports.notify(
                &events::UNKNOWN_EXTENSION,
                SourceSpan::builtin(),
                format!("no registered language handles `.{extension}` files"),
            );
            return false;
        };

        let language = Rc::clone(&self.languages[language_id.index()]);
        let Self { sources, reports, units, .. } = self;
        let Some(source) = sources.file(file) else {
            return false;
        };
        let scan = Scan::new(file, source);

        language.preparse(&scan, reports);

        let errors_before = reports.error_count();
        let Some(ast) = language.parse(&scan, reports) else {
            if reports.error_count() == errors_before {
                reports.notify(
                    &events::PARSE_FAILED,
                    scan.whole(),
                    format!("failed to parse `{}`", scan.path()),
                );
            }
            debug!("parse failed for {}", scan.path());
            return false;
        };

        let mut registrar = UnitRegistrar { units, reports, language: language_id };
        language.postparse(&scan, ast, &mut registrar);
        true
    }

    /// Register a compile unit directly. Duplicate paths keep the first
    /// unit, report `DuplicateUnit`, and discard this one; returns whether
    /// the unit was inserted.
    pub fn add_unit(
        &mut self,
        id: UnitId,
        language: LanguageId,
        ast: Rc<dyn std::any::Any>,
    ) -> bool {
        register_unit(
            &mut self.units,
            &mut self.reports,
            CompileUnit::new(id, language, ast),
        )
    }

    /// Pure registry lookup; a miss is silent.
    pub fn get_unit(&self, id: &UnitId) -> Option<&CompileUnit> {
        self.units.get(id)
    }

    /// Attach a root module to a registered unit. Drivers normally do this
    /// through [`crate::language::UnitCtx::set_module`] during forward
    /// declaration; this is the same operation for code driving the
    /// lifetime directly. Returns whether the unit exists.
    pub fn set_unit_module(&mut self, id: &UnitId, module: ModuleId) -> bool {
        match self.units.get_mut(id) {
            Some(unit) => {
                unit.set_module(module);
                true
            }
            None => false,
        }
    }

    pub fn units(&self) -> impl Iterator<Item = &CompileUnit> {
        self.units.values()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Run one stage over every unit in registration order. Drivers that
    /// leave the stage's default method body are skipped. Never stops
    /// early; inspect [`Lifetime::reports`] between stages.
    pub fn run_stage(&mut self, stage: Stage) {
        info!("running stage {} over {} unit(s)", stage.name(), self.units.len());

        let ids: Vec<UnitId> = self.units.keys().cloned().collect();
        for id in ids {
            let Some(unit) = self.units.get(&id) else {
                continue;
            };
            let language_id = unit.language();
            let ast = Rc::clone(unit.ast_handle());
            let language = Rc::clone(&self.languages[language_id.index()]);

            debug!("stage {} for unit `{id}`", stage.name());
            let mut ctx = UnitCtx { lifetime: self, id, ast, language: language_id };
            run_pass(language.as_ref(), stage, &mut ctx);
        }
    }

    /// Force-resolve every symbol still open after the stages have run:
    /// walk each unit's module tree (and any runtime modules), resolving
    /// every tag and recursing into nested module symbols. Resolution is
    /// idempotent, so symbols already closed by cross-references are
    /// untouched.
    pub fn resolve_all(&mut self) {
        let mut roots: Vec<ModuleId> = self.runtimes.iter().flatten().copied().collect();
        roots.extend(self.units.values().filter_map(CompileUnit::module));

        let Self { graph, cookie, reports, .. } = self;
        let mut sema = Sema { graph, cookie, reports };
        let mut visited = FxHashSet::default();
        for module in roots {
            resolve_module_decls(&mut sema, module, &mut visited);
        }
    }

    /// Run every stage in order, then force-resolve the stragglers.
    pub fn compile(&mut self) {
        for stage in Stage::ALL {
            self.run_stage(stage);
        }
        self.resolve_all();
    }

    /// The resolve bundle over this lifetime's graph, cookie, and reports.
    pub fn sema(&mut self) -> Sema<'_> {
        Sema {
            graph: &mut self.graph,
            cookie: &mut self.cookie,
            reports: &mut self.reports,
        }
    }

    pub fn reports(&self) -> &Reports {
        &self.reports
    }

    pub fn reports_mut(&mut self) -> &mut Reports {
        &mut self.reports
    }

    pub fn graph(&self) -> &SymbolGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SymbolGraph {
        &mut self.graph
    }

    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    pub fn runtime_of(&self, language: LanguageId) -> Option<ModuleId> {
        self.runtimes.get(language.index()).copied().flatten()
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        for language in &self.languages {
            language.destroy();
        }
    }
}

fn resolve_module_decls(
    sema: &mut Sema<'_>,
    module: ModuleId,
    visited: &mut FxHashSet<ModuleId>,
) {
    if !visited.insert(module) {
        return;
    }

    for tag in 0..sema.graph.module(module).tag_count() {
        let symbols: Vec<SymbolId> = sema.graph.symbols_in(module, tag).collect();
        for id in symbols {
            sema.resolve(id);
            if let Some(nested) = sema.graph.symbol(id).nested() {
                resolve_module_decls(sema, nested, visited);
            }
        }
    }
}

pub(crate) fn register_unit(
    units: &mut IndexMap<UnitId, CompileUnit>,
    reports: &mut Reports,
    unit: CompileUnit,
) -> bool {
    let id = unit.id().clone();
    if units.contains_key(&id) {
        reports.notify(
            &events::DUPLICATE_UNIT,
            SourceSpan::builtin(),
            format!("unit `{id}` is already registered; keeping the first registration"),
        );
        return false;
    }

    debug!("registered unit `{id}`");
    units.insert(id, unit);
    true
}
