//! End-to-end pipeline tests with a small line-based declaration language.
//!
//! The grammar: `module a.b` names the unit, `import a.c` binds another
//! unit's module into scope, and `let name = <int|path>` declares a value
//! whose type is deferred until resolution. Enough to exercise parsing
//! dispatch, unit registration, all three stages, and cross-unit symbol
//! resolution through the public API.

use std::any::Any;
use std::rc::Rc;

use compiler::{
    events, Attributes, CompileUnit, Language, LanguageInfo, Lifetime, ModuleId, Scan, Sema,
    SymbolId, SymbolKind, SymbolState, Tag, Type, UnitCtx, UnitId, UnitRegistrar,
};
use diagnostics::{DiagnosticInfo, Reports, Severity};
use source_map::SourceSpan;

const VALUES: Tag = 0;
const MODULES: Tag = 1;
const TAGS: usize = 2;

static BAD_SYNTAX: DiagnosticInfo = DiagnosticInfo {
    id: "decl-bad-syntax",
    severity: Severity::Error,
    brief: "malformed declaration",
};

#[derive(Clone)]
enum Expr {
    Lit,
    Ref(String),
}

#[derive(Clone)]
struct Decl {
    name: String,
    expr: Expr,
    span: SourceSpan,
}

struct Ast {
    module: String,
    imports: Vec<(String, SourceSpan)>,
    decls: Vec<Decl>,
}

struct DeclLang;

static DECL_INFO: LanguageInfo = LanguageInfo {
    id: "decl",
    name: "Declarations",
    version: "1.0.0",
    extensions: &["decl"],
};

fn resolve_path(sema: &mut Sema<'_>, scope: ModuleId, path: &str, span: SourceSpan) -> Type {
    let mut current = scope;
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap();
    for segment in segments {
        let Some(module_sym) = sema.lookup(current, MODULES, segment, span) else {
            return Type::Poison;
        };
        let Some(nested) = sema.graph.symbol(module_sym).nested() else {
            return Type::Poison;
        };
        current = nested;
    }
    match sema.lookup(current, VALUES, last, span) {
        Some(found) => sema.resolve(found),
        None => Type::Poison,
    }
}

impl Language for DeclLang {
    fn info(&self) -> &LanguageInfo {
        &DECL_INFO
    }

    fn parse(&self, scan: &Scan<'_>, reports: &mut Reports) -> Option<Rc<dyn Any>> {
        let mut module = None;
        let mut imports = Vec::new();
        let mut decls = Vec::new();
        let mut offset = 0;
        let mut ok = true;

        for raw in scan.text().lines() {
            let span = scan.span(offset, offset + raw.len());
            offset += raw.len() + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("module ") {
                module = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("import ") {
                imports.push((rest.trim().to_string(), span));
            } else if let Some(rest) = line.strip_prefix("let ") {
                match rest.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim();
                        let expr = if value.parse::<i64>().is_ok() {
                            Expr::Lit
                        } else {
                            Expr::Ref(value.to_string())
                        };
                        decls.push(Decl { name: name.trim().to_string(), expr, span });
                    }
                    None => {
                        reports.notify(&BAD_SYNTAX, span, "expected `let name = value`");
                        ok = false;
                    }
                }
            } else {
                reports.notify(&BAD_SYNTAX, span, format!("unrecognized line `{line}`"));
                ok = false;
            }
        }

        let Some(module) = module else {
            reports.notify(&BAD_SYNTAX, scan.whole(), "missing `module` header");
            return None;
        };
        if !ok {
            return None;
        }
        Some(Rc::new(Ast { module, imports, decls }))
    }

    fn postparse(&self, _scan: &Scan<'_>, ast: Rc<dyn Any>, units: &mut UnitRegistrar<'_>) {
        let module = ast
            .downcast_ref::<Ast>()
            .map(|ast| ast.module.clone())
            .unwrap_or_default();
        units.add_unit(UnitId::from_dotted(&module), ast);
    }

    fn forward_decls(&self, ctx: &mut UnitCtx<'_>) {
        let Some(ast) = ctx.ast::<Ast>() else { return };
        let module = ast.module.clone();
        let decls = ast.decls.clone();

        let root = ctx.graph_mut().new_root(module, SourceSpan::builtin(), TAGS);
        ctx.set_module(root);

        for decl in decls {
            let Decl { name, expr, span } = decl;
            let sym = ctx.graph_mut().open_symbol(
                name.clone(),
                span,
                SymbolKind::Value,
                Attributes::default(),
                root,
                move |sema: &mut Sema<'_>, scope, _| match &expr {
                    Expr::Lit => Type::int(),
                    Expr::Ref(path) => resolve_path(sema, scope, path, span),
                },
            );
            ctx.sema().declare(root, VALUES, &name, sym);
        }
    }

    fn process_imports(&self, ctx: &mut UnitCtx<'_>) {
        let Some(ast) = ctx.ast::<Ast>() else { return };
        let imports = ast.imports.clone();
        let Some(root) = ctx.module() else { return };

        for (path, span) in imports {
            let target = UnitId::from_dotted(&path);
            match ctx.find_unit(&target).and_then(CompileUnit::module) {
                Some(imported) => {
                    let name = target.name().to_string();
                    let sym = ctx.graph_mut().module_symbol(
                        name.clone(),
                        span,
                        Attributes::default(),
                        imported,
                    );
                    ctx.sema().declare(root, MODULES, &name, sym);
                }
                None => {
                    ctx.reports().notify(
                        &events::IMPORT_NOT_FOUND,
                        span,
                        format!("imported unit `{target}` was never registered"),
                    );
                }
            }
        }
    }

    fn compile_module(&self, ctx: &mut UnitCtx<'_>) {
        let Some(root) = ctx.module() else { return };
        let mut sema = ctx.sema();
        let symbols: Vec<SymbolId> = sema.graph.symbols_in(root, VALUES).collect();
        for id in symbols {
            sema.resolve(id);
        }
    }
}

/// A driver that parses but implements no stage hooks at all.
struct ParseOnly;

static PARSE_ONLY_INFO: LanguageInfo = LanguageInfo {
    id: "parse-only",
    name: "Parse Only",
    version: "1.0.0",
    extensions: &["po"],
};

impl Language for ParseOnly {
    fn info(&self) -> &LanguageInfo {
        &PARSE_ONLY_INFO
    }

    fn parse(&self, _scan: &Scan<'_>, _reports: &mut Reports) -> Option<Rc<dyn Any>> {
        Some(Rc::new(()))
    }

    fn postparse(&self, scan: &Scan<'_>, ast: Rc<dyn Any>, units: &mut UnitRegistrar<'_>) {
        units.add_unit(UnitId::from_dotted(scan.path()), ast);
    }
}

fn session() -> Lifetime {
    compiler::logging::init_test();
    let mut lt = Lifetime::new();
    lt.add_language(Rc::new(DeclLang));
    lt
}

fn value_of(lt: &Lifetime, unit: &str, name: &str) -> SymbolId {
    let module = lt
        .get_unit(&UnitId::from_dotted(unit))
        .and_then(CompileUnit::module)
        .unwrap();
    lt.graph().get(module, VALUES, name).unwrap()
}

#[test]
fn two_units_compile_across_an_import() {
    let mut lt = session();
    assert!(lt.parse_file("lib.decl", "module demo.lib\nlet x = 1\n"));
    assert!(lt.parse_file("main.decl", "module demo.main\nimport demo.lib\nlet y = lib.x\n"));

    lt.compile();

    assert!(!lt.reports().has_errors());
    let y = value_of(&lt, "demo.main", "y");
    assert_eq!(lt.graph().symbol(y).state(), SymbolState::Closed);
    assert_eq!(lt.graph().symbol(y).resolved(), Some(&Type::int()));
}

#[test]
fn duplicate_declaration_keeps_first_and_continues() {
    let mut lt = session();
    assert!(lt.parse_file("m.decl", "module m\nlet a = 1\nlet a = 2\nlet b = a\n"));

    lt.compile();

    assert_eq!(lt.reports().count_of(&events::REDEFINITION), 1);
    let a = value_of(&lt, "m", "a");
    let b = value_of(&lt, "m", "b");
    assert_eq!(lt.graph().symbol(a).state(), SymbolState::Closed);
    assert_eq!(lt.graph().symbol(b).resolved(), Some(&Type::int()));
}

#[test]
fn cyclic_definitions_poison_only_the_cycle() {
    let mut lt = session();
    assert!(lt.parse_file("m.decl", "module m\nlet a = b\nlet b = a\nlet c = 1\n"));

    lt.compile();

    assert_eq!(lt.reports().count_of(&events::CYCLIC_DEPENDENCY), 1);
    assert_eq!(lt.graph().symbol(value_of(&lt, "m", "a")).state(), SymbolState::Error);
    assert_eq!(lt.graph().symbol(value_of(&lt, "m", "b")).state(), SymbolState::Error);
    assert_eq!(lt.graph().symbol(value_of(&lt, "m", "c")).state(), SymbolState::Closed);
}

#[test]
fn missing_import_is_reported_but_unit_still_compiles() {
    let mut lt = session();
    assert!(lt.parse_file("m.decl", "module m\nimport no.such\nlet a = 1\n"));

    lt.compile();

    assert_eq!(lt.reports().count_of(&events::IMPORT_NOT_FOUND), 1);
    assert_eq!(lt.graph().symbol(value_of(&lt, "m", "a")).state(), SymbolState::Closed);
}

#[test]
fn units_fail_independently() {
    let mut lt = session();
    assert!(lt.parse_file("bad.decl", "module bad\nlet a = b\nlet b = a\n"));
    assert!(lt.parse_file("good.decl", "module good\nlet x = 1\nlet y = x\n"));

    lt.compile();

    assert!(lt.reports().has_errors());
    assert_eq!(lt.graph().symbol(value_of(&lt, "good", "x")).state(), SymbolState::Closed);
    assert_eq!(lt.graph().symbol(value_of(&lt, "good", "y")).state(), SymbolState::Closed);
}

#[test]
fn parse_error_registers_no_unit() {
    let mut lt = session();
    assert!(!lt.parse_file("m.decl", "module m\nlet broken\n"));

    assert_eq!(lt.unit_count(), 0);
    assert_eq!(lt.reports().count_of(&BAD_SYNTAX), 1);
}

#[test]
fn missing_module_header_is_rejected() {
    let mut lt = session();
    assert!(!lt.parse_file("m.decl", "let a = 1\n"));
    assert_eq!(lt.unit_count(), 0);
    assert_eq!(lt.reports().count_of(&BAD_SYNTAX), 1);
}

#[test]
fn driver_without_stage_hooks_is_skipped() {
    compiler::logging::init_test();
    let mut lt = Lifetime::new();
    lt.add_language(Rc::new(ParseOnly));

    assert!(lt.parse_file("anything.po", ""));
    lt.compile();

    assert!(lt.reports().is_empty());
    assert_eq!(lt.graph().module_count(), 0);
    assert_eq!(lt.graph().symbol_count(), 0);
}

#[test]
fn undefined_reference_is_reported_at_its_use() {
    let mut lt = session();
    assert!(lt.parse_file("m.decl", "module m\nlet a = ghost\n"));

    lt.compile();

    assert_eq!(lt.reports().count_of(&events::UNDEFINED_SYMBOL), 1);
    let a = value_of(&lt, "m", "a");
    // The symbol still closes; its type is poisoned, not its state.
    assert_eq!(lt.graph().symbol(a).state(), SymbolState::Closed);
    assert_eq!(lt.graph().symbol(a).resolved(), Some(&Type::Poison));
}
