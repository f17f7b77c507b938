//! Deferred symbol resolution: the cookie stack and the resolve engine
//!
//! Forward declaration leaves symbols `Open` with a resolver attached; the
//! engine here runs those resolvers on demand. Resolvers may request the
//! types of other symbols, recursing through [`Sema::resolve`], and the
//! [`Cookie`] — the stack of symbols currently mid-resolution — is what
//! turns a circular definition into a reported diagnostic instead of
//! unbounded recursion.
//!
//! All shared state (graph, cookie, reports) is threaded explicitly through
//! the [`Sema`] bundle; there is no global anywhere in the engine, so tests
//! construct a fresh bundle and drive it directly.

use log::{debug, trace};
use source_map::SourceSpan;

use crate::events;
use crate::graph::{ModuleId, SymbolGraph, SymbolId, SymbolState, Tag};
use crate::types::Type;

/// The stack of symbols whose resolvers are currently running. Owned by the
/// lifetime, empty between resolutions.
#[derive(Debug, Default)]
pub struct Cookie {
    stack: Vec<SymbolId>,
}

impl Cookie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.stack.contains(&id)
    }

    fn position(&self, id: SymbolId) -> Option<usize> {
        self.stack.iter().position(|&entry| entry == id)
    }

    /// The cycle segment: everything on the stack from `id`'s frame upward.
    fn cycle_from(&self, id: SymbolId) -> &[SymbolId] {
        match self.position(id) {
            Some(index) => &self.stack[index..],
            None => &[],
        }
    }

    /// The symbol whose resolver is currently running, if any.
    pub fn top(&self) -> Option<SymbolId> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    fn push(&mut self, id: SymbolId) {
        self.stack.push(id);
    }

    fn pop(&mut self) {
        self.stack.pop();
    }
}

/// Driver callback that finishes one open declaration. Implemented for any
/// matching closure, so drivers capture whatever AST payload they need by
/// value instead of smuggling it through an untyped pointer.
pub trait ResolveSymbol {
    /// Produce the symbol's type, resolving in `scope`. May recurse into
    /// [`Sema::resolve`] for dependencies.
    fn resolve(&self, sema: &mut Sema<'_>, scope: ModuleId, symbol: SymbolId) -> Type;
}

impl<F> ResolveSymbol for F
where
    F: Fn(&mut Sema<'_>, ModuleId, SymbolId) -> Type,
{
    fn resolve(&self, sema: &mut Sema<'_>, scope: ModuleId, symbol: SymbolId) -> Type {
        self(sema, scope, symbol)
    }
}

/// The borrow bundle threaded through every resolution: the symbol graph,
/// the in-progress stack, and the diagnostics sink.
pub struct Sema<'a> {
    pub graph: &'a mut SymbolGraph,
    pub cookie: &'a mut Cookie,
    pub reports: &'a mut diagnostics::Reports,
}

impl Sema<'_> {
    /// Resolve a symbol to its type.
    ///
    /// Idempotent: closed symbols return their stored type with no side
    /// effects, poisoned symbols return [`Type::Poison`] without reporting
    /// again, and a resolver is invoked at most once per symbol. A request
    /// for a symbol already on the cookie is a cyclic dependency: it is
    /// reported once, naming the requested symbol and its requester, and the
    /// requested symbol is poisoned.
    pub fn resolve(&mut self, id: SymbolId) -> Type {
        match self.graph.symbol(id).state() {
            SymbolState::Closed => {
                return self
                    .graph
                    .symbol(id)
                    .resolved()
                    .cloned()
                    .unwrap_or(Type::Poison);
            }
            SymbolState::Error => return Type::Poison,
            SymbolState::Open | SymbolState::Resolving => {}
        }

        if self.cookie.contains(id) {
            self.report_cycle(id);
            // Every symbol between the re-requested frame and the top of the
            // stack is on the cycle; poison them all so their unwinding
            // frames discard the resolver results. Symbols below the cycle
            // still close normally, carrying the poison type.
            let cycle: Vec<SymbolId> = self.cookie.cycle_from(id).to_vec();
            for member in cycle {
                self.graph.symbol_mut(member).poison();
            }
            return Type::Poison;
        }

        let Some(pending) = self.graph.symbol_mut(id).begin_resolve() else {
            // Open symbols always carry a resolver; reaching this means the
            // symbol was constructed outside the open/declare API.
            self.graph.symbol_mut(id).poison();
            return Type::Poison;
        };

        trace!(
            "resolving `{}` (depth {})",
            self.graph.symbol(id).name(),
            self.cookie.depth()
        );

        self.cookie.push(id);
        let ty = pending.run.resolve(self, pending.scope, id);
        self.cookie.pop();

        let symbol = self.graph.symbol_mut(id);
        if symbol.state() == SymbolState::Resolving {
            // Closed even if the resolver reported fatal diagnostics: the
            // pipeline keeps going on a best-effort type.
            symbol.close(ty.clone());
            ty
        } else {
            // Poisoned mid-flight by cycle detection; the resolver's value
            // is discarded.
            Type::Poison
        }
    }

    fn report_cycle(&mut self, id: SymbolId) {
        let name = self.graph.symbol(id).name().to_string();
        let node = self.graph.symbol(id).node();
        debug!("cyclic dependency detected while resolving `{name}`");

        let event = self.reports.notify(
            &events::CYCLIC_DEPENDENCY,
            node,
            format!("cyclic dependency while resolving `{name}`"),
        );
        if let Some(requester) = self.cookie.top() {
            let requester = self.graph.symbol(requester);
            self.reports.append(
                event,
                requester.node(),
                format!("requested while resolving `{}`", requester.name()),
            );
        }
    }

    /// Look up a name through the scope chain. Pure; no reporting.
    pub fn find(&self, module: ModuleId, tag: Tag, name: &str) -> Option<SymbolId> {
        self.graph.get(module, tag, name)
    }

    /// Look up a name and report `UndefinedSymbol` at `node` on a miss.
    pub fn lookup(
        &mut self,
        module: ModuleId,
        tag: Tag,
        name: &str,
        node: SourceSpan,
    ) -> Option<SymbolId> {
        let found = self.graph.get(module, tag, name);
        if found.is_none() {
            self.reports.notify(
                &events::UNDEFINED_SYMBOL,
                node,
                format!("unresolved reference to `{name}`"),
            );
        }
        found
    }

    /// Insert a symbol into a scope, reporting `Redefinition` with both
    /// declaration nodes when the slot is taken. Returns the surviving
    /// symbol (the incumbent on conflict).
    pub fn declare(
        &mut self,
        module: ModuleId,
        tag: Tag,
        name: &str,
        symbol: SymbolId,
    ) -> SymbolId {
        match self.graph.set(module, tag, name, symbol) {
            None => symbol,
            Some(existing) => {
                let new_node = self.graph.symbol(symbol).node();
                let prior_node = self.graph.symbol(existing).node();
                let event = self.reports.notify(
                    &events::REDEFINITION,
                    new_node,
                    format!("`{name}` is already declared in this scope"),
                );
                self.reports
                    .append(event, prior_node, "previously declared here");
                existing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::graph::{Attributes, SymbolKind};
    use diagnostics::Reports;

    const VALUES: Tag = 0;

    struct Fixture {
        graph: SymbolGraph,
        cookie: Cookie,
        reports: Reports,
        root: ModuleId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut graph = SymbolGraph::new();
            let root = graph.new_root("test", SourceSpan::builtin(), 1);
            Self { graph, cookie: Cookie::new(), reports: Reports::new(), root }
        }

        fn sema(&mut self) -> Sema<'_> {
            Sema {
                graph: &mut self.graph,
                cookie: &mut self.cookie,
                reports: &mut self.reports,
            }
        }

        fn open<R: ResolveSymbol + 'static>(&mut self, name: &str, resolver: R) -> SymbolId {
            let root = self.root;
            let id = self.graph.open_symbol(
                name,
                SourceSpan::builtin(),
                SymbolKind::Value,
                Attributes::default(),
                root,
                resolver,
            );
            self.graph.set(root, VALUES, name, id);
            id
        }
    }

    #[test]
    fn resolver_runs_at_most_once() {
        let mut fx = Fixture::new();
        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);
        let id = fx.open("a", move |_: &mut Sema<'_>, _, _| {
            counter.set(counter.get() + 1);
            Type::int()
        });

        let first = fx.sema().resolve(id);
        let second = fx.sema().resolve(id);

        assert_eq!(first, Type::int());
        assert_eq!(second, Type::int());
        assert_eq!(calls.get(), 1);
        assert!(fx.cookie.is_empty());
        assert!(fx.reports.is_empty());
    }

    #[test]
    fn two_symbol_cycle_terminates() {
        let mut fx = Fixture::new();
        let a = fx.open("a", |sema: &mut Sema<'_>, scope, _| {
            let b = sema.find(scope, VALUES, "b").unwrap();
            sema.resolve(b)
        });
        let b = fx.open("b", |sema: &mut Sema<'_>, scope, _| {
            let a = sema.find(scope, VALUES, "a").unwrap();
            sema.resolve(a)
        });

        let ty = fx.sema().resolve(a);

        assert!(ty.is_poison());
        assert_eq!(fx.reports.count_of(&events::CYCLIC_DEPENDENCY), 1);
        assert!(fx.cookie.is_empty());
        assert_eq!(fx.graph.symbol(a).state(), SymbolState::Error);
        assert_eq!(fx.graph.symbol(b).state(), SymbolState::Error);
    }

    #[test]
    fn self_cycle_terminates() {
        let mut fx = Fixture::new();
        let a = fx.open("a", |sema: &mut Sema<'_>, scope, _| {
            let me = sema.find(scope, VALUES, "a").unwrap();
            sema.resolve(me)
        });

        assert!(fx.sema().resolve(a).is_poison());
        assert_eq!(fx.reports.count_of(&events::CYCLIC_DEPENDENCY), 1);
        assert_eq!(fx.graph.symbol(a).state(), SymbolState::Error);
    }

    #[test]
    fn long_cycle_depth_is_bounded() {
        let mut fx = Fixture::new();
        let count = 512;
        let mut ids = Vec::new();
        for index in 0..count {
            let next = format!("s{}", (index + 1) % count);
            let id = fx.open(&format!("s{index}"), move |sema: &mut Sema<'_>, scope, _| {
                let next = sema.find(scope, VALUES, &next).unwrap();
                sema.resolve(next)
            });
            ids.push(id);
        }

        assert!(fx.sema().resolve(ids[0]).is_poison());
        assert_eq!(fx.reports.count_of(&events::CYCLIC_DEPENDENCY), 1);
        assert!(fx.cookie.is_empty());
    }

    #[test]
    fn dependency_chain_resolves_in_order() {
        let mut fx = Fixture::new();
        let a = fx.open("a", |_: &mut Sema<'_>, _, _| Type::Bool);
        let b = fx.open("b", |sema: &mut Sema<'_>, scope, _| {
            let a = sema.find(scope, VALUES, "a").unwrap();
            sema.resolve(a)
        });

        assert_eq!(fx.sema().resolve(b), Type::Bool);
        assert_eq!(fx.graph.symbol(a).state(), SymbolState::Closed);
        assert_eq!(fx.graph.symbol(b).state(), SymbolState::Closed);
    }

    #[test]
    fn dependent_outside_the_cycle_still_closes() {
        let mut fx = Fixture::new();
        let x = fx.open("x", |sema: &mut Sema<'_>, scope, _| {
            let a = sema.find(scope, VALUES, "a").unwrap();
            sema.resolve(a)
        });
        let a = fx.open("a", |sema: &mut Sema<'_>, scope, _| {
            let b = sema.find(scope, VALUES, "b").unwrap();
            sema.resolve(b)
        });
        let b = fx.open("b", |sema: &mut Sema<'_>, scope, _| {
            let a = sema.find(scope, VALUES, "a").unwrap();
            sema.resolve(a)
        });

        let ty = fx.sema().resolve(x);

        assert!(ty.is_poison());
        assert_eq!(fx.graph.symbol(a).state(), SymbolState::Error);
        assert_eq!(fx.graph.symbol(b).state(), SymbolState::Error);
        // x depends on the cycle but is not part of it: it closes, carrying
        // the poison type.
        assert_eq!(fx.graph.symbol(x).state(), SymbolState::Closed);
        assert_eq!(fx.graph.symbol(x).resolved(), Some(&Type::Poison));
    }

    #[test]
    fn poisoned_symbol_does_not_rereport() {
        let mut fx = Fixture::new();
        let a = fx.open("a", |sema: &mut Sema<'_>, scope, _| {
            let me = sema.find(scope, VALUES, "a").unwrap();
            sema.resolve(me)
        });

        fx.sema().resolve(a);
        let before = fx.reports.len();
        assert!(fx.sema().resolve(a).is_poison());
        assert_eq!(fx.reports.len(), before);
    }

    #[test]
    fn declare_reports_redefinition_with_both_nodes() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let first = fx.graph.declare_symbol(
            "a",
            SourceSpan::builtin(),
            SymbolKind::Value,
            Attributes::default(),
            Type::int(),
        );
        let second = fx.graph.declare_symbol(
            "a",
            SourceSpan::builtin(),
            SymbolKind::Value,
            Attributes::default(),
            Type::Bool,
        );

        let mut sema = fx.sema();
        assert_eq!(sema.declare(root, VALUES, "a", first), first);
        assert_eq!(sema.declare(root, VALUES, "a", second), first);

        assert_eq!(fx.reports.count_of(&events::REDEFINITION), 1);
        let event = fx.reports.iter().next().unwrap();
        assert_eq!(event.labels.len(), 1);
        assert_eq!(fx.graph.get(root, VALUES, "a"), Some(first));
    }

    #[test]
    fn lookup_reports_undefined() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let mut sema = fx.sema();
        assert!(sema.lookup(root, VALUES, "ghost", SourceSpan::builtin()).is_none());
        assert_eq!(fx.reports.count_of(&events::UNDEFINED_SYMBOL), 1);
    }
}
