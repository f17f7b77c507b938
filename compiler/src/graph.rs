//! Arena-owned symbol graph: tagged scopes and declaration state machines
//!
//! All modules and symbols for one compilation run live in a single
//! [`SymbolGraph`] owned by the lifetime. [`ModuleId`] and [`SymbolId`] are
//! indices into it, so parent links and cross-module references can never
//! dangle: a module or symbol lives exactly as long as the graph does.
//!
//! A module is a scope partitioned into tags — small per-language categories
//! (values, types, procedures, modules) that keep unrelated namespaces from
//! colliding. Within one tag of one module a name maps to at most one
//! symbol, and insertion is first-wins: the incumbent survives and the
//! caller reports the redefinition with both declaration sites.

use fxhash::FxHashMap;
use source_map::SourceSpan;

use crate::resolve::ResolveSymbol;
use crate::types::Type;

/// Index of a module in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Index of a symbol in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Namespace tag within a module. Each driver defines its own small tag
/// enum and creates its modules with the matching tag count.
pub type Tag = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// A per-unit or runtime root; has no parent.
    Root,
    /// A nested scope created inside another module.
    Namespace,
}

/// What category of declaration a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Value,
    Type,
    Function,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Visible only within its own unit.
    Internal,
    /// Exported for other units and backends.
    Export,
    /// Provided by a foreign unit or the host environment.
    Import,
    /// Program entry point.
    Entry,
}

/// Visibility and linkage carried by every symbol. Opaque to the core;
/// drivers and backends give it meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub visibility: Visibility,
    pub linkage: Linkage,
}

impl Default for Attributes {
    fn default() -> Self {
        Self { visibility: Visibility::Private, linkage: Linkage::Internal }
    }
}

impl Attributes {
    pub fn exported() -> Self {
        Self { visibility: Visibility::Public, linkage: Linkage::Export }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// Resolution state of a declaration.
///
/// A symbol passes through `Open` and `Resolving` at most once each;
/// `Closed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolState {
    /// Forward-declared; the resolver has not run yet.
    Open,
    /// The resolver is currently on the resolution stack.
    Resolving,
    /// Fully resolved; the symbol carries its type.
    Closed,
    /// Resolution failed (cycle or resolver fault); the symbol is poison.
    Error,
}

/// The deferred work attached to an open symbol: the scope to resolve in
/// and the driver callback that finishes the declaration.
pub struct Pending {
    pub scope: ModuleId,
    pub run: Box<dyn ResolveSymbol>,
}

/// One declaration and its resolution state machine.
pub struct SymbolData {
    name: String,
    node: SourceSpan,
    kind: SymbolKind,
    attribs: Attributes,
    state: SymbolState,
    resolved: Option<Type>,
    pending: Option<Pending>,
    /// For module-kind symbols, the scope the symbol names.
    nested: Option<ModuleId>,
}

impl SymbolData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> SourceSpan {
        self.node
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn attribs(&self) -> Attributes {
        self.attribs
    }

    pub fn state(&self) -> SymbolState {
        self.state
    }

    /// The resolved type; `Some` exactly when the state is `Closed`.
    pub fn resolved(&self) -> Option<&Type> {
        self.resolved.as_ref()
    }

    pub fn nested(&self) -> Option<ModuleId> {
        self.nested
    }

    pub fn is_open(&self) -> bool {
        self.state == SymbolState::Open
    }

    /// Move `Open -> Resolving`, handing the pending resolver to the engine.
    /// Returns `None` if the symbol is not open.
    pub(crate) fn begin_resolve(&mut self) -> Option<Pending> {
        if self.state != SymbolState::Open {
            return None;
        }
        self.state = SymbolState::Resolving;
        self.pending.take()
    }

    /// Move `Resolving -> Closed` with the produced type.
    pub(crate) fn close(&mut self, ty: Type) {
        self.state = SymbolState::Closed;
        self.resolved = Some(ty);
    }

    /// Terminal failure: drop any pending resolver, carry no type.
    pub(crate) fn poison(&mut self) {
        self.state = SymbolState::Error;
        self.pending = None;
        self.resolved = None;
    }
}

impl std::fmt::Debug for SymbolData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolData")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

/// A tagged scope. The parent link is fixed at creation and never
/// reassigned, which keeps parent chains acyclic by construction.
#[derive(Debug)]
pub struct ModuleData {
    kind: ModuleKind,
    name: String,
    node: SourceSpan,
    parent: Option<ModuleId>,
    tags: Vec<FxHashMap<String, SymbolId>>,
}

impl ModuleData {
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> SourceSpan {
        self.node
    }

    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}

/// Arena for all modules and symbols in one compilation run.
#[derive(Default)]
pub struct SymbolGraph {
    modules: Vec<ModuleData>,
    symbols: Vec<SymbolData>,
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parentless root module (per-unit or runtime scope).
    pub fn new_root(
        &mut self,
        name: impl Into<String>,
        node: SourceSpan,
        tag_count: usize,
    ) -> ModuleId {
        self.push_module(ModuleKind::Root, name.into(), node, None, tag_count)
    }

    /// Create a scope nested inside `parent`.
    pub fn new_module(
        &mut self,
        parent: ModuleId,
        name: impl Into<String>,
        node: SourceSpan,
        tag_count: usize,
    ) -> ModuleId {
        self.push_module(ModuleKind::Namespace, name.into(), node, Some(parent), tag_count)
    }

    fn push_module(
        &mut self,
        kind: ModuleKind,
        name: String,
        node: SourceSpan,
        parent: Option<ModuleId>,
        tag_count: usize,
    ) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        let tags = (0..tag_count).map(|_| FxHashMap::default()).collect();
        self.modules.push(ModuleData { kind, name, node, parent, tags });
        id
    }

    pub fn module(&self, id: ModuleId) -> &ModuleData {
        &self.modules[id.0 as usize]
    }

    pub fn symbol(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.0 as usize]
    }

    pub(crate) fn symbol_mut(&mut self, id: SymbolId) -> &mut SymbolData {
        &mut self.symbols[id.0 as usize]
    }

    /// Look up `name` under `tag`, walking the parent chain on local misses.
    /// Pure; never mutates.
    pub fn get(&self, module: ModuleId, tag: Tag, name: &str) -> Option<SymbolId> {
        let mut current = Some(module);
        while let Some(id) = current {
            if let Some(found) = self.get_local(id, tag, name) {
                return Some(found);
            }
            current = self.module(id).parent();
        }
        None
    }

    /// Look up `name` in `module` alone, without walking parents.
    pub fn get_local(&self, module: ModuleId, tag: Tag, name: &str) -> Option<SymbolId> {
        self.module(module).tags.get(tag)?.get(name).copied()
    }

    /// Insert `symbol` under `(tag, name)`. First-wins: if the slot is
    /// occupied the incumbent is returned unchanged and nothing is inserted;
    /// the caller reports the redefinition with both declaration nodes.
    pub fn set(
        &mut self,
        module: ModuleId,
        tag: Tag,
        name: impl Into<String>,
        symbol: SymbolId,
    ) -> Option<SymbolId> {
        let name = name.into();
        if let Some(existing) = self.get_local(module, tag, &name) {
            return Some(existing);
        }
        let data = &mut self.modules[module.0 as usize];
        if let Some(slot) = data.tags.get_mut(tag) {
            slot.insert(name, symbol);
        }
        None
    }

    /// All symbols registered under one tag of one module.
    pub fn symbols_in(&self, module: ModuleId, tag: Tag) -> impl Iterator<Item = SymbolId> + '_ {
        self.module(module)
            .tags
            .get(tag)
            .into_iter()
            .flat_map(|slot| slot.values().copied())
    }

    /// Forward-declare a symbol: created `Open` with its resolver attached.
    pub fn open_symbol<R>(
        &mut self,
        name: impl Into<String>,
        node: SourceSpan,
        kind: SymbolKind,
        attribs: Attributes,
        scope: ModuleId,
        resolver: R,
    ) -> SymbolId
    where
        R: ResolveSymbol + 'static,
    {
        self.push_symbol(SymbolData {
            name: name.into(),
            node,
            kind,
            attribs,
            state: SymbolState::Open,
            resolved: None,
            pending: Some(Pending { scope, run: Box::new(resolver) }),
            nested: None,
        })
    }

    /// Declare a symbol whose type is already known; created `Closed`.
    pub fn declare_symbol(
        &mut self,
        name: impl Into<String>,
        node: SourceSpan,
        kind: SymbolKind,
        attribs: Attributes,
        ty: Type,
    ) -> SymbolId {
        self.push_symbol(SymbolData {
            name: name.into(),
            node,
            kind,
            attribs,
            state: SymbolState::Closed,
            resolved: Some(ty),
            pending: None,
            nested: None,
        })
    }

    /// Declare a module-kind symbol naming `nested`; created `Closed`.
    pub fn module_symbol(
        &mut self,
        name: impl Into<String>,
        node: SourceSpan,
        attribs: Attributes,
        nested: ModuleId,
    ) -> SymbolId {
        self.push_symbol(SymbolData {
            name: name.into(),
            node,
            kind: SymbolKind::Module,
            attribs,
            state: SymbolState::Closed,
            resolved: Some(Type::Unit),
            pending: None,
            nested: Some(nested),
        })
    }

    fn push_symbol(&mut self, data: SymbolData) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(data);
        id
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

impl std::fmt::Debug for SymbolGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolGraph")
            .field("modules", &self.modules.len())
            .field("symbols", &self.symbols.len())
            .finish()
    }
}
