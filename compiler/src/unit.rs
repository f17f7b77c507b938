//! Compile units: one parsed source file and its resolved module
//!
//! A unit pairs a driver-produced AST — opaque to the core, held behind
//! `Rc<dyn Any>` — with the module the driver builds for it during forward
//! declaration. Units are keyed by a dotted path ([`UnitId`]) in the
//! lifetime's registry; paths compare structurally, segment by segment.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::graph::ModuleId;
use crate::language::LanguageId;

/// Dotted path identifying a compile unit, e.g. `math.vec`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UnitId {
    segments: SmallVec<[String; 4]>,
}

impl UnitId {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Parse a `.`-separated path. Empty segments are dropped.
    pub fn from_dotted(path: &str) -> Self {
        Self::new(path.split('.').filter(|segment| !segment.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final path segment, used as the unit's short name.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// One compiled source unit.
pub struct CompileUnit {
    id: UnitId,
    language: LanguageId,
    ast: Rc<dyn Any>,
    module: Option<ModuleId>,
}

impl CompileUnit {
    pub(crate) fn new(id: UnitId, language: LanguageId, ast: Rc<dyn Any>) -> Self {
        Self { id, language, ast, module: None }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn language(&self) -> LanguageId {
        self.language
    }

    /// The driver's AST, downcast to its concrete type. The core itself
    /// never inspects it.
    pub fn ast<T: 'static>(&self) -> Option<&T> {
        self.ast.downcast_ref()
    }

    pub(crate) fn ast_handle(&self) -> &Rc<dyn Any> {
        &self.ast
    }

    /// The unit's root module; `Some` once forward declaration has run.
    pub fn module(&self) -> Option<ModuleId> {
        self.module
    }

    pub(crate) fn set_module(&mut self, module: ModuleId) {
        self.module = Some(module);
    }
}

impl fmt::Debug for CompileUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileUnit")
            .field("id", &self.id)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}
