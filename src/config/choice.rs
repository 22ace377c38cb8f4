use std::cell::{Cell, RefCell};

use crate::config::menu::Item;
use crate::config::symbol::{Prompt, SymbolId, SymbolType};
use crate::config::SourceLoc;
use crate::expr::Expr;
use crate::tristate::Tristate;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChoiceId(pub(crate) u32);

impl ChoiceId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// `default <member> if <condition>` on a choice; first true condition wins.
#[derive(Clone, Debug)]
pub struct ChoiceDefault {
    pub member: SymbolId,
    pub condition: Expr,
}

pub struct Choice {
    pub(crate) name: Option<String>,
    /// Declared type, or `Unknown` until inferred from the first typed
    /// member. Bound once resolved.
    pub(crate) typ: Cell<SymbolType>,
    pub(crate) optional: bool,
    pub(crate) prompts: Vec<Prompt>,
    pub(crate) defaults: Vec<ChoiceDefault>,
    pub(crate) deps: Vec<Expr>,
    /// All structural children in declaration order (symbols and any
    /// comments the front end put inside the block).
    pub(crate) items: Vec<Item>,
    /// Symbol children in declaration order, including "weird" members that
    /// are excluded from the mutual-exclusion set.
    pub(crate) members: Vec<SymbolId>,
    pub(crate) parent: Option<Item>,
    pub(crate) def_locations: Vec<SourceLoc>,

    pub(crate) user_selection: Option<SymbolId>,
    pub(crate) user_mode: Option<Tristate>,

    /// Members actually participating in mutual exclusion; stamped with the
    /// structure generation it was computed under.
    pub(crate) actual_members: RefCell<Option<(u64, Vec<SymbolId>)>>,
    pub(crate) cached_visibility: Cell<Option<Tristate>>,
    pub(crate) cached_mode: Cell<Option<Tristate>>,
    pub(crate) cached_selection: Cell<Option<Option<SymbolId>>>,
}

impl Choice {
    pub(crate) fn new(name: Option<String>, typ: SymbolType, optional: bool) -> Choice {
        Choice {
            name,
            typ: Cell::new(typ),
            optional,
            prompts: Vec::new(),
            defaults: Vec::new(),
            deps: Vec::new(),
            items: Vec::new(),
            members: Vec::new(),
            parent: None,
            def_locations: Vec::new(),
            user_selection: None,
            user_mode: None,
            actual_members: RefCell::new(None),
            cached_visibility: Cell::new(None),
            cached_mode: Cell::new(None),
            cached_selection: Cell::new(None),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn def_locations(&self) -> &[SourceLoc] {
        &self.def_locations
    }

    pub(crate) fn invalidate(&self) {
        self.cached_visibility.set(None);
        self.cached_mode.set(None);
        self.cached_selection.set(None);
    }
}
