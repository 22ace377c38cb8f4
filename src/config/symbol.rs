use std::cell::{Cell, RefCell};
use std::fmt;

use derive_more::{From, TryInto};
use indexmap::IndexSet;

use crate::config::choice::ChoiceId;
use crate::config::menu::Item;
use crate::config::SourceLoc;
use crate::expr::Expr;
use crate::tristate::Tristate;

/// Stable arena index of a symbol. The three reserved constants `n`, `m`,
/// `y` always occupy the first three slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolType {
    /// Referenced but never defined, or defined without a type so far. An
    /// unknown symbol's value is its own name.
    Unknown,
    Bool,
    Tristate,
    String,
    Int,
    Hex,
}

/// A computed or user-assigned value. `Int`/`Hex` keep the textual form so
/// that hex markers and padding survive a round trip.
#[derive(Clone, Debug, PartialEq, Eq, From, TryInto)]
#[try_into(owned, ref)]
pub enum Value {
    Tristate(Tristate),
    String(String),
    #[from(ignore)]
    #[try_into(ignore)]
    Int(String),
    #[from(ignore)]
    #[try_into(ignore)]
    Hex(String),
}

impl Value {
    pub fn as_tristate(&self) -> Option<Tristate> {
        match self {
            Value::Tristate(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Value::Tristate(t) => t.name(),
            Value::String(s) | Value::Int(s) | Value::Hex(s) => s,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conditional prompt: the text a front end would display, plus the
/// expression gating its visibility.
#[derive(Clone, Debug)]
pub struct Prompt {
    pub text: String,
    pub condition: Expr,
}

/// `default <value> if <condition>`, evaluated in declaration order.
#[derive(Clone, Debug)]
pub struct SymbolDefault {
    pub value: Expr,
    pub condition: Expr,
}

/// `range <low> <high> if <condition>` on an int/hex symbol. Bounds are
/// atoms wrapped in expressions so they can reference other symbols.
#[derive(Clone, Debug)]
pub struct Range {
    pub low: Expr,
    pub high: Expr,
    pub condition: Expr,
}

pub struct Symbol {
    pub(crate) name: String,
    pub(crate) typ: Cell<SymbolType>,
    pub(crate) prompts: Vec<Prompt>,
    pub(crate) defaults: Vec<SymbolDefault>,
    /// `select`/`imply` clauses declared on *this* symbol: (target, gate).
    pub(crate) selects: Vec<(SymbolId, Expr)>,
    pub(crate) implies: Vec<(SymbolId, Expr)>,
    pub(crate) ranges: Vec<Range>,
    /// Extra dependencies contributed by enclosing menus and `if` blocks.
    pub(crate) deps: Vec<Expr>,
    /// OR over `selector && gate` of every select targeting this symbol,
    /// maintained eagerly as selects are declared.
    pub(crate) rev_dep: Expr,
    /// Same for `imply`.
    pub(crate) weak_rev_dep: Expr,
    pub(crate) choice: Option<ChoiceId>,
    pub(crate) parent: Option<Item>,
    pub(crate) user_value: Option<Value>,
    pub(crate) def_locations: Vec<SourceLoc>,
    pub(crate) ref_locations: Vec<SourceLoc>,
    pub(crate) constant: bool,
    pub(crate) from_env: bool,
    pub(crate) special: bool,
    pub(crate) allnoconfig_y: bool,

    // Caches. Value and visibility are invalidated through the reverse
    // dependency index; the dependent set is structural and survives value
    // mutation.
    pub(crate) cached_value: RefCell<Option<Value>>,
    pub(crate) cached_visibility: Cell<Option<Tristate>>,
    /// Stamped with the structure generation it was computed under.
    pub(crate) cached_dependents: RefCell<Option<(u64, IndexSet<SymbolId>)>>,
    pub(crate) write_to_conf: Cell<bool>,
    pub(crate) computing: Cell<bool>,
}

impl Symbol {
    pub(crate) fn new(name: String) -> Symbol {
        Symbol {
            name,
            typ: Cell::new(SymbolType::Unknown),
            prompts: Vec::new(),
            defaults: Vec::new(),
            selects: Vec::new(),
            implies: Vec::new(),
            ranges: Vec::new(),
            deps: Vec::new(),
            rev_dep: Expr::symbol(crate::config::SYM_N),
            weak_rev_dep: Expr::symbol(crate::config::SYM_N),
            choice: None,
            parent: None,
            user_value: None,
            def_locations: Vec::new(),
            ref_locations: Vec::new(),
            constant: false,
            from_env: false,
            special: false,
            allnoconfig_y: false,
            cached_value: RefCell::new(None),
            cached_visibility: Cell::new(None),
            cached_dependents: RefCell::new(None),
            write_to_conf: Cell::new(false),
            computing: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type; choice members may effectively inherit one from
    /// the choice instead, see [`crate::config::Config::effective_type`].
    pub fn declared_type(&self) -> SymbolType {
        self.typ.get()
    }

    pub fn user_value(&self) -> Option<&Value> {
        self.user_value.as_ref()
    }

    pub fn is_defined(&self) -> bool {
        self.constant || !self.def_locations.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    pub fn is_from_environment(&self) -> bool {
        self.from_env
    }

    pub fn is_allnoconfig_y(&self) -> bool {
        self.allnoconfig_y
    }

    /// The enclosing choice, if any. Note that structural containment is
    /// not the same as being part of the choice's mutual-exclusion set; see
    /// [`crate::config::Config::is_choice_symbol`].
    pub fn choice(&self) -> Option<ChoiceId> {
        self.choice
    }

    pub fn def_locations(&self) -> &[SourceLoc] {
        &self.def_locations
    }

    pub fn ref_locations(&self) -> &[SourceLoc] {
        &self.ref_locations
    }

    pub(crate) fn invalidate(&self) {
        if self.constant {
            return;
        }
        self.cached_value.replace(None);
        self.cached_visibility.set(None);
        self.write_to_conf.set(false);
    }
}
