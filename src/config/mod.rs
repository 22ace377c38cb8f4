//! The symbol/choice/menu graph and its evaluation semantics.
//!
//! A `Config` owns every entity of one configuration universe in arenas and
//! hands out copyable ids; parent/child and reverse-dependency links are
//! plain ids, so traversal code can walk back-references freely. The front
//! end (out of scope here) builds the graph once through the `define_*` /
//! `add_*` surface; afterwards queries evaluate lazily against caches that
//! are invalidated through the reverse-dependency index on every user-value
//! mutation.

use std::cell::{Cell, RefCell};

use fxhash::FxHashMap;
use itertools::Itertools;
use scopeguard::guard;
use tracing::warn;

use crate::config::choice::{Choice, ChoiceDefault, ChoiceId};
use crate::config::errors::{ConfigError, ConfigResult};
use crate::config::menu::{Comment, CommentId, Item, Menu, MenuId};
use crate::config::symbol::{
    Prompt, Range, Symbol, SymbolDefault, SymbolId, SymbolType, Value,
};
use crate::expr::evaluate::Evaluate;
use crate::expr::{parse_tokens, Atom, Expr, ParseOptions};
use crate::lexer::token::Token;
use crate::lexer::tokenize;
use crate::tristate::Tristate;

pub mod choice;
pub mod dependencies;
pub mod errors;
pub mod menu;
pub mod symbol;

#[cfg(test)]
mod tests;

/// Where an entity was defined or referenced in the description source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: u32) -> SourceLoc {
        SourceLoc {
            file: file.into(),
            line,
        }
    }
}

/// The reserved constants, pre-registered in every `Config`.
pub const SYM_N: SymbolId = SymbolId(0);
pub const SYM_M: SymbolId = SymbolId(1);
pub const SYM_Y: SymbolId = SymbolId(2);

pub struct Config {
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) choices: Vec<Choice>,
    pub(crate) menus: Vec<Menu>,
    pub(crate) comments: Vec<Comment>,
    names: FxHashMap<String, SymbolId>,
    top_items: Vec<Item>,
    modules_sym: Option<SymbolId>,
    mainmenu: Option<String>,
    arch: Option<String>,
    srcarch: Option<String>,
    srctree: Option<String>,
    pub(crate) config_prefix: String,
    pub(crate) config_header: Option<String>,
    pub(crate) undefined_assignments: Vec<(String, String)>,

    /// Bumped on every structural mutation; stamps the derived structural
    /// caches (dependency edges, choice membership) so they rebuild lazily
    /// instead of being swept eagerly during graph construction.
    pub(crate) structure_gen: Cell<u64>,
    pub(crate) direct_dependents: RefCell<Option<(u64, Vec<Vec<SymbolId>>)>>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut config = Config {
            symbols: Vec::new(),
            choices: Vec::new(),
            menus: Vec::new(),
            comments: Vec::new(),
            names: FxHashMap::default(),
            top_items: Vec::new(),
            modules_sym: None,
            mainmenu: None,
            arch: None,
            srcarch: None,
            srctree: None,
            config_prefix: "CONFIG_".to_string(),
            config_header: None,
            undefined_assignments: Vec::new(),
            structure_gen: Cell::new(0),
            direct_dependents: RefCell::new(None),
        };

        for (name, value) in [
            ("n", Tristate::No),
            ("m", Tristate::Mod),
            ("y", Tristate::Yes),
        ] {
            let id = config.intern(name);
            let sym = &mut config.symbols[id.index()];
            sym.typ.set(SymbolType::Tristate);
            sym.constant = true;
            sym.special = true;
            *sym.cached_value.borrow_mut() = Some(Value::Tristate(value));
        }

        config
    }

    //
    // Entity access
    //

    pub fn sym(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn choice_ref(&self, id: ChoiceId) -> &Choice {
        &self.choices[id.index()]
    }

    pub fn menu_ref(&self, id: MenuId) -> &Menu {
        &self.menus[id.index()]
    }

    pub fn comment_ref(&self, id: CommentId) -> &Comment {
        &self.comments[id.index()]
    }

    /// Looks up a symbol by name without creating it.
    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    /// All symbols in registration order, reserved constants excluded.
    pub fn symbols(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (3..self.symbols.len() as u32).map(SymbolId)
    }

    pub fn choices(&self) -> impl Iterator<Item = ChoiceId> + '_ {
        (0..self.choices.len() as u32).map(ChoiceId)
    }

    pub fn menus(&self) -> impl Iterator<Item = MenuId> + '_ {
        (0..self.menus.len() as u32).map(MenuId)
    }

    pub fn comments(&self) -> impl Iterator<Item = CommentId> + '_ {
        (0..self.comments.len() as u32).map(CommentId)
    }

    pub fn top_level_items(&self) -> &[Item] {
        &self.top_items
    }

    pub fn parent_of(&self, item: Item) -> Option<Item> {
        match item {
            Item::Symbol(id) => self.sym(id).parent,
            Item::Choice(id) => self.choice_ref(id).parent,
            Item::Menu(id) => self.menu_ref(id).parent,
            Item::Comment(id) => self.comment_ref(id).parent,
        }
    }

    /// Child items of a menu or choice (symbols and comments have none),
    /// optionally flattened pre-order.
    pub fn items_of(&self, item: Item, recursive: bool) -> Vec<Item> {
        let children: &[Item] = match item {
            Item::Menu(id) => &self.menu_ref(id).items,
            Item::Choice(id) => &self.choice_ref(id).items,
            Item::Symbol(_) | Item::Comment(_) => &[],
        };

        let mut out = Vec::new();
        for &child in children {
            out.push(child);
            if recursive {
                out.extend(self.items_of(child, true));
            }
        }
        out
    }

    /// Symbols contained in a menu or choice. For a choice this is the
    /// mutual-exclusion set, which can be smaller than its item list.
    pub fn symbols_of(&self, item: Item, recursive: bool) -> Vec<SymbolId> {
        if let (Item::Choice(cid), false) = (item, recursive) {
            return self.choice_symbols(cid);
        }
        self.items_of(item, recursive)
            .into_iter()
            .filter_map(|item| match item {
                Item::Symbol(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    //
    // Graph building (the front-end contract)
    //

    fn touch_structure(&mut self) {
        self.structure_gen.set(self.structure_gen.get() + 1);
    }

    /// Interns a name, creating an undefined symbol on first sight.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name.to_string()));
        self.names.insert(name.to_string(), id);
        id
    }

    /// Records a bare reference (a mention in some expression) with its
    /// source location.
    pub fn reference_symbol(&mut self, name: &str, loc: SourceLoc) -> SymbolId {
        let id = self.intern(name);
        self.symbols[id.index()].ref_locations.push(loc);
        id
    }

    /// Declares a symbol. Re-definition of an existing symbol adds a
    /// location and, where the previous type was undetermined, fixes the
    /// type; conflicting re-typing keeps the first type.
    pub fn define_symbol(
        &mut self,
        name: &str,
        typ: SymbolType,
        parent: Option<Item>,
        loc: Option<SourceLoc>,
    ) -> SymbolId {
        let id = self.intern(name);
        {
            let sym = &mut self.symbols[id.index()];
            if sym.constant {
                warn!(symbol = name, "attempt to redefine a reserved constant");
                return id;
            }
            if typ != SymbolType::Unknown {
                if sym.typ.get() == SymbolType::Unknown {
                    sym.typ.set(typ);
                } else if sym.typ.get() != typ {
                    warn!(
                        symbol = name,
                        "conflicting type in re-definition, keeping the first"
                    );
                }
            }
            if let Some(loc) = loc {
                sym.def_locations.push(loc);
            }
        }
        // Every definition site is a tree node of its own; the parent link
        // keeps pointing at the first one.
        self.attach(Item::Symbol(id), parent);
        self.touch_structure();
        id
    }

    /// Declares a symbol whose value comes from a process environment
    /// variable, captured now.
    pub fn define_env_symbol(
        &mut self,
        name: &str,
        env_var: &str,
        loc: Option<SourceLoc>,
    ) -> SymbolId {
        let id = self.define_symbol(name, SymbolType::String, None, loc);
        let text = std::env::var(env_var).unwrap_or_else(|_| {
            warn!(symbol = name, env_var, "environment variable is not set");
            String::new()
        });
        let sym = &mut self.symbols[id.index()];
        sym.from_env = true;
        sym.special = true;
        sym.defaults.push(SymbolDefault {
            value: Expr::Atom(Atom::Constant(text)),
            condition: Expr::symbol(SYM_Y),
        });
        self.touch_structure();
        id
    }

    pub fn define_choice(
        &mut self,
        name: Option<&str>,
        typ: SymbolType,
        optional: bool,
        parent: Option<Item>,
        loc: Option<SourceLoc>,
    ) -> ChoiceId {
        let id = ChoiceId(self.choices.len() as u32);
        let mut choice = Choice::new(name.map(str::to_string), typ, optional);
        if let Some(loc) = loc {
            choice.def_locations.push(loc);
        }
        self.choices.push(choice);
        self.attach(Item::Choice(id), parent);
        self.touch_structure();
        id
    }

    pub fn define_menu(
        &mut self,
        title: &str,
        dep: Option<Expr>,
        parent: Option<Item>,
        loc: Option<SourceLoc>,
    ) -> MenuId {
        let id = MenuId(self.menus.len() as u32);
        let mut menu = Menu::new(title.to_string(), dep);
        menu.location = loc;
        self.menus.push(menu);
        self.attach(Item::Menu(id), parent);
        self.touch_structure();
        id
    }

    pub fn define_comment(
        &mut self,
        text: &str,
        dep: Option<Expr>,
        parent: Option<Item>,
        loc: Option<SourceLoc>,
    ) -> CommentId {
        let id = CommentId(self.comments.len() as u32);
        let mut comment = Comment::new(text.to_string(), dep);
        comment.location = loc;
        self.comments.push(comment);
        self.attach(Item::Comment(id), parent);
        self.touch_structure();
        id
    }

    fn attach(&mut self, item: Item, parent: Option<Item>) {
        match parent {
            None => self.top_items.push(item),
            Some(Item::Menu(mid)) => self.menus[mid.index()].items.push(item),
            Some(Item::Choice(cid)) => {
                self.choices[cid.index()].items.push(item);
                if let Item::Symbol(sid) = item {
                    self.choices[cid.index()].members.push(sid);
                    self.symbols[sid.index()].choice = Some(cid);
                }
            }
            Some(other) => {
                warn!(?other, "invalid parent item, attaching at top level");
                self.top_items.push(item);
            }
        }
        match item {
            Item::Symbol(id) => {
                let sym = &mut self.symbols[id.index()];
                if sym.parent.is_none() {
                    sym.parent = parent;
                }
            }
            Item::Choice(id) => self.choices[id.index()].parent = parent,
            Item::Menu(id) => self.menus[id.index()].parent = parent,
            Item::Comment(id) => self.comments[id.index()].parent = parent,
        }
    }

    fn condition(cond: Option<Expr>) -> Expr {
        cond.unwrap_or_else(|| Expr::symbol(SYM_Y))
    }

    pub fn add_prompt(&mut self, sym: SymbolId, text: &str, condition: Option<Expr>) {
        self.symbols[sym.index()].prompts.push(Prompt {
            text: text.to_string(),
            condition: Self::condition(condition),
        });
        self.touch_structure();
    }

    pub fn add_default(&mut self, sym: SymbolId, value: Expr, condition: Option<Expr>) {
        self.symbols[sym.index()].defaults.push(SymbolDefault {
            value,
            condition: Self::condition(condition),
        });
        self.touch_structure();
    }

    pub fn add_range(&mut self, sym: SymbolId, low: Expr, high: Expr, condition: Option<Expr>) {
        self.symbols[sym.index()].ranges.push(Range {
            low,
            high,
            condition: Self::condition(condition),
        });
        self.touch_structure();
    }

    /// Declares `select <target> if <condition>` on `sym` and folds the
    /// edge into the target's reverse dependency expression.
    pub fn add_select(&mut self, sym: SymbolId, target: SymbolId, condition: Option<Expr>) {
        let condition = Self::condition(condition);
        self.symbols[sym.index()]
            .selects
            .push((target, condition.clone()));
        let edge = Expr::and(Expr::symbol(sym), condition);
        let target_sym = &mut self.symbols[target.index()];
        target_sym.rev_dep = Self::fold_or(std::mem::replace(
            &mut target_sym.rev_dep,
            Expr::symbol(SYM_N),
        ), edge);
        self.touch_structure();
    }

    /// Declares `imply <target> if <condition>` on `sym`; the weak variant
    /// of select.
    pub fn add_imply(&mut self, sym: SymbolId, target: SymbolId, condition: Option<Expr>) {
        let condition = Self::condition(condition);
        self.symbols[sym.index()]
            .implies
            .push((target, condition.clone()));
        let edge = Expr::and(Expr::symbol(sym), condition);
        let target_sym = &mut self.symbols[target.index()];
        target_sym.weak_rev_dep = Self::fold_or(std::mem::replace(
            &mut target_sym.weak_rev_dep,
            Expr::symbol(SYM_N),
        ), edge);
        self.touch_structure();
    }

    fn fold_or(current: Expr, edge: Expr) -> Expr {
        if current == Expr::symbol(SYM_N) {
            edge
        } else {
            Expr::or(current, edge)
        }
    }

    /// Adds an extra dependency contributed by an enclosing menu or `if`
    /// block.
    pub fn add_dep(&mut self, item: Item, dep: Expr) {
        match item {
            Item::Symbol(id) => self.symbols[id.index()].deps.push(dep),
            Item::Choice(id) => self.choices[id.index()].deps.push(dep),
            Item::Menu(id) => self.menus[id.index()].deps.push(dep),
            Item::Comment(id) => self.comments[id.index()].deps.push(dep),
        }
        self.touch_structure();
    }

    pub fn add_choice_prompt(&mut self, choice: ChoiceId, text: &str, condition: Option<Expr>) {
        self.choices[choice.index()].prompts.push(Prompt {
            text: text.to_string(),
            condition: Self::condition(condition),
        });
        self.touch_structure();
    }

    pub fn add_choice_default(
        &mut self,
        choice: ChoiceId,
        member: SymbolId,
        condition: Option<Expr>,
    ) {
        self.choices[choice.index()].defaults.push(ChoiceDefault {
            member,
            condition: Self::condition(condition),
        });
        self.touch_structure();
    }

    pub fn add_visible_if(&mut self, menu: MenuId, condition: Expr) {
        self.menus[menu.index()].visible_if.push(condition);
        self.touch_structure();
    }

    pub fn set_modules_symbol(&mut self, sym: SymbolId) {
        self.modules_sym = Some(sym);
    }

    pub fn modules_symbol(&self) -> Option<SymbolId> {
        self.modules_sym
    }

    pub fn set_allnoconfig_y(&mut self, sym: SymbolId) {
        self.symbols[sym.index()].allnoconfig_y = true;
    }

    pub fn mark_special(&mut self, sym: SymbolId) {
        self.symbols[sym.index()].special = true;
    }

    pub fn set_mainmenu(&mut self, title: &str) {
        self.mainmenu = Some(title.to_string());
    }

    pub fn mainmenu(&self) -> Option<&str> {
        self.mainmenu.as_deref()
    }

    pub fn set_arch(&mut self, arch: &str) {
        self.arch = Some(arch.to_string());
    }

    pub fn arch(&self) -> Option<&str> {
        self.arch.as_deref()
    }

    pub fn set_srcarch(&mut self, srcarch: &str) {
        self.srcarch = Some(srcarch.to_string());
    }

    pub fn srcarch(&self) -> Option<&str> {
        self.srcarch.as_deref()
    }

    pub fn set_srctree(&mut self, srctree: &str) {
        self.srctree = Some(srctree.to_string());
    }

    pub fn srctree(&self) -> Option<&str> {
        self.srctree.as_deref()
    }

    pub fn set_config_prefix(&mut self, prefix: &str) {
        self.config_prefix = prefix.to_string();
    }

    pub fn config_prefix(&self) -> &str {
        &self.config_prefix
    }

    //
    // Expression parsing
    //

    /// Parses a condition expression in declaration context: names are
    /// interned, a bare `m` is tied to the modules symbol.
    pub fn parse_expr(&mut self, text: &str) -> ConfigResult<Expr> {
        self.parse_decl(text, None, true)
    }

    /// Like [`Config::parse_expr`], recording `loc` as the reference
    /// location of every mentioned symbol.
    pub fn parse_expr_at(&mut self, text: &str, loc: SourceLoc) -> ConfigResult<Expr> {
        self.parse_decl(text, Some(loc), true)
    }

    /// Parses the value side of a `default` in declaration context; `m`
    /// stays a plain constant here.
    pub fn parse_value_expr(&mut self, text: &str) -> ConfigResult<Expr> {
        self.parse_decl(text, None, false)
    }

    fn parse_decl(
        &mut self,
        text: &str,
        loc: Option<SourceLoc>,
        transform_m: bool,
    ) -> ConfigResult<Expr> {
        let tokens = tokenize(text).map_err(ConfigError::from)?;
        let mut options = ParseOptions::default();
        if transform_m {
            options = options.transform_m(self.modules_sym);
        }
        let mut resolve = |token: &Token| match token {
            Token::Word(word) => match Tristate::from_name(word) {
                Some(_) => Atom::Symbol(self.intern(word)),
                None => {
                    let id = self.intern(word);
                    if let Some(loc) = &loc {
                        self.symbols[id.index()].ref_locations.push(loc.clone());
                    }
                    Atom::Symbol(id)
                }
            },
            Token::Str(text) => match Tristate::from_name(text) {
                Some(_) => Atom::Symbol(self.intern(text)),
                None => Atom::Constant(text.clone()),
            },
            _ => unreachable!("the parser only resolves words and strings"),
        };
        let expr = parse_tokens(&tokens, options, &mut resolve)?;
        self.touch_structure();
        Ok(expr)
    }

    /// Evaluates an expression string against current symbol values: the
    /// ad-hoc query surface. Unknown names behave as string constants equal
    /// to their own spelling; the graph is not modified.
    pub fn eval(&self, text: &str) -> ConfigResult<Tristate> {
        let tokens = tokenize(text).map_err(ConfigError::from)?;
        let options = ParseOptions::default().transform_m(self.modules_sym);
        let mut resolve = |token: &Token| {
            let text = match token {
                Token::Word(w) => w,
                Token::Str(s) => s,
                _ => unreachable!("the parser only resolves words and strings"),
            };
            if Tristate::from_name(text).is_some() {
                return Atom::Symbol(self.symbol(text).expect("constants are pre-registered"));
            }
            if matches!(token, Token::Word(_)) {
                if let Some(id) = self.symbol(text) {
                    return Atom::Symbol(id);
                }
            }
            Atom::Constant(text.clone())
        };
        let expr = parse_tokens(&tokens, options, &mut resolve)?;
        Ok(self.eval_expr(&expr))
    }

    //
    // Evaluation
    //

    pub fn modules_enabled(&self) -> bool {
        self.modules_sym.is_some_and(|id| {
            self.value(id)
                .as_tristate()
                .is_some_and(|t| t != Tristate::No)
        })
    }

    /// Evaluates an expression tree, applying the promotion rule: a `m`
    /// result becomes `y` whenever modules are disabled. Every internal
    /// evaluation point (visibility gates, default gates, range gates,
    /// select gates, choice modes) goes through here.
    pub fn eval_expr(&self, expr: &Expr) -> Tristate {
        let result = expr.evaluate(self);
        if result == Tristate::Mod && !self.modules_enabled() {
            Tristate::Yes
        } else {
            result
        }
    }

    fn deps_value(&self, deps: &[Expr]) -> Tristate {
        deps.iter()
            .fold(Tristate::Yes, |acc, dep| acc.min(self.eval_expr(dep)))
    }

    /// `visible if` contributions of every enclosing menu; gates prompts
    /// without feeding into non-prompt computation.
    fn enclosing_visible_if(&self, mut parent: Option<Item>) -> Tristate {
        let mut vis = Tristate::Yes;
        while let Some(item) = parent {
            if let Item::Menu(mid) = item {
                for cond in &self.menus[mid.index()].visible_if {
                    vis = vis.min(self.eval_expr(cond));
                }
            }
            parent = self.parent_of(item);
        }
        vis
    }

    /// Promotes `m` to `y` for non-tristate carriers and whenever modules
    /// are disabled.
    fn promote(&self, value: Tristate, tristate_capable: bool) -> Tristate {
        if value == Tristate::Mod && (!tristate_capable || !self.modules_enabled()) {
            Tristate::Yes
        } else {
            value
        }
    }

    /// The effective type: the declared one, or for untyped members of a
    /// choice's mutual-exclusion set, the choice's type.
    pub fn effective_type(&self, id: SymbolId) -> SymbolType {
        let sym = self.sym(id);
        let declared = sym.typ.get();
        if declared != SymbolType::Unknown {
            return declared;
        }
        match sym.choice {
            Some(cid) if self.is_choice_symbol(id) => self.choice_type(cid),
            _ => SymbolType::Unknown,
        }
    }

    pub fn visibility(&self, id: SymbolId) -> Tristate {
        let sym = self.sym(id);
        if let Some(vis) = sym.cached_visibility.get() {
            return vis;
        }
        let vis = self.calc_visibility(id);
        sym.cached_visibility.set(Some(vis));
        vis
    }

    fn calc_visibility(&self, id: SymbolId) -> Tristate {
        let sym = self.sym(id);

        // A symbol with no prompts is never visible, whatever its type.
        let mut vis = Tristate::No;
        for prompt in &sym.prompts {
            vis = vis.max(self.eval_expr(&prompt.condition));
        }
        vis = vis.min(self.deps_value(&sym.deps));
        vis = vis.min(self.enclosing_visible_if(sym.parent));
        if let Some(cid) = sym.choice {
            vis = vis.min(self.choice_visibility(cid));
        }
        self.promote(vis, self.effective_type(id) == SymbolType::Tristate)
    }

    pub fn choice_visibility(&self, id: ChoiceId) -> Tristate {
        let choice = self.choice_ref(id);
        if let Some(vis) = choice.cached_visibility.get() {
            return vis;
        }

        let mut vis = Tristate::No;
        for prompt in &choice.prompts {
            vis = vis.max(self.eval_expr(&prompt.condition));
        }
        vis = vis.min(self.deps_value(&choice.deps));
        vis = vis.min(self.enclosing_visible_if(choice.parent));
        let vis = self.promote(vis, self.choice_type(id) == SymbolType::Tristate);

        choice.cached_visibility.set(Some(vis));
        vis
    }

    pub fn menu_visibility(&self, id: MenuId) -> Tristate {
        let menu = self.menu_ref(id);
        let mut vis = menu
            .dep
            .as_ref()
            .map_or(Tristate::Yes, |dep| self.eval_expr(dep));
        vis = vis.min(self.deps_value(&menu.deps));
        vis
    }

    pub fn menu_visible_if_visibility(&self, id: MenuId) -> Tristate {
        self.deps_value(&self.menu_ref(id).visible_if)
    }

    pub fn comment_visibility(&self, id: CommentId) -> Tristate {
        let comment = self.comment_ref(id);
        let mut vis = comment
            .dep
            .as_ref()
            .map_or(Tristate::Yes, |dep| self.eval_expr(dep));
        vis = vis.min(self.deps_value(&comment.deps));
        vis
    }

    /// The computed value, from cache when warm.
    pub fn value(&self, id: SymbolId) -> Value {
        let sym = self.sym(id);
        {
            if let Some(value) = &*sym.cached_value.borrow() {
                return value.clone();
            }
        }
        if sym.computing.get() {
            // A value-dependency cycle. Evaluate with what is known right
            // now; callers reach a fixed point by re-querying.
            return self.neutral_value(id);
        }
        sym.computing.set(true);
        let _reset = guard((), |()| sym.computing.set(false));
        let value = self.calc_value(id);
        *sym.cached_value.borrow_mut() = Some(value.clone());
        value
    }

    pub fn tristate_value(&self, id: SymbolId) -> Tristate {
        self.value(id).as_tristate().unwrap_or(Tristate::No)
    }

    fn neutral_value(&self, id: SymbolId) -> Value {
        match self.effective_type(id) {
            SymbolType::Bool | SymbolType::Tristate => Value::Tristate(Tristate::No),
            SymbolType::String => Value::String(String::new()),
            SymbolType::Int => Value::Int(String::new()),
            SymbolType::Hex => Value::Hex(String::new()),
            SymbolType::Unknown => Value::String(self.sym(id).name.clone()),
        }
    }

    fn calc_value(&self, id: SymbolId) -> Value {
        let sym = self.sym(id);
        sym.write_to_conf.set(false);
        match self.effective_type(id) {
            // An undefined symbol's value is its own name; this is what
            // makes comparisons against unknown names well-defined.
            SymbolType::Unknown => Value::String(sym.name.clone()),
            SymbolType::Bool | SymbolType::Tristate => {
                Value::Tristate(self.calc_tristate_value(id))
            }
            SymbolType::String => Value::String(self.calc_string_value(id)),
            SymbolType::Int => Value::Int(self.calc_numeric_value(id, 10)),
            SymbolType::Hex => Value::Hex(self.calc_numeric_value(id, 16)),
        }
    }

    fn calc_tristate_value(&self, id: SymbolId) -> Tristate {
        let sym = self.sym(id);
        let typ = self.effective_type(id);

        if sym.choice.is_some() && self.is_choice_symbol(id) {
            return self.calc_choice_member_value(id);
        }

        let vis = self.visibility(id);
        let mut value = Tristate::No;
        let mut use_defaults = true;

        if vis != Tristate::No {
            sym.write_to_conf.set(true);
            if let Some(user) = sym.user_value.as_ref().and_then(Value::as_tristate) {
                // The user value is honored up to the visibility ceiling.
                value = user.min(vis);
                use_defaults = false;
            }
        }

        if use_defaults {
            for default in &sym.defaults {
                let cond = self.eval_expr(&default.condition);
                if cond != Tristate::No {
                    sym.write_to_conf.set(true);
                    value = self.eval_expr(&default.value).min(cond);
                    break;
                }
            }

            // imply: a weak suggestion, honored only while the symbol's own
            // dependencies hold and no user value is in effect.
            let implied = self.eval_expr(&sym.weak_rev_dep);
            if implied != Tristate::No && self.deps_value(&sym.deps) != Tristate::No {
                sym.write_to_conf.set(true);
                value = value.max(implied);
            }
        }

        // select can force the value up past the visibility ceiling, but
        // never lowers it.
        let forced = self.eval_expr(&sym.rev_dep);
        if forced != Tristate::No {
            sym.write_to_conf.set(true);
            value = value.max(forced);
        }

        // m promotes to y for bool symbols and for symbols implied to y...
        if value == Tristate::Mod
            && (typ == SymbolType::Bool || self.eval_expr(&sym.weak_rev_dep) == Tristate::Yes)
        {
            value = Tristate::Yes;
        }
        // ...and whenever modules are disabled.
        if value == Tristate::Mod && !self.modules_enabled() {
            value = Tristate::Yes;
        }
        value
    }

    fn calc_choice_member_value(&self, id: SymbolId) -> Tristate {
        let sym = self.sym(id);
        let choice = sym.choice.expect("caller checked choice membership");

        if self.visibility(id) == Tristate::No {
            return Tristate::No;
        }

        let mode = self.choice_mode(choice);
        sym.write_to_conf.set(mode != Tristate::No);
        match mode {
            Tristate::No => Tristate::No,
            Tristate::Yes => {
                if self.choice_selection(choice) == Some(id) {
                    Tristate::Yes
                } else {
                    Tristate::No
                }
            }
            Tristate::Mod => {
                // In m mode members are individually togglable to m;
                // mutual exclusion only applies to the y mode.
                match sym.user_value.as_ref().and_then(Value::as_tristate) {
                    Some(Tristate::Mod | Tristate::Yes) => Tristate::Mod,
                    _ => Tristate::No,
                }
            }
        }
    }

    fn calc_string_value(&self, id: SymbolId) -> String {
        let sym = self.sym(id);

        if self.visibility(id) != Tristate::No {
            sym.write_to_conf.set(true);
            if let Some(Value::String(user)) = &sym.user_value {
                return user.clone();
            }
        }

        for default in &sym.defaults {
            if self.eval_expr(&default.condition) != Tristate::No {
                sym.write_to_conf.set(true);
                return self.value_expr_text(&default.value);
            }
        }
        String::new()
    }

    fn calc_numeric_value(&self, id: SymbolId, base: u32) -> String {
        let sym = self.sym(id);

        // The first range whose gate holds is the active one.
        let active = sym.ranges.iter().find_map(|range| {
            (self.eval_expr(&range.condition) != Tristate::No).then(|| {
                (
                    self.value_expr_text(&range.low),
                    self.value_expr_text(&range.high),
                )
            })
        });
        let active_bounds = active.as_ref().and_then(|(low, high)| {
            Some((parse_in_base(low, base)?, parse_in_base(high, base)?))
        });

        if self.visibility(id) != Tristate::No {
            sym.write_to_conf.set(true);
            if let Some(user) = &sym.user_value {
                let text = user.as_str();
                if let Some(n) = parse_in_base(text, base) {
                    // A user value is used verbatim while it satisfies the
                    // active range; outside it, it is treated as absent and
                    // the defaults take over.
                    let in_range =
                        active_bounds.map_or(true, |(low, high)| n >= low && n <= high);
                    if in_range {
                        return text.to_string();
                    }
                }
            }
        }

        for default in &sym.defaults {
            if self.eval_expr(&default.condition) != Tristate::No {
                sym.write_to_conf.set(true);
                let text = self.value_expr_text(&default.value);
                // Defaults outside the active range are clamped to the
                // violated bound, keeping the bound's own textual form.
                if let (Some((low, high)), Some(n)) =
                    (active_bounds, parse_in_base(&text, base))
                {
                    let (low_text, high_text) = active.as_ref().unwrap();
                    if n < low {
                        return low_text.clone();
                    }
                    if n > high {
                        return high_text.clone();
                    }
                }
                return text;
            }
        }

        // No default and no user value: the low bound stands in, but only
        // when positive. Hex gets its marker here even when the bound text
        // lacks one.
        if let Some((low_text, _)) = &active {
            if parse_in_base(low_text, base).is_some_and(|low| low > 0) {
                if base == 16 && !low_text.starts_with("0x") && !low_text.starts_with("0X") {
                    return format!("0x{low_text}");
                }
                return low_text.clone();
            }
        }
        String::new()
    }

    pub fn has_ranges(&self, id: SymbolId) -> bool {
        !self.sym(id).ranges.is_empty()
    }

    /// The textual reading of a value expression (normally a plain atom).
    fn value_expr_text(&self, expr: &Expr) -> String {
        match expr {
            Expr::Atom(Atom::Symbol(id)) => self.value(*id).as_str().to_string(),
            Expr::Atom(Atom::Constant(text)) => text.clone(),
            other => self.eval_expr(other).name().to_string(),
        }
    }

    //
    // Choice resolution
    //

    pub fn choice_type(&self, id: ChoiceId) -> SymbolType {
        let choice = self.choice_ref(id);
        let declared = choice.typ.get();
        if declared != SymbolType::Unknown {
            return declared;
        }
        // Inferred from the first explicitly typed member, then bound.
        for member in self.choice_symbols(id) {
            let typ = self.sym(member).declared_type();
            if typ != SymbolType::Unknown {
                choice.typ.set(typ);
                return typ;
            }
        }
        SymbolType::Unknown
    }

    /// The members participating in mutual exclusion, in declaration order.
    pub fn choice_symbols(&self, id: ChoiceId) -> Vec<SymbolId> {
        let choice = self.choice_ref(id);
        let gen = self.structure_gen.get();
        {
            let cached = choice.actual_members.borrow();
            if let Some((stamp, members)) = &*cached {
                if *stamp == gen {
                    return members.clone();
                }
            }
        }

        let mut actual = Vec::new();
        let mut previous: Option<SymbolId> = None;
        for &member in &choice.members {
            let weird = previous
                .is_some_and(|prev| self.depends_on_preceding_sibling(member, prev));
            if !weird {
                actual.push(member);
            }
            previous = Some(member);
        }

        *choice.actual_members.borrow_mut() = Some((gen, actual.clone()));
        actual
    }

    /// The predicate behind the choice membership quirk: a member whose own
    /// dependencies mention the structurally preceding member expresses a
    /// sub-item revealed by a sibling, not an alternative. Kept as one
    /// function so it can be corrected in isolation.
    fn depends_on_preceding_sibling(&self, member: SymbolId, previous: SymbolId) -> bool {
        let sym = self.sym(member);
        sym.deps
            .iter()
            .chain(sym.prompts.iter().map(|prompt| &prompt.condition))
            .any(|expr| expr.referenced().contains(&previous))
    }

    /// Whether the symbol is part of its choice's mutual-exclusion set (not
    /// merely a structural child).
    pub fn is_choice_symbol(&self, id: SymbolId) -> bool {
        match self.sym(id).choice {
            Some(cid) => self.choice_symbols(cid).contains(&id),
            None => false,
        }
    }

    pub fn choice_mode(&self, id: ChoiceId) -> Tristate {
        let choice = self.choice_ref(id);
        if let Some(mode) = choice.cached_mode.get() {
            return mode;
        }

        let minimum = if choice.optional {
            Tristate::No
        } else {
            Tristate::Mod
        };
        let mut mode = choice.user_mode.unwrap_or(minimum);
        mode = mode.min(self.choice_visibility(id));
        let mode = self.promote(mode, self.choice_type(id) == SymbolType::Tristate);

        choice.cached_mode.set(Some(mode));
        mode
    }

    /// The member currently holding the selection; meaningful only in `y`
    /// mode.
    pub fn choice_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        let choice = self.choice_ref(id);
        if let Some(selection) = choice.cached_selection.get() {
            return selection;
        }

        let selection = self.calc_selection(id);
        choice.cached_selection.set(Some(selection));
        selection
    }

    fn calc_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        if self.choice_mode(id) != Tristate::Yes {
            return None;
        }
        let choice = self.choice_ref(id);
        if let Some(user) = choice.user_selection {
            if self.visibility(user) == Tristate::Yes {
                return Some(user);
            }
        }
        self.choice_selection_from_defaults(id)
    }

    /// Default resolution alone, ignoring any user selection: first default
    /// with a true gate and a visible member, else the first visible member.
    pub fn choice_selection_from_defaults(&self, id: ChoiceId) -> Option<SymbolId> {
        let choice = self.choice_ref(id);
        let chosen = choice
            .defaults
            .iter()
            .find(|default| self.eval_expr(&default.condition) != Tristate::No)
            .map(|default| default.member);
        if let Some(member) = chosen {
            if self.visibility(member) != Tristate::No {
                return Some(member);
            }
        }
        self.choice_symbols(id)
            .into_iter()
            .find(|&member| self.visibility(member) != Tristate::No)
    }

    /// The member the user explicitly selected, whether or not it is
    /// currently selectable.
    pub fn choice_user_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        self.choice_ref(id).user_selection
    }

    /// Selects a member by assigning it the user value `y`.
    pub fn set_user_selection(&mut self, id: ChoiceId, member: SymbolId) -> bool {
        if self.sym(member).choice != Some(id) {
            warn!(
                member = %self.sym(member).name,
                "selection target is not a member of the choice"
            );
            return false;
        }
        self.set_user_value(member, "y")
    }

    pub fn is_choice_selection(&self, id: SymbolId) -> bool {
        match self.sym(id).choice {
            Some(cid) => self.choice_selection(cid) == Some(id),
            None => false,
        }
    }

    //
    // Bounds and modifiability
    //

    /// The lowest value a user assignment can reach: the select floor. None
    /// when the symbol cannot be moved at all.
    pub fn lower_bound(&self, id: SymbolId) -> Option<Tristate> {
        let floor = self.select_floor(id)?;
        (self.visibility(id) > floor).then_some(floor)
    }

    /// The highest value a user assignment can reach: the visibility
    /// ceiling.
    pub fn upper_bound(&self, id: SymbolId) -> Option<Tristate> {
        let floor = self.select_floor(id)?;
        let vis = self.visibility(id);
        (vis > floor).then_some(vis)
    }

    fn select_floor(&self, id: SymbolId) -> Option<Tristate> {
        let sym = self.sym(id);
        let typ = self.effective_type(id);
        if !matches!(typ, SymbolType::Bool | SymbolType::Tristate) || sym.special {
            return None;
        }
        let mut floor = self.eval_expr(&sym.rev_dep);
        if typ == SymbolType::Bool && floor == Tristate::Mod {
            floor = Tristate::Yes;
        }
        Some(floor)
    }

    /// The tri-state values a user assignment can currently take effect
    /// with, lowest first. Empty for non-bool/tristate symbols and for
    /// symbols pinned by selects or invisibility.
    pub fn assignable_values(&self, id: SymbolId) -> Vec<Tristate> {
        match (self.lower_bound(id), self.upper_bound(id)) {
            (Some(low), Some(high)) => [Tristate::No, Tristate::Mod, Tristate::Yes]
                .into_iter()
                .filter(|&t| t >= low && t <= high)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_modifiable(&self, id: SymbolId) -> bool {
        match self.effective_type(id) {
            SymbolType::Bool | SymbolType::Tristate => self.lower_bound(id).is_some(),
            SymbolType::String | SymbolType::Int | SymbolType::Hex => {
                !self.sym(id).special && self.visibility(id) != Tristate::No
            }
            SymbolType::Unknown => false,
        }
    }

    //
    // User values
    //

    fn validate_user_value(&self, id: SymbolId, text: &str) -> Option<Value> {
        let sym = self.sym(id);
        if sym.constant || sym.special {
            return None;
        }
        match self.effective_type(id) {
            SymbolType::Bool => match text {
                "n" => Some(Value::Tristate(Tristate::No)),
                "y" => Some(Value::Tristate(Tristate::Yes)),
                _ => None,
            },
            SymbolType::Tristate => Tristate::from_name(text).map(Value::Tristate),
            SymbolType::String => Some(Value::String(text.to_string())),
            SymbolType::Int => text
                .parse::<i64>()
                .ok()
                .map(|_| Value::Int(text.to_string())),
            SymbolType::Hex => {
                parse_in_base(text, 16).map(|_| Value::Hex(text.to_string()))
            }
            SymbolType::Unknown => None,
        }
    }

    /// Assigns a user value, returning whether it was accepted. A value of
    /// the wrong type for the symbol is rejected with a warning and the
    /// previous user value is retained.
    pub fn set_user_value(&mut self, id: SymbolId, text: &str) -> bool {
        match self.validate_user_value(id, text) {
            Some(value) => {
                self.commit_user_value(id, value);
                true
            }
            None => {
                warn!(
                    symbol = %self.sym(id).name,
                    value = text,
                    "rejected invalid user value"
                );
                false
            }
        }
    }

    /// The strict variant of [`Config::set_user_value`].
    pub fn try_set_user_value(&mut self, id: SymbolId, text: &str) -> ConfigResult<()> {
        match self.validate_user_value(id, text) {
            Some(value) => {
                self.commit_user_value(id, value);
                Ok(())
            }
            None => Err(ConfigError::InvalidUserValue {
                symbol: self.sym(id).name.clone(),
                value: text.to_string(),
            }
            .into()),
        }
    }

    fn commit_user_value(&mut self, id: SymbolId, value: Value) {
        if let (Some(cid), Some(tri)) = (self.sym(id).choice, value.as_tristate()) {
            if self.is_choice_symbol(id) {
                let choice = &mut self.choices[cid.index()];
                match tri {
                    Tristate::Yes => {
                        choice.user_selection = Some(id);
                        choice.user_mode = Some(Tristate::Yes);
                    }
                    Tristate::Mod => {
                        choice.user_selection = None;
                        choice.user_mode = Some(Tristate::Mod);
                    }
                    Tristate::No => {}
                }
            }
        }
        self.symbols[id.index()].user_value = Some(value);
        self.invalidate_after_user_change(id);
    }

    pub fn user_value(&self, id: SymbolId) -> Option<&Value> {
        self.sym(id).user_value.as_ref()
    }

    pub fn unset_user_value(&mut self, id: SymbolId) {
        if self.symbols[id.index()].user_value.take().is_some() {
            self.invalidate_after_user_change(id);
        }
    }

    /// Resets every user value (and all choice user state).
    pub fn unset_all_user_values(&mut self) {
        for sym in &mut self.symbols {
            sym.user_value = None;
        }
        for choice in &mut self.choices {
            choice.user_selection = None;
            choice.user_mode = None;
        }
        self.invalidate_all();
    }

    //
    // References
    //

    /// Symbols mentioned in the entity's own declarations, first-occurrence
    /// order, duplicates removed. The extended form also walks the
    /// dependency expressions contributed by enclosing menus/ifs. Reserved
    /// constants are omitted.
    pub fn referenced_symbols(&self, item: Item, include_enclosing: bool) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = Vec::new();
        let deps: &[Expr];

        match item {
            Item::Symbol(id) => {
                let sym = self.sym(id);
                for prompt in &sym.prompts {
                    ids.extend(prompt.condition.referenced());
                }
                for default in &sym.defaults {
                    ids.extend(default.value.referenced());
                    ids.extend(default.condition.referenced());
                }
                for (target, condition) in sym.selects.iter().chain(&sym.implies) {
                    ids.push(*target);
                    ids.extend(condition.referenced());
                }
                for range in &sym.ranges {
                    ids.extend(range.low.referenced());
                    ids.extend(range.high.referenced());
                    ids.extend(range.condition.referenced());
                }
                deps = &sym.deps;
            }
            Item::Choice(id) => {
                let choice = self.choice_ref(id);
                for prompt in &choice.prompts {
                    ids.extend(prompt.condition.referenced());
                }
                for default in &choice.defaults {
                    ids.push(default.member);
                    ids.extend(default.condition.referenced());
                }
                deps = &choice.deps;
            }
            Item::Menu(id) => {
                let menu = self.menu_ref(id);
                if let Some(dep) = &menu.dep {
                    ids.extend(dep.referenced());
                }
                for cond in &menu.visible_if {
                    ids.extend(cond.referenced());
                }
                deps = &menu.deps;
            }
            Item::Comment(id) => {
                let comment = self.comment_ref(id);
                if let Some(dep) = &comment.dep {
                    ids.extend(dep.referenced());
                }
                deps = &comment.deps;
            }
        }

        if include_enclosing {
            for dep in deps {
                ids.extend(dep.referenced());
            }
        }

        ids.into_iter()
            .filter(|&id| !self.sym(id).constant)
            .unique()
            .collect()
    }

    /// Targets of this symbol's own `select` clauses.
    pub fn selected_symbols(&self, id: SymbolId) -> Vec<SymbolId> {
        self.sym(id)
            .selects
            .iter()
            .map(|(target, _)| *target)
            .unique()
            .collect()
    }

    /// Targets of this symbol's own `imply` clauses.
    pub fn implied_symbols(&self, id: SymbolId) -> Vec<SymbolId> {
        self.sym(id)
            .implies
            .iter()
            .map(|(target, _)| *target)
            .unique()
            .collect()
    }
}

/// Numeric reading of a value's text. Hex accepts an optional sign and an
/// optional `0x`/`0X` marker, so padding and marker presence never change
/// the number.
pub(crate) fn parse_in_base(text: &str, base: u32) -> Option<i64> {
    if base == 16 {
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let digits = unsigned
            .strip_prefix("0x")
            .or_else(|| unsigned.strip_prefix("0X"))
            .unwrap_or(unsigned);
        if digits.is_empty() {
            return None;
        }
        let magnitude = i64::from_str_radix(digits, 16).ok()?;
        Some(if negative { -magnitude } else { magnitude })
    } else {
        text.parse().ok()
    }
}
