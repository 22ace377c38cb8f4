
mod bounds;

use crate::config::symbol::{SymbolId, SymbolType};
use crate::config::Config;
use crate::tristate::Tristate;

pub(crate) use macros::config_test;

//
// Shared fixture helpers. Graphs are built through the same surface the
// front end uses.
//

pub(crate) fn sym(c: &Config, name: &str) -> SymbolId {
    c.symbol(name)
        .unwrap_or_else(|| panic!("symbol {name} not in fixture"))
}

pub(crate) fn value_of(c: &Config, name: &str) -> String {
    c.value(sym(c, name)).as_str().to_string()
}

pub(crate) fn tri_of(c: &Config, name: &str) -> Tristate {
    c.tristate_value(sym(c, name))
}

pub(crate) fn vis_of(c: &Config, name: &str) -> Tristate {
    c.visibility(sym(c, name))
}

pub(crate) fn set(c: &mut Config, name: &str, value: &str) -> bool {
    let id = sym(c, name);
    c.set_user_value(id, value)
}

/// Declares a bool `MODULES` symbol and designates it.
pub(crate) fn with_modules(c: &mut Config) -> SymbolId {
    let modules = c.define_symbol("MODULES", SymbolType::Bool, None, None);
    c.add_prompt(modules, "Enable module support", None);
    c.set_modules_symbol(modules);
    modules
}

/// `config <name> <typ>` with an unconditional prompt.
pub(crate) fn prompted(c: &mut Config, name: &str, typ: SymbolType) -> SymbolId {
    let id = c.define_symbol(name, typ, None, None);
    c.add_prompt(id, name, None);
    id
}

/// `config <name> <typ>` with a prompt gated on `cond`.
pub(crate) fn prompted_if(c: &mut Config, name: &str, typ: SymbolType, cond: &str) -> SymbolId {
    let id = c.define_symbol(name, typ, None, None);
    let cond = c.parse_expr(cond).unwrap();
    c.add_prompt(id, name, Some(cond));
    id
}

/// `config <name> <typ>` with no prompt and a single unconditional default.
pub(crate) fn defaulted(c: &mut Config, name: &str, typ: SymbolType, default: &str) -> SymbolId {
    let id = c.define_symbol(name, typ, None, None);
    let value = c.parse_value_expr(default).unwrap();
    c.add_default(id, value, None);
    id
}
