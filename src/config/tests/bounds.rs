//! User-assignment bounds: the select floor, the visibility ceiling, the
//! assignable set derived from them, and modifiability.

use pretty_assertions::assert_eq;

use super::{config_test, defaulted, prompted, prompted_if, set, sym, with_modules};
use crate::config::symbol::SymbolType;
use crate::config::Config;
use crate::tristate::Tristate::{self, Mod, No, Yes};

fn kbounds() -> Config {
    let mut c = Config::new();
    with_modules(&mut c);

    // Silent selector/implier sources at fixed values.
    defaulted(&mut c, "SEL_M", SymbolType::Tristate, "m");
    defaulted(&mut c, "SEL_Y", SymbolType::Tristate, "y");
    defaulted(&mut c, "IMP_N", SymbolType::Tristate, "n");
    defaulted(&mut c, "IMP_M", SymbolType::Tristate, "m");
    defaulted(&mut c, "IMP_Y", SymbolType::Tristate, "y");

    prompted(&mut c, "Y_VISIBLE_BOOL", SymbolType::Bool);
    prompted(&mut c, "Y_VISIBLE_TRISTATE", SymbolType::Tristate);
    prompted_if(&mut c, "M_VISIBLE_BOOL", SymbolType::Bool, "m");
    prompted_if(&mut c, "M_VISIBLE_TRISTATE", SymbolType::Tristate, "m");

    for (name, typ, selector) in [
        ("Y_SELECTED_BOOL", SymbolType::Bool, "SEL_Y"),
        ("M_SELECTED_BOOL", SymbolType::Bool, "SEL_M"),
        ("Y_SELECTED_TRISTATE", SymbolType::Tristate, "SEL_Y"),
        ("M_SELECTED_TRISTATE", SymbolType::Tristate, "SEL_M"),
    ] {
        prompted(&mut c, name, typ);
        let target = sym(&c, name);
        let source = sym(&c, selector);
        c.add_select(source, target, None);
    }
    prompted_if(&mut c, "M_SELECTED_M_VISIBLE_TRISTATE", SymbolType::Tristate, "m");
    let target = sym(&c, "M_SELECTED_M_VISIBLE_TRISTATE");
    let source = sym(&c, "SEL_M");
    c.add_select(source, target, None);

    for (name, typ, implier) in [
        ("N_IMPLIED_BOOL", SymbolType::Bool, "IMP_N"),
        ("N_IMPLIED_TRISTATE", SymbolType::Tristate, "IMP_N"),
        ("M_IMPLIED_BOOL", SymbolType::Bool, "IMP_M"),
        ("M_IMPLIED_TRISTATE", SymbolType::Tristate, "IMP_M"),
        ("Y_IMPLIED_BOOL", SymbolType::Bool, "IMP_Y"),
        ("Y_IMPLIED_TRISTATE", SymbolType::Tristate, "IMP_Y"),
    ] {
        prompted(&mut c, name, typ);
        let target = sym(&c, name);
        let source = sym(&c, implier);
        c.add_imply(source, target, None);
    }

    prompted(&mut c, "STRING", SymbolType::String);
    prompted(&mut c, "INT", SymbolType::Int);
    prompted(&mut c, "HEX", SymbolType::Hex);

    set(&mut c, "MODULES", "y");
    c
}

#[track_caller]
fn check_bounds(c: &Config, name: &str, low: Option<Tristate>, high: Option<Tristate>) {
    let id = sym(c, name);
    assert_eq!(c.lower_bound(id), low, "{name} lower bound");
    assert_eq!(c.upper_bound(id), high, "{name} upper bound");

    // The assignable set is exactly the closed bound interval.
    let expected: Vec<Tristate> = match (low, high) {
        (Some(low), Some(high)) => [No, Mod, Yes]
            .into_iter()
            .filter(|&t| t >= low && t <= high)
            .collect(),
        _ => Vec::new(),
    };
    assert_eq!(c.assignable_values(id), expected, "{name} assignable values");
}

config_test!(bounds_matrix, c = kbounds(), {
    check_bounds(&c, "n", None, None);
    check_bounds(&c, "m", None, None);
    check_bounds(&c, "y", None, None);
    check_bounds(&c, "Y_VISIBLE_BOOL", Some(No), Some(Yes));
    check_bounds(&c, "Y_VISIBLE_TRISTATE", Some(No), Some(Yes));
    check_bounds(&c, "M_VISIBLE_BOOL", Some(No), Some(Yes)); // promoted visibility
    check_bounds(&c, "M_VISIBLE_TRISTATE", Some(No), Some(Mod));
    check_bounds(&c, "Y_SELECTED_BOOL", None, None);
    check_bounds(&c, "M_SELECTED_BOOL", None, None); // floor promoted to y
    check_bounds(&c, "Y_SELECTED_TRISTATE", None, None);
    check_bounds(&c, "M_SELECTED_TRISTATE", Some(Mod), Some(Yes));
    check_bounds(&c, "M_SELECTED_M_VISIBLE_TRISTATE", None, None);
    check_bounds(&c, "N_IMPLIED_BOOL", Some(No), Some(Yes));
    check_bounds(&c, "N_IMPLIED_TRISTATE", Some(No), Some(Yes));
    check_bounds(&c, "M_IMPLIED_BOOL", Some(No), Some(Yes));
    check_bounds(&c, "M_IMPLIED_TRISTATE", Some(No), Some(Yes));
    check_bounds(&c, "Y_IMPLIED_BOOL", Some(No), Some(Yes));
    check_bounds(&c, "Y_IMPLIED_TRISTATE", Some(No), Some(Yes));
    check_bounds(&c, "STRING", None, None);
    check_bounds(&c, "INT", None, None);
    check_bounds(&c, "HEX", None, None);
});

config_test!(modifiability, c = kbounds(), {
    for name in [
        "Y_VISIBLE_BOOL",
        "Y_VISIBLE_TRISTATE",
        "M_SELECTED_TRISTATE",
        "STRING",
        "INT",
        "HEX",
    ] {
        assert!(c.is_modifiable(sym(&c, name)), "{name} should be modifiable");
    }
    for name in [
        "n",
        "m",
        "y",
        "Y_SELECTED_BOOL",
        "M_SELECTED_BOOL",
        "M_SELECTED_M_VISIBLE_TRISTATE",
    ] {
        assert!(!c.is_modifiable(sym(&c, name)), "{name} should not be modifiable");
    }

    // No prompt at all: not modifiable, whatever the type.
    let hidden = c.define_symbol("HIDDEN_STRING", SymbolType::String, None, None);
    assert!(!c.is_modifiable(hidden));
    let hidden = c.define_symbol("HIDDEN_BOOL", SymbolType::Bool, None, None);
    assert!(!c.is_modifiable(hidden));
});
