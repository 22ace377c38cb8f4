//! Reading and writing the persisted-assignment format (the `.config`
//! analog): `NAME=value` lines, `# NAME is not set` markers, and a verbatim
//! leading header.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::errors::{ConfigError, ConfigResult};
use crate::config::menu::Item;
use crate::config::symbol::{SymbolId, SymbolType, Value};
use crate::config::Config;
use crate::tristate::Tristate;

static SET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z0-9_]+)=(.*)$").unwrap());
static UNSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^# ([A-Za-z0-9_]+) is not set").unwrap());

/// Inserts `#` before each line of a header, the exact inverse of the
/// reading rule: an empty header is a bare `#`, and a newline-terminated
/// header gets a trailing `#` so the final newline survives the round trip.
fn comment_out(header: &str) -> String {
    if header.is_empty() {
        return "#".to_string();
    }
    let mut out = String::new();
    for line in header.split_inclusive('\n') {
        out.push('#');
        out.push_str(line);
    }
    if header.ends_with('\n') {
        out.push('#');
    }
    out
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> String {
    value.replace("\\\"", "\"").replace("\\\\", "\\")
}

impl Config {
    /// Loads a persisted assignment. With `replace` every existing user
    /// value is cleared first; otherwise only symbols present in the text
    /// are touched.
    pub fn load_config_str(&mut self, text: &str, replace: bool) -> ConfigResult<()> {
        if replace {
            self.unset_all_user_values();
        }

        let mut lines = text.lines().peekable();

        // The header is the maximal leading run of comment lines that are
        // not value markers, preserved with the markers stripped.
        let mut header: Option<String> = None;
        while let Some(line) = lines.peek() {
            if !line.starts_with('#') || UNSET_RE.is_match(line) {
                break;
            }
            let mut stripped = line[1..].to_string();
            stripped.push('\n');
            header.get_or_insert_with(String::new).push_str(&stripped);
            lines.next();
        }
        if let Some(h) = &mut header {
            if h.ends_with('\n') {
                h.pop();
            }
        }
        self.config_header = header;

        for line in lines {
            let line = line.trim_end();
            if let Some(caps) = SET_RE.captures(line) {
                let full_name = caps.get(1).unwrap().as_str();
                let raw_value = caps.get(2).unwrap().as_str();
                let Some(name) = full_name.strip_prefix(self.config_prefix()) else {
                    continue;
                };

                let value = if let Some(rest) = raw_value.strip_prefix('"') {
                    let Some(inner) = rest.strip_suffix('"') else {
                        return Err(ConfigError::MalformedAssignment {
                            line: line.to_string(),
                        }
                        .into());
                    };
                    unescape(inner)
                } else {
                    raw_value.to_string()
                };

                self.apply_loaded_value(name, &value);
            } else if let Some(caps) = UNSET_RE.captures(line) {
                let full_name = caps.get(1).unwrap().as_str();
                if let Some(name) = full_name.strip_prefix(self.config_prefix()) {
                    // The marker only means something for bool/tristate
                    // symbols.
                    match self.symbol(name) {
                        Some(id)
                            if !matches!(
                                self.effective_type(id),
                                SymbolType::Bool | SymbolType::Tristate
                            ) => {}
                        _ => self.apply_loaded_value(name, "n"),
                    }
                }
            }
            // Anything else (blank lines, stray comments, indented
            // assignments) is ignored.
        }

        Ok(())
    }

    pub fn load_config_file(&mut self, path: impl AsRef<Path>, replace: bool) -> ConfigResult<()> {
        let text = fs::read_to_string(path.as_ref()).map_err(ConfigError::from)?;
        self.load_config_str(&text, replace)
    }

    fn apply_loaded_value(&mut self, name: &str, value: &str) {
        match self.symbol(name) {
            Some(id) => {
                self.set_user_value(id, value);
            }
            None => {
                warn!(symbol = name, "assignment to undefined symbol");
                self.undefined_assignments
                    .push((name.to_string(), value.to_string()));
            }
        }
    }

    /// Assignment lines recorded for names the graph does not know;
    /// diagnostics for the caller.
    pub fn undefined_assignments(&self) -> &[(String, String)] {
        &self.undefined_assignments
    }

    /// The verbatim header of the most recently loaded assignment file.
    pub fn config_header(&self) -> Option<&str> {
        self.config_header.as_deref()
    }

    /// Serializes every user-relevant symbol, walking the item tree in
    /// declaration order.
    pub fn format_config(&self, header: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(header) = header {
            out.push_str(&comment_out(header));
            out.push('\n');
        }

        let mut written = Vec::new();
        for &item in self.top_level_items() {
            self.format_item(item, &mut out, &mut written);
        }
        out
    }

    pub fn write_config_file(
        &self,
        path: impl AsRef<Path>,
        header: Option<&str>,
    ) -> ConfigResult<()> {
        fs::write(path.as_ref(), self.format_config(header)).map_err(ConfigError::from)?;
        Ok(())
    }

    fn format_item(&self, item: Item, out: &mut String, written: &mut Vec<SymbolId>) {
        match item {
            Item::Symbol(id) => self.format_symbol(id, out, written),
            Item::Choice(_) | Item::Menu(_) => {
                for child in self.items_of(item, false) {
                    self.format_item(child, out, written);
                }
            }
            Item::Comment(_) => {}
        }
    }

    fn format_symbol(&self, id: SymbolId, out: &mut String, written: &mut Vec<SymbolId>) {
        let sym = self.sym(id);
        // A symbol can appear in several spots of the tree; it is written
        // at its first one only. Special symbols never persist.
        if sym.is_special() || written.contains(&id) {
            return;
        }

        let value = self.value(id);
        if !sym.write_to_conf.get() {
            return;
        }
        written.push(id);

        let name = sym.name();
        let prefix = self.config_prefix();
        match (self.effective_type(id), &value) {
            (SymbolType::Bool | SymbolType::Tristate, Value::Tristate(Tristate::No)) => {
                out.push_str(&format!("# {prefix}{name} is not set\n"));
            }
            (SymbolType::Bool | SymbolType::Tristate, Value::Tristate(t)) => {
                out.push_str(&format!("{prefix}{name}={t}\n"));
            }
            (SymbolType::String, value) => {
                out.push_str(&format!("{prefix}{name}=\"{}\"\n", escape(value.as_str())));
            }
            (SymbolType::Int | SymbolType::Hex, value) => {
                out.push_str(&format!("{prefix}{name}={}\n", value.as_str()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{comment_out, escape, unescape};
    use crate::config::symbol::SymbolType;
    use crate::config::Config;

    fn escape_fixture() -> (Config, crate::config::symbol::SymbolId) {
        let mut c = Config::new();
        let s = c.define_symbol("STRING", SymbolType::String, None, None);
        c.add_prompt(s, "string", None);
        (c, s)
    }

    #[test]
    fn escaping_is_inverse() {
        for value in [r#"\"#, r#"""#, r#"\"a'\\"#, "plain", ""] {
            assert_eq!(unescape(&escape(value)), value);
        }
    }

    #[test]
    fn writes_escaped_string_values() {
        let (mut c, s) = escape_fixture();
        c.set_user_value(s, r#""\"#);
        assert_eq!(c.format_config(None), "CONFIG_STRING=\"\\\"\\\\\"\n");
    }

    #[test]
    fn string_value_round_trips() {
        let (mut c, s) = escape_fixture();
        let nasty = r#"\"a'\\"#;
        c.set_user_value(s, nasty);
        let formatted = c.format_config(None);
        assert_eq!(formatted, "CONFIG_STRING=\"\\\\\\\"a'\\\\\\\\\"\n");

        let (mut c2, s2) = escape_fixture();
        c2.load_config_str(&formatted, true).unwrap();
        assert_eq!(c2.value(s2).as_str(), nasty);
    }

    #[test]
    fn header_round_trips() {
        let (mut c, _) = escape_fixture();
        for header in [
            "", " ", "\n", "\n\n", "#", "a", "a\n", "a\n\n", "abcdef",
            "foo\nbar baz\n\n\n qaz#",
        ] {
            let formatted = c.format_config(Some(header));
            c.load_config_str(&formatted, true).unwrap();
            assert_eq!(c.config_header(), Some(header), "header {header:?}");
        }
    }

    #[test]
    fn no_header_reads_as_none() {
        let (mut c, _) = escape_fixture();
        c.load_config_str("", true).unwrap();
        assert_eq!(c.config_header(), None);

        // A not-set marker is not a header.
        c.load_config_str("# CONFIG_STRING is not set\n", true).unwrap();
        assert_eq!(c.config_header(), None);

        // A single bare comment marker is an empty header.
        c.load_config_str("#\n", true).unwrap();
        assert_eq!(c.config_header(), Some(""));
    }

    #[test]
    fn comment_out_shapes() {
        assert_eq!(comment_out(""), "#");
        assert_eq!(comment_out("a"), "#a");
        assert_eq!(comment_out("a\n"), "#a\n#");
        assert_eq!(comment_out("a\nb"), "#a\n#b");
    }

    #[test]
    fn merge_only_touches_listed_symbols() {
        let mut c = Config::new();
        let b = c.define_symbol("BOOL", SymbolType::Bool, None, None);
        c.add_prompt(b, "bool", None);
        let s = c.define_symbol("STRING", SymbolType::String, None, None);
        c.add_prompt(s, "string", None);

        assert_eq!(c.value(b).as_str(), "n");
        assert_eq!(c.value(s).as_str(), "");

        c.load_config_str("CONFIG_BOOL=y\n", false).unwrap();
        assert_eq!(c.value(b).as_str(), "y");
        assert_eq!(c.value(s).as_str(), "");

        c.load_config_str("CONFIG_STRING=\"foo bar\"\n", false).unwrap();
        assert_eq!(c.value(b).as_str(), "y");
        assert_eq!(c.value(s).as_str(), "foo bar");

        // Replace mode resets what the file does not mention.
        c.load_config_str("CONFIG_STRING=\"foo bar\"\n", true).unwrap();
        assert_eq!(c.value(b).as_str(), "n");
        assert_eq!(c.value(s).as_str(), "foo bar");

        // An empty file in replace mode clears everything.
        c.load_config_str("", true).unwrap();
        assert_eq!(c.value(s).as_str(), "");
    }

    #[test]
    fn indented_assignments_are_ignored() {
        let mut c = Config::new();
        let b = c.define_symbol("IGNOREME", SymbolType::Bool, None, None);
        c.add_prompt(b, "ignore me", None);
        c.set_user_value(b, "y");
        c.load_config_str("  CONFIG_IGNOREME=n\n", false).unwrap();
        assert_eq!(c.value(b).as_str(), "y");
    }

    #[test]
    fn unknown_names_are_recorded() {
        let mut c = Config::new();
        c.load_config_str("CONFIG_NO_SUCH=y\n", false).unwrap();
        assert_eq!(
            c.undefined_assignments(),
            &[("NO_SUCH".to_string(), "y".to_string())]
        );
    }

    #[test]
    fn not_set_marker_sets_no() {
        let mut c = Config::new();
        let b = c.define_symbol("BOOL", SymbolType::Bool, None, None);
        c.add_prompt(b, "bool", None);
        c.set_user_value(b, "y");
        c.load_config_str("# CONFIG_BOOL is not set\n", false).unwrap();
        assert_eq!(c.value(b).as_str(), "n");
        assert_eq!(c.user_value(b).map(|v| v.as_str().to_string()), Some("n".into()));
    }

    #[test]
    fn bool_no_writes_marker_line() {
        let mut c = Config::new();
        let b = c.define_symbol("BOOL", SymbolType::Bool, None, None);
        c.add_prompt(b, "bool", None);
        c.set_user_value(b, "n");
        assert_eq!(c.format_config(None), "# CONFIG_BOOL is not set\n");
    }

    #[test]
    fn hex_user_text_form_is_preserved() {
        let mut c = Config::new();
        let h = c.define_symbol("HEX", SymbolType::Hex, None, None);
        c.add_prompt(h, "hex", None);
        c.set_user_value(h, "0x123");
        assert_eq!(c.format_config(None), "CONFIG_HEX=0x123\n");
        c.set_user_value(h, "123");
        assert_eq!(c.format_config(None), "CONFIG_HEX=123\n");
    }
}
