use std::fmt;

/// The truth value of every expression and the value domain of bool/tristate
/// symbols. Totally ordered: `No < Mod < Yes`, so `min`/`max` double as the
/// AND/OR connectives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tristate {
    No,
    Mod,
    Yes,
}

impl Tristate {
    /// Parses the canonical one-letter spelling. Anything other than
    /// `n`/`m`/`y` is not a tri-state.
    pub fn from_name(s: &str) -> Option<Tristate> {
        match s {
            "n" => Some(Tristate::No),
            "m" => Some(Tristate::Mod),
            "y" => Some(Tristate::Yes),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tristate::No => "n",
            Tristate::Mod => "m",
            Tristate::Yes => "y",
        }
    }

    /// Boolean negation. `Mod` maps to `No`.
    pub fn not(self) -> Tristate {
        match self {
            Tristate::No => Tristate::Yes,
            Tristate::Mod | Tristate::Yes => Tristate::No,
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Tristate::{self, Mod, No, Yes};

    const ALL: [Tristate; 3] = [No, Mod, Yes];

    fn truth_table(cmp: fn(Tristate, Tristate) -> bool) -> Vec<bool> {
        ALL.iter()
            .flat_map(|&a| ALL.iter().map(move |&b| cmp(a, b)))
            .collect()
    }

    #[test]
    fn ordering_less() {
        assert_eq!(
            truth_table(|a, b| a < b),
            vec![false, true, true, false, false, true, false, false, false]
        );
    }

    #[test]
    fn ordering_less_eq() {
        assert_eq!(
            truth_table(|a, b| a <= b),
            vec![true, true, true, false, true, true, false, false, true]
        );
    }

    #[test]
    fn ordering_greater() {
        assert_eq!(
            truth_table(|a, b| a > b),
            vec![false, false, false, true, false, false, true, true, false]
        );
    }

    #[test]
    fn ordering_greater_eq() {
        assert_eq!(
            truth_table(|a, b| a >= b),
            vec![true, false, false, true, true, false, true, true, true]
        );
    }

    #[test]
    fn connectives() {
        // AND is min, OR is max.
        assert_eq!(No.max(Mod), Mod);
        assert_eq!(Mod.max(Yes), Yes);
        assert_eq!(Mod.min(Yes), Mod);
        assert_eq!(No.min(Yes), No);
        assert_eq!(Yes.not(), No);
        assert_eq!(Mod.not(), No);
        assert_eq!(No.not(), Yes);
    }

    #[test]
    fn names_round_trip() {
        for t in ALL {
            assert_eq!(Tristate::from_name(t.name()), Some(t));
            assert_eq!(t.to_string(), t.name());
        }
        assert_eq!(Tristate::from_name("M"), None);
        assert_eq!(Tristate::from_name("yes"), None);
        assert_eq!(Tristate::from_name(""), None);
    }
}
