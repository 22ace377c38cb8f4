//! The reverse-dependency view of the graph and cache invalidation.
//!
//! Edges are structural: symbol R gets an edge to symbol S when S's
//! declarations mention R, set once by the front end and never affected by
//! value mutation. The per-symbol dependent *set* is the transitive closure
//! over those edges (plus choice siblings), memoized on first use. Mutating
//! a user value invalidates the value/visibility caches along the closure,
//! never the edge index itself.

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::config::choice::ChoiceId;
use crate::config::symbol::SymbolId;
use crate::config::Config;
use crate::expr::Expr;

fn add_refs<'a>(
    config: &Config,
    edges: &mut [IndexSet<SymbolId>],
    exprs: impl Iterator<Item = &'a Expr>,
    dependent: SymbolId,
) {
    for expr in exprs {
        for referenced in expr.referenced() {
            if !config.sym(referenced).constant && referenced != dependent {
                edges[referenced.index()].insert(dependent);
            }
        }
    }
}

impl Config {
    /// Direct dependents per symbol: everything whose own declarations
    /// mention it. Built lazily, rebuilt only after structural changes.
    fn with_direct_dependents<R>(&self, f: impl FnOnce(&[Vec<SymbolId>]) -> R) -> R {
        let gen = self.structure_gen.get();
        {
            let cached = self.direct_dependents.borrow();
            if let Some((stamp, edges)) = &*cached {
                if *stamp == gen {
                    return f(edges);
                }
            }
        }

        let edges = self.build_direct_dependents();
        let result = f(&edges);
        *self.direct_dependents.borrow_mut() = Some((gen, edges));
        result
    }

    fn build_direct_dependents(&self) -> Vec<Vec<SymbolId>> {
        debug!(
            symbols = self.symbols.len(),
            "building reverse-dependency index"
        );
        let mut edges: Vec<IndexSet<SymbolId>> = vec![IndexSet::new(); self.symbols.len()];

        for (index, sym) in self.symbols.iter().enumerate() {
            let id = SymbolId(index as u32);

            add_refs(
                self,
                &mut edges,
                sym.prompts
                    .iter()
                    .map(|prompt| &prompt.condition)
                    .chain(sym.defaults.iter().flat_map(|d| [&d.value, &d.condition]))
                    .chain(
                        sym.ranges
                            .iter()
                            .flat_map(|r| [&r.low, &r.high, &r.condition]),
                    )
                    .chain(sym.deps.iter()),
                id,
            );

            // A selecting/implying symbol (and its gates) can move the
            // target.
            for (target, condition) in sym.selects.iter().chain(&sym.implies) {
                if !sym.constant {
                    edges[index].insert(*target);
                }
                add_refs(self, &mut edges, std::iter::once(condition), *target);
            }
        }

        for index in 0..self.choices.len() {
            let cid = ChoiceId(index as u32);
            // Anything gating the choice can change every member.
            for member in self.choice_symbols(cid) {
                let choice = self.choice_ref(cid);
                add_refs(
                    self,
                    &mut edges,
                    choice
                        .prompts
                        .iter()
                        .map(|prompt| &prompt.condition)
                        .chain(choice.defaults.iter().map(|d| &d.condition))
                        .chain(choice.deps.iter()),
                    member,
                );
            }
        }

        edges
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect()
    }

    /// The transitive set of symbols whose computed value or visibility may
    /// change when this symbol's value does. Stable across repeated calls;
    /// survives value-cache invalidation.
    pub fn dependents(&self, id: SymbolId) -> Vec<SymbolId> {
        let gen = self.structure_gen.get();
        {
            let cached = self.sym(id).cached_dependents.borrow();
            if let Some((stamp, set)) = &*cached {
                if *stamp == gen {
                    return set.iter().copied().collect();
                }
            }
        }

        let set = self.with_direct_dependents(|edges| {
            let mut set = IndexSet::new();
            let mut expanded = IndexSet::new();
            for &dependent in &edges[id.index()] {
                self.expand(edges, dependent, &mut set, &mut expanded);
            }
            // Changing one choice member can flip the selection, so the
            // siblings (and everything depending on them) are affected too.
            self.expand_siblings(edges, id, &mut set, &mut expanded);
            set
        });

        trace!(
            symbol = %self.sym(id).name,
            count = set.len(),
            "computed dependent set"
        );
        let result = set.iter().copied().collect();
        *self.sym(id).cached_dependents.borrow_mut() = Some((gen, set));
        result
    }

    /// Adds `id` and everything that may be affected by it: its direct
    /// dependents transitively, and at every level the choice siblings of
    /// the node being expanded.
    fn expand(
        &self,
        edges: &[Vec<SymbolId>],
        id: SymbolId,
        set: &mut IndexSet<SymbolId>,
        expanded: &mut IndexSet<SymbolId>,
    ) {
        if !expanded.insert(id) {
            return;
        }
        set.insert(id);
        for &dependent in &edges[id.index()] {
            self.expand(edges, dependent, set, expanded);
        }
        self.expand_siblings(edges, id, set, expanded);
    }

    /// Sibling expansion is shallow on the sibling itself (it would
    /// otherwise loop straight back to `id`) but full on the sibling's own
    /// dependents.
    fn expand_siblings(
        &self,
        edges: &[Vec<SymbolId>],
        id: SymbolId,
        set: &mut IndexSet<SymbolId>,
        expanded: &mut IndexSet<SymbolId>,
    ) {
        let Some(cid) = self.sym(id).choice else {
            return;
        };
        if !self.is_choice_symbol(id) {
            return;
        }
        for sibling in self.choice_symbols(cid) {
            if sibling == id {
                continue;
            }
            set.insert(sibling);
            for &dependent in &edges[sibling.index()] {
                self.expand(edges, dependent, set, expanded);
            }
        }
    }

    pub(crate) fn invalidate_after_user_change(&self, id: SymbolId) {
        if self.modules_symbol() == Some(id) {
            // Promotion reads the modules state everywhere; start over.
            self.invalidate_all();
            return;
        }
        self.invalidate_symbol(id);
        for dependent in self.dependents(id) {
            self.invalidate_symbol(dependent);
        }
    }

    fn invalidate_symbol(&self, id: SymbolId) {
        let sym = self.sym(id);
        sym.invalidate();
        if let Some(cid) = sym.choice {
            self.choice_ref(cid).invalidate();
        }
    }

    pub(crate) fn invalidate_all(&self) {
        debug!("invalidating all cached values");
        for index in 0..self.symbols.len() {
            self.invalidate_symbol(SymbolId(index as u32));
        }
        for choice in &self.choices {
            choice.invalidate();
        }
    }
}
