use crate::config::choice::ChoiceId;
use crate::config::symbol::SymbolId;
use crate::config::SourceLoc;
use crate::expr::Expr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MenuId(pub(crate) u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommentId(pub(crate) u32);

impl MenuId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl CommentId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the structural tree: what a menu, choice, or the top level
/// contains, in declaration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Item {
    Symbol(SymbolId),
    Choice(ChoiceId),
    Menu(MenuId),
    Comment(CommentId),
}

pub struct Menu {
    pub(crate) title: String,
    /// `depends on`: gates the menu and, through propagation by the front
    /// end, everything inside it.
    pub(crate) dep: Option<Expr>,
    /// `visible if`: gates whether contained prompts are shown, without
    /// affecting computed values that don't go through a prompt.
    pub(crate) visible_if: Vec<Expr>,
    /// Extra dependencies contributed by enclosing menus/ifs.
    pub(crate) deps: Vec<Expr>,
    pub(crate) items: Vec<Item>,
    pub(crate) parent: Option<Item>,
    pub(crate) location: Option<SourceLoc>,
}

impl Menu {
    pub(crate) fn new(title: String, dep: Option<Expr>) -> Menu {
        Menu {
            title,
            dep,
            visible_if: Vec::new(),
            deps: Vec::new(),
            items: Vec::new(),
            parent: None,
            location: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn location(&self) -> Option<&SourceLoc> {
        self.location.as_ref()
    }
}

pub struct Comment {
    pub(crate) text: String,
    pub(crate) dep: Option<Expr>,
    pub(crate) deps: Vec<Expr>,
    pub(crate) parent: Option<Item>,
    pub(crate) location: Option<SourceLoc>,
}

impl Comment {
    pub(crate) fn new(text: String, dep: Option<Expr>) -> Comment {
        Comment {
            text,
            dep,
            deps: Vec::new(),
            parent: None,
            location: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn location(&self) -> Option<&SourceLoc> {
        self.location.as_ref()
    }
}
