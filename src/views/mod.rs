//! Read-only presentations of a result page.
//!
//! Each adapter turns a [`PageSnapshot`] into rows ready to print. Adapters
//! hold only formatting options, so one instance can render any number of
//! snapshots from any number of models.

pub mod list;
pub mod table;
pub mod tree;

pub use list::{ListAdapter, ListPage, ListRow};
pub use table::{Table, TableAdapter, TableRow};
pub use tree::{TreeAdapter, TreeRow, TreeView};

use crate::state::PageSnapshot;

/// Projection of a page snapshot into a display structure.
pub trait DocumentPresenter {
    type Output;

    fn present(&self, snapshot: &PageSnapshot) -> Self::Output;
}

/// Presentation picked on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewKind {
    #[default]
    List,
    Table,
    Tree,
}

impl ViewKind {
    /// Render `snapshot` with the default adapter for this kind.
    pub fn render(self, snapshot: &PageSnapshot) -> String {
        match self {
            ViewKind::List => ListAdapter::default().present(snapshot).to_string(),
            ViewKind::Table => TableAdapter::default().present(snapshot).to_string(),
            ViewKind::Tree => TreeAdapter::default().present(snapshot).to_string(),
        }
    }
}
