mod attrs;
mod command;
mod editor;
mod extension;
mod extensions;
mod node;
mod ops;
mod selection;
mod state;
mod status;
mod update;
mod view;

pub use crate::attrs::*;
pub use crate::command::*;
pub use crate::editor::*;
pub use crate::extension::*;
pub use crate::extensions::*;
pub use crate::node::*;
pub use crate::ops::*;
pub use crate::selection::*;
pub use crate::state::*;
pub use crate::status::*;
pub use crate::update::*;
pub use crate::view::*;
