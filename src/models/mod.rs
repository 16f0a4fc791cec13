pub mod activity;
pub mod clause;
pub mod document;
pub mod enums;
pub mod passage;
pub mod progress;

pub use activity::*;
pub use clause::*;
pub use document::*;
pub use enums::*;
pub use passage::*;
pub use progress::*;
