//! Purpose index: a tree of dot-separated purpose tags and its pattern matcher.
//!
//! Pattern syntax:
//!
//! ```text
//! PURPOSE1.SUB.OTHER   exact path
//! PURPOSE1.*           every direct child of PURPOSE1
//! PURPOSE1.*.TEST      every TEST below any child of PURPOSE1
//! PURPOSE1.            PURPOSE1 and all of its descendants
//! ```

mod search;
mod tree;

pub use search::{PurposeMatch, PurposeMatches};
pub use tree::{PurposeNode, PurposeTree, BUCKET_KEY};
