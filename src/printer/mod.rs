//! Output writers: token dump, preprocessed-source reconstruction, AST S-expressions, and the
//! JSON declaration summary (spec.md §6). Each is a straightforward tree walk over the typed
//! AST the parser already built; none of these modules do any further analysis.

pub mod ast;
pub mod json;
pub mod tokens;
