//! `cfront`: a standalone C11/C23 preprocessor and parser front end.
//!
//! Three stages, run in order by [`session::Session`]: tokenize, preprocess (macro expansion,
//! conditional inclusion, `#embed`), and parse into a typed [`ast::Program`]. Everything past
//! that — the [`printer`] module and the `cfront` binary — is a thin consumer of the `Program`
//! the parser hands back.

pub mod arena;
pub mod ast;
pub mod constexpr;
pub mod diagnostics;
pub mod hashmap;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod printer;
pub mod session;
pub mod source;
pub mod stdlib_headers;
pub mod token;
pub mod types;
pub mod unicode;

pub use session::Session;
