pub mod assembler;
pub mod ast;
pub mod diag;
pub mod error;
pub mod eval;
pub mod image;
pub mod lexer;
pub mod listing;
pub mod object;
pub mod parser;
pub mod pass1;
pub mod pass2;
pub mod span;
pub mod symtab;

pub use assembler::{Assembler, Assembly};
pub use diag::{Diagnostic, Severity, render_diagnostic, render_diagnostics};
pub use error::AsmError;
pub use image::Image;
pub use listing::{format_listing, write_listing};
pub use object::{format_object, read_object, write_object};
pub use span::SourceFile;
