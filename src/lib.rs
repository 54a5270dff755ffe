#![forbid(unsafe_code)]
//! A C99-to-x86-64 ahead-of-time compiler core (spec.md §1-§2).
//!
//! The excluded lexer/preprocessor hands a finished [`token::Token`]
//! stream to [`parser`]; everything from there — parsing, semantic
//! analysis, constant folding, AIR construction, target localization,
//! register allocation, instruction selection, and GAS emission — lives
//! in this crate. [`compile_translation_unit`] threads one token stream
//! through the whole pipeline.

pub mod air;
pub mod ast;
pub mod constexpr;
pub mod diag;
pub mod emit;
pub mod localize;
pub mod options;
pub mod parser;
pub mod regalloc;
pub mod select;
pub mod sema;
pub mod symbol;
pub mod token;
pub mod types;

use air::AirModule;
use anyhow::Result;
use diag::DiagnosticBag;
use options::CompileOptions;
use token::Token;

/// Result of running the whole pipeline over one translation unit.
pub struct CompileResult {
    pub diags: DiagnosticBag,
    /// `None` when parsing or semantic analysis produced a fatal
    /// diagnostic and code generation was skipped.
    pub assembly: Option<String>,
}

/// Runs every pipeline stage over `tokens` (spec.md §2): parse, analyze,
/// and — if analysis collected no error-severity diagnostic — build AIR,
/// localize, allocate registers, select instructions, and emit GAS
/// assembly text.
///
/// Returns `Err` only for a fatal internal error below the analyzer (spec.md
/// §7): an invariant a well-typed program should never trip. Diagnostics
/// collected during parsing/analysis are surfaced through `CompileResult`
/// regardless of whether code generation ran.
pub fn compile_translation_unit(tokens: &[Token], options: &CompileOptions) -> Result<CompileResult> {
    let parser::ParseResult { mut ast, mut symtab, scopes, root, mut diags } = parser::Parser::new(tokens).parse_translation_unit();

    sema::analyze(&mut ast, &mut symtab, &scopes, root, &mut diags);

    let blocked = diags.has_errors() || (options.warnings_as_errors && !diags.is_empty());
    if blocked {
        return Ok(CompileResult { diags, assembly: None });
    }

    let mut module: AirModule = air::builder::build(&ast, &mut symtab, &mut diags, root);
    if diags.has_errors() || (options.warnings_as_errors && !diags.is_empty()) {
        return Ok(CompileResult { diags, assembly: None });
    }
    localize::run(&mut module, &symtab);
    let allocated = regalloc::run(&module)?;
    let program = select::run(&allocated, &symtab)?;
    let assembly = emit::emit(&program, &symtab, options);

    Ok(CompileResult { diags, assembly: Some(assembly) })
}
