//! Thin CLI driver over the `cfront` library: flag parsing and I/O only, per spec.md §6's
//! "CLI surface" table. All actual work happens in [`cfront::session::Session`].

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use cfront::session::Session;

#[derive(Parser, Debug)]
#[command(name = "cfront", version, about = "A preprocessor and parser front-end for C11/C23")]
struct Args {
    /// Source file to process, or `-` for stdin.
    path: String,

    /// Add a user include search path (searched after the file's own directory).
    #[arg(short = 'I', value_name = "path")]
    user_includes: Vec<String>,

    /// Add a system include search path.
    #[arg(long, value_name = "path")]
    isystem: Vec<String>,

    /// Define a macro: `name` or `name=value` (value defaults to `1`).
    #[arg(short = 'D', value_name = "name[=val]")]
    defines: Vec<String>,

    /// Undefine a macro.
    #[arg(short = 'U', value_name = "name")]
    undefs: Vec<String>,

    /// Print the AST as S-expressions.
    #[arg(short = 'a', long = "ast")]
    ast: bool,

    /// Print the token stream.
    #[arg(short = 'P', long = "print-tokens")]
    print_tokens: bool,

    /// Print preprocessed source.
    #[arg(short = 'E', long = "preprocess")]
    preprocess_only: bool,

    /// Emit a JSON declaration summary.
    #[arg(short = 'j', long = "json")]
    json: bool,

    /// Skip the preprocessor; parse the file as-is.
    #[arg(short = 'X', long = "no-preprocess")]
    no_preprocess: bool,

    /// Write output to `file` instead of stdout.
    #[arg(short = 'o', value_name = "file")]
    output: Option<String>,

    /// Bound on collected errors before aborting.
    #[arg(long = "max-errors", value_name = "N")]
    max_errors: Option<usize>,

    /// Treat warnings as errors.
    #[arg(long = "Werror")]
    warnings_as_errors: bool,

    /// Soft size cap for `#embed`, e.g. `64K`, `1M`.
    #[arg(long = "embed-limit", value_name = "SIZE")]
    embed_limit: Option<String>,

    /// Makes the `#embed` cap a hard error instead of a warning.
    #[arg(long = "embed-hard-limit")]
    embed_hard_limit: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

fn run(args: Args) -> Result<(), ()> {
    let mut session = Session::new();

    for dir in &args.user_includes {
        session.add_user_include_dir(dir);
    }
    for dir in &args.isystem {
        session.add_system_include_dir(dir);
    }
    for spec in &args.defines {
        session.define(spec).map_err(|e| eprintln!("{}", e))?;
    }
    for name in &args.undefs {
        session.undef(name);
    }
    if let Some(n) = args.max_errors {
        session.set_max_errors(n);
    }
    session.set_warnings_as_errors(args.warnings_as_errors);
    if let Some(spec) = &args.embed_limit {
        let bytes = parse_size(spec).ok_or_else(|| eprintln!("invalid --embed-limit value '{}'", spec))?;
        session.pp.embed_limit = Some(bytes);
        if args.embed_hard_limit {
            session.pp.embed_hard_limit = Some(bytes);
        }
    }

    let tokens = if args.no_preprocess {
        let file = session.sources.add_from_path(&args.path).map_err(|e| eprintln!("{}: {}", args.path, e))?;
        let mut toks =
            cfront::lexer::tokenize(file, &session.sources.get(file).contents, &mut session.diags).map_err(|e| eprintln!("{}", e))?;
        cfront::lexer::convert_pp_tokens(&mut toks, &mut session.interner, &mut session.diags).map_err(|e| eprintln!("{}", e))?;
        toks
    } else if args.path == "-" {
        session.preprocess_stdin().map_err(|e| eprintln!("{}", e))?
    } else {
        session.preprocess(&args.path).map_err(|e| eprintln!("{}", e))?
    };

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path).map_err(|e| eprintln!("{}: {}", path, e))?),
        None => Box::new(io::stdout()),
    };

    if args.print_tokens {
        let _ = session.print_tokens(&tokens, &mut out);
    }
    if args.preprocess_only {
        let _ = session.print_preprocessed(&tokens, &mut out);
    }

    if args.ast || args.json || (!args.print_tokens && !args.preprocess_only) {
        let prog = session.parse(tokens).map_err(|e| eprintln!("{}", e))?;
        if args.ast {
            let _ = session.print_ast(&prog, &mut out);
        }
        if args.json {
            let _ = session.output_json(&prog, &mut out);
        }
    }

    if session.has_errors() {
        let _ = session.print_all_errors();
        return Err(());
    }
    Ok(())
}

fn parse_size(spec: &str) -> Option<u64> {
    let spec = spec.trim();
    let (digits, mult) = match spec.chars().last() {
        Some('K') | Some('k') => (&spec[..spec.len() - 1], 1024),
        Some('M') | Some('m') => (&spec[..spec.len() - 1], 1024 * 1024),
        Some('G') | Some('g') => (&spec[..spec.len() - 1], 1024 * 1024 * 1024),
        Some('B') | Some('b') => (&spec[..spec.len() - 1], 1),
        _ => (spec, 1),
    };
    digits.trim().parse::<u64>().ok().map(|n| n * mult)
}
