use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser as ClapParser;
use clap::Subcommand;

use log::info;

use rox::ast_printer::AstPrinter;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::Scanner;
use rox::stmt::Stmt;
use rox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Script to execute; omit to start the REPL
    script: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes the provided input from a given valid filepath
    Tokenize { filename: PathBuf },

    /// Parses the provided input and dumps the AST in prefix form
    Parse { filename: PathBuf },
}

/// One interpreter session plus the two per-run flags the exit codes and
/// the REPL loop are built from.
struct Lox {
    interpreter: Interpreter,
    had_error: bool,
    had_runtime_error: bool,
}

impl Lox {
    fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// The full pipeline: scan, parse, resolve, interpret.  Each phase
    /// reports its diagnostics inline and stops the pipeline if the
    /// compile flag came up; runtime errors only surface from `interpret`.
    fn run(&mut self, source: &[u8]) {
        let scanner: Scanner = Scanner::new(source);
        let mut tokens: Vec<Token> = Vec::new();

        for result in scanner {
            match result {
                Ok(token) => tokens.push(token),

                Err(err) => {
                    eprintln!("{}", err);
                    self.had_error = true;
                }
            }
        }

        if self.had_error {
            return;
        }

        let mut parser: Parser = Parser::new(tokens);
        let statements: Vec<Stmt> = parser.parse();

        for err in parser.take_errors() {
            eprintln!("{}", err);
            self.had_error = true;
        }

        if self.had_error {
            return;
        }

        let mut resolver: Resolver = Resolver::new(&mut self.interpreter);
        resolver.resolve(&statements);

        for err in resolver.take_errors() {
            eprintln!("{}", err);
            self.had_error = true;
        }

        if self.had_error {
            return;
        }

        if let Err(err) = self.interpreter.interpret(&statements) {
            eprintln!("{}", err);
            self.had_runtime_error = true;
        }
    }
}

fn read_file(path: &Path) -> Vec<u8> {
    let file: File = match File::open(path) {
        Ok(file) => file,

        Err(err) => {
            eprintln!("Failed to open file {}: {}", path.display(), err);
            std::process::exit(74);
        }
    };

    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(file);

    if let Err(err) = reader.read_to_end(&mut buf) {
        eprintln!("Failed to read file {}: {}", path.display(), err);
        std::process::exit(74);
    }

    buf
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    info!("Running file {}", path.display());

    let source: Vec<u8> = read_file(path);

    let mut lox: Lox = Lox::new();
    lox.run(&source);

    if lox.had_error {
        std::process::exit(65);
    }

    if lox.had_runtime_error {
        std::process::exit(70);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    info!("Starting REPL");

    let mut lox: Lox = Lox::new();

    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line: String = String::new();

        if reader.read_line(&mut line)? == 0 {
            // EOF ends the session.
            break;
        }

        lox.run(line.as_bytes());

        // A bad line must not poison the next one; runtime failures keep
        // their mark.
        lox.had_error = false;
    }

    Ok(())
}

fn tokenize(path: &Path) -> anyhow::Result<()> {
    let source: Vec<u8> = read_file(path);

    let scanner: Scanner = Scanner::new(&source);
    let mut tokenized: bool = true;

    for token in scanner {
        match token {
            Ok(token) => println!("{}", token),

            Err(err) => {
                tokenized = false;
                eprintln!("{}", err);
            }
        }
    }

    if !tokenized {
        std::process::exit(65);
    }

    Ok(())
}

fn parse(path: &Path) -> anyhow::Result<()> {
    let source: Vec<u8> = read_file(path);

    let scanner: Scanner = Scanner::new(&source);
    let mut tokens: Vec<Token> = Vec::new();
    let mut scanned: bool = true;

    for result in scanner {
        match result {
            Ok(token) => tokens.push(token),

            Err(err) => {
                scanned = false;
                eprintln!("{}", err);
            }
        }
    }

    if !scanned {
        std::process::exit(65);
    }

    let mut parser: Parser = Parser::new(tokens);
    let statements: Vec<Stmt> = parser.parse();

    let errors = parser.take_errors();

    for err in &errors {
        eprintln!("{}", err);
    }

    for stmt in &statements {
        println!("{}", AstPrinter::print_stmt(stmt));
    }

    if !errors.is_empty() {
        std::process::exit(65);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(err)
            if err.kind() == clap::error::ErrorKind::DisplayHelp
                || err.kind() == clap::error::ErrorKind::DisplayVersion =>
        {
            err.print()?;
            return Ok(());
        }

        Err(err) => {
            // Bad usage exits 64, not clap's default.
            err.print()?;
            std::process::exit(64);
        }
    };

    match args.command {
        Some(Commands::Tokenize { filename }) => tokenize(&filename)?,

        Some(Commands::Parse { filename }) => parse(&filename)?,

        None => match args.script {
            Some(script) => run_file(&script)?,

            None => run_prompt()?,
        },
    }

    Ok(())
}
