use anyhow::Result;
use is_terminal::IsTerminal;
use std::io;

use pypad::{cli::Cli, config::Config, handlers, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Load config; CLI flags override it
    let mut cfg = Config::load();
    if let Some(python) = args.python.as_deref() {
        cfg.set("PYPAD_PYTHON", python);
    }

    let interactive = !args.wants_batch() && io::stdin().is_terminal() && io::stdout().is_terminal();
    if interactive {
        logging::init_file(&cfg.log_file(), args.verbose)?;
        handlers::pad::run(&cfg, &args.files, args.in_place).await
    } else {
        logging::init_stderr(args.verbose);
        let options = handlers::run::BatchOptions {
            line: args.line,
            end_line: args.end_line,
            cell: args.cell,
            // Nothing picked: step through the whole file
            all: args.all || (args.line.is_none() && !args.cell),
        };
        handlers::run::run(&cfg, &args.files, options).await
    }
}
