use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "pypad", about = "Run Python files statement by statement", version)]
#[command(group(ArgGroup::new("target").args(["line", "all"]).multiple(false)))]
pub struct Cli {
    /// Files to open. The first one is shown (and run in batch mode).
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Run the block at this line (1-based) and exit.
    #[arg(long, value_name = "N")]
    pub line: Option<usize>,

    /// Last line (1-based) of a selection starting at --line.
    #[arg(long = "end-line", value_name = "M", requires = "line")]
    pub end_line: Option<usize>,

    /// Run the whole #%% cell around --line instead of one statement.
    #[arg(long)]
    pub cell: bool,

    /// Step through the whole file block by block.
    #[arg(long)]
    pub all: bool,

    /// Keep the cursor where it is after running (interactive mode).
    #[arg(long = "in-place")]
    pub in_place: bool,

    /// Python interpreter to start.
    #[arg(long, value_name = "PATH")]
    pub python: Option<String>,

    /// Log debug output.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Whether a one-shot run was asked for on the command line.
    pub fn wants_batch(&self) -> bool {
        self.line.is_some() || self.cell || self.all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from(["pypad", "a.py", "--line", "3", "--end-line", "5", "--cell"]).unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("a.py")]);
        assert_eq!(cli.line, Some(3));
        assert_eq!(cli.end_line, Some(5));
        assert!(cli.cell && cli.wants_batch());
    }

    #[test]
    fn line_and_all_conflict() {
        assert!(Cli::try_parse_from(["pypad", "a.py", "--line", "3", "--all"]).is_err());
        assert!(Cli::try_parse_from(["pypad", "a.py", "--end-line", "3"]).is_err());
    }
}
