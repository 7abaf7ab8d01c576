use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "milopt")]
#[command(about = "Runs graph rewrite passes over a small arithmetic program")]
pub struct Cli {
    /// The program to optimize (e.g., "y = x / 4.0; y")
    #[arg(default_value = "x")]
    pub program: String,

    /// Pass to run, as namespace::name. Repeat to run several in order;
    /// the default pipeline runs when none is given
    #[arg(short, long = "pass", value_name = "ID")]
    pub passes: Vec<String>,

    /// Print the registered pass identifiers and exit
    #[arg(long)]
    pub list: bool,

    /// Check use/def consistency after every pass
    #[arg(long)]
    pub verify: bool,

    /// Write the optimized program here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log: String,
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["milopt"]).unwrap();
        assert_eq!(cli.program, "x");
        assert!(cli.passes.is_empty());
        assert!(!cli.list);
        assert!(!cli.verify);
        assert_eq!(cli.output, None);
        assert_eq!(cli.log, "warn");
    }

    #[test]
    fn test_repeated_passes_keep_order() {
        let cli = Cli::try_parse_from([
            "milopt",
            "y = x / 2; y",
            "-p",
            "common::dead_code_elimination",
            "--pass",
            "common::divide_to_multiply",
            "--verify",
        ])
        .unwrap();
        assert_eq!(
            cli.passes,
            vec!["common::dead_code_elimination", "common::divide_to_multiply"]
        );
        assert!(cli.verify);
    }
}
