pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "filtering-system")]
#[command(about = "Parse, compile and page criteria filters")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Parse a filters string into canonical criteria")]
    Parse(commands::parse::ParseArgs),

    #[command(about = "Compile filters into a query document")]
    Compile(commands::compile::CompileArgs),

    #[command(about = "Page through a JSON array file with filters and sorting")]
    Paginate(commands::paginate::PaginateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Parse(args) => commands::parse::handle(args, output_format),
        Commands::Compile(args) => commands::compile::handle(args, output_format),
        Commands::Paginate(args) => commands::paginate::handle(args, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paginate_flags() {
        let cli = Cli::parse_from([
            "filtering-system",
            "--json",
            "paginate",
            "items.json",
            "--filters",
            r#"{"qty":{"gt":1}}"#,
            "--page",
            "2",
            "--sort-order",
            "asc",
            "--deny",
            "secret",
            "--deny",
            "token",
        ]);
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Paginate(args) => {
                assert_eq!(args.file, "items.json");
                assert_eq!(args.page, Some(2));
                assert_eq!(args.deny, vec!["secret", "token"]);
            }
            _ => panic!("expected paginate"),
        }
    }
}
