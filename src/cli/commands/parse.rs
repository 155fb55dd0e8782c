use clap::Args;

use crate::cli::utils::{output_value, read_filters};
use crate::cli::OutputFormat;
use crate::filter::{to_shorthand, Criterion};
use crate::services::FilteringService;

#[derive(Args, Debug)]
pub struct ParseArgs {
    #[arg(help = "Filters JSON (object or array shorthand), or - for stdin")]
    pub filters: String,

    #[arg(long, help = "Print the array shorthand instead of canonical criteria")]
    pub shorthand: bool,
}

pub fn handle(args: ParseArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = FilteringService::from_global_config();
    let criteria = service.parse_filters(read_filters(&args.filters)?)?;

    let value = if args.shorthand {
        to_shorthand(&criteria)
    } else {
        serde_json::to_value(&criteria)?
    };
    output_value(output_format, &value, || describe(&criteria, 0))
}

/// One line per criterion, groups indented under their operator
fn describe(criteria: &[Criterion], indent: usize) -> String {
    let pad = "  ".repeat(indent);
    criteria
        .iter()
        .map(|criterion| match criterion {
            Criterion::Leaf { field, operator, value } => format!("{}{} {} {}", pad, field, operator, value),
            Criterion::Group { logical_operator, criteria } => format!(
                "{}{}\n{}",
                pad,
                logical_operator.as_str().to_uppercase(),
                describe(criteria, indent + 1)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
