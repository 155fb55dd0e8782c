use clap::Args;
use serde_json::json;

use crate::cli::utils::{output_value, policy_from, read_filters};
use crate::cli::OutputFormat;
use crate::database::{SqlParam, SqlWhere};
use crate::services::FilteringService;

#[derive(Args, Debug)]
pub struct CompileArgs {
    #[arg(help = "Filters JSON (object or array shorthand), or - for stdin")]
    pub filters: String,

    #[arg(long = "deny", value_name = "FIELD", help = "Field that may not be filtered on (repeatable)")]
    pub deny: Vec<String>,

    #[arg(long, help = "Render a parameterised SQL WHERE clause instead of a query document")]
    pub sql: bool,
}

pub fn handle(args: CompileArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = FilteringService::from_global_config();
    let criteria = service.parse_filters(read_filters(&args.filters)?)?;
    let predicate = service.compile_query(&criteria, &policy_from(&args.deny))?;

    if args.sql {
        let (clause, params) = SqlWhere::generate(&predicate)?;
        let params: Vec<_> = params.iter().map(SqlParam::to_json).collect();
        let value = json!({ "where": clause, "params": params });
        return output_value(output_format, &value, || {
            let mut lines = vec![clause.clone()];
            lines.extend(params.iter().enumerate().map(|(i, p)| format!("  ${} = {}", i + 1, p)));
            lines.join("\n")
        });
    }

    output_value(output_format, &predicate.to_document(), || predicate.to_string())
}
