use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Args;
use serde_json::Value;

use crate::api::FilterQuery;
use crate::cli::utils::{output_value, policy_from, read_filters};
use crate::cli::OutputFormat;
use crate::database::MemoryCollection;
use crate::error::ApiError;
use crate::services::FilteringService;
use crate::types::SortOrder;

#[derive(Args, Debug)]
pub struct PaginateArgs {
    #[arg(help = "JSON file holding an array of documents")]
    pub file: String,

    #[arg(long, help = "Filters JSON, or - for stdin")]
    pub filters: Option<String>,

    #[arg(long)]
    pub page: Option<u64>,

    #[arg(long)]
    pub limit: Option<u64>,

    #[arg(long)]
    pub sort_by: Option<String>,

    #[arg(long, help = "asc or desc")]
    pub sort_order: Option<SortOrder>,

    #[arg(long = "deny", value_name = "FIELD", help = "Field that may not be filtered or sorted on (repeatable)")]
    pub deny: Vec<String>,

    #[arg(
        long = "relation",
        value_name = "FIELD=FILE",
        help = "Populate FIELD from the documents in FILE, matched on _id (repeatable)"
    )]
    pub relations: Vec<String>,
}

pub async fn handle(args: PaginateArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let name = Path::new(&args.file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("documents")
        .to_string();
    let mut collection = MemoryCollection::new(name, load_documents(&args.file)?);

    let mut populate = Vec::with_capacity(args.relations.len());
    for spec in &args.relations {
        let (field, file) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("relation must look like FIELD=FILE, got '{}'", spec))?;
        let related = MemoryCollection::new(field, load_documents(file)?);
        collection = collection.with_relation(field, Arc::new(related));
        populate.push(field.to_string());
    }

    let query = FilterQuery {
        filters: args.filters.as_deref().map(read_filters).transpose()?,
        page: args.page,
        limit: args.limit,
        sort_by: args.sort_by,
        sort_order: args.sort_order,
    };

    let service = FilteringService::from_global_config();
    let page = service
        .find_page(&collection, query, &policy_from(&args.deny), &populate)
        .await
        .map_err(ApiError::from)?;

    let value = serde_json::to_value(&page)?;
    output_value(output_format, &value, || {
        let mut lines: Vec<String> = page.data.iter().map(Value::to_string).collect();
        let info = &page.pagination;
        lines.push(format!(
            "page {} of {} ({} total, {} per page)",
            info.page, info.total_pages, info.total, info.per_page
        ));
        lines.join("\n")
    })
}

fn load_documents(path: &str) -> anyhow::Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("{} must hold a JSON array of documents", path))
}
