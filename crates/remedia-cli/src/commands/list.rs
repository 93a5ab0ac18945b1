use std::path::Path;

use remedia_core::features::{
    AppContext, Content, ContentService, Expert, HealthConcern, NewsArticle, Remedy, Symptom,
    Video,
};

use crate::cli::ContentKind;
use crate::commands::common::{connect, normalize_search, short_id};
use crate::error::CliError;

pub async fn run_list(
    kind: ContentKind,
    search: Option<&str>,
    limit: usize,
    as_json: bool,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    let search = normalize_search(search)?;
    let (_, ctx) = connect(config_path)?;
    let search = search.as_deref();
    match kind {
        ContentKind::Experts => print_rows::<Expert>(&ctx, search, limit, as_json).await,
        ContentKind::Remedies => print_rows::<Remedy>(&ctx, search, limit, as_json).await,
        ContentKind::News => print_rows::<NewsArticle>(&ctx, search, limit, as_json).await,
        ContentKind::Videos => print_rows::<Video>(&ctx, search, limit, as_json).await,
        ContentKind::HealthConcerns => {
            print_rows::<HealthConcern>(&ctx, search, limit, as_json).await
        }
        ContentKind::Symptoms => print_rows::<Symptom>(&ctx, search, limit, as_json).await,
    }
}

async fn print_rows<T: Content>(
    ctx: &AppContext,
    search: Option<&str>,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let rows = ContentService::<T>::new(ctx).page(search, limit).await?;
    let rows = rows.as_slice();

    if as_json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if rows.is_empty() {
        println!("No {} found.", T::TABLE.replace('_', " "));
    } else {
        for line in format_rows(rows) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_rows<T: Content>(rows: &[T]) -> Vec<String> {
    rows.iter()
        .map(|row| format!("{:<8}  {}", short_id(row.id()), row.label()))
        .collect()
}
