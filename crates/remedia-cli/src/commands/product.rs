use std::path::Path;

use remedia_core::features::extract_product;

use crate::commands::common::connect;
use crate::error::CliError;

pub async fn run_product(url: &str, config_path: Option<&Path>) -> Result<(), CliError> {
    let (_, ctx) = connect(config_path)?;
    let product = extract_product(&ctx, url).await?;
    println!("{}", serde_json::to_string_pretty(&product)?);
    Ok(())
}
