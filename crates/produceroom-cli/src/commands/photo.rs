use clap::Subcommand;
use produceroom_core::media::resolve_sku;
use serde_json::json;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum PhotoAction {
    /// Print the SKU's completion photo metadata
    Show {
        /// SKU (`77`, `#77`) or an item name carrying one
        target: String,
    },
    /// Delete the SKU's completion photo from the store and the cache
    Delete { target: String },
}

pub fn run(action: PhotoAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    match action {
        PhotoAction::Show { target } => {
            let sku = resolve_sku(&target)?;
            match ctx.lifecycle.completion_photo(&sku)? {
                Some(photo) => print_json(&json!({
                    "sku": sku,
                    "timestamp": photo.timestamp,
                    "size": photo.bytes().map(|b| b.len()),
                }))?,
                None => return Err(format!("no completion photo for SKU {sku}").into()),
            }
        }
        PhotoAction::Delete { target } => {
            let sku = resolve_sku(&target)?;
            print_json(&ctx.lifecycle.delete_completion_photo(&sku)?)?;
        }
    }
    Ok(())
}
