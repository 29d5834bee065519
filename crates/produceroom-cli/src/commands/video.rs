use std::path::PathBuf;

use clap::Subcommand;
use produceroom_core::media::resolve_sku;
use produceroom_core::VideoLibrary;
use serde_json::json;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum VideoAction {
    /// Store a WebM file as the SKU's instructional video
    Upload {
        /// SKU (`77`, `#77`) or an item name carrying one
        target: String,
        file: PathBuf,
    },
    /// List stored videos by SKU
    List,
    /// Delete the SKU's video
    Delete { target: String },
    /// Print a playable URL for the SKU's video
    Url { target: String },
}

pub fn run(action: VideoAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open()?;
    let blobs = ctx.blobs();
    let videos = VideoLibrary::new(&blobs).with_cache(&ctx.cache);
    match action {
        VideoAction::Upload { target, file } => {
            let sku = resolve_sku(&target)?;
            let bytes = std::fs::read(&file)?;
            let meta = videos.save(&sku, &bytes)?;
            print_json(&json!({ "sku": sku, "meta": meta }))?;
        }
        VideoAction::List => print_json(&videos.list()?)?,
        VideoAction::Delete { target } => {
            let sku = resolve_sku(&target)?;
            videos.delete(&sku)?;
            println!("deleted video for SKU {sku}");
        }
        VideoAction::Url { target } => {
            let sku = resolve_sku(&target)?;
            match videos.url(&sku)? {
                Some(url) => println!("{url}"),
                None => return Err(format!("no video for SKU {sku}").into()),
            }
        }
    }
    Ok(())
}
