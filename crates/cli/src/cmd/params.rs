use anyhow::{Context, Result};
use argp::FromArgs;
use docs_og_core::source::{PageIndex, static_params};
use typed_path::Utf8NativePathBuf;

use crate::util::{load_config, native_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Print the (lang, slug) pairs of every page image as JSON.
#[argp(subcommand, name = "params")]
pub struct Args {
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// config file (default: config.yml)
    config: Option<Utf8NativePathBuf>,
}

pub fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let pages = PageIndex::load(&config.docs)?;
    let params = static_params(&pages);
    let json = serde_json::to_string_pretty(&params).context("Failed to serialize params")?;
    println!("{}", json);
    Ok(())
}
