use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use argp::FromArgs;
use docs_og_core::{
    config::Config,
    source::{PageIndex, PageSource, static_params},
    util::join_normalized,
};
use docs_og_images::{font::FontProvider, og::render_page, render::SvgRenderer};
use typed_path::Utf8NativePathBuf;
use url::Url;

use crate::util::{load_config, native_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Render every page image ahead of time.
#[argp(subcommand, name = "prerender")]
pub struct Args {
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// config file (default: config.yml)
    config: Option<Utf8NativePathBuf>,
    #[argp(option, short = 'o', from_str_fn(native_path))]
    /// output directory
    output: Utf8NativePathBuf,
}

pub fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let site_url = config.site_url()?;
    let pages = PageIndex::load(&config.docs)?;
    let output = PathBuf::from(args.output.as_str());
    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let count = runtime.block_on(prerender(&config, &site_url, &pages, &output))?;
    tracing::info!("Wrote {} images to {}", count, output.display());
    Ok(())
}

async fn prerender(
    config: &Config,
    site_url: &Url,
    pages: &PageIndex,
    output: &Path,
) -> Result<usize> {
    let client = reqwest::Client::new();
    let fonts = FontProvider::new(&config.font, &client);
    let renderer =
        SvgRenderer::new(client).with_public_dir(site_url.clone(), &config.site.public_dir);
    let mut count = 0;
    for params in static_params(pages) {
        let Some((_, slugs)) = params.slug.split_last() else { continue };
        let page = pages
            .get_page(slugs, Some(&params.lang))
            .ok_or_else(|| anyhow!("Page /{} ({}) disappeared", slugs.join("/"), params.lang))?;
        let image = render_page(&renderer, &fonts, &page.data, site_url, &config.site.name)
            .await
            .with_context(|| format!("Failed to render {}", page.path.display()))?;
        let path = join_normalized(join_normalized(output, &params.lang), page.image_path());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &image.data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Wrote {}", path.display());
        count += 1;
    }
    Ok(count)
}
