use std::{
    collections::HashMap,
    ffi::OsStr,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::{
    config::DocsConfig,
    models::{Page, PageMetadata, StaticParams},
};

/// Read-only lookup of documentation pages.
pub trait PageSource: Send + Sync {
    /// Find a page by its slugs. `None` selects the default locale.
    fn get_page(&self, slugs: &[String], locale: Option<&str>) -> Option<&Page>;

    fn pages(&self) -> Vec<&Page>;
}

/// Every (locale, image path) pair that should be pre-rendered.
pub fn static_params(source: &dyn PageSource) -> Vec<StaticParams> {
    source
        .pages()
        .into_iter()
        .map(|page| StaticParams { lang: page.locale.clone(), slug: page.image_segments() })
        .collect()
}

/// In-memory page index, usually loaded from a content directory.
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    default_locale: String,
    pages: Vec<Page>,
    by_route: HashMap<(String, Vec<String>), usize>,
}

impl PageIndex {
    pub fn new(default_locale: impl Into<String>, pages: Vec<Page>) -> Result<Self> {
        let mut by_route = HashMap::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if let Some(prev) = by_route.insert((page.locale.clone(), page.slugs.clone()), i) {
                bail!(
                    "Duplicate page /{} ({}): {} and {}",
                    page.slugs.join("/"),
                    page.locale,
                    pages[prev].path.display(),
                    page.path.display()
                );
            }
        }
        Ok(Self { default_locale: default_locale.into(), pages, by_route })
    }

    /// Scan `config.content_dir` for Markdown pages.
    pub fn load(config: &DocsConfig) -> Result<Self> {
        let root = &config.content_dir;
        let mut files = Vec::new();
        collect_files(root, &mut files)
            .with_context(|| format!("Failed to scan content directory {}", root.display()))?;
        let mut pages = Vec::with_capacity(files.len());
        for file in files {
            let relative = file.strip_prefix(root).unwrap_or(&file).to_path_buf();
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let data = parse_frontmatter(&text)
                .with_context(|| format!("Failed to parse frontmatter of {}", file.display()))?;
            let (locale, slugs) = route_for_path(&relative, config);
            pages.push(Page { locale, slugs, data, path: relative });
        }
        let index = Self::new(config.default_locale.clone(), pages)?;
        if index.is_empty() {
            tracing::warn!("No pages found in {}", root.display());
        } else {
            tracing::info!("Loaded {} pages from {}", index.len(), root.display());
        }
        Ok(index)
    }

    pub fn len(&self) -> usize { self.pages.len() }

    pub fn is_empty(&self) -> bool { self.pages.is_empty() }
}

impl PageSource for PageIndex {
    fn get_page(&self, slugs: &[String], locale: Option<&str>) -> Option<&Page> {
        let locale = locale.unwrap_or(&self.default_locale);
        self.by_route.get(&(locale.to_string(), slugs.to_vec())).map(|&i| &self.pages[i])
    }

    fn pages(&self) -> Vec<&Page> { self.pages.iter().collect() }
}

fn is_page_file(path: &Path) -> bool {
    matches!(path.extension().and_then(OsStr::to_str), Some("md" | "mdx"))
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else if is_page_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Map a content-relative file path to its locale and slugs.
///
/// `guide/setup.md` becomes `["guide", "setup"]`, `guide/index.md` becomes
/// `["guide"]`, and `guide/setup.fr.md` is the `fr` variant of the former
/// when `fr` is a configured locale.
fn route_for_path(path: &Path, config: &DocsConfig) -> (String, Vec<String>) {
    let mut slugs = path
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>();
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let (name, locale) = match stem.rsplit_once('.') {
        Some((name, locale)) if config.locales.iter().any(|l| l == locale) => {
            (name.to_string(), locale.to_string())
        }
        _ => (stem, config.default_locale.clone()),
    };
    if name != "index" {
        slugs.push(name);
    }
    (locale, slugs)
}

#[derive(Deserialize)]
struct Frontmatter {
    title: Option<String>,
    description: Option<String>,
}

fn parse_frontmatter(text: &str) -> Result<PageMetadata> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines();
    if lines.next().map(str::trim_end) != Some("---") {
        return Err(anyhow!("Missing frontmatter"));
    }
    let mut yaml = String::new();
    let mut closed = false;
    for line in lines {
        if line.trim_end() == "---" {
            closed = true;
            break;
        }
        yaml.push_str(line);
        yaml.push('\n');
    }
    if !closed {
        return Err(anyhow!("Unterminated frontmatter"));
    }
    let frontmatter: Frontmatter = serde_yaml::from_str(&yaml)?;
    let title = frontmatter
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow!("Missing title"))?;
    let description = frontmatter.description.filter(|d| !d.trim().is_empty());
    Ok(PageMetadata { title, description })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    fn config(dir: &str) -> DocsConfig {
        DocsConfig {
            content_dir: fixture(dir),
            default_locale: "en".to_string(),
            locales: vec!["fr".to_string()],
        }
    }

    fn slugs(s: &[&str]) -> Vec<String> { s.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn test_route_for_path() {
        let config = config("content");
        let cases: &[(&str, (&str, &[&str]))] = &[
            ("index.md", ("en", &[])),
            ("guide/index.mdx", ("en", &["guide"])),
            ("guide/setup.md", ("en", &["guide", "setup"])),
            ("guide/setup.fr.md", ("fr", &["guide", "setup"])),
            ("guide/v1.2.md", ("en", &["guide", "v1.2"])),
        ];
        for &(path, (locale, expected)) in cases {
            assert_eq!(
                route_for_path(Path::new(path), &config),
                (locale.to_string(), slugs(expected)),
                "{path}"
            );
        }
    }

    #[test]
    fn test_parse_frontmatter() {
        let data =
            parse_frontmatter("---\ntitle: Hello\ndescription: World\n---\n# Body\n").unwrap();
        assert_eq!(data.title, "Hello");
        assert_eq!(data.description.as_deref(), Some("World"));

        let data = parse_frontmatter("---\ntitle: Hello\ndescription: ''\n---\n").unwrap();
        assert_eq!(data.description, None);

        assert!(parse_frontmatter("# No frontmatter\n").is_err());
        assert!(parse_frontmatter("---\ntitle: Open\n").is_err());
        assert!(parse_frontmatter("---\ndescription: No title\n---\n").is_err());
    }

    #[test]
    fn test_load_index() {
        let index = PageIndex::load(&config("content")).unwrap();
        assert_eq!(index.len(), 4);
        assert!(!index.is_empty());

        let root = index.get_page(&[], None).unwrap();
        assert_eq!(root.data.title, "Introduction");

        let setup = index.get_page(&slugs(&["guide", "setup"]), None).unwrap();
        assert_eq!(setup.data.title, "Setup");
        assert_eq!(setup.data.description.as_deref(), Some("Install and configure the toolkit."));

        let setup_fr = index.get_page(&slugs(&["guide", "setup"]), Some("fr")).unwrap();
        assert_eq!(setup_fr.data.title, "Installation");

        let guide = index.get_page(&slugs(&["guide"]), None).unwrap();
        assert_eq!(guide.data.description, None);

        assert!(index.get_page(&slugs(&["missing"]), None).is_none());
        assert!(index.get_page(&slugs(&["guide"]), Some("fr")).is_none());
    }

    #[test]
    fn test_load_missing_title() {
        assert!(PageIndex::load(&config("missing-title")).is_err());
    }

    #[test]
    fn test_duplicate_pages() {
        let page = |path: &str| Page {
            locale: "en".to_string(),
            slugs: slugs(&["guide"]),
            data: PageMetadata { title: "Guide".to_string(), description: None },
            path: PathBuf::from(path),
        };
        assert!(PageIndex::new("en", vec![page("guide.md"), page("guide/index.md")]).is_err());
    }

    #[test]
    fn test_static_params() {
        let index = PageIndex::load(&config("content")).unwrap();
        let params = static_params(&index);
        assert_eq!(params.len(), index.pages().len());
        let set = params.iter().cloned().collect::<HashSet<_>>();
        assert_eq!(set.len(), params.len());
        let expected = [
            ("en", slugs(&["image.png"])),
            ("en", slugs(&["guide", "image.png"])),
            ("en", slugs(&["guide", "setup", "image.png"])),
            ("fr", slugs(&["guide", "setup", "image.png"])),
        ];
        for (lang, slug) in expected {
            assert!(set.contains(&StaticParams { lang: lang.to_string(), slug }));
        }
        assert!(params.iter().all(|p| !p.slug.is_empty()));
    }
}
