//! Tera rendering engine: [`TemplateKind`] enum and [`Renderer`].
//!
//! | Template  | Output                                    |
//! |-----------|-------------------------------------------|
//! | GitReview | `<clone>/.gitreview`                      |
//! | JjbConfig | `/etc/jenkins_jobs/jenkins_jobs.ini`      |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::{to_tera_context, GitReviewCtx, JjbConfigCtx};
use crate::error::{io_err, RenderError};

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("gitreview.tera", include_str!("templates/gitreview.tera")),
    (
        "jenkins_jobs.ini.tera",
        include_str!("templates/jenkins_jobs.ini.tera"),
    ),
];

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn load_override_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("tera") || !path.is_file() {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((normalize_template_name(rel), contents));
    }
    Ok(templates)
}

fn build_tera(override_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = override_dir {
        for (name, content) in load_override_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

/// Every file the configurator renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    GitReview,
    JjbConfig,
}

impl TemplateKind {
    pub fn all() -> &'static [TemplateKind] {
        &[TemplateKind::GitReview, TemplateKind::JjbConfig]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::GitReview => "gitreview.tera",
            TemplateKind::JjbConfig => "jenkins_jobs.ini.tera",
        }
    }

    /// File name of the rendered output inside its target directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateKind::GitReview => ".gitreview",
            TemplateKind::JjbConfig => "jenkins_jobs.ini",
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tera-based renderer. Create once with [`Renderer::new`] and reuse.
///
/// An override directory may contain `.tera` files that replace the embedded
/// defaults by name (e.g. a config repository shipping its own `gitreview.tera`).
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Construct a renderer with the embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_overrides(None)
    }

    pub fn with_overrides(override_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(Renderer {
            tera: build_tera(override_dir)?,
        })
    }

    fn render_kind<T: serde::Serialize>(
        &self,
        kind: TemplateKind,
        ctx: &T,
    ) -> Result<String, RenderError> {
        let tera_ctx = to_tera_context(ctx)?;
        Ok(self.tera.render(kind.template_name(), &tera_ctx)?)
    }

    /// Render the `.gitreview` routing file.
    pub fn gitreview(&self, ctx: &GitReviewCtx) -> Result<String, RenderError> {
        self.render_kind(TemplateKind::GitReview, ctx)
    }

    /// Render `jenkins_jobs.ini`.
    pub fn jjb_config(&self, ctx: &JjbConfigCtx) -> Result<String, RenderError> {
        self.render_kind(TemplateKind::JjbConfig, ctx)
    }

    /// Render `.gitreview` into `repo_dir`.
    ///
    /// Returns the written path and whether the file already existed (a new
    /// file must be `git add`ed before committing).
    pub fn write_gitreview(
        &self,
        repo_dir: &Path,
        ctx: &GitReviewCtx,
    ) -> Result<(PathBuf, bool), RenderError> {
        let target = repo_dir.join(TemplateKind::GitReview.file_name());
        let existed = target.exists();
        let content = self.gitreview(ctx)?;
        std::fs::write(&target, content).map_err(|e| io_err(&target, e))?;
        Ok((target, existed))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn neutron() -> GitReviewCtx {
        GitReviewCtx {
            project: "openstack/neutron".into(),
            host: "10.0.0.1".into(),
            port: 29418,
        }
    }

    #[test]
    fn renderer_new_succeeds() {
        Renderer::new().expect("Renderer::new should succeed with embedded templates");
    }

    #[test]
    fn gitreview_renders_exact_lines() {
        let renderer = Renderer::new().unwrap();
        let out = renderer.gitreview(&neutron()).unwrap();
        assert_eq!(
            out,
            "[gerrit]\nhost=10.0.0.1\nport=29418\nproject=openstack/neutron\n"
        );
    }

    #[test]
    fn jjb_config_contains_credentials() {
        let renderer = Renderer::new().unwrap();
        let out = renderer
            .jjb_config(&JjbConfigCtx {
                username: "admin".into(),
                password: "s3cret".into(),
                jenkins_url: "http://10.0.0.2:8080/".into(),
            })
            .unwrap();
        assert!(out.contains("[jenkins]\n"));
        assert!(out.contains("user=admin\n"));
        assert!(out.contains("password=s3cret\n"));
        assert!(out.contains("url=http://10.0.0.2:8080/\n"));
    }

    #[test]
    fn override_directory_replaces_embedded_template() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("gitreview.tera"),
            "[gerrit]\nhost={{ host }}\nport={{ port }}\nproject={{ project }}.git\n",
        )
        .unwrap();
        let renderer = Renderer::with_overrides(Some(dir.path())).unwrap();
        let out = renderer.gitreview(&neutron()).unwrap();
        assert!(out.ends_with("project=openstack/neutron.git\n"));
    }

    #[test]
    fn write_gitreview_reports_prior_existence() {
        let repo = TempDir::new().unwrap();
        let renderer = Renderer::new().unwrap();
        let (path, existed) = renderer.write_gitreview(repo.path(), &neutron()).unwrap();
        assert!(!existed);
        let (_, existed) = renderer.write_gitreview(repo.path(), &neutron()).unwrap();
        assert!(existed);
        assert!(path.ends_with(".gitreview"));
    }

    #[test]
    fn every_kind_has_an_embedded_template() {
        let renderer = Renderer::new().unwrap();
        for kind in TemplateKind::all() {
            assert!(
                renderer.tera.get_template_names().any(|n| n == kind.template_name()),
                "missing template for {kind:?}"
            );
        }
    }
}
