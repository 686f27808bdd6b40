use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::XnodeConfig;
use crate::project::PackageName;
use crate::util::process::{self, CommandSpec, StreamMode};

/// Built-in template: (relative destination, contents).
const BUILTIN_TEMPLATE: &[(&str, &str)] = &[
    (
        "package.json",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/package.json.in")),
    ),
    (
        "rollup.config.js",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/rollup.config.js")),
    ),
    (
        "src/index.js",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/src/index.js")),
    ),
    (
        "src/nodes/Hello.js",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/src/nodes/Hello.js")),
    ),
    (
        "src/nodes/World.js",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/src/nodes/World.js")),
    ),
    (
        "src/shared/utility.js",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/src/shared/utility.js")),
    ),
    (
        "README.md",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/README.md")),
    ),
    (
        ".gitignore",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/app/gitignore")),
    ),
];

/// Entries allowed to exist in a target directory before scaffolding.
const HARMLESS_ENTRIES: &[&str] = &[
    ".DS_Store",
    ".git",
    ".gitattributes",
    ".github",
    ".gitignore",
    ".gitlab-ci.yml",
    ".hg",
    ".hgcheck",
    ".hgignore",
    ".idea",
    ".npmignore",
    ".travis.yml",
    ".vscode",
    "docs",
    "LICENSE",
    "README.md",
    "mkdocs.yml",
    "Thumbs.db",
];

/// Names that would shadow the toolkit itself.
const RESERVED_NAMES: &[&str] = &["xnode", "xnode-dev", "node-scripts", "create-node"];

static APP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("app name pattern"));

#[derive(Debug, Clone)]
pub struct NewProjectOptions {
    pub dir: PathBuf,
    /// Directory copied instead of the built-in template.
    pub template: Option<PathBuf>,
    pub git: bool,
    pub install: bool,
}

pub fn new_project(config: &XnodeConfig, options: &NewProjectOptions) -> Result<PathBuf> {
    let root = absolute(&options.dir)?;
    let raw_name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("cannot derive a project name from {}", root.display()))?;
    let context = TemplateContext::new(&raw_name)?;

    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    ensure_safe_to_create(&root)?;

    println!(
        "Creating a new Design Express node project in {}",
        root.display()
    );

    let template = options
        .template
        .clone()
        .or_else(|| config.defaults.template.clone());
    match template {
        Some(dir) => copy_template_dir(&dir, &root, &context)?,
        None => {
            for (relative, contents) in BUILTIN_TEMPLATE {
                write_template(&root.join(relative), contents, &context)?;
            }
        }
    }

    if options.git && try_git_init(&root) {
        println!("Initialized a git repository.");
    }
    if options.install {
        install_dependencies(config, &root)?;
    }

    println!("✓ Created {} at {}", context.app_name, root.display());
    println!();
    println!("Inside that directory, you can run:");
    println!("  xnode build    bundle the nodes");
    println!("  xnode pack     write the .xnode archive");
    println!("  xnode publish  upload it to the registry");
    Ok(root)
}

fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to resolve current directory")?
        .join(dir))
}

/// Fails when the directory holds anything besides known harmless files.
pub fn ensure_safe_to_create(root: &Path) -> Result<()> {
    let mut conflicts = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if HARMLESS_ENTRIES.contains(&name.as_str()) || name.ends_with(".iml") {
            continue;
        }
        conflicts.push(name);
    }
    if conflicts.is_empty() {
        return Ok(());
    }
    conflicts.sort();
    bail!(
        "the directory {} contains files that could conflict:\n{}\nEither try using a new directory name, or remove the files listed above.",
        root.display(),
        conflicts
            .iter()
            .map(|name| format!("  {name}"))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn write_template(path: &Path, template: &str, context: &TemplateContext) -> Result<()> {
    if path.exists() {
        bail!("file `{}` already exists", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory `{}`", parent.display()))?;
    }
    let rendered = render_template(template, context);
    fs::write(path, rendered).with_context(|| format!("failed to write `{}`", path.display()))
}

fn render_template(template: &str, context: &TemplateContext) -> String {
    let mut output = template.to_owned();
    for (key, value) in &context.placeholders {
        let token = format!("{{{{{key}}}}}");
        output = output.replace(&token, value);
    }
    output
}

/// Copies a template directory, rendering UTF-8 files. `*.in` files lose
/// the suffix and `gitignore` becomes `.gitignore`.
fn copy_template_dir(src: &Path, dest: &Path, context: &TemplateContext) -> Result<()> {
    if !src.is_dir() {
        bail!("template directory {} does not exist", src.display());
    }
    for entry in
        fs::read_dir(src).with_context(|| format!("failed to read directory {}", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if src_path.is_dir() {
            if file_name == "node_modules" || file_name == ".git" {
                continue;
            }
            copy_template_dir(&src_path, &dest.join(&file_name), context)?;
            continue;
        }
        let target_name = match file_name.as_str() {
            "gitignore" => ".gitignore".to_string(),
            other => other.strip_suffix(".in").unwrap_or(other).to_string(),
        };
        let dest_path = dest.join(target_name);
        let bytes = fs::read(&src_path)
            .with_context(|| format!("failed to read {}", src_path.display()))?;
        match String::from_utf8(bytes) {
            Ok(text) => write_template(&dest_path, &text, context)?,
            Err(raw) => {
                if let Some(parent) = dest_path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                fs::write(&dest_path, raw.into_bytes())
                    .with_context(|| format!("failed to write {}", dest_path.display()))?;
            }
        }
    }
    Ok(())
}

fn try_git_init(root: &Path) -> bool {
    let Ok(git) = which::which("git") else {
        debug!("git not found; skipping repository init");
        return false;
    };
    let inside = CommandSpec::new(&git)
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(root)
        .output(StreamMode::Discard);
    if process::run(&inside).is_ok_and(|out| out.status.success()) {
        debug!("already inside a git work tree");
        return false;
    }

    let init = CommandSpec::new(&git)
        .args(["init"])
        .current_dir(root)
        .output(StreamMode::Discard);
    if let Err(err) = process::run_checked(&init) {
        warn!("git repo not initialized: {err:#}");
        return false;
    }

    let add = CommandSpec::new(&git)
        .args(["add", "-A"])
        .current_dir(root)
        .output(StreamMode::Capture);
    let commit = CommandSpec::new(&git)
        .args(["commit", "-m", "Initialize project using xnode new"])
        .current_dir(root)
        .output(StreamMode::Capture);
    let committed = process::run_checked(&add).and_then(|_| process::run_checked(&commit));
    if let Err(err) = committed {
        // Usually a missing author identity; leave no half-initialized repo behind.
        warn!("git commit not created: {err:#}");
        if let Err(err) = fs::remove_dir_all(root.join(".git")) {
            warn!("failed to remove .git: {err}");
        }
        return false;
    }
    true
}

fn install_dependencies(config: &XnodeConfig, root: &Path) -> Result<()> {
    let npm = match &config.tools.npm.path {
        Some(path) => path.clone(),
        None => match which::which("npm") {
            Ok(path) => path,
            Err(_) => {
                warn!("npm not found on PATH; skipping dependency install");
                println!("Skipped `npm install` (npm not found).");
                return Ok(());
            }
        },
    };
    println!("Installing packages. This might take a couple of minutes.");
    let spec = CommandSpec::new(npm).args(["install"]).current_dir(root);
    process::run_checked(&spec).context("dependency install failed")?;
    Ok(())
}

struct TemplateContext {
    app_name: String,
    placeholders: HashMap<String, String>,
}

impl TemplateContext {
    fn new(raw: &str) -> Result<Self> {
        let app_name = raw.trim().to_string();
        if !APP_NAME.is_match(&app_name) {
            bail!(
                "cannot create a project named `{app_name}`: names must be lowercase and may contain only letters, digits, `-` and `_`"
            );
        }
        PackageName::parse(&app_name)
            .with_context(|| format!("cannot create a project named `{app_name}`"))?;
        if RESERVED_NAMES.contains(&app_name.as_str()) {
            bail!("cannot create a project named `{app_name}`: the name is reserved");
        }

        let mut placeholders = HashMap::new();
        placeholders.insert("app_name".into(), app_name.clone());
        placeholders.insert("app_title".into(), app_name.to_case(Case::Title));
        placeholders.insert("app_pascal".into(), app_name.to_case(Case::Pascal));
        placeholders.insert("app_snake".into(), app_name.to_case(Case::Snake));
        placeholders.insert("xnode_version".into(), env!("CARGO_PKG_VERSION").into());

        Ok(Self {
            app_name,
            placeholders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dir: PathBuf) -> NewProjectOptions {
        NewProjectOptions {
            dir,
            template: None,
            git: false,
            install: false,
        }
    }

    #[test]
    fn builtin_template_renders_project() {
        let temp = tempfile::tempdir().unwrap();
        let root = new_project(&XnodeConfig::default(), &options(temp.path().join("my-nodes")))
            .unwrap();

        let package = fs::read_to_string(root.join("package.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&package).unwrap();
        assert_eq!(value["name"], "my-nodes");
        assert!(root.join(".gitignore").exists());
        assert!(root.join("src/nodes/Hello.js").exists());
        let rollup = fs::read_to_string(root.join("rollup.config.js")).unwrap();
        assert!(rollup.contains("name: \"MyNodes\""));
        assert!(!rollup.contains("{{"));
    }

    #[test]
    fn rejects_invalid_names() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["MyNodes", "xnode", "_hidden", "my.nodes"] {
            let err = new_project(&XnodeConfig::default(), &options(temp.path().join(name)))
                .unwrap_err();
            assert!(err.to_string().contains("cannot create a project named"));
        }
    }

    #[test]
    fn harmless_files_are_tolerated() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("nodes");
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("README.md"), "keep").unwrap();
        fs::write(root.join("project.iml"), "").unwrap();
        ensure_safe_to_create(&root).unwrap();
    }

    #[test]
    fn conflicting_files_are_listed() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("nodes");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();
        fs::write(root.join("index.js"), "").unwrap();
        let err = new_project(&XnodeConfig::default(), &options(root)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("  index.js\n  package.json"), "{message}");
    }

    #[test]
    fn custom_template_directory_is_copied_and_rendered() {
        let temp = tempfile::tempdir().unwrap();
        let template = temp.path().join("tpl");
        fs::create_dir_all(template.join("src")).unwrap();
        fs::write(template.join("package.json.in"), r#"{"name": "{{app_name}}"}"#).unwrap();
        fs::write(template.join("gitignore"), "dist/\n").unwrap();
        fs::write(template.join("src/logo.bin"), [0xff, 0xfe, 0x00]).unwrap();

        let mut opts = options(temp.path().join("custom-nodes"));
        opts.template = Some(template);
        let root = new_project(&XnodeConfig::default(), &opts).unwrap();

        assert_eq!(
            fs::read_to_string(root.join("package.json")).unwrap(),
            r#"{"name": "custom-nodes"}"#
        );
        assert!(root.join(".gitignore").exists());
        assert_eq!(fs::read(root.join("src/logo.bin")).unwrap(), vec![0xff, 0xfe, 0x00]);
    }

    #[test]
    fn placeholders_are_replaced() {
        let context = TemplateContext::new("hello-world").unwrap();
        assert_eq!(
            render_template("{{app_title}} / {{app_snake}}", &context),
            "Hello World / hello_world"
        );
    }

    #[test]
    fn scaffolded_project_can_be_packed() {
        let temp = tempfile::tempdir().unwrap();
        let root = new_project(&XnodeConfig::default(), &options(temp.path().join("pack-me_2")))
            .unwrap();

        let manifest = crate::project::ProjectManifest::load(&root).unwrap();
        assert_eq!(manifest.package.full(), "pack-me_2");

        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/index.js"), "export class Hello {}").unwrap();
        let outputs = crate::builder::resolve_outputs(&root, &manifest, &[]).unwrap();
        let outcome = crate::packer::pack(&crate::packer::PackRequest {
            project_dir: root.clone(),
            outputs,
            out_dir: None,
        })
        .unwrap();
        assert_eq!(outcome.path, root.join("pack-me_2-0.1.0.xnode"));
    }
}
