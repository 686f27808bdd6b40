use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

pub const MANIFEST_FILE: &str = "package.json";

static PACKAGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@(?P<scope>[A-Za-z0-9_-]+)/)?(?P<name>[A-Za-z0-9_-]+)$")
        .expect("package name pattern")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^[^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*@([A-Za-z0-9-]+\.)+[A-Za-z]{2,}$"#,
    )
    .expect("email pattern")
});

/// npm-style `"Name <email> (url)"` author strings.
static AUTHOR_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?P<email>[^>]+)>").expect("author pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName {
    pub scope: Option<String>,
    pub name: String,
}

impl PackageName {
    pub fn parse(raw: &str) -> Result<Self> {
        let captures = PACKAGE_NAME
            .captures(raw.trim())
            .ok_or_else(|| anyhow!("cannot parse package name `{raw}`"))?;
        Ok(Self {
            scope: captures.name("scope").map(|m| m.as_str().to_string()),
            name: captures["name"].to_string(),
        })
    }

    pub fn full(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{scope}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// `<scope>_<name>-<version>.xnode`, the file the packer writes.
    pub fn archive_file_name(&self, version: &Version) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}_{}-{version}.xnode", self.name),
            None => format!("{}-{version}.xnode", self.name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Text(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl Author {
    /// The email the registry knows the author by.
    pub fn email(&self) -> Option<String> {
        match self {
            Author::Text(text) => {
                let text = text.trim();
                if is_email(text) {
                    return Some(text.to_string());
                }
                AUTHOR_STRING
                    .captures(text)
                    .map(|c| c["email"].trim().to_string())
                    .filter(|email| is_email(email))
            }
            Author::Detailed { name, email, .. } => name
                .as_deref()
                .filter(|name| is_email(name))
                .or(email.as_deref().filter(|email| is_email(email)))
                .map(str::to_string),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Author::Text(text) => text.clone(),
            Author::Detailed { name, email, url } => {
                let mut out = name.clone().unwrap_or_default();
                if let Some(email) = email {
                    out = format!("{out} <{email}>").trim().to_string();
                }
                if let Some(url) = url {
                    out = format!("{out} ({url})").trim().to_string();
                }
                out
            }
        }
    }
}

pub fn is_email(raw: &str) -> bool {
    EMAIL.is_match(raw)
}

#[derive(Debug, Clone, Deserialize)]
struct PackageJsonRaw {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    author: Option<Author>,
    license: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    main: Option<String>,
    readme: Option<String>,
}

/// The subset of `package.json` the pack/publish pipeline relies on, plus the
/// raw document for registry metadata.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    pub path: PathBuf,
    pub package: PackageName,
    pub version: Version,
    pub description: Option<String>,
    pub author: Option<Author>,
    pub license: Option<String>,
    pub keywords: Vec<String>,
    pub main: Option<String>,
    pub readme: Option<String>,
    pub raw: Map<String, JsonValue>,
}

impl ProjectManifest {
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(MANIFEST_FILE);
        if !path.exists() {
            bail!("cannot find {}", path.display());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&data, path)
    }

    pub fn parse(data: &str, path: PathBuf) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(data)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let JsonValue::Object(raw) = value else {
            bail!("{} must contain a JSON object", path.display());
        };
        let fields: PackageJsonRaw = serde_json::from_value(JsonValue::Object(raw.clone()))
            .with_context(|| format!("unexpected field types in {}", path.display()))?;

        let (Some(name), Some(version)) = (fields.name, fields.version) else {
            bail!("cannot parse `name` or `version` in {}", path.display());
        };
        let package = PackageName::parse(&name)
            .with_context(|| format!("invalid `name` in {}", path.display()))?;
        let version = Version::parse(version.trim())
            .with_context(|| format!("invalid semver `{version}` in {}", path.display()))?;

        Ok(Self {
            path,
            package,
            version,
            description: fields.description,
            author: fields.author,
            license: fields.license,
            keywords: fields.keywords,
            main: fields.main,
            readme: fields.readme,
            raw,
        })
    }

    pub fn project_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn archive_file_name(&self) -> String {
        self.package.archive_file_name(&self.version)
    }

    /// The registry user derived from `author`.
    pub fn publisher_email(&self) -> Result<String> {
        let Some(author) = &self.author else {
            bail!("cannot find `author` in {}", self.path.display());
        };
        author
            .email()
            .ok_or_else(|| anyhow!("cannot find `author.email` in {}", self.path.display()))
    }

    /// README text: the `readme` field, else `README.md` next to the manifest.
    pub fn readme_text(&self) -> Option<String> {
        if let Some(text) = self.readme.as_ref().filter(|t| !t.trim().is_empty()) {
            return Some(text.clone());
        }
        fs::read_to_string(self.project_dir().join("README.md")).ok()
    }
}
