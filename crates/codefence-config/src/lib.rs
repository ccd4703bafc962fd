//! Configuration primitives and loader for codefence.
//!
//! The loader resolves configuration using a precedence stack:
//! override flag → working directory → git root → built-in defaults.
//! Comma-separated extension lists are parsed and validated here, once, so the
//! transform engine only ever sees typed sets.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use codefence_utils::normalize_store_path;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = ".codefence.toml";

/// Directory converted when no configuration layer names one.
pub const DEFAULT_ROOT_DIRECTORY: &str = "Code";

const DEFAULT_FILE_TYPES: &[(&str, &str)] = &[
    ("markup", "html"),
    ("style", "css, scss, sass, less"),
    ("programming", "js, ts, py, java, cpp, rb, kt, swift, cs, rs"),
    ("config", "conf, json, xml, ini, yml, yaml"),
    ("script", "sh, bat, ps1, lua, pl"),
    ("database", "sql"),
    ("other", ""),
];

const DEFAULT_LANGUAGES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("pl", "perl"),
    ("kt", "kotlin"),
    ("cs", "csharp"),
    ("sh", "bash"),
    ("bat", "batch"),
    ("yml", "yaml"),
];

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub project: ProjectSettings,
    pub catalog: FileTypeCatalog,
    pub languages: LanguageTagMap,
    pub undo: UndoSettings,
    pub sources: ConfigSources,
}

/// Project-level settings naming the directory the operations act on.
#[derive(Clone, Debug)]
pub struct ProjectSettings {
    /// Store-relative, normalised path. Empty means the store root.
    pub root: String,
}

/// Category name → extensions eligible for conversion.
///
/// Categories may overlap; an extension listed twice is still a single
/// member of [`FileTypeCatalog::convertible`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileTypeCatalog {
    categories: BTreeMap<String, BTreeSet<String>>,
}

impl FileTypeCatalog {
    /// Build a catalog from `(category, "comma, separated")` pairs.
    pub fn from_lists<'a, I>(lists: I) -> Result<Self, ConfigValidationErrors>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut errors = Vec::new();
        let mut categories = BTreeMap::new();
        for (name, list) in lists {
            let tokens = split_extension_list(list);
            let extensions = validate_extensions(name, tokens, None, &mut errors);
            categories.insert(name.to_string(), extensions);
        }
        if errors.is_empty() {
            Ok(FileTypeCatalog { categories })
        } else {
            Err(ConfigValidationErrors(errors))
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.categories
            .iter()
            .map(|(name, extensions)| (name.as_str(), extensions))
    }

    pub fn extensions(&self, category: &str) -> Option<&BTreeSet<String>> {
        self.categories.get(category)
    }

    /// Flattened union of every category, built once per operation.
    pub fn convertible(&self) -> HashSet<String> {
        self.categories.values().flatten().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(BTreeSet::is_empty)
    }
}

/// Extension → fence language tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LanguageTagMap {
    tags: BTreeMap<String, String>,
}

impl LanguageTagMap {
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigValidationErrors>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut errors = Vec::new();
        let mut tags = BTreeMap::new();
        for (extension, tag) in pairs {
            if let Some((extension, tag)) = validate_language(extension, tag, None, &mut errors) {
                tags.insert(extension, tag);
            }
        }
        if errors.is_empty() {
            Ok(LanguageTagMap { tags })
        } else {
            Err(ConfigValidationErrors(errors))
        }
    }

    pub fn get(&self, extension: &str) -> Option<&str> {
        self.tags.get(extension).map(String::as_str)
    }

    /// Returns the mapped tag, or the extension itself when unmapped.
    pub fn resolve<'a>(&'a self, extension: &'a str) -> &'a str {
        self.get(extension).unwrap_or(extension)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags
            .iter()
            .map(|(extension, tag)| (extension.as_str(), tag.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Settings that govern the undo operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UndoSettings {
    pub rename: RenameStrategy,
}

/// How undo derives the restored path from a wrapped one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenameStrategy {
    /// Remove the first `.md` found anywhere in the path.
    #[default]
    FirstOccurrence,
    /// Remove a trailing `.md` only.
    Suffix,
}

impl RenameStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RenameStrategy::FirstOccurrence => "first-occurrence",
            RenameStrategy::Suffix => "suffix",
        }
    }
}

impl fmt::Display for RenameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenameStrategy {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "first-occurrence" => Ok(RenameStrategy::FirstOccurrence),
            "suffix" => Ok(RenameStrategy::Suffix),
            _ => Err(()),
        }
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/git/local/override/inline).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl ConfigSource {
    fn default(base_dir: PathBuf) -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
            base_dir,
        }
    }

    fn inline() -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Inline,
            path: None,
            base_dir: PathBuf::from("."),
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ConfigSource {
            kind,
            path: Some(path),
            base_dir,
        }
    }

    pub fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
    Inline,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
            ConfigSourceKind::Inline => "inline config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let default_source = ConfigSource::default(working_dir.clone());
        let mut merged = defaults_layer(default_source.clone());
        let mut source_layers = vec![default_source];

        let git_root = find_git_root(&working_dir);
        let git_config_path = git_root.as_ref().map(|root| root.join(CONFIG_FILE_NAME));
        let local_config_path = working_dir.join(CONFIG_FILE_NAME);

        if let Some(path) = git_config_path.as_ref() {
            if path.exists() && Some(path) != override_path.as_ref() && path != &local_config_path {
                let source = ConfigSource::for_file(ConfigSourceKind::GitRoot, path.clone());
                merged.merge(load_layer(path, source.clone())?);
                source_layers.push(source);
            }
        }

        if local_config_path.exists() && Some(&local_config_path) != override_path.as_ref() {
            let source = ConfigSource::for_file(ConfigSourceKind::Local, local_config_path.clone());
            merged.merge(load_layer(&local_config_path, source.clone())?);
            source_layers.push(source);
        }

        if let Some(path) = override_path {
            let source = ConfigSource::for_file(ConfigSourceKind::Override, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            source_layers.push(source);
        }

        let config = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(config.with_sources(ConfigSources {
            working_directory: working_dir,
            layers: source_layers,
        }))
    }

    /// Built-in defaults layered under a TOML document held in memory.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let default_source = ConfigSource::default(PathBuf::from("."));
        let inline_source = ConfigSource::inline();
        let mut merged = defaults_layer(default_source.clone());
        let layer = parse_layer(contents, inline_source.clone()).map_err(|source| {
            ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            }
        })?;
        merged.merge(layer);

        let config = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(config.with_sources(ConfigSources {
            working_directory: PathBuf::from("."),
            layers: vec![default_source, inline_source],
        }))
    }

    /// Defaults only, without consulting the filesystem.
    pub fn builtin() -> Self {
        let source = ConfigSource::default(PathBuf::from("."));
        let config = defaults_layer(source.clone())
            .finalize()
            .unwrap_or_else(|err| panic!("built-in codefence defaults are invalid: {err}"));
        config.with_sources(ConfigSources {
            working_directory: PathBuf::from("."),
            layers: vec![source],
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builtin()
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    parse_layer(&contents, source).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })
}

fn parse_layer(contents: &str, source: ConfigSource) -> Result<PartialConfig, toml::de::Error> {
    let raw: RawConfig = toml::from_str(contents)?;
    Ok(raw.into_partial(source))
}

fn defaults_layer(source: ConfigSource) -> PartialConfig {
    let file_types = DEFAULT_FILE_TYPES
        .iter()
        .map(|(name, list)| {
            (
                (*name).to_string(),
                Located::new(split_extension_list(list), source.clone()),
            )
        })
        .collect();

    let languages = DEFAULT_LANGUAGES
        .iter()
        .map(|(extension, tag)| {
            (
                (*extension).to_string(),
                Located::new((*tag).to_string(), source.clone()),
            )
        })
        .collect();

    PartialConfig {
        root: Some(Located::new(DEFAULT_ROOT_DIRECTORY.into(), source.clone())),
        file_types,
        languages,
        rename: Some(Located::new(
            RenameStrategy::default().as_str().into(),
            source,
        )),
    }
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Split a comma-separated extension list into trimmed, lowercased tokens.
pub fn split_extension_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn extension_problem(extension: &str) -> Option<&'static str> {
    if extension.starts_with('.') {
        Some("must not start with '.'")
    } else if extension.contains('.') {
        Some("must not contain '.'")
    } else if extension.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if extension.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else {
        None
    }
}

fn validate_extensions(
    category: &str,
    tokens: Vec<String>,
    source: Option<&ConfigSource>,
    errors: &mut Vec<ConfigValidationError>,
) -> BTreeSet<String> {
    let mut extensions = BTreeSet::new();
    for token in tokens {
        match extension_problem(&token) {
            Some(problem) => errors.push(
                ConfigValidationError::new(
                    source.cloned(),
                    format!("extension '{token}' {problem}"),
                )
                .with_context(format!("file_types.{category}")),
            ),
            None => {
                extensions.insert(token);
            }
        }
    }
    extensions
}

fn validate_language(
    extension: &str,
    tag: &str,
    source: Option<&ConfigSource>,
    errors: &mut Vec<ConfigValidationError>,
) -> Option<(String, String)> {
    let extension = extension.trim().to_lowercase();
    let tag = tag.trim();
    let context = format!("languages.{extension}");

    if let Some(problem) = extension_problem(&extension) {
        errors.push(
            ConfigValidationError::new(
                source.cloned(),
                format!("extension '{extension}' {problem}"),
            )
            .with_context(context),
        );
        return None;
    }

    if tag.is_empty() {
        errors.push(
            ConfigValidationError::new(source.cloned(), "language tag cannot be empty".into())
                .with_context(context),
        );
        return None;
    }

    if tag.contains('`') || tag.chars().any(char::is_whitespace) {
        errors.push(
            ConfigValidationError::new(
                source.cloned(),
                format!("language tag '{tag}' must not contain whitespace or backticks"),
            )
            .with_context(context),
        );
        return None;
    }

    Some((extension, tag.to_string()))
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    root: Option<Located<String>>,
    file_types: BTreeMap<String, Located<Vec<String>>>,
    languages: BTreeMap<String, Located<String>>,
    rename: Option<Located<String>>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        if other.root.is_some() {
            self.root = other.root;
        }
        if other.rename.is_some() {
            self.rename = other.rename;
        }
        self.file_types.extend(other.file_types);
        self.languages.extend(other.languages);
    }

    fn finalize(self) -> Result<ResolvedConfig, ConfigValidationErrors> {
        let mut errors = Vec::new();

        let root_loc = self.root.unwrap_or_else(|| {
            Located::new(
                DEFAULT_ROOT_DIRECTORY.into(),
                ConfigSource::default(PathBuf::from(".")),
            )
        });
        let root = normalize_store_path(&root_loc.value);
        if root.split('/').any(|segment| segment == "..") {
            errors.push(
                ConfigValidationError::new(
                    Some(root_loc.source.clone()),
                    format!("'{}' must not contain '..' segments", root_loc.value),
                )
                .with_context("project.root"),
            );
        }

        let mut categories = BTreeMap::new();
        for (name, located) in self.file_types {
            let extensions =
                validate_extensions(&name, located.value, Some(&located.source), &mut errors);
            categories.insert(name, extensions);
        }

        let mut tags = BTreeMap::new();
        for (extension, located) in self.languages {
            if let Some((extension, tag)) =
                validate_language(&extension, &located.value, Some(&located.source), &mut errors)
            {
                tags.insert(extension, tag);
            }
        }

        let rename = match self.rename {
            Some(located) => match located.value.parse::<RenameStrategy>() {
                Ok(strategy) => strategy,
                Err(_) => {
                    errors.push(
                        ConfigValidationError::new(
                            Some(located.source.clone()),
                            format!(
                                "unknown rename strategy '{}' (expected 'first-occurrence' or 'suffix')",
                                located.value
                            ),
                        )
                        .with_context("undo.rename"),
                    );
                    RenameStrategy::default()
                }
            },
            None => RenameStrategy::default(),
        };

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(ResolvedConfig {
            project: ProjectSettings { root },
            catalog: FileTypeCatalog { categories },
            languages: LanguageTagMap { tags },
            undo: UndoSettings { rename },
        })
    }
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

#[derive(Clone, Debug)]
struct ResolvedConfig {
    project: ProjectSettings,
    catalog: FileTypeCatalog,
    languages: LanguageTagMap,
    undo: UndoSettings,
}

impl ResolvedConfig {
    fn with_sources(self, sources: ConfigSources) -> Config {
        Config {
            project: self.project,
            catalog: self.catalog,
            languages: self.languages,
            undo: self.undo,
            sources,
        }
    }
}

/// Container for validation failures, formatted as a bullet list.
#[derive(Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationErrors {}

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

/// Validation failure with optional provenance.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
    pub context: Option<String>,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: String) -> Self {
        ConfigValidationError {
            source,
            message,
            context: None,
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source.describe())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    project: Option<RawProject>,
    #[serde(default)]
    file_types: BTreeMap<String, RawExtensionList>,
    #[serde(default)]
    languages: BTreeMap<String, String>,
    #[serde(default)]
    undo: Option<RawUndo>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        let file_types = self
            .file_types
            .into_iter()
            .map(|(name, list)| (name, Located::new(list.into_tokens(), source.clone())))
            .collect();

        let languages = self
            .languages
            .into_iter()
            .map(|(extension, tag)| (extension, Located::new(tag, source.clone())))
            .collect();

        PartialConfig {
            root: self
                .project
                .and_then(|project| project.root)
                .map(|value| Located::new(value, source.clone())),
            file_types,
            languages,
            rename: self
                .undo
                .and_then(|undo| undo.rename)
                .map(|value| Located::new(value, source)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawProject {
    #[serde(default)]
    root: Option<String>,
}

/// Extensions may be written either as `"js, ts"` or as `["js", "ts"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawExtensionList {
    Joined(String),
    Items(Vec<String>),
}

impl RawExtensionList {
    fn into_tokens(self) -> Vec<String> {
        match self {
            RawExtensionList::Joined(list) => split_extension_list(&list),
            RawExtensionList::Items(items) => items
                .iter()
                .map(|item| item.trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawUndo {
    #[serde(default)]
    rename: Option<String>,
}
