//! Theme engine
//!
//! Templates are rendered with Tera. The built-in templates are embedded in
//! the binary; an active theme directory on disk may override any of them
//! or add new ones. Features:
//! - Theme loading and switching with fallback to the built-in theme
//! - Template hot-reload from disk
//! - Standard template variables
//! - `asset()` template function for versioned, CDN-aware asset URLs

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera, Value};

use crate::effects::EffectsMode;
use crate::services::settings::SiteSettings;

pub mod assets;
mod error;

pub use error::ThemeError;

/// Name of the theme that only uses the embedded templates
pub const BUILTIN_THEME: &str = "default";

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct BuiltinTemplates;

pub struct ThemeEngine {
    tera: Tera,
    themes_path: PathBuf,
    current_theme: String,
    cdn_url: Option<String>,
}

impl std::fmt::Debug for ThemeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeEngine")
            .field("themes_path", &self.themes_path)
            .field("current_theme", &self.current_theme)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`ThemeEngine::set_theme_with_fallback`]
#[derive(Debug, Clone)]
pub struct ThemeSwitchResult {
    pub success: bool,
    pub used_fallback: bool,
    pub error: Option<String>,
}

impl ThemeEngine {
    /// Create an engine with the given active theme.
    ///
    /// A missing theme directory is not an error: the engine logs a warning
    /// and renders with the built-in templates.
    pub fn new(themes_path: &Path, active_theme: &str, cdn_url: Option<String>) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            themes_path: themes_path.to_path_buf(),
            current_theme: BUILTIN_THEME.to_string(),
            cdn_url,
        };

        let result = engine.set_theme_with_fallback(active_theme);
        if !result.success {
            return Err(ThemeError::Load(result.error.unwrap_or_default()).into());
        }
        Ok(engine)
    }

    /// Built-in templates only
    pub fn builtin(cdn_url: Option<String>) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            themes_path: PathBuf::new(),
            current_theme: BUILTIN_THEME.to_string(),
            cdn_url,
        };
        engine.load_templates(BUILTIN_THEME)?;
        Ok(engine)
    }

    fn theme_dir(&self, theme_name: &str) -> PathBuf {
        self.themes_path.join(theme_name)
    }

    /// Build a fresh Tera instance: embedded templates first, then the
    /// theme's overrides from disk.
    fn load_templates(&mut self, theme_name: &str) -> Result<()> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in BuiltinTemplates::iter() {
            let Some(file) = BuiltinTemplates::get(&name) else {
                continue;
            };
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| ThemeError::InvalidUtf8(name.to_string()))?;
            templates.insert(name.into_owned(), content);
        }

        if theme_name != BUILTIN_THEME {
            let theme_path = self.theme_dir(theme_name);
            if !theme_path.is_dir() {
                return Err(ThemeError::NotFound(theme_name.to_string()).into());
            }
            let template_path = match theme_path.join("templates") {
                dir if dir.is_dir() => dir,
                _ => theme_path,
            };
            collect_templates_from_dir(&template_path, &template_path, &mut templates)?;
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::Load(error_chain(&e)))?;
        tera.register_function(
            "asset",
            AssetFunction {
                cdn_url: self.cdn_url.clone(),
            },
        );

        self.tera = tera;
        Ok(())
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera
            .render(template, context)
            .map_err(|e| {
                ThemeError::Render {
                    template: template.to_string(),
                    message: error_chain(&e),
                }
                .into()
            })
    }

    /// Render with the standard variables merged into `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = self.standard_context(standard_vars);
        full_context.extend(context.clone());
        self.render(template, &full_context)
    }

    /// Context holding only the standard variables
    pub fn standard_context(&self, vars: &StandardTemplateVars) -> TeraContext {
        let mut context = TeraContext::new();
        context.insert("site", &vars.site);
        context.insert("request_path", &vars.request_path);
        context.insert("year", &vars.year);
        context.insert("effects_mode", vars.effects_mode.as_str());
        context.insert("chat_enabled", &vars.chat_enabled);
        context.insert("version", env!("CARGO_PKG_VERSION"));
        context.insert("theme_name", &self.current_theme);
        if let Some(ref user) = vars.current_user {
            context.insert("current_user", user);
        }
        context
    }

    /// Render `template`, falling back to `error.html` and then to a
    /// minimal built-in page. Never fails.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(template, error = %e, "Template render failed, trying error template");

                let mut error_context = context.clone();
                error_context.insert("status", &500);
                error_context.insert("error_message", "Something went wrong while rendering this page.");

                match self.render("error.html", &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::warn!(error = %error_template_err, "Error template failed, using plain error page");
                        simple_error_page(500, "Something went wrong while rendering this page.")
                    }
                }
            }
        }
    }

    /// Render the error page for an HTTP status
    pub fn render_error(&self, status: u16, message: &str, vars: &StandardTemplateVars) -> String {
        let mut context = self.standard_context(vars);
        context.insert("status", &status);
        context.insert("error_message", message);
        match self.render("error.html", &context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(error = %e, "Error template failed, using plain error page");
                simple_error_page(status, message)
            }
        }
    }

    /// Switch the active theme
    pub fn set_theme(&mut self, theme_name: &str) -> Result<()> {
        self.load_templates(theme_name)?;
        if self.current_theme != theme_name {
            tracing::info!(from = %self.current_theme, to = %theme_name, "Theme switched");
        }
        self.current_theme = theme_name.to_string();
        Ok(())
    }

    /// Switch theme; on failure fall back to the built-in templates
    pub fn set_theme_with_fallback(&mut self, theme_name: &str) -> ThemeSwitchResult {
        match self.set_theme(theme_name) {
            Ok(()) => ThemeSwitchResult {
                success: true,
                used_fallback: false,
                error: None,
            },
            Err(e) if theme_name != BUILTIN_THEME => {
                let error_msg = e.to_string();
                tracing::warn!(
                    theme = theme_name,
                    error = %error_msg,
                    "Theme not available, falling back to built-in templates"
                );
                match self.set_theme(BUILTIN_THEME) {
                    Ok(()) => ThemeSwitchResult {
                        success: true,
                        used_fallback: true,
                        error: Some(error_msg),
                    },
                    Err(fallback_err) => ThemeSwitchResult {
                        success: false,
                        used_fallback: true,
                        error: Some(format!("Original error: {}; Fallback error: {}", error_msg, fallback_err)),
                    },
                }
            }
            Err(e) => ThemeSwitchResult {
                success: false,
                used_fallback: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Reload the current theme's templates from disk
    pub fn reload_templates(&mut self) -> Result<()> {
        let current = self.current_theme.clone();
        self.load_templates(&current)
    }

    pub fn current_theme(&self) -> &str {
        &self.current_theme
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Themes installed on disk, plus the built-in one
    pub fn list_themes(&self) -> Vec<ThemeInfo> {
        let mut themes = vec![ThemeInfo::builtin()];

        let Ok(entries) = fs::read_dir(&self.themes_path) else {
            return themes;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_dir() || name == BUILTIN_THEME {
                continue;
            }
            match load_theme_metadata(&path, name) {
                Ok(info) => themes.push(info),
                Err(e) => tracing::warn!(theme = name, error = %e, "Failed to load theme metadata"),
            }
        }
        themes.sort_by(|a, b| a.name.cmp(&b.name));
        themes
    }
}

fn collect_templates_from_dir(base_path: &Path, current_path: &Path, templates: &mut BTreeMap<String, String>) -> Result<()> {
    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::Load(format!("{} is outside {}", path.display(), base_path.display())))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path).with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.insert(template_name, content);
        }
    }
    Ok(())
}

fn load_theme_metadata(theme_path: &Path, theme_name: &str) -> Result<ThemeInfo> {
    let toml_path = theme_path.join("theme.toml");
    if !toml_path.exists() {
        return Ok(ThemeInfo {
            name: theme_name.to_string(),
            display_name: theme_name.to_string(),
            description: None,
            version: "0.0.0".to_string(),
            author: None,
        });
    }

    let content = fs::read_to_string(&toml_path).with_context(|| format!("Failed to read {:?}", toml_path))?;
    let metadata: ThemeMetadata =
        toml::from_str(&content).map_err(|e| ThemeError::InvalidMetadata(format!("theme '{}': {}", theme_name, e)))?;

    Ok(ThemeInfo {
        name: theme_name.to_string(),
        display_name: metadata.display_name.unwrap_or_else(|| theme_name.to_string()),
        description: metadata.description,
        version: metadata.version.unwrap_or_else(|| "0.0.0".to_string()),
        author: metadata.author,
    })
}

fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// `{{ asset(path="css/site.css") }}`
///
/// Output is marked safe so URLs are not HTML-escaped.
struct AssetFunction {
    cdn_url: Option<String>,
}

impl tera::Function for AssetFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("asset() requires a string `path` argument"))?;
        Ok(Value::String(assets::url(self.cdn_url.as_deref(), path)))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// Last-resort page when even `error.html` cannot be rendered
pub fn simple_error_page(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Error {status}</title>
</head>
<body>
<main>
<h1>Error {status}</h1>
<p>{}</p>
</main>
</body>
</html>"#,
        crate::services::markdown::html_escape(message)
    )
}

/// theme.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThemeMetadata {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThemeInfo {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub version: String,
    pub author: Option<String>,
}

impl ThemeInfo {
    fn builtin() -> Self {
        Self {
            name: BUILTIN_THEME.to_string(),
            display_name: "Folio".to_string(),
            description: Some("Built-in templates".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: None,
        }
    }
}

/// Variables every page template can rely on
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    pub site: SiteSettings,
    pub request_path: String,
    pub year: i32,
    pub effects_mode: EffectsMode,
    pub chat_enabled: bool,
    pub current_user: Option<CurrentUser>,
}

/// Signed-in user as seen by templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl StandardTemplateVars {
    pub fn new(site: SiteSettings, request_path: impl Into<String>) -> Self {
        Self {
            site,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
            effects_mode: EffectsMode::default(),
            chat_enabled: false,
            current_user: None,
        }
    }

    pub fn with_effects_mode(mut self, mode: EffectsMode) -> Self {
        self.effects_mode = mode;
        self
    }

    pub fn with_chat(mut self, enabled: bool) -> Self {
        self.chat_enabled = enabled;
        self
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.current_user = Some(user);
        self
    }
}
