use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::request::variables::VariableSet;

/// Longest prefix taken from a variable when naming files and jobs
const MAX_NAME_LEN: usize = 64;

/// Rendered MATLAB source: `addpath` calls followed by a single function call
#[derive(Debug)]
pub struct Script {
    pub content: String,
}

/// A script that's been written to disk and is never cleaned up by us
///
/// MATLAB reads it from standard input when the job starts, so it has to outlive this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempScript {
    pub path: PathBuf,
}

/// Rendering context for the MATLAB template
#[derive(Serialize)]
struct ScriptContext<'a> {
    paths: Vec<String>,
    function: &'a str,
    arguments: String,
}

impl Script {
    /// Render the MATLAB template using TinyTemplate
    pub fn render(paths: &[String], function: &str, variables: &VariableSet) -> Result<Script> {
        /// included MATLAB template
        static MATLAB: &str =
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/matlab.txt"));
        let mut tt = TinyTemplate::new();
        // scripts aren't HTML
        tt.set_default_formatter(&format_unescaped);
        tt.add_template("matlab", MATLAB)
            .context("invalid MATLAB template")?;

        let context = ScriptContext {
            paths: paths.iter().map(|p| quote_path(p)).collect(),
            function,
            arguments: variables.items().join(","),
        };

        let content = tt
            .render("matlab", &context)
            .context("can't render MATLAB script")?;
        Ok(Script { content })
    }

    /// Write the script to a uniquely named `.m` file in `dir`
    ///
    /// The file is named `<prefix>_XXXXXX_<count>.m`. Contents are written and flushed before the
    /// file is persisted, so a returned path always points at a complete script.
    pub fn write(&self, dir: &Path, prefix: &str, count: usize) -> Result<TempScript> {
        let prefix = format!("{}_", safe_name(prefix));
        let suffix = format!("_{}.m", count);

        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(dir)
            .with_context(|| format!("can't create temp file in {}", dir.display()))?;

        file.write_all(self.content.as_bytes())
            .and_then(|_| file.flush())
            .with_context(|| format!("can't write temp file {}", file.path().display()))?;

        let (_, path) = file.keep().context("can't persist temp file")?;
        info!("Wrote script {}", path.display());
        debug!("{}", self.content.trim_end());

        Ok(TempScript { path })
    }
}

/// MATLAB char arrays escape a single quote by doubling it
fn quote_path(path: &str) -> String {
    path.replace('\'', "''")
}

/// Reduce a variable to something usable in file and job names
///
/// Anything outside `[A-Za-z0-9_.-]` becomes `_`. An empty result is replaced with `job`.
pub fn safe_name(s: &str) -> String {
    let name: String = s
        .chars()
        .take(MAX_NAME_LEN)
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => c,
            _ => '_',
        })
        .collect();

    match name.trim_matches(|c| c == '_' || c == '.').is_empty() {
        true => "job".to_string(),
        false => name,
    }
}
