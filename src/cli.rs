//! Command line: schema lookup, lens listing, patching.
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{Catalog, resolve_schema_location};
use crate::document::{DocumentIndex, FileLanguage};
use crate::lens::{ArgumentsLens, arguments_lenses};
use crate::patch::{EditSession, PatchOptions};
use crate::schema::FormGenerator;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// find the `arguments` of workflow function calls, build their form schema
/// from a service catalog and write form data back into the document
#[derive(Parser, Debug)]
#[command(name = "argform", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the form model and schema of one catalog operation
    Schema(SchemaOut),
    /// list the "+ Add arguments..." lenses of workflow documents
    Lenses(LensesOut),
    /// replace the arguments under a lens with form data
    Patch(PatchOut),
}

#[derive(Args, Debug, Clone)]
struct CatalogSettings {
    /// one or more catalog files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    catalog: Vec<String>,

    /// directory local schema locations are resolved against (by file name)
    #[arg(long, env = "ARGFORM_SPECS_DIR")]
    specs_dir: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// schema location as written in the workflow (`<location>#<operationId>`)
    #[arg(long)]
    location: String,

    /// operation id inside that schema
    #[arg(long)]
    operation: String,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct LensesOut {
    /// one or more workflow documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// document language, instead of guessing from the file extension
    #[arg(long)]
    language: Option<FileLanguage>,

    /// print lenses as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Parser, Debug)]
struct PatchOut {
    /// workflow document to edit
    #[arg(long, short)]
    input: PathBuf,

    /// document language, instead of guessing from the file extension
    #[arg(long)]
    language: Option<FileLanguage>,

    /// JSON file holding the submitted form value
    #[arg(long, short)]
    data: PathBuf,

    /// which lens of the document to patch, in document order
    #[arg(long, default_value_t = 0)]
    lens: usize,

    /// indentation of the written YAML block
    #[arg(long, default_value_t = PatchOptions::default().yaml_indent)]
    yaml_indent: usize,

    /// output file (input is rewritten in place if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct DocumentLenses<'a> {
    file: &'a Path,
    language: FileLanguage,
    lenses: &'a [ArgumentsLens],
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CatalogSettings {
    fn load(&self) -> anyhow::Result<Catalog> {
        let paths = resolve_file_path_patterns(&self.catalog).context("failed to resolve catalog file paths")?;
        let catalog = Catalog::load(&paths)?;
        debug!(files = paths.len(), services = catalog.len(), "catalog ready");
        Ok(catalog)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn verbose(&self) -> bool {
        self.verbose
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Schema(target) => target.run(),
            Command::Lenses(target) => target.run(),
            Command::Patch(target) => target.run(),
        }
    }
}

impl SchemaOut {
    fn run(&self) -> anyhow::Result<()> {
        let catalog = self.catalog_settings.load()?;
        let location = resolve_schema_location(&self.location, self.catalog_settings.specs_dir.as_deref());
        let Some(form) = FormGenerator::new(&catalog).generate(&location, &self.operation) else {
            eprintln!(
                "{} no schema for {}#{}",
                "note:".yellow().bold(),
                location,
                self.operation
            );
            return Ok(());
        };
        let form_src = serde_json::to_string_pretty(&form)?;
        write_output(self.out.as_deref(), &form_src)
    }
}

impl LensesOut {
    fn run(&self) -> anyhow::Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let documents = source_paths
            .par_iter()
            .map(|path| -> anyhow::Result<_> {
                let doc = read_document(path, self.language)?;
                let lenses = arguments_lenses(&doc);
                Ok((path.as_path(), doc.language(), lenses))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if self.json {
            let listing = documents
                .iter()
                .map(|(file, language, lenses)| DocumentLenses {
                    file: *file,
                    language: *language,
                    lenses: lenses.as_slice(),
                })
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }
        for (file, _, lenses) in &documents {
            for lens in lenses {
                let form = &lens.arguments;
                println!(
                    "{}:{}:{}  {}  {}#{}  {}:{} → {}:{}",
                    file.display().to_string().bold(),
                    lens.position.line + 1,
                    lens.position.character + 1,
                    lens.title.green(),
                    form.operation.open_api_schema_location,
                    form.operation.operation_id.cyan(),
                    form.start_position.line,
                    form.start_position.character,
                    form.end_position.line,
                    form.end_position.character,
                );
            }
        }
        Ok(())
    }
}

impl PatchOut {
    fn run(&self) -> anyhow::Result<()> {
        let data_src = std::fs::read_to_string(&self.data)
            .with_context(|| format!("failed to read form data {}", self.data.display()))?;
        let value = serde_json::from_str::<serde_json::Value>(&data_src)
            .with_context(|| format!("failed to parse form data {}", self.data.display()))?;

        let doc = read_document(&self.input, self.language)?;
        let lenses = arguments_lenses(&doc);
        let lens = lenses.get(self.lens).ok_or_else(|| {
            anyhow!(
                "{} has {} arguments lens(es), no lens #{}",
                self.input.display(),
                lenses.len(),
                self.lens
            )
        })?;
        let session = EditSession::open(&doc, lens.arguments.edit_range())?;

        // the form may have been open for a while; patch what is on disk now
        let current = std::fs::read_to_string(&self.input)
            .with_context(|| format!("failed to re-read {}", self.input.display()))?;
        let options = PatchOptions { yaml_indent: self.yaml_indent };
        let patched = session
            .submit(&current, &value, options)
            .with_context(|| format!("failed to patch {}", self.input.display()))?;

        let out = self.out.as_deref().unwrap_or(&self.input);
        write_file(out, &patched)?;
        eprintln!("{} {}", "patched".green().bold(), out.display());
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_document(path: &Path, language: Option<FileLanguage>) -> anyhow::Result<DocumentIndex> {
    let language = match language.or_else(|| FileLanguage::from_path(path)) {
        Some(language) => language,
        None => bail!("cannot tell the language of {}; pass --language", path.display()),
    };
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    DocumentIndex::parse(source, language).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_output(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => write_file(out, contents),
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn write_file(out: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                // an explicit glob that matched nothing is almost always a typo
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("argform-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = CommandLineInterface::try_parse_from([
            "argform", "-v", "patch", "--input", "flow.sw.yaml", "--data", "form.json", "--lens", "2",
        ])
        .unwrap();
        assert!(cli.verbose());
        let Command::Patch(patch) = cli.cmd else { panic!("expected patch") };
        assert_eq!(patch.lens, 2);
        assert_eq!(patch.yaml_indent, 12);
        assert_eq!(patch.language, None);

        let cli = CommandLineInterface::try_parse_from(["argform", "lenses", "-i", "a.json", "b.yaml", "--language", "yml"])
            .unwrap();
        let Command::Lenses(lenses) = cli.cmd else { panic!("expected lenses") };
        assert_eq!(lenses.input, vec!["a.json", "b.yaml"]);
        assert_eq!(lenses.language, Some(FileLanguage::Yaml));
    }

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let dir = scratch_dir("globs");
        std::fs::write(dir.join("one.sw.json"), "{}").unwrap();
        std::fs::write(dir.join("two.sw.json"), "{}").unwrap();

        let pattern = format!("{}/*.sw.json", dir.display());
        let mut found = resolve_file_path_patterns([pattern.as_str(), "missing.yaml"]).unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![PathBuf::from("missing.yaml"), dir.join("one.sw.json"), dir.join("two.sw.json")]
        );

        let nothing = format!("{}/*.nope", dir.display());
        assert!(resolve_file_path_patterns([nothing]).is_err());
    }

    #[test]
    fn patch_command_rewrites_the_document() {
        let dir = scratch_dir("patch");
        let input = dir.join("flow.sw.yaml");
        let data = dir.join("form.json");
        let out = dir.join("out").join("flow.sw.yaml");
        std::fs::write(
            &input,
            "\
functions:
  - name: greet
    operation: specs/greet.yaml#greet
states:
  - name: Start
    actions:
      - functionRef:
          refName: greet
          arguments:
            name: John
",
        )
        .unwrap();
        std::fs::write(&data, r#"{"name": "Jane"}"#).unwrap();

        let args: Vec<std::ffi::OsString> = vec![
            "argform".into(),
            "patch".into(),
            "--input".into(),
            input.clone().into(),
            "--data".into(),
            data.clone().into(),
            "--out".into(),
            out.clone().into(),
        ];
        let cli = CommandLineInterface::try_parse_from(args).unwrap();
        cli.run().unwrap();

        let patched = std::fs::read_to_string(&out).unwrap();
        assert!(patched.ends_with("          arguments:\n            name: Jane\n"));
    }
}
