//! SchemaForge Command-Line Client
//!
//! Compiles a JSON schema file with the in-memory store and prints the
//! emitted units, a type summary or the synchronised access grants.

mod output;

use clap::{Parser, Subcommand};
use output::OutputFormat;
use schemaforge_core::{
    CompilerConfig, GrantStore, GrantSynchronizer, MemoryGrantStore, MemoryStore, PassReport,
    SchemaCompiler, SchemaDocument,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// SchemaForge Command-Line Client
#[derive(Parser, Debug)]
#[command(name = "schemaforge")]
#[command(version, about = "SchemaForge schema compiler")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Allow schema types to reuse built-in or reserved names
    #[arg(long, global = true)]
    pub allow_override: bool,

    /// Activate the units that pass even when others fail
    #[arg(long, global = true)]
    pub force: bool,

    /// Additional reserved type names
    #[arg(long = "reserve", global = true, value_name = "NAME")]
    pub reserved: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a schema file and print the emitted units
    Compile {
        /// Schema file (JSON)
        schema: PathBuf,
    },
    /// Print a summary of the compiled types
    Types {
        /// Schema file (JSON)
        schema: PathBuf,
    },
    /// Print the access grants the compiled schema requires
    Grants {
        /// Schema file (JSON)
        schema: PathBuf,
    },
}

impl Command {
    fn schema(&self) -> &Path {
        match self {
            Command::Compile { schema } | Command::Types { schema } | Command::Grants { schema } => {
                schema
            }
        }
    }
}

impl Args {
    /// Compiler configuration for the given flags.
    ///
    /// Activation is strict unless `--force` is passed.
    pub fn to_config(&self) -> CompilerConfig {
        CompilerConfig::strict()
            .force_activation(self.force)
            .allow_type_override(self.allow_override)
            .reserved_names(self.reserved.iter().cloned())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schemaforge=info")),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let compiled = compile_file(args.command.schema(), args.to_config())?;

    let rendered = match &args.command {
        Command::Compile { .. } => output::render_report(&compiled.report, args.format)?,
        Command::Types { .. } => output::render_types(&compiled.report, args.format)?,
        Command::Grants { .. } => {
            let grants = compiled.grants.store().list()?;
            output::render_grants(&grants, args.format)?
        }
    };
    println!("{}", rendered);

    if compiled.report.generation.is_none() {
        std::process::exit(2);
    }
    Ok(())
}

/// Outcome of compiling a schema file.
pub struct Compiled {
    pub report: PassReport,
    pub grants: GrantSynchronizer,
}

/// Load `path` into an in-memory store and run one reload pass.
pub fn compile_file(path: &Path, config: CompilerConfig) -> Result<Compiled, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let document = SchemaDocument::from_json(&content)?;
    let store = Arc::new(MemoryStore::from_snapshot(document.into_snapshot()));
    let grants = GrantSynchronizer::new(Arc::new(MemoryGrantStore::new()));

    let compiler = SchemaCompiler::builder(store)
        .config(config)
        .grants(grants.clone())
        .build();

    tracing::info!(schema = %path.display(), "compiling schema file");
    let report = compiler.reload().ok_or("reload pass did not run")?;
    Ok(Compiled { report, grants })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::catalog::PropertyType;
    use schemaforge_core::{PropertyDef, RelationshipDef, SchemaSnapshot, TypeDef};
    use std::io::Write;

    fn schema_file() -> tempfile::NamedTempFile {
        let snapshot = SchemaSnapshot::new(0)
            .with_type(TypeDef::new("Customer"))
            .with_type(TypeDef::new("Order"))
            .with_property("Customer", PropertyDef::typed("email", PropertyType::String))
            .with_relationship(RelationshipDef::one_to_many("Customer", "OWNS", "Order"));
        let json = SchemaDocument::from_snapshot(&snapshot).to_json().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "schemaforge",
            "compile",
            "schema.json",
            "--format",
            "json",
            "--force",
            "--reserve",
            "Session",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.command.schema(), Path::new("schema.json"));

        let config = args.to_config();
        assert!(config.force_activation);
        assert!(!config.allow_type_override);
        assert!(config.reserved_names.contains("Session"));
    }

    #[test]
    fn test_strict_by_default() {
        let args = Args::try_parse_from(["schemaforge", "types", "schema.json"]).unwrap();
        assert!(!args.to_config().force_activation);
    }

    #[test]
    fn test_compile_file() {
        let file = schema_file();
        let compiled = compile_file(file.path(), CompilerConfig::strict()).unwrap();

        assert!(compiled.report.is_clean(), "{:?}", compiled.report.diagnostics);
        assert_eq!(compiled.report.units.len(), 2);
        assert!(compiled
            .grants
            .store()
            .get("Customer/_Orders")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_missing_file() {
        let result = compile_file(Path::new("/nonexistent/schema.json"), CompilerConfig::new());
        assert!(result.is_err());
    }
}
