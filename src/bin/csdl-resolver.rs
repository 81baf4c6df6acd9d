//! CSDL Resolver CLI
//!
//! Command-line interface for loading Redfish schema documents and querying
//! the resolved type graph.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use csdl_resolver::{
    get_resource_json_metadata, load_document, DefaultSource, DocumentKind, JsonSchemaDefinition,
    JsonSchemaSet, LoadOptions, LoadedDocument, NamespaceRegistry, ODataType,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "csdl-resolver")]
#[command(about = "Load Redfish CSDL schemas and query the resolved type graph")]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoadArgs {
    /// Also load every document reachable through Reference elements
    #[arg(long)]
    follow_references: bool,

    /// Local directory containing copies of published schema files
    #[arg(long)]
    local_base: Option<PathBuf>,

    /// URL prefix served from --local-base (e.g., http://redfish.dmtf.org/schemas/v1)
    #[arg(long, requires = "local_base")]
    remote_base: Option<String>,

    /// HTTP fetch timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        let mut options = LoadOptions::new()
            .timeout(Duration::from_secs(self.timeout))
            .follow_references(self.follow_references);
        if let (Some(local), Some(remote)) = (&self.local_base, &self.remote_base) {
            options = options.url_mapping(local.clone(), remote.clone());
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents and summarize their namespaces
    Inspect {
        /// Schema sources: file paths or URLs (http:// or https://); `.json`
        /// sources are read as JSON Schema
        #[arg(required = true)]
        sources: Vec<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Resolve an @odata.type value against loaded schemas
    ResolveType {
        /// Type string, e.g. #Drive.v1_0_0.Drive
        odata_type: String,

        /// Schema source to load (repeatable)
        #[arg(long = "schema", required = true)]
        schemas: Vec<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Report entity types whose BaseType does not resolve
    BaseTypes {
        /// Schema sources: file paths or URLs
        #[arg(required = true)]
        sources: Vec<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Locate and summarize the JSON-Schema file for a namespace
    JsonMetadata {
        /// Unversioned namespace, e.g. Drive
        namespace: String,

        /// Directory holding the JSON-Schema files
        #[arg(long)]
        dir: PathBuf,

        /// Show property flags for one definition
        #[arg(long = "type")]
        type_name: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Inspect {
            sources,
            json,
            load,
        } => run_inspect(&sources, &load, json),

        Commands::ResolveType {
            odata_type,
            schemas,
            json,
            load,
        } => run_resolve_type(&odata_type, &schemas, &load, json),

        Commands::BaseTypes {
            sources,
            json,
            load,
        } => run_base_types(&sources, &load, json),

        Commands::JsonMetadata {
            namespace,
            dir,
            type_name,
            json,
        } => run_json_metadata(&namespace, &dir, type_name.as_deref(), json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load every source into one registry.
///
/// A source named on the command line that fails to load is fatal; failures
/// among referenced documents are kept on the registry and reported later.
fn build_registry(sources: &[String], load: &LoadArgs) -> Result<NamespaceRegistry, u8> {
    let options = load.options();
    let mut registry = NamespaceRegistry::new();
    for source in sources {
        registry.load_from(&DefaultSource, source, &options);
        if let Some(failure) = registry.failures().iter().find(|f| &f.location == source) {
            eprintln!("Error: {}", failure);
            return Err(failure.error.exit_code() as u8);
        }
    }
    Ok(registry)
}

/// Load JSON-Schema sources, which stay outside the CSDL registry.
fn load_json_schemas(sources: &[String], load: &LoadArgs) -> Result<Vec<JsonSchemaSet>, u8> {
    let options = load.options();
    let mut schemas = Vec::new();
    for source in sources {
        match load_document(source, DocumentKind::JsonSchema, &options) {
            Ok(LoadedDocument::JsonSchema(set)) => schemas.push(set),
            Ok(LoadedDocument::Csdl(_)) => {}
            Err(e) => {
                eprintln!("Error: {}: {}", source, e);
                return Err(e.exit_code() as u8);
            }
        }
    }
    Ok(schemas)
}

fn run_inspect(sources: &[String], load: &LoadArgs, json_output: bool) -> Result<(), u8> {
    let (json_sources, csdl_sources): (Vec<String>, Vec<String>) = sources
        .iter()
        .cloned()
        .partition(|s| DocumentKind::from_location(s) == DocumentKind::JsonSchema);
    let registry = build_registry(&csdl_sources, load)?;
    let schemas = load_json_schemas(&json_sources, load)?;

    if json_output {
        let documents: Vec<_> = registry
            .documents()
            .iter()
            .map(|doc| {
                let namespaces: Vec<_> = doc
                    .namespaces
                    .iter()
                    .map(|ns| {
                        json!({
                            "name": ns.name,
                            "alias": ns.alias,
                            "entity_types": ns.entity_types().len(),
                            "complex_types": ns.complex_types().len(),
                            "enum_types": ns.enum_types().len(),
                            "actions": ns.actions().len(),
                        })
                    })
                    .collect();
                json!({
                    "uri": doc.uri,
                    "edmx_version": doc.edmx_version,
                    "namespaces": namespaces,
                    "references": doc.references.len(),
                })
            })
            .collect();
        let failures: Vec<_> = registry
            .failures()
            .iter()
            .map(|f| {
                json!({
                    "location": f.location,
                    "namespaces": f.namespaces,
                    "kind": f.error.kind(),
                    "error": f.error.to_string(),
                })
            })
            .collect();
        let json_schemas: Vec<_> = schemas
            .iter()
            .map(|set| {
                let definitions: Vec<_> =
                    set.definitions.iter().map(|d| d.type_name.as_str()).collect();
                json!({ "uri": set.source, "definitions": definitions })
            })
            .collect();
        let output = json!({
            "documents": documents,
            "json_schemas": json_schemas,
            "inconsistencies": registry.inconsistencies(),
            "failures": failures,
        });
        println!("{}", output);
        return Ok(());
    }

    for doc in registry.documents() {
        let version = doc.edmx_version.as_deref().unwrap_or("none");
        if doc.is_edmx() {
            println!("{} (Edmx {})", doc.uri, version);
        } else {
            println!("{} (root element {}, not Edmx)", doc.uri, doc.edmx_element);
        }
        for ns in &doc.namespaces {
            println!(
                "  {}: {} entity, {} complex, {} enum, {} actions",
                ns.name,
                ns.entity_types().len(),
                ns.complex_types().len(),
                ns.enum_types().len(),
                ns.actions().len()
            );
        }
    }
    for set in &schemas {
        println!("{} (JSON Schema)", set.source);
        for definition in &set.definitions {
            println!("  {}: {} properties", definition.type_name, definition.properties.len());
        }
    }
    for inconsistency in registry.inconsistencies() {
        println!("warning: {}", inconsistency);
    }
    for failure in registry.failures() {
        println!("warning: not loaded: {}", failure);
    }
    Ok(())
}

fn run_resolve_type(
    odata_type: &str,
    schemas: &[String],
    load: &LoadArgs,
    json_output: bool,
) -> Result<(), u8> {
    if ODataType::parse(odata_type).is_none() {
        report_unresolved(json_output, odata_type, "not a #Namespace.Type value");
        return Err(1);
    }

    let registry = build_registry(schemas, load)?;
    let resolver = registry.resolver();

    match resolver.resolve_odata_type(odata_type) {
        Some(resolved) => {
            let ty = resolved.ty;
            if json_output {
                let output = json!({
                    "resolved": true,
                    "type": ty.qualified_name(),
                    "kind": ty.kind,
                    "schema_uri": ty.schema_uri,
                });
                println!("{}", output);
            } else {
                println!("{} ({}) in {}", ty.qualified_name(), ty.kind, ty.schema_uri);
            }
            Ok(())
        }
        None => {
            report_unresolved(json_output, odata_type, "no loaded namespace defines it");
            Err(1)
        }
    }
}

fn report_unresolved(json_output: bool, odata_type: &str, reason: &str) {
    if json_output {
        let output = json!({"resolved": false, "type": odata_type, "reason": reason});
        println!("{}", output);
    } else {
        eprintln!("Unresolved: {} ({})", odata_type, reason);
    }
}

fn run_base_types(sources: &[String], load: &LoadArgs, json_output: bool) -> Result<(), u8> {
    let registry = build_registry(sources, load)?;
    let resolver = registry.resolver();

    let mut dangling = Vec::new();
    for ns in registry.namespaces() {
        for ty in ns.entity_types() {
            let Some(base) = &ty.base_type else {
                continue;
            };
            if resolver.resolve_type(base, &ty.schema_uri).is_some() {
                continue;
            }
            let status = resolver.verify_resource_basetype(base);
            dangling.push((ty, base, status));
        }
    }

    if json_output {
        let entries: Vec<_> = dangling
            .iter()
            .map(|(ty, base, status)| {
                json!({
                    "type": ty.qualified_name(),
                    "base_type": base,
                    "namespace_found": status.namespace_found,
                    "type_found": status.type_found,
                    "schema_uri": ty.schema_uri,
                })
            })
            .collect();
        println!("{}", json!({ "unresolved": entries }));
    } else if dangling.is_empty() {
        println!("All base types resolve");
    } else {
        for (ty, base, status) in &dangling {
            let reason = if status.namespace_found {
                "type not found in namespace"
            } else {
                "namespace not found"
            };
            println!(
                "{} -> {}: {} ({})",
                ty.qualified_name(),
                base,
                reason,
                ty.schema_uri
            );
        }
    }

    if dangling.is_empty() {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_json_metadata(
    namespace: &str,
    dir: &Path,
    type_name: Option<&str>,
    json_output: bool,
) -> Result<(), u8> {
    let metadata = match get_resource_json_metadata(namespace, dir) {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            eprintln!("No JSON schema for {} in {}", namespace, dir.display());
            return Err(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e.exit_code() as u8);
        }
    };

    let Some(type_name) = type_name else {
        if json_output {
            let definitions: Vec<_> = metadata
                .schema
                .definitions
                .iter()
                .map(|d| d.type_name.as_str())
                .collect();
            let output = json!({
                "file": metadata.file_name.display().to_string(),
                "definitions": definitions,
            });
            println!("{}", output);
        } else {
            println!("{}", metadata.file_name.display());
            for definition in &metadata.schema.definitions {
                println!("  {} ({} properties)", definition.type_name, definition.properties.len());
            }
        }
        return Ok(());
    };

    let Some(definition) = metadata.schema.definition(type_name) else {
        eprintln!(
            "No definition {} in {}",
            type_name,
            metadata.file_name.display()
        );
        return Err(1);
    };

    if json_output {
        match serde_json::to_string(definition) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return Err(2);
            }
        }
    } else {
        print_definition(definition);
    }
    Ok(())
}

fn print_definition(definition: &JsonSchemaDefinition) {
    println!(
        "{} (additionalProperties: {})",
        definition.type_name, definition.additional_properties
    );
    for property in &definition.properties {
        let mut flags = Vec::new();
        if property.required {
            flags.push("required");
        }
        if property.nullable {
            flags.push("nullable");
        }
        if property.readonly {
            flags.push("readonly");
        }
        println!("  {} [{}]", property.name, flags.join(", "));
    }
}
