//! Schema Form CLI
//!
//! Command-line interface for computing defaults, resolving schemas, listing
//! field ids and validating form data.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use schema_form::{
    default_form_data, load_document, load_options, resolve_tree, validate_form_data,
    FormOptions, IdScheme,
};

#[derive(Parser)]
#[command(name = "schema-form")]
#[command(about = "Compute form state from a JSON Schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill form data with schema defaults
    Defaults {
        /// Schema file
        schema: PathBuf,

        /// Existing form data to merge defaults into
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective schema tree for the given data
    Resolve {
        /// Schema file
        schema: PathBuf,

        /// Form data that drives dependencies and oneOf/anyOf selection
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the field id of every field
    Ids {
        /// Schema file
        schema: PathBuf,

        /// Form data (array elements only get ids when present)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Form options file (idPrefix, idSeparator)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate form data and print the error tree
    Validate {
        /// Schema file
        schema: PathBuf,

        /// Form data file
        data: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Defaults {
            schema,
            data,
            output,
            pretty,
        } => run_defaults(&schema, data.as_deref(), output, pretty),

        Commands::Resolve {
            schema,
            data,
            output,
            pretty,
        } => run_resolve(&schema, data.as_deref(), output, pretty),

        Commands::Ids {
            schema,
            data,
            options,
            pretty,
        } => run_ids(&schema, data.as_deref(), options.as_deref(), pretty),

        Commands::Validate { schema, data, json } => run_validate(&schema, &data, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_defaults(
    schema_path: &Path,
    data_path: Option<&Path>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load(schema_path)?;
    let data = data_path.map(load).transpose()?;

    let defaults = default_form_data(&schema, data.as_ref()).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    emit(&defaults, output, pretty)
}

fn run_resolve(
    schema_path: &Path,
    data_path: Option<&Path>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load(schema_path)?;
    let data = data_path.map(load).transpose()?;

    emit(&resolve_tree(&schema, data.as_ref()), output, pretty)
}

fn run_ids(
    schema_path: &Path,
    data_path: Option<&Path>,
    options_path: Option<&Path>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load(schema_path)?;
    let data = data_path.map(load).transpose()?;
    let options = match options_path {
        Some(path) => load_options(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => FormOptions::default(),
    };

    let ids = IdScheme::from_options(&options).id_map(&schema, data.as_ref());
    emit(&ids.to_id_schema(), None, pretty)?;

    if ids.errors.is_empty() {
        return Ok(());
    }
    for (path, error) in &ids.errors {
        eprintln!("Error at {}: {}", path, error);
    }
    Err(2)
}

fn run_validate(schema_path: &Path, data_path: &Path, json_output: bool) -> Result<(), u8> {
    let schema = load(schema_path).map_err(|code| {
        report_error(json_output, "loading schema failed");
        code
    })?;
    let data = load(data_path).map_err(|code| {
        report_error(json_output, "loading data failed");
        code
    })?;

    let errors = validate_form_data(&schema, &data, None).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    if errors.is_empty() {
        if json_output {
            println!(r#"{{"valid":true}}"#);
        } else {
            println!("Valid");
        }
        return Ok(());
    }

    if json_output {
        let output = serde_json::json!({
            "valid": false,
            "errors": errors.flatten(),
            "errorSchema": errors.to_error_schema(),
        });
        println!("{}", output);
    } else {
        eprintln!("Validation failed:");
        for error in errors.flatten() {
            eprintln!("  {}: {}", error.path, error.message);
        }
    }
    Err(1)
}

fn load(path: &Path) -> Result<Value, u8> {
    load_document(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn emit(value: &Value, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
