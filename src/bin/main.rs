//! The `semaflow` CLI: compile requests to SQL, or serve a catalog over
//! HTTP (with the `api` feature).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use semaflow::backend::DataSource;
use semaflow::handle::FlowHandle;
use semaflow::planner::types::QueryRequest;

#[derive(Parser)]
#[command(name = "semaflow", version, about = "Semantic query compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a request JSON file into SQL and print it.
    Sql {
        /// Catalog directory (tables/ + flows/).
        #[arg(long)]
        dir: PathBuf,
        /// Data sources YAML (a list of descriptors).
        #[arg(long)]
        sources: PathBuf,
        /// Request payload JSON file.
        #[arg(long)]
        request: PathBuf,
    },
    /// Serve the catalog over HTTP.
    #[cfg(feature = "api")]
    Serve {
        /// Catalog directory (tables/ + flows/).
        #[arg(long)]
        dir: PathBuf,
        /// Data sources YAML (a list of descriptors).
        #[arg(long)]
        sources: PathBuf,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

fn load_sources(path: &PathBuf) -> Result<Vec<DataSource>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Sql {
            dir,
            sources,
            request,
        } => {
            let handle = FlowHandle::from_dir(&dir, load_sources(&sources)?)?;
            let payload = std::fs::read_to_string(&request)?;
            let request: QueryRequest = serde_json::from_str(&payload)?;
            println!("{}", handle.build_sql(&request)?);
        }
        #[cfg(feature = "api")]
        Command::Serve { dir, sources, port } => {
            let handle = FlowHandle::from_dir(&dir, load_sources(&sources)?)?;
            semaflow::api::serve(handle, port).await?;
        }
    }
    Ok(())
}
