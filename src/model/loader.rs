//! YAML catalog loading for `FlowHandle::from_dir`.
//!
//! A catalog directory holds `tables/*.y(a)ml` and `flows/*.y(a)ml`. Files
//! are read in sorted order so catalog construction is reproducible.
//!
//! Flow files nest the base table:
//!
//! ```yaml
//! name: sales
//! base_table:
//!   semantic_table: orders
//!   alias: o
//! joins:
//!   - semantic_table: customers
//!     alias: c
//!     to_table: o
//!     join_type: left
//!     join_keys:
//!       - left: customer_id
//!         right: id
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FlowError, FlowResult};
use crate::model::flow::{FlowJoin, SemanticFlow};
use crate::model::table::SemanticTable;

/// On-disk shape of a flow's base table reference.
#[derive(Debug, Deserialize)]
struct BaseTableDoc {
    semantic_table: String,
    alias: String,
}

/// On-disk shape of a flow definition.
#[derive(Debug, Deserialize)]
struct FlowDoc {
    name: String,
    base_table: BaseTableDoc,
    #[serde(default)]
    joins: Vec<FlowJoin>,
    #[serde(default)]
    description: Option<String>,
}

impl From<FlowDoc> for SemanticFlow {
    fn from(doc: FlowDoc) -> Self {
        SemanticFlow {
            name: doc.name,
            base_table: doc.base_table.semantic_table,
            base_alias: doc.base_table.alias,
            joins: doc.joins,
            description: doc.description,
        }
    }
}

/// Load semantic tables and flows from a catalog directory.
pub fn load_catalog_dir(root: &Path) -> FlowResult<(Vec<SemanticTable>, Vec<SemanticFlow>)> {
    let tables = yaml_files(&root.join("tables"))?
        .into_iter()
        .map(|path| read_yaml::<SemanticTable>(&path))
        .collect::<FlowResult<Vec<_>>>()?;
    let flows = yaml_files(&root.join("flows"))?
        .into_iter()
        .map(|path| read_yaml::<FlowDoc>(&path).map(SemanticFlow::from))
        .collect::<FlowResult<Vec<_>>>()?;
    Ok((tables, flows))
}

fn yaml_files(dir: &Path) -> FlowResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        FlowError::catalog(format!("cannot read catalog directory {}: {}", dir.display(), e))
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yml") | Some("yaml")
            )
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> FlowResult<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| FlowError::catalog(format!("cannot read {}: {}", path.display(), e)))?;
    serde_yaml::from_str(&text)
        .map_err(|e| FlowError::catalog(format!("invalid YAML in {}: {}", path.display(), e)))
}
