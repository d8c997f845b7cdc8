//! Semantic flows: a base table plus an ordered list of joins.

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};

/// How a joined table relates to its target alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

/// One equi-join key pair: `left` is a column on the joined table's target
/// alias, `right` a column on the joined table itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKey {
    pub left: String,
    pub right: String,
}

impl JoinKey {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// A join edge inside a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowJoin {
    /// Name of the semantic table being joined in.
    pub semantic_table: String,
    /// Alias the table is known by within the flow.
    pub alias: String,
    /// Alias of an earlier-declared table this join attaches to.
    #[serde(rename = "to_table")]
    pub to_alias: String,
    #[serde(rename = "join_type")]
    pub kind: JoinKind,
    #[serde(rename = "join_keys")]
    pub keys: Vec<JoinKey>,
}

/// A named bundle of one base semantic table plus ordered joins, forming a
/// reusable query context. Aliases are unique across base and joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticFlow {
    pub name: String,
    pub base_table: String,
    pub base_alias: String,
    #[serde(default)]
    pub joins: Vec<FlowJoin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SemanticFlow {
    pub fn new(
        name: impl Into<String>,
        base_table: impl Into<String>,
        base_alias: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_table: base_table.into(),
            base_alias: base_alias.into(),
            joins: Vec::new(),
            description: None,
        }
    }

    pub fn with_join(mut self, join: FlowJoin) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Structural validation: alias uniqueness, forward-only join targets,
    /// non-empty join keys. Table references are checked at handle build.
    pub fn validate_structure(&self) -> FlowResult<()> {
        if self.name.is_empty() {
            return Err(FlowError::catalog("flow with empty name"));
        }
        if self.base_alias.is_empty() {
            return Err(FlowError::catalog(format!(
                "flow '{}' has an empty base alias",
                self.name
            )));
        }
        let mut seen = vec![self.base_alias.clone()];
        for join in &self.joins {
            if join.keys.is_empty() {
                return Err(FlowError::catalog(format!(
                    "flow '{}': join '{}' has no join keys",
                    self.name, join.alias
                )));
            }
            if seen.iter().any(|a| a == &join.alias) {
                return Err(FlowError::catalog(format!(
                    "flow '{}': duplicate alias '{}'",
                    self.name, join.alias
                )));
            }
            if !seen.iter().any(|a| a == &join.to_alias) {
                return Err(FlowError::catalog(format!(
                    "flow '{}': join '{}' targets alias '{}' which is not declared earlier",
                    self.name, join.alias, join.to_alias
                )));
            }
            seen.push(join.alias.clone());
        }
        Ok(())
    }

    /// Aliases in declaration order, base first.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base_alias.as_str()).chain(self.joins.iter().map(|j| j.alias.as_str()))
    }
}
