// ── Grading-standard table ──
//
// Groups the node's grading standards by (symbology, symbol type) so a
// caller can offer the tables valid for a detected symbol. Compiled after
// login and optionally persisted as JSON.

use std::path::Path;

use indexmap::IndexMap;
use inspect_api::node::models::GradingStandards;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// One grading table usable for a symbol class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardTable {
    pub standard: String,
    pub table_id: String,
}

/// All tables for one (symbology, symbol type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardGroup {
    pub symbology: String,
    pub symbol_type: String,
    pub tables: Vec<StandardTable>,
}

/// Compiled grading-standard table, in the node's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardsTable {
    groups: Vec<StandardGroup>,
}

impl StandardsTable {
    /// Group `standards` by symbol class. Entries without specifications
    /// land under empty names.
    pub fn compile(standards: &GradingStandards) -> Self {
        let mut map: IndexMap<(String, String), Vec<StandardTable>> = IndexMap::new();

        for gs in &standards.grading_standards {
            let (symbology, symbol_type) = gs
                .specifications
                .as_ref()
                .map(|s| {
                    (
                        s.symbology.clone().unwrap_or_default(),
                        s.symbol_type.clone().unwrap_or_default(),
                    )
                })
                .unwrap_or_default();

            map.entry((symbology, symbol_type))
                .or_default()
                .push(StandardTable {
                    standard: gs.standard.clone().unwrap_or_default(),
                    table_id: gs.table_id.clone().unwrap_or_default(),
                });
        }

        let groups = map
            .into_iter()
            .map(|((symbology, symbol_type), tables)| StandardGroup {
                symbology,
                symbol_type,
                tables,
            })
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[StandardGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Tables valid for one symbol class.
    pub fn tables_for(&self, symbology: &str, symbol_type: &str) -> &[StandardTable] {
        self.groups
            .iter()
            .find(|g| g.symbology == symbology && g.symbol_type == symbol_type)
            .map_or(&[][..], |g| g.tables.as_slice())
    }

    /// Write the table as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| CoreError::Internal(e.to_string()))?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), groups = self.groups.len(), "saved grading-standard table");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| CoreError::Payload {
            message: format!("{}: {e}", path.display()),
        })
    }
}
