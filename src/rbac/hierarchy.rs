use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::path::{KeyError, NodePath};

#[derive(thiserror::Error, Debug)]
pub enum HierarchyError {
    #[error("invalid name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: KeyError,
    },
    #[error("duplicate node '{0}' after normalization")]
    Duplicate(String),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("failed to read hierarchy file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse hierarchy file: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Static module tree as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HierarchyConfig {
    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModuleConfig {
    #[schema(example = "HRMS")]
    pub name: String,
    #[serde(default)]
    pub submodules: Vec<SubmoduleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubmoduleConfig {
    #[schema(example = "Attendance")]
    pub name: String,
    /// Third-level entries edited through the Configure dialog
    #[serde(default)]
    #[schema(example = json!(["Attendance Record"]))]
    pub popups: Vec<String>,
}

impl ModuleConfig {
    fn new(name: &str, submodules: Vec<SubmoduleConfig>) -> Self {
        Self {
            name: name.to_string(),
            submodules,
        }
    }
}

impl SubmoduleConfig {
    fn new(name: &str, popups: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            popups: popups.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl HierarchyConfig {
    pub fn from_json(json: &str) -> Result<Self, HierarchyError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, HierarchyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| HierarchyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Navigation tree of the ERP application.
    pub fn erp_default() -> Self {
        let sub = SubmoduleConfig::new;
        Self {
            modules: vec![
                ModuleConfig::new(
                    "HRMS",
                    vec![
                        sub("Employees", &[]),
                        sub("Attendance", &["Attendance Record", "Shift Schedule"]),
                        sub("Leave Management", &["Leave Requests", "Leave Balance"]),
                        sub("Payroll", &["Salary Structure", "Payslips"]),
                    ],
                ),
                ModuleConfig::new(
                    "Inventory",
                    vec![
                        sub("Items", &[]),
                        sub("Stock Movements", &["Stock Transfer", "Stock Adjustment"]),
                        sub("Warehouses", &[]),
                    ],
                ),
                ModuleConfig::new(
                    "Production",
                    vec![
                        sub("Bill of Materials", &[]),
                        sub("Work Orders", &["Job Cards"]),
                        sub("Quality Control", &[]),
                    ],
                ),
                ModuleConfig::new(
                    "Sales",
                    vec![
                        sub("Quotations", &[]),
                        sub("Sales Orders", &[]),
                        sub("Invoices", &["Credit Notes", "Payment Receipts"]),
                    ],
                ),
                ModuleConfig::new(
                    "Logistics",
                    vec![sub("Shipments", &["Delivery Notes"]), sub("Fleet", &[])],
                ),
                ModuleConfig::new(
                    "CRM",
                    vec![sub("Leads", &[]), sub("Customers", &[]), sub("Opportunities", &[])],
                ),
                ModuleConfig::new(
                    "Accounting",
                    vec![
                        sub("Chart of Accounts", &[]),
                        sub("Journal Entries", &[]),
                        sub("Ledgers", &["General Ledger", "Trial Balance"]),
                    ],
                ),
                ModuleConfig::new(
                    "Master Data",
                    vec![sub("Departments", &[]), sub("Designations", &[]), sub("Tax Codes", &[])],
                ),
                ModuleConfig::new(
                    "Administration",
                    vec![sub("Users", &[]), sub("Roles & Permissions", &[])],
                ),
            ],
        }
    }
}

// =============================================================================
// VALIDATED TREE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub path: NodePath,
    /// Name as configured, for display
    pub name: String,
}

impl Node {
    pub fn depth(&self) -> usize {
        self.path.depth()
    }
}

/// Validated hierarchy. Nodes are kept in pre-order so a matrix renders
/// each module directly followed by its submodules and popups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    nodes: Vec<Node>,
}

impl Hierarchy {
    pub fn from_config(config: HierarchyConfig) -> Result<Self, HierarchyError> {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();

        let mut push = |path: NodePath, name: &str| -> Result<NodePath, HierarchyError> {
            if !seen.insert(path.clone()) {
                return Err(HierarchyError::Duplicate(path.visibility_key()));
            }
            nodes.push(Node {
                path: path.clone(),
                name: name.trim().to_string(),
            });
            Ok(path)
        };

        for module in &config.modules {
            let module_path = push(NodePath::module(&module.name).map_err(invalid(&module.name))?, &module.name)?;
            for submodule in &module.submodules {
                let sub_path = push(
                    module_path.child(&submodule.name).map_err(invalid(&submodule.name))?,
                    &submodule.name,
                )?;
                for popup in &submodule.popups {
                    push(sub_path.child(popup).map_err(invalid(popup))?, popup)?;
                }
            }
        }

        tracing::debug!(nodes = nodes.len(), "hierarchy loaded");
        Ok(Self { nodes })
    }

    pub fn from_file(path: &Path) -> Result<Self, HierarchyError> {
        Self::from_config(HierarchyConfig::from_file(path)?)
    }

    pub fn erp_default() -> Self {
        Self::from_config(HierarchyConfig::erp_default())
            .unwrap_or_else(|err| unreachable!("built-in hierarchy is valid: {err}"))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn paths(&self) -> impl Iterator<Item = &NodePath> {
        self.nodes.iter().map(|node| &node.path)
    }

    pub fn node(&self, path: &NodePath) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.path == path)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.node(path).is_some()
    }

    /// Direct children of `parent`, in configuration order.
    pub fn children<'a>(&'a self, parent: &'a NodePath) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |node| node.path.is_child_of(parent))
    }

    /// Looks up a node by its visibility key.
    pub fn resolve(&self, key: &str) -> Result<Option<&Node>, KeyError> {
        let path = NodePath::parse_visibility_key(key)?;
        Ok(self.node(&path))
    }
}

fn invalid(name: &str) -> impl Fn(KeyError) -> HierarchyError + '_ {
    move |source| HierarchyError::InvalidName {
        name: name.to_string(),
        source,
    }
}
