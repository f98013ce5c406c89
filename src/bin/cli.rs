use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use erp_rbac::rbac::{Action, Hierarchy, PermissionId, PermissionStore, Role, Seed};

#[derive(Parser, Debug)]
#[command(author, version, about = "erp-rbac hierarchy and permission key tool", long_about = None)]
struct Cli {
    /// Hierarchy JSON file; falls back to RBAC_HIERARCHY_PATH, then the built-in tree
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the hierarchy as an indented tree with visibility keys
    Hierarchy,
    /// Print every permission key the hierarchy derives
    Keys,
    /// Print the default matrix of a role
    Matrix {
        #[arg(long)]
        role: String,
        /// Start from an empty store instead of the admin seed
        #[arg(long)]
        no_seed: bool,
    },
    /// Decode a permission key into its path and action
    Decode { key: String },
}

fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Hierarchy => {
            let hierarchy = load_hierarchy(cli.file)?;
            for node in hierarchy.nodes() {
                let indent = "  ".repeat(node.depth() - 1);
                println!("{}{:<32} {}", indent, node.name, node.path.visibility_key());
            }
        }
        Commands::Keys => {
            let hierarchy = load_hierarchy(cli.file)?;
            for path in hierarchy.paths() {
                for action in Action::ALL {
                    println!("{}", PermissionId::new(path.clone(), action));
                }
            }
        }
        Commands::Matrix { role, no_seed } => {
            let role: Role = role.parse()?;
            let hierarchy = Arc::new(load_hierarchy(cli.file)?);
            let seed = if no_seed { Seed::default() } else { Seed::admin() };
            let store = PermissionStore::seeded(hierarchy, &seed);
            print_matrix(&store, role);
        }
        Commands::Decode { key } => {
            let id = PermissionId::parse(&key).with_context(|| format!("cannot decode '{key}'"))?;
            println!("path:   {}", id.path().visibility_key());
            println!("depth:  {}", id.path().depth());
            println!("action: {}", id.action());
        }
    }

    Ok(())
}

fn load_hierarchy(file: Option<PathBuf>) -> anyhow::Result<Hierarchy> {
    let file = file.or_else(|| std::env::var("RBAC_HIERARCHY_PATH").ok().map(PathBuf::from));
    match file {
        Some(path) => Hierarchy::from_file(&path)
            .with_context(|| format!("failed to load hierarchy from {}", path.display())),
        None => Ok(Hierarchy::erp_default()),
    }
}

fn print_matrix(store: &PermissionStore, role: Role) {
    print!("{:<40} {:<8}", "Node", "Visible");
    for action in Action::ALL {
        print!(" {:<7}", action.label());
    }
    println!();

    for row in store.matrix(role) {
        let name = format!("{}{}", "  ".repeat(row.depth - 1), row.name);
        print!("{:<40} {:<8}", name, if row.visible { "yes" } else { "-" });
        for cell in &row.actions {
            let mark = match (cell.granted, cell.enabled) {
                (true, true) => "[x]",
                (true, false) => "(x)",
                (false, true) => "[ ]",
                (false, false) => "( )",
            };
            print!(" {:<7}", mark);
        }
        println!();
    }

    print!("{:<40} {:<8}", "", "");
    for action in Action::ALL {
        print!(" {:<7}", format!("{:?}", store.column_state(role, action)).to_lowercase());
    }
    println!();
}
