//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::GenealogyService;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::render;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{NewDistributor, Status};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;
use crate::util::path::resolve_against;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Some(Commands::Config { command }) => config_command(cli, command),
        Some(command) => {
            let container = ServiceContainer::new(load_settings(cli)?);
            let mut service = container.genealogy_service()?;
            let summary = service.refresh()?;
            if !summary.converged {
                output::warning(&format!(
                    "ranks did not settle within {} passes",
                    summary.passes
                ));
            }
            dispatch(command, &mut service)
        }
        None => {
            Cli::command()
                .print_help()
                .map_err(|e| InfraError::io("print help", e))?;
            Ok(())
        }
    }
}

fn dispatch(command: &Commands, service: &mut GenealogyService) -> CliResult<()> {
    match command {
        Commands::Tree { id, depth } => tree(service, id.as_deref(), *depth),
        Commands::List => list(service),
        Commands::Show { id } => show(service, id),
        Commands::Downline { id, depth } => downline(service, id, *depth),
        Commands::Ranks => ranks(service),
        Commands::Add {
            parent,
            name,
            email,
            sponsor,
            inactive,
            volume,
        } => {
            let data = NewDistributor {
                name: name.clone(),
                email: email.clone(),
                sponsor_id: sponsor.clone(),
                status: if *inactive {
                    Status::Inactive
                } else {
                    Status::Active
                },
                personal_volume: *volume,
                avatar_url: None,
            };
            add(service, data, parent)
        }
        Commands::Stats => stats(service),
        Commands::Check => check(service),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

fn working_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(|e| InfraError::io("current dir", e).into()),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let dir = working_dir(cli)?;
    let mut settings = Settings::load(Some(&dir))?;
    if let Some(snapshot) = &cli.snapshot {
        settings.snapshot_path = resolve_against(&dir, snapshot);
    }
    debug!("snapshot: {}", settings.snapshot_path.display());
    Ok(settings)
}

#[instrument(level = "debug", skip(service))]
fn tree(service: &GenealogyService, id: Option<&str>, depth: Option<usize>) -> CliResult<()> {
    match render::to_tree_string(service.tree(), id, depth) {
        Some(rendered) => output::info(&rendered),
        None => match id {
            Some(id) => return Err(CliError::Usage(format!("distributor not found: {id}"))),
            None => output::info("Empty tree"),
        },
    }
    Ok(())
}

fn list(service: &GenealogyService) -> CliResult<()> {
    output::header(&format!(
        "{:<38} {:<20} {:<9} {:<10} {:>5} {:>8} {:>12} {:>12}",
        "ID", "NAME", "STATUS", "RANK", "LEVEL", "RECRUITS", "PV", "GV"
    ));
    for row in service.summaries() {
        output::info(&format!(
            "{:<38} {:<20} {:<9} {:<10} {:>5} {:>8} {:>12.2} {:>12.2}",
            row.id,
            row.name,
            row.status,
            row.rank_name,
            row.level,
            row.recruits,
            row.personal_volume,
            row.group_volume
        ));
    }
    Ok(())
}

#[instrument(level = "debug", skip(service))]
fn show(service: &GenealogyService, id: &str) -> CliResult<()> {
    let tree = service.tree();
    let d = tree
        .find_node_by_id(id)
        .ok_or_else(|| CliError::Usage(format!("distributor not found: {id}")))?;

    output::header(d);
    output::field("status", &d.status);
    output::field("rank", &tree.ladder().name(d.rank));
    output::field("level", &d.level);
    output::field("recruits", &d.recruits);
    output::field("can recruit", &d.can_recruit);
    output::field("personal vol", &format!("{:.2}", d.personal_volume));
    if let Some(gv) = service.group_volume(id) {
        output::field("group vol", &format!("{:.2}", gv));
    }
    output::field("joined", &d.join_date.format("%Y-%m-%d"));
    if let Some(email) = &d.email {
        output::field("email", email);
    }
    match tree.placement_parent(id) {
        Some(parent) => output::field("placed under", parent),
        None => output::field("placed under", "(root)"),
    }

    let sponsors = service.sponsor_chain(id);
    if !sponsors.is_empty() {
        let chain: Vec<String> = sponsors.iter().map(|s| s.to_string()).collect();
        output::field("sponsors", &chain.join(" <- "));
    }

    match tree.get_next_rank(d.rank) {
        Some(next) => output::field("next rank", &format!("{}: {}", next.name, next.description)),
        None => output::field("next rank", "top rank reached"),
    }

    if !d.customers.is_empty() {
        output::header("Customers");
        for c in &d.customers {
            output::detail(&format!("{} [{}] {:.2}", c.name, c.id, c.total_purchases));
        }
    }
    Ok(())
}

#[instrument(level = "debug", skip(service))]
fn downline(service: &GenealogyService, id: &str, depth: Option<usize>) -> CliResult<()> {
    let tree = service.tree();
    let start = tree
        .find_node_by_id(id)
        .ok_or_else(|| CliError::Usage(format!("distributor not found: {id}")))?;

    for d in tree.get_downline(id, depth) {
        output::info(&format!(
            "{:>3} {}",
            d.level.saturating_sub(start.level),
            render::node_label(tree, d)
        ));
    }
    Ok(())
}

fn ranks(service: &GenealogyService) -> CliResult<()> {
    let ladder = service.tree().ladder();
    output::header(&format!(
        "Rank ladder (minimum {} direct recruits)",
        ladder.min_direct_recruits()
    ));
    for rule in ladder.rules() {
        output::detail(&format!(
            "{:<12} legs >= {:<3} {}",
            rule.name, rule.min_qualified_legs, rule.description
        ));
    }
    Ok(())
}

#[instrument(level = "debug", skip(service, data))]
fn add(service: &mut GenealogyService, data: NewDistributor, parent: &str) -> CliResult<()> {
    let id = service.add_distributor(data, parent)?;
    output::action("Added", &id);
    Ok(())
}

fn stats(service: &GenealogyService) -> CliResult<()> {
    let stats = service.stats();
    let ladder = service.tree().ladder();

    output::header("Network");
    output::field("distributors", &stats.total_distributors);
    output::field("active", &stats.active);
    output::field("inactive", &stats.inactive);
    output::field("customers", &stats.customers);
    output::field("total volume", &format!("{:.2}", stats.total_volume));
    output::field("depth", &stats.depth);
    output::header("Ranks");
    for (rank, count) in &stats.rank_histogram {
        output::field(&ladder.name(*rank), count);
    }
    Ok(())
}

fn check(service: &GenealogyService) -> CliResult<()> {
    let tree = service.tree();
    let roots = tree.root_ids();
    if roots.len() > 1 {
        output::warning(&format!("multiple roots: {}", roots.join(", ")));
    }
    output::success(&format!(
        "snapshot valid: {} distributors, depth {}",
        tree.len(),
        tree.depth()
    ));
    Ok(())
}

fn config_command(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let dir = working_dir(cli)?;
            match global_config_path() {
                Some(path) => output::field("global", &path.display()),
                None => output::field("global", "(no config directory)"),
            }
            output::field("local", &local_config_path(&dir).display());
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Edit { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("no global config directory available".to_string())
                })?
            } else {
                local_config_path(&working_dir(cli)?)
            };
            edit_config(&path)?;
        }
    }
    Ok(())
}

fn edit_config(path: &Path) -> CliResult<()> {
    let container = ServiceContainer::new(Settings::default());
    if !container.fs.exists(path) {
        container
            .fs
            .ensure_parent(path)
            .map_err(|e| InfraError::io(format!("create {}", path.display()), e))?;
        container
            .fs
            .write(path, &Settings::template())
            .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
        output::action("Created", &path.display());
    }
    container.editor.open(path).map_err(|e| InfraError::Editor {
        message: e.to_string(),
    })?;
    Ok(())
}
