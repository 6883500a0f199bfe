//! Command dispatch: loads settings, wires services, renders results.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::parse_document;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let project_dir = resolve_project_dir(cli.project_dir.as_deref())?;
    match &cli.command {
        Some(Commands::Clean {
            input,
            output,
            dump_dir,
        }) => {
            let mut settings = Settings::load(Some(&project_dir))?;
            if let Some(dir) = dump_dir {
                settings.dump.dir = Some(dir.clone());
            }
            cmd_clean(&ServiceContainer::new(settings), input, output.as_deref())
        }
        Some(Commands::Tree { input }) => cmd_tree(input),
        Some(Commands::Translate { latex }) => {
            let settings = Settings::load(Some(&project_dir))?;
            cmd_translate(&ServiceContainer::new(settings), latex)
        }
        Some(Commands::Config { command }) => cmd_config(command, &project_dir),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see --help".to_string(),
        )),
    }
}

fn resolve_project_dir(dir: Option<&Path>) -> CliResult<PathBuf> {
    match dir {
        Some(d) => Ok(d.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| CliError::Infra(InfraError::io("get current directory", e))),
    }
}

fn read_input(container: Option<&ServiceContainer>, input: &Path) -> CliResult<String> {
    let content = match container {
        Some(c) => c.fs.read_to_string(input),
        None => std::fs::read_to_string(input),
    };
    content.map_err(|e| CliError::Infra(InfraError::io(format!("read {}", input.display()), e)))
}

#[instrument(skip(container))]
fn cmd_clean(container: &ServiceContainer, input: &Path, output: Option<&Path>) -> CliResult<()> {
    let xml = read_input(Some(container), input)?;
    let cleaner = container.cleaner()?;
    let (cleaned, report) = cleaner.clean_xml(&xml)?;
    debug!("report: {:?}", report);

    match output {
        Some(path) => {
            container
                .fs
                .ensure_parent(path)
                .and_then(|_| container.fs.write(path, &cleaned))
                .map_err(|e| {
                    CliError::Infra(InfraError::io(format!("write {}", path.display()), e))
                })?;
            output::action("Cleaned", &path.display());
        }
        None => output::info(&cleaned),
    }
    if report.math_failed > 0 {
        output::warning(&format!(
            "{} math node(s) kept as plain phrases",
            report.math_failed
        ));
    }
    output::success(&report);
    Ok(())
}

#[instrument]
fn cmd_tree(input: &Path) -> CliResult<()> {
    let xml = read_input(None, input)?;
    let doc = parse_document(&xml).map_err(crate::application::ApplicationError::from)?;
    output::info(&doc.to_termtree(doc.root()));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_translate(container: &ServiceContainer, latex: &str) -> CliResult<()> {
    let translator = container.translator()?;
    let formula = translator.translate(latex)?;
    output::info(&formula);
    Ok(())
}

fn cmd_config(command: &ConfigCommands, project_dir: &Path) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(project_dir))?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            output::header("Config files (lowest to highest precedence)");
            match global_config_path() {
                Some(path) => output::detail(&format!(
                    "global: {}{}",
                    path.display(),
                    exists_marker(&path)
                )),
                None => output::detail(&"global: <no config directory>"),
            }
            let local = local_config_path(project_dir);
            output::detail(&format!("local:  {}{}", local.display(), exists_marker(&local)));
            output::detail(&"env:    TEXCLEAN_* (e.g. TEXCLEAN_TRANSLATOR__EXECUTABLE)");
        }
    }
    Ok(())
}

fn exists_marker(path: &Path) -> &'static str {
    if path.exists() {
        ""
    } else {
        " (missing)"
    }
}
