//! Interactive demo: registers the sample scene domain, opens a session
//! over it and drives the tree from stdin commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use console::style;
use dialoguer::{theme::ColorfulTheme, Input};
use ferroscope_inspect::{InvokeReport, NodeKind, RowView, Session};

mod config;
mod domain;
mod prompt;
mod view;

use prompt::ConsolePrompt;
use view::ConsoleView;

#[derive(Parser)]
#[command(name = "ferroscope")]
#[command(about = "Browse and mutate a live object graph from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Options file (TOML); missing keys fall back to defaults
    #[arg(long)]
    options: Option<PathBuf>,

    /// Expand aliased values into independent subtrees
    #[arg(long)]
    show_duplicates: bool,

    /// Show operations that take parameters
    #[arg(long)]
    with_params: bool,

    /// Expand text values into their character elements
    #[arg(long)]
    text_internals: bool,

    /// Depth cap for one expansion pass
    #[arg(long)]
    max_depth: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long)]
    quiet: bool,
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

const HELP: &str = "commands:
  e N      expand row N (follows shortcuts)
  c N      collapse row N
  s N      select row N (shows its status line)
  i N      invoke the operation at row N
  d N      edit the field or element at row N
  f TEXT   set the filter (empty clears; $Type constrains by type)
  t NAME   toggle an option (e.g. t show_duplicates)
  o        print current options
  r        refresh
  h        help
  q        quit";

fn toggle(session: &mut Session, name: &str) -> bool {
    let options = session.options_mut();
    let flag = match name {
        "public_fields" => &mut options.public_fields,
        "non_public_fields" => &mut options.non_public_fields,
        "transient_fields" => &mut options.transient_fields,
        "void_operations" => &mut options.void_operations,
        "value_operations" => &mut options.value_operations,
        "operations_with_params" => &mut options.operations_with_params,
        "null_elements" => &mut options.null_elements,
        "base_operations" => &mut options.base_operations,
        "text_internals" => &mut options.text_internals,
        "show_duplicates" => &mut options.show_duplicates,
        _ => return false,
    };
    *flag = !*flag;
    true
}

fn parse_row(arg: Option<&str>) -> Option<usize> {
    arg.and_then(|text| text.parse().ok())
}

fn run_command(
    session: &mut Session,
    view: &mut ConsoleView,
    command: &str,
    arg: Option<&str>,
) -> Result<bool> {
    match command {
        "q" => return Ok(false),
        "h" => println!("{HELP}"),
        "r" => {
            session.refresh(view)?;
        }
        "o" => {
            let rendered = toml::to_string(session.options())?;
            print!("{rendered}");
        }
        "e" => {
            if let Some(row) = parse_row(arg) {
                match view.node_at(row) {
                    Some(id) => {
                        let is_shortcut =
                            matches!(session.tree().kind(id), NodeKind::Shortcut(_));
                        if is_shortcut {
                            session.expand_shortcut(view, id)?;
                        } else {
                            view.expand_row(row);
                        }
                    }
                    None => log::warn!("no row {row}"),
                }
            }
        }
        "c" => {
            if let Some(row) = parse_row(arg) {
                view.collapse_row(row);
            }
        }
        "s" => {
            if let Some(row) = parse_row(arg) {
                view.select(row);
            }
        }
        "i" => {
            if let Some(id) = parse_row(arg).and_then(|row| view.node_at(row)) {
                match session.invoke(view, id, &mut ConsolePrompt)? {
                    InvokeReport::Canceled => println!("{}", style("canceled").dim()),
                    InvokeReport::Completed { fault: true, .. } => {
                        println!("{}", style("call raised a fault").red())
                    }
                    InvokeReport::Completed { fault: false, .. } => {}
                }
            }
        }
        "d" => {
            if let Some(id) = parse_row(arg).and_then(|row| view.node_at(row)) {
                session.edit(view, id, &mut ConsolePrompt)?;
            }
        }
        "f" => {
            session.set_filter(arg.unwrap_or(""));
            session.refresh(view)?;
        }
        "t" => {
            let name = arg.unwrap_or("");
            if toggle(session, name) {
                session.refresh(view)?;
            } else {
                log::warn!("unknown option {name:?}");
            }
        }
        other => log::warn!("unknown command {other:?} (h for help)"),
    }
    Ok(true)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut options = config::load_options(cli.options.as_deref())?;
    if cli.show_duplicates {
        options.show_duplicates = true;
    }
    if cli.with_params {
        options.operations_with_params = true;
    }
    if cli.text_internals {
        options.text_internals = true;
    }
    if let Some(max_depth) = cli.max_depth {
        options.max_depth = max_depth;
    }

    let (registry, root) = domain::build()?;
    let mut session = Session::new(registry, root, options);
    let mut view = ConsoleView::new();
    session.refresh(&mut view)?;
    println!("{HELP}");

    loop {
        view.render(&session);
        let line = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()?;
        let mut parts = line.trim().splitn(2, ' ');
        let command = parts.next().unwrap_or("");
        let arg = parts.next().map(str::trim);
        if command.is_empty() {
            continue;
        }
        match run_command(&mut session, &mut view, command, arg) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => eprintln!("{}", style(error).red()),
        }
    }
    Ok(())
}
