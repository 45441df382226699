use log::{debug, info, warn};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;
use snafu::{prelude::*, ErrorCompat};
use text_diff::print_diff;

use lap_ranking::{RawLapInput, Scope};

mod args;
mod board;

use crate::args::{Args, Command};
use crate::board::config_reader::{read_config, BoardConfig};
use crate::board::export::{render, ExportFormat};
use crate::board::io_common::export_file_name;
use crate::board::io_csv::read_uploaded_csv;
use crate::board::io_xlsx::read_xlsx_lap_table;
use crate::board::storage::FileStorage;
use crate::board::*;

fn scope_of(class: &Option<String>) -> Scope {
    match class.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => Scope::Class(c.to_string()),
        _ => Scope::All,
    }
}

fn emit(
    session: &Session<FileStorage>,
    format: ExportFormat,
    scope: &Scope,
    out: Option<&str>,
    reference: Option<&str>,
) -> BoardResult<()> {
    let entries = session.ranked_view(scope);
    let rendered = render(format, session.title(), scope, &entries)?;

    // The reference rendering, if provided for comparison
    if let Some(ref_p) = reference {
        let expected = fs::read(ref_p).context(ReadingFileSnafu { path: ref_p })?;
        if expected != rendered {
            warn!("Found differences with the reference {}", ref_p);
            print_diff(
                String::from_utf8_lossy(&expected).as_ref(),
                String::from_utf8_lossy(&rendered).as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu { path: ref_p }.fail();
        }
        info!("The output matches the reference {}", ref_p);
    }

    match out {
        None | Some("stdout") => {
            let mut stdout = io::stdout();
            stdout
                .write_all(&rendered)
                .and_then(|_| stdout.flush())
                .context(RenderingSnafu {})?;
        }
        Some(p) => {
            let path = if p == "auto" {
                export_file_name(session.title(), format.extension())
            } else {
                p.to_string()
            };
            fs::write(&path, &rendered).context(WritingFileSnafu { path: path.clone() })?;
            info!("{} entries written to {}", entries.len(), path);
        }
    }
    Ok(())
}

fn run(args: &Args) -> BoardResult<()> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => BoardConfig::default(),
    };
    let root: PathBuf = args
        .config
        .as_deref()
        .and_then(|p| Path::new(p).parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    if args.command.is_admin() {
        config.check_admin(args.password.as_deref())?;
    }

    let rules = config.rules()?;
    let paths = config.paths(&root);
    let mut session = Session::open(
        FileStorage::new(paths.clone()),
        rules,
        &config.default_title(),
    )?;

    match &args.command {
        Command::Submit {
            name,
            class,
            lap,
            minutes,
            seconds,
            millis,
            bonus,
            penalty,
        } => {
            let raw = RawLapInput {
                name: name.clone(),
                class_name: class.clone(),
                lap_number: *lap,
                minutes: *minutes,
                seconds: *seconds,
                milliseconds: *millis,
                bonus_seconds: *bonus,
                penalty_seconds: *penalty,
            };
            let record = session.submit_record(&raw)?;
            println!(
                "Recorded {} (class {}) lap {}: {}",
                record.name, record.class_name, record.lap_number, record.total_time
            );
        }
        Command::Show {
            class,
            format,
            out,
            reference,
        } => {
            let format = ExportFormat::parse(format)?;
            emit(
                &session,
                format,
                &scope_of(class),
                out.as_deref(),
                reference.as_deref(),
            )?;
        }
        Command::Export { format, class, out } => {
            let fmt = ExportFormat::parse(format)?;
            ensure!(
                fmt != ExportFormat::Text,
                UnknownFormatSnafu {
                    format: format.clone()
                }
            );
            emit(&session, fmt, &scope_of(class), out.as_deref(), None)?;
        }
        Command::Title { text } => {
            session.set_title(text)?;
            println!("Title set to {}", session.title());
        }
        Command::Delete { position } => {
            let removed = session.delete_record(*position)?;
            println!(
                "Deleted {} (class {}) lap {}",
                removed.name, removed.class_name, removed.lap_number
            );
        }
        Command::Reset => {
            session.reset_all()?;
            println!("The board is empty");
        }
        Command::Backup => {
            let count = session.backup()?;
            println!("{} rows saved to {}", count, paths.backup.display());
        }
        Command::Import { file, worksheet } => {
            let path = Path::new(file);
            let is_excel = path
                .extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case("xlsx"))
                .unwrap_or(false);
            let rows = if is_excel {
                read_xlsx_lap_table(path, worksheet.as_deref())?
            } else {
                read_uploaded_csv(path)?
            };
            debug!("import: {} rows read from {}", rows.len(), file);
            let count = session.import_rows(&rows)?;
            println!("{} records imported", count);
            let quarantined = session.board().quarantined().len();
            if quarantined > 0 {
                println!("{} rows could not be read and are kept aside", quarantined);
            }
        }
        Command::Reload => {
            session.reload()?;
            println!(
                "{} records, {} unreadable rows",
                session.board().len(),
                session.board().quarantined().len()
            );
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        let mut last = String::new();
        for (idx, cause) in ErrorCompat::iter_chain(&e).enumerate() {
            let msg = cause.to_string();
            if msg == last {
                continue;
            }
            if idx == 0 {
                eprintln!("Error: {}", msg);
            } else {
                eprintln!("  caused by: {}", msg);
            }
            last = msg;
        }
        exit(1);
    }
}
