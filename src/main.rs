use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;
use survey_session::report::SortOrder;

mod args;
mod survey;

use crate::args::{Args, Command};
use crate::survey::config_reader::{resolve_settings, Settings};
use crate::survey::prompt::DialoguerPrompter;
use crate::survey::*;

fn run(args: &Args) -> SvResult<()> {
    let settings = resolve_settings(args)?;
    let stdout = std::io::stdout();
    match &args.command {
        Command::Create { input } => {
            run_create(&settings, input.clone(), &mut DialoguerPrompter::new())?;
        }
        Command::List => {
            run_list(&settings, &mut stdout.lock())?;
        }
        Command::Respond { form } => {
            run_respond(&settings, form, &mut DialoguerPrompter::new())?;
        }
        Command::Results {
            form,
            sort,
            out,
            reference,
        } => {
            let settings = match sort.as_deref() {
                None => settings,
                Some(name) => match SortOrder::from_name(name) {
                    Some(sort_order) => Settings {
                        sort_order,
                        ..settings
                    },
                    None => snafu::whatever!("Unknown sort order {:?}", name),
                },
            };
            run_results(
                &settings,
                form,
                out.clone(),
                reference.clone(),
                &mut stdout.lock(),
            )?;
        }
        Command::Export { form, out } => {
            let n = run_export(&settings, form, out.clone())?;
            debug!("export: {} bytes", n);
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        for cause in e.iter_chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
