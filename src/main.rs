use std::fs::File;

use clap::Parser;
use log::LevelFilter;
use simplelog::{Config, SimpleLogger, WriteLogger};

use plush::config::ShellConfig;
use plush::shell::Shell;

fn init_logging(config: &ShellConfig) -> Result<(), String> {
    let level = config.log_level().map_err(|err| err.to_string())?;
    if let Some(path) = &config.log_file {
        let file = File::create(path).map_err(|err| format!("{}: {}", path.display(), err))?;
        WriteLogger::init(level.unwrap_or(LevelFilter::Debug), Config::default(), file)
            .map_err(|err| err.to_string())?;
    } else if let Some(level) = level {
        SimpleLogger::init(level, Config::default()).map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn main() {
    let config = ShellConfig::parse();

    if let Err(err) = init_logging(&config) {
        eprintln!("plush: {}", err);
        std::process::exit(2);
    }

    let mut shell = match Shell::new(&config) {
        Ok(shell) => shell,
        Err(err) => {
            eprintln!("plush: {}", err);
            std::process::exit(2);
        }
    };
    std::process::exit(shell.run());
}
