//! Command-line entry point for pdsman
//!
//! Collects the operator's choices (read or write, snapshot file, target
//! IP), sanity-checks that the target actually is an ICP DAS gateway via
//! its MAC vendor prefix, and runs the synchronization.

use std::io::{self, BufRead, Write as IoWrite};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use pdsman::netutil::{ArpTableResolver, MacResolver};
use pdsman::persist;
use pdsman::sync::{PdsConnection, RestartPolicy};

/// Dotted-quad IPv4 address, each octet 0-255.
static IP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$")
        .expect("IP pattern must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Read,
    Write,
}

fn main() -> Result<()> {
    env_logger::init();

    // Parse command line arguments; anything missing is prompted for.
    let args: Vec<String> = std::env::args().collect();
    let mut command: Option<Command> = None;
    let mut ip_arg: Option<String> = None;
    let mut file_arg: Option<PathBuf> = None;
    let mut force = false;
    let mut no_restart = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "read" => command = Some(Command::Read),
            "write" => command = Some(Command::Write),
            "--ip" => {
                if i + 1 < args.len() {
                    ip_arg = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    bail!("--ip requires a value");
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    file_arg = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    bail!("--file requires a value");
                }
            }
            "--force" => force = true,
            "--no-restart" => no_restart = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    let command = match command {
        Some(command) => command,
        None => prompt_command()?,
    };

    let file = match file_arg {
        Some(file) => file,
        None => prompt_file(command)?,
    };

    let ip = prompt_ip(ip_arg, force)?;

    match command {
        Command::Read => {
            run_read(&ip, &file)?;
            println!("Reading configuration end");
        }
        Command::Write => {
            let restart = if no_restart { RestartPolicy::Never } else { RestartPolicy::Always };
            run_write(&ip, &file, restart)?;
            println!("Writing configuration end");
        }
    }
    Ok(())
}

fn print_usage() {
    println!("Usage: pdsman [read|write] [--ip <address>] [--file <path>] [--force] [--no-restart]");
    println!();
    println!("  read           read the gateway configuration into a snapshot file");
    println!("  write          write a snapshot file to the gateway");
    println!("  --ip           gateway IP address");
    println!("  --file, -f     snapshot file path (*.pds)");
    println!("  --force        skip the MAC vendor check");
    println!("  --no-restart   do not issue RESET after writing");
}

fn prompt_command() -> Result<Command> {
    loop {
        print!("Read from the gateway or Write to the gateway ? (R/W) ");
        io::stdout().flush()?;
        let line = read_line()?;
        match line.trim().to_ascii_uppercase().as_str() {
            "R" => return Ok(Command::Read),
            "W" => return Ok(Command::Write),
            _ => println!("Please enter a valid command !"),
        }
    }
}

fn prompt_file(command: Command) -> Result<PathBuf> {
    let verb = match command {
        Command::Read => "save to",
        Command::Write => "load from",
    };
    loop {
        print!("Please enter the config file to {verb} (*.pds): ");
        io::stdout().flush()?;
        let line = read_line()?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
}

/// Obtain a validated gateway IP, checking the MAC vendor prefix unless
/// forced. The operator can override a failed check interactively, with a
/// second confirmation, exactly because writing to a random host's port 23
/// is worse than a second question.
fn prompt_ip(preset: Option<String>, force: bool) -> Result<String> {
    let resolver = ArpTableResolver::new();
    let mut preset = preset;
    loop {
        let candidate = match preset.take() {
            Some(candidate) => candidate,
            None => {
                print!("Please enter the gateway IP : ");
                io::stdout().flush()?;
                read_line()?.trim().to_string()
            }
        };

        if !IP_PATTERN.is_match(&candidate) {
            println!("Invalid IP!");
            continue;
        }

        if force {
            return Ok(candidate);
        }

        let parsed: Ipv4Addr = candidate.parse().context("IP passed validation but failed to parse")?;
        match resolver.resolve(parsed) {
            Ok(mac) if mac.is_icpdas() => return Ok(candidate),
            Ok(mac) => {
                println!("The MAC address {mac} of the specified IP doesn't correspond to an ICP DAS gateway!");
            }
            Err(e) => {
                println!("Could not verify the gateway MAC address: {e}");
            }
        }

        println!();
        if confirm("Do you want to force and continue anyway? (y/N) ")?
            && confirm("The resulting config file will probably be wrong. Are you sure? (y/N) ")?
        {
            return Ok(candidate);
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    Ok(read_line()?.trim().eq_ignore_ascii_case("y"))
}

fn read_line() -> Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn run_read(hostname: &str, path: &Path) -> Result<()> {
    let mut connection =
        PdsConnection::connect(hostname).with_context(|| format!("connecting to {hostname}"))?;
    // The session is released on every exit path.
    let result = (|| -> Result<()> {
        let config = connection.read_configuration()?;
        persist::save_snapshot(path, &config)?;
        Ok(())
    })();
    connection.close();
    result
}

fn run_write(hostname: &str, path: &Path, restart: RestartPolicy) -> Result<()> {
    let config = persist::load_snapshot(path)?;
    let mut connection =
        PdsConnection::connect(hostname).with_context(|| format!("connecting to {hostname}"))?;
    let result = connection
        .write_configuration(&config, restart)
        .map_err(anyhow::Error::from);
    connection.close();
    result
}
