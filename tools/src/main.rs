// Controls location spoofing through the shared preferences document

use std::{env, path::PathBuf, process::ExitCode, sync::Arc, thread, time::Duration};

use clap::{Arg, ArgMatches, Command as ClapCommand, value_parser};
use gpsrider::{Command, CommandExecutor, FileConfig, ResultCode, SpoofContext};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "gpsrider.json";

fn cli() -> ClapCommand {
    ClapCommand::new("gpsrider")
        .about("Control runtime location spoofing")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Preferences document (defaults to $GPSRIDER_CONFIG or ./gpsrider.json)"),
        )
        .subcommand_required(true)
        .subcommand(ClapCommand::new("start").about("Start spoofing at the stored location"))
        .subcommand(ClapCommand::new("stop").about("Stop spoofing"))
        .subcommand(ClapCommand::new("toggle").about("Start or stop spoofing"))
        .subcommand(
            ClapCommand::new("set")
                .about("Set the location and start spoofing")
                .arg(
                    Arg::new("latitude")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("longitude")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            ClapCommand::new("accuracy")
                .about("Set the reported accuracy in meters")
                .arg(
                    Arg::new("meters")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            ClapCommand::new("randomize")
                .about("Randomize within a radius around the location")
                .arg(Arg::new("radius").value_parser(value_parser!(f64))),
        )
        .subcommand(ClapCommand::new("status").about("Print whether spoofing is active"))
        .subcommand(ClapCommand::new("current").about("Print the stored location"))
        .subcommand(
            ClapCommand::new("preview")
                .about("Print fixes as a hooked app would receive them")
                .arg(
                    Arg::new("count")
                        .long("count")
                        .default_value("5")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("interval_ms")
                        .long("interval-ms")
                        .default_value("500")
                        .value_parser(value_parser!(u64)),
                ),
        )
}

fn config_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("config")
        .cloned()
        .or_else(|| env::var_os("GPSRIDER_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn to_command(name: &str, matches: &ArgMatches) -> Option<Command> {
    Some(match name {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "toggle" => Command::Toggle,
        "set" => Command::SetCustomLocation {
            latitude: *matches.get_one::<f64>("latitude")?,
            longitude: *matches.get_one::<f64>("longitude")?,
        },
        "accuracy" => Command::SetAccuracy(*matches.get_one::<f64>("meters")?),
        "randomize" => Command::EnableRandomize {
            radius: matches.get_one::<f64>("radius").copied(),
        },
        "status" => Command::GetStatus,
        "current" => Command::GetCurrentLocation,
        _ => return None,
    })
}

fn preview(path: PathBuf, matches: &ArgMatches) -> ExitCode {
    let count = matches.get_one::<u32>("count").copied().unwrap_or(5);
    let interval = Duration::from_millis(matches.get_one::<u64>("interval_ms").copied().unwrap_or(500));

    let context = SpoofContext::new(Arc::new(FileConfig::new(path)));
    if !context.is_enabled() {
        eprintln!("Fake location is not active, showing the configured location anyway");
    }
    let mut rng = rand::rng();
    for i in 0..count {
        let state = context.refresh();
        let fix = context.synthesizer().realistic_fix(&mut rng, &state);
        match serde_json::to_string(&fix) {
            Ok(line) => println!("{line}"),
            Err(e) => {
                eprintln!("Unable to print fix: {e}");
                return ExitCode::FAILURE;
            }
        }
        if i + 1 < count {
            thread::sleep(interval);
        }
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let path = config_path(&matches);
    tracing::debug!("Using preferences at {}", path.display());

    let Some((name, sub)) = matches.subcommand() else {
        eprintln!("Invalid usage, pass -h for help");
        return ExitCode::FAILURE;
    };
    if name == "preview" {
        return preview(path, sub);
    }
    let Some(command) = to_command(name, sub) else {
        eprintln!("Invalid usage, pass -h for help");
        return ExitCode::FAILURE;
    };

    let outcome = CommandExecutor::new(FileConfig::new(path)).execute(command);
    match outcome.code {
        ResultCode::Success => {
            println!("{}", outcome.message);
            ExitCode::SUCCESS
        }
        ResultCode::Error | ResultCode::InvalidParams => {
            eprintln!("{}", outcome.message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Command> {
        let matches = cli().try_get_matches_from(args).unwrap();
        let (name, sub) = matches.subcommand()?;
        to_command(name, sub)
    }

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn negative_coordinates_parse() {
        assert_eq!(
            parse(&["gpsrider", "set", "-33.8688", "151.2093"]),
            Some(Command::SetCustomLocation {
                latitude: -33.8688,
                longitude: 151.2093
            })
        );
    }

    #[test]
    fn randomize_radius_is_optional() {
        assert_eq!(
            parse(&["gpsrider", "randomize"]),
            Some(Command::EnableRandomize { radius: None })
        );
        assert_eq!(
            parse(&["gpsrider", "randomize", "250"]),
            Some(Command::EnableRandomize {
                radius: Some(250.0)
            })
        );
    }

    #[test]
    fn config_flag_wins() {
        let matches = cli()
            .try_get_matches_from(["gpsrider", "--config", "/tmp/x.json", "status"])
            .unwrap();
        assert_eq!(config_path(&matches), PathBuf::from("/tmp/x.json"));
    }
}
