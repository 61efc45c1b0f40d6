//! padbind - list input devices and watch what they report.
//!
//! Probes every installed driver once, then prints the device table, raw key
//! events or menu button states.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use padbind::drivers::evdev::{keys, EvdevDriver};
use padbind::drivers::DefaultBind;
use padbind::{BindType, DriverId, InputConfig, InputContext, MenuButtons, NoDevicePolicy};
use std::time::Duration;

/// Factory binds of a plain keyboard: arrows, A/S/D, Enter, and BackSlash for the menu.
const KEYBOARD_BINDS: [DefaultBind; 9] = [
    DefaultBind::new(keys::KEY_UP, BindType::Player12, 0),
    DefaultBind::new(keys::KEY_DOWN, BindType::Player12, 1),
    DefaultBind::new(keys::KEY_LEFT, BindType::Player12, 2),
    DefaultBind::new(keys::KEY_RIGHT, BindType::Player12, 3),
    DefaultBind::new(keys::KEY_S, BindType::Player12, 4),
    DefaultBind::new(keys::KEY_D, BindType::Player12, 5),
    DefaultBind::new(keys::KEY_A, BindType::Player12, 6),
    DefaultBind::new(keys::KEY_ENTER, BindType::Player12, 7),
    DefaultBind::new(keys::KEY_BACKSLASH, BindType::Emu, 0),
];

fn build_cli() -> Command {
    let cli = Command::new("padbind")
        .version(padbind::VERSION)
        .about("Inspect input devices, key events and menu buttons")
        .arg(
            Arg::new("abs-only")
                .long("abs-only")
                .help("Also use devices that only have an analog stick")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("list").about("Probe and print the device table (default)"))
        .subcommand(
            Command::new("monitor")
                .about("Print raw key events with their names")
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .help("Give up after this long without an event")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("count")
                        .long("count")
                        .help("Stop after this many events")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("menu")
                .about("Print menu button states with autorepeat")
                .arg(
                    Arg::new("repeat-ms")
                        .long("repeat-ms")
                        .help("Autorepeat delay once a button is held")
                        .value_parser(value_parser!(u64))
                        .default_value("50"),
                )
                .arg(
                    Arg::new("count")
                        .long("count")
                        .help("Stop after this many results")
                        .value_parser(value_parser!(usize)),
                ),
        );

    #[cfg(feature = "config")]
    let cli = cli
        .arg(
            Arg::new("config")
                .long("config")
                .help("Tunables file (TOML)")
                .value_parser(value_parser!(std::path::PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .help("Bind profile to apply after probing (TOML)")
                .value_parser(value_parser!(std::path::PathBuf))
                .global(true),
        );

    cli
}

#[cfg(feature = "config")]
fn load_config(matches: &ArgMatches) -> Result<InputConfig> {
    match matches.get_one::<std::path::PathBuf>("config") {
        Some(path) => InputConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => InputConfig::load_default().context("loading default config"),
    }
}

#[cfg(not(feature = "config"))]
fn load_config(_matches: &ArgMatches) -> Result<InputConfig> {
    Ok(InputConfig::default())
}

#[cfg(feature = "config")]
fn apply_profile(ctx: &mut InputContext, matches: &ArgMatches) -> Result<()> {
    if let Some(path) = matches.get_one::<std::path::PathBuf>("profile") {
        let profile = padbind::config::profile::BindProfile::load(path)
            .with_context(|| format!("loading bind profile {}", path.display()))?;
        let applied = profile.apply(ctx);
        log::info!("applied {applied} binds from {}", path.display());
    }
    Ok(())
}

#[cfg(not(feature = "config"))]
fn apply_profile(_ctx: &mut InputContext, _matches: &ArgMatches) -> Result<()> {
    Ok(())
}

fn monitor(ctx: &mut InputContext, matches: &ArgMatches) -> Result<()> {
    let timeout = matches
        .get_one::<u64>("timeout-ms")
        .map(|ms| Duration::from_millis(*ms));
    let limit = matches.get_one::<usize>("count").copied();

    let mut seen = 0;
    while limit.map_or(true, |limit| seen < limit) {
        let Some(ev) = ctx
            .update_keycode(timeout)
            .context("waiting for key events")?
        else {
            println!("timed out");
            break;
        };
        println!(
            "#{}: {} {:3} ({})",
            ev.device,
            if ev.down { "down" } else { "up  " },
            ev.code,
            ctx.key_name(Some(ev.device), ev.code)
        );
        seen += 1;
    }
    Ok(())
}

fn menu(ctx: &mut InputContext, matches: &ArgMatches) -> Result<()> {
    let repeat = Duration::from_millis(*matches.get_one::<u64>("repeat-ms").unwrap_or(&50));
    let limit = matches.get_one::<usize>("count").copied();

    println!("confirm with {}", ctx.menu_key_name(None, MenuButtons::MOK));
    let mut seen = 0;
    while limit.map_or(true, |limit| seen < limit) {
        let buttons = ctx
            .menu_wait(MenuButtons::all(), repeat)
            .context("waiting for menu buttons")?;
        println!("{:08x} {:?}", buttons.bits(), buttons);
        seen += 1;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let mut config = load_config(&matches)?;
    // report a missing device instead of exiting from inside the library
    config.no_device_policy = NoDevicePolicy::Error;

    let mut ctx = InputContext::new(config);
    ctx.install_driver(
        DriverId::Evdev,
        Box::new(
            EvdevDriver::new()
                .with_default_binds(KEYBOARD_BINDS)
                .allow_abs_only(matches.get_flag("abs-only")),
        ),
    );
    ctx.probe();
    apply_profile(&mut ctx, &matches)?;

    match matches.subcommand() {
        Some(("monitor", sub)) => monitor(&mut ctx, sub),
        Some(("menu", sub)) => menu(&mut ctx, sub),
        _ => {
            print!("{}", ctx.debug_dump());
            Ok(())
        }
    }
}
