//! x11session - Main entry point
//!
//! Opens a window on an X11 display and logs the events it receives

use std::env;
use std::process;
use std::time::Duration;

use x11session::backend::{self, Connector};
use x11session::protocol::*;
use x11session::session::{ControlFlow, DisplaySession, ErrorContext, EventHandler, SessionConfig};

/// Client version
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    println!("x11session v{}", VERSION);
    println!("A minimal X11 client session");
    println!();
    println!("Usage: x11session [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -display <name>       Display to connect to (default: $DISPLAY)");
    println!("  -geometry <WxH+X+Y>   Window geometry (default: 350x250+200+300)");
    println!("  -title <text>         Window title (default: Hello X11)");
    println!("  -border <n>           Border width in pixels (default: 5)");
    println!("  -events <list>        Comma-separated events to select");
    println!("                        (default: button-press,key-press,expose)");
    println!("  -backend <type>       Backend type (wire, x11rb)");
    println!("  -retries <n>          Extra connection attempts (default: 0)");
    println!("  -list-backends        List available backends");
    println!("  -h, --help            Show this help message");
    println!();
    println!("Examples:");
    println!("  x11session -display :1");
    println!("  x11session -geometry 640x480+0+0 -backend x11rb");
    println!();
}

fn list_backends() {
    println!("Available backends:");
    for backend in backend::available_backends() {
        println!("  - {}", backend);
    }
    println!();
    println!("To build without x11rb:");
    println!("  cargo build --no-default-features");
}

#[derive(Debug)]
struct Config {
    session: SessionConfig,
    backend_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session: SessionConfig::default(),
            backend_type: "wire".to_string(),
        }
    }
}

/// Parse a comma-separated list of event names into a mask
fn parse_events(list: &str) -> Result<EventMask, String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .try_fold(EventMask::empty(), |mask, name| {
            EventMask::from_cli_name(name)
                .map(|bit| mask | bit)
                .ok_or_else(|| format!("Unknown event name: {}", name))
        })
}

/// Parse an X geometry string such as `350x250+200+300`
fn parse_geometry(spec: &str) -> Option<Rectangle> {
    let (width, rest) = spec.split_once('x')?;
    let offset_at = rest.find(['+', '-'])?;
    let (height, offsets) = rest.split_at(offset_at);
    let second = offsets[1..].find(['+', '-'])? + 1;
    let (x, y) = offsets.split_at(second);

    let signed = |s: &str| -> Option<i16> { s.trim_start_matches('+').parse().ok() };
    Some(Rectangle::new(
        signed(x)?,
        signed(y)?,
        width.parse().ok()?,
        height.parse().ok()?,
    ))
}

fn parse_args() -> Result<Config, String> {
    let mut config = Config::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-list-backends" => {
                list_backends();
                process::exit(0);
            }
            "-display" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -display".to_string());
                }
                config.session.display = Some(args[i].clone());
            }
            "-geometry" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -geometry".to_string());
                }
                config.session.geometry = parse_geometry(&args[i])
                    .ok_or_else(|| format!("Invalid geometry: {}", args[i]))?;
            }
            "-title" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -title".to_string());
                }
                config.session.title = Some(args[i].clone());
            }
            "-border" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -border".to_string());
                }
                config.session.border_width = args[i]
                    .parse()
                    .map_err(|_| "Invalid border width".to_string())?;
            }
            "-events" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -events".to_string());
                }
                config.session.event_mask = parse_events(&args[i])?;
            }
            "-backend" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -backend".to_string());
                }
                config.backend_type = args[i].clone();
            }
            "-retries" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for -retries".to_string());
                }
                let retries: u32 = args[i]
                    .parse()
                    .map_err(|_| "Invalid retry count".to_string())?;
                config.session.connect_attempts = retries.saturating_add(1);
                config.session.retry_delay = Duration::from_secs(1);
            }
            arg => {
                return Err(format!("Unknown option: {}", arg));
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Logs every event the window selected
struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn expose(&mut self, event: &ExposeEvent) -> ControlFlow {
        log::info!(
            "Expose {}x{}+{}+{} ({} more)",
            event.width,
            event.height,
            event.x,
            event.y,
            event.count
        );
        ControlFlow::Continue
    }

    fn mapping_notify(&mut self, event: &MappingNotifyEvent) -> ControlFlow {
        log::info!("Mapping notify: {:?}", event.request);
        ControlFlow::Continue
    }

    fn button_press(&mut self, event: &ButtonPressEvent) -> ControlFlow {
        log::info!(
            "Button {} pressed at {},{}",
            event.detail.get(),
            event.event_x,
            event.event_y
        );
        ControlFlow::Continue
    }

    fn key_press(&mut self, event: &KeyPressEvent) -> ControlFlow {
        log::info!("Key {} pressed (state {:?})", event.detail.get(), event.state);
        ControlFlow::Continue
    }

    fn unhandled(&mut self, event: &Event) -> ControlFlow {
        log::debug!("Ignoring {:?}", event.event_type());
        ControlFlow::Continue
    }
}

fn on_error(ctx: &ErrorContext<'_>, message: &str) {
    log::error!("{}: {}", ctx.display, message);
}

fn run_session<C: Connector>(connector: C, config: SessionConfig) -> i32 {
    let mut session = DisplaySession::new(connector, config).with_error_handler(Box::new(on_error));
    match session.run(&mut LoggingHandler) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    // Validate backend is available
    let available = backend::available_backends();
    if !available.contains(&config.backend_type.as_str()) {
        eprintln!("Error: Backend '{}' is not available", config.backend_type);
        eprintln!();
        list_backends();
        process::exit(1);
    }

    log::info!("x11session v{}", VERSION);
    log::info!("Backend: {}", config.backend_type);

    let status = match config.backend_type.as_str() {
        #[cfg(all(feature = "backend-x11rb", target_family = "unix"))]
        "x11rb" => run_session(backend::x11rb::X11rbConnector, config.session),
        _ => run_session(backend::wire::WireConnector, config.session),
    };
    process::exit(status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry() {
        assert_eq!(
            parse_geometry("350x250+200+300"),
            Some(Rectangle::new(200, 300, 350, 250))
        );
        assert_eq!(
            parse_geometry("10x20-5+7"),
            Some(Rectangle::new(-5, 7, 10, 20))
        );
        assert_eq!(parse_geometry("350x250"), None);
        assert_eq!(parse_geometry("wide"), None);
    }

    #[test]
    fn test_parse_events() {
        assert_eq!(
            parse_events("button-press,key-press,expose"),
            Ok(EventMask::BUTTON_PRESS | EventMask::KEY_PRESS | EventMask::EXPOSURE)
        );
        assert_eq!(parse_events("expose, motion"), Ok(EventMask::EXPOSURE | EventMask::POINTER_MOTION));
        assert_eq!(parse_events(""), Ok(EventMask::empty()));
        assert!(parse_events("expose,bogus").is_err());
    }
}
