use std::fmt::{self, Display};

use colored::{Color, Colorize};
use log::{Level, LevelFilter, SetLoggerError};

/// Crates of this workspace, with the tag and color they are shown with
const LOCAL_CRATES: [(&str, &str, Color); 3] = [
    ("quickdraw", "MAIN", Color::BrightCyan),
    ("quickdraw_collab", "COLLAB", Color::BrightMagenta),
    ("quickdraw_server", "SERVER", Color::BrightGreen),
];

const LOCAL_LEVEL: LevelFilter = LevelFilter::Info;
/// External crates only need to log warnings and errors
const EXTERNAL_LEVEL: LevelFilter = LevelFilter::Warn;

pub fn init_logger() -> Result<(), SetLoggerError> {
    let dispatch = LOCAL_CRATES
        .iter()
        .fold(fern::Dispatch::new().level(EXTERNAL_LEVEL), |d, (name, ..)| {
            d.level_for(*name, LOCAL_LEVEL)
        });

    dispatch
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {} {:^8} {}",
                Badge(record.level()),
                chrono::Local::now().format("%H:%M:%S").to_string().bright_black(),
                Target::of(record.target()),
                message
            ))
        })
        .chain(std::io::stdout())
        .apply()
}

/// Where a record came from, shortened to its crate
#[derive(Debug, PartialEq)]
enum Target<'a> {
    Local { tag: &'static str, color: Color },
    External(&'a str),
}

impl<'a> Target<'a> {
    fn of(target: &'a str) -> Self {
        let krate = target.split("::").next().unwrap_or(target);

        LOCAL_CRATES
            .iter()
            .find(|(name, ..)| *name == krate)
            .map(|(_, tag, color)| Target::Local { tag: *tag, color: *color })
            .unwrap_or(Target::External(krate))
    }
}

impl Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local { tag, color } => Display::fmt(&tag.color(*color), f),
            Target::External(name) => Display::fmt(name, f),
        }
    }
}

/// A fixed width, colored level label
struct Badge(Level);

impl Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.0 {
            Level::Error => " ERR ".black().on_red().bold(),
            Level::Warn => " WRN ".black().on_yellow().bold(),
            Level::Info => " INF ".black().on_blue().bold(),
            Level::Debug => " DBG ".white().on_black(),
            Level::Trace => " TRC ".normal(),
        };

        Display::fmt(&label, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_by_crate() {
        assert!(matches!(
            Target::of("quickdraw::config"),
            Target::Local { tag: "MAIN", .. }
        ));
        assert!(matches!(
            Target::of("quickdraw_collab::rooms"),
            Target::Local { tag: "COLLAB", .. }
        ));
        assert!(matches!(
            Target::of("quickdraw_server"),
            Target::Local { tag: "SERVER", .. }
        ));
        assert_eq!(Target::of("sqlx::query"), Target::External("sqlx"));
    }
}
