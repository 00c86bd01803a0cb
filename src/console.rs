use colored::Colorize;
use log::warn;
use std::io::{self, Write};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Level {
    Debug,
    Notice,
    Error,
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum Style {
    /// `::notice::message` workflow commands, picked up by the Actions runner.
    Workflow,
    Plain { colored: bool, verbose: bool },
}

/// User-facing output on the debug, notice and error tiers.
pub struct Console {
    style: Style,
    sink: Box<dyn io::Write>,
}

impl Console {
    pub fn workflow(sink: Box<dyn io::Write>) -> Self {
        Console {
            style: Style::Workflow,
            sink,
        }
    }

    pub fn plain(sink: Box<dyn io::Write>, colored: bool, verbose: bool) -> Self {
        Console {
            style: Style::Plain { colored, verbose },
            sink,
        }
    }

    pub fn stdout(in_actions: bool, verbose: bool) -> Self {
        if in_actions {
            Console::workflow(Box::new(io::stdout()))
        } else {
            Console::plain(Box::new(io::stdout()), atty::is(atty::Stream::Stdout), verbose)
        }
    }

    pub fn debug(&mut self, msg: &str) {
        self.emit(Level::Debug, msg)
    }

    pub fn notice(&mut self, msg: &str) {
        self.emit(Level::Notice, msg)
    }

    pub fn error(&mut self, msg: &str) {
        self.emit(Level::Error, msg)
    }

    fn emit(&mut self, level: Level, msg: &str) {
        let res = match self.style {
            Style::Workflow => writeln!(self.sink, "::{}::{}", command(level), escape_data(msg)),
            Style::Plain { verbose: false, .. } if level == Level::Debug => Ok(()),
            Style::Plain { colored, .. } => {
                let tag = format!("{:<6}", command(level));
                let tag = match (colored, level) {
                    (false, _) => tag.as_str().normal(),
                    (true, Level::Debug) => tag.as_str().dimmed(),
                    (true, Level::Notice) => tag.as_str().blue(),
                    (true, Level::Error) => tag.as_str().red().bold(),
                };
                writeln!(self.sink, "{} {}", tag, msg)
            }
        };
        if let Err(err) = res.and_then(|_| self.sink.flush()) {
            warn!("Cannot write to console: {}", err);
        }
    }
}

fn command(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Notice => "notice",
        Level::Error => "error",
    }
}

fn escape_data(msg: &str) -> String {
    msg.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
