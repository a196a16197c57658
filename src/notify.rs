//! Output side of a poll cycle: terminal printing, the daily post log and
//! the audible alert.

use crate::config::{Config, SoundConfig};
use crate::feeds::Post;
use crate::format::{render_line, sanitize_for_log, FormattedPost, Formatter};
use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Something that makes a noise when critical posts arrive.
pub trait Alert {
    fn ring(&mut self);
}

/// Terminal bell.
pub struct Bell;

impl Alert for Bell {
    fn ring(&mut self) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

#[cfg(feature = "sound")]
pub use sound::SoundFile;

#[cfg(feature = "sound")]
mod sound {
    use super::{Alert, Bell};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::PathBuf;

    /// Plays an audio file through the default output device. Falls back
    /// to the terminal bell whenever audio is unavailable.
    pub struct SoundFile {
        path: PathBuf,
        // Must outlive every sink created from the handle.
        _stream: Option<OutputStream>,
        handle: Option<OutputStreamHandle>,
    }

    impl SoundFile {
        pub fn new(path: PathBuf) -> Self {
            let (stream, handle) = match OutputStream::try_default() {
                Ok((stream, handle)) => (Some(stream), Some(handle)),
                Err(e) => {
                    tracing::warn!("audio output unavailable: {}", e);
                    (None, None)
                }
            };
            Self {
                path,
                _stream: stream,
                handle,
            }
        }

        fn play(&self) -> Result<(), String> {
            let handle = self
                .handle
                .as_ref()
                .ok_or_else(|| "audio output not available".to_string())?;
            let file = File::open(&self.path)
                .map_err(|e| format!("cannot open {}: {}", self.path.display(), e))?;
            let source = Decoder::new(BufReader::new(file))
                .map_err(|e| format!("cannot decode {}: {}", self.path.display(), e))?;
            let sink = Sink::try_new(handle).map_err(|e| format!("no audio sink: {}", e))?;
            sink.append(source);
            sink.detach();
            Ok(())
        }
    }

    impl Alert for SoundFile {
        fn ring(&mut self) {
            if let Err(e) = self.play() {
                tracing::warn!("{}", e);
                Bell.ring();
            }
        }
    }
}

/// The alert to use for `sound`, or `None` when sound is off or silenced.
pub fn alert_from_config(sound: &SoundConfig, silent: bool) -> Option<Box<dyn Alert>> {
    if silent || !sound.enabled {
        return None;
    }
    #[cfg(feature = "sound")]
    if let Some(path) = &sound.file {
        return Some(Box::new(SoundFile::new(path.clone())));
    }
    #[cfg(not(feature = "sound"))]
    if sound.file.is_some() {
        tracing::debug!("built without the `sound` feature, using the terminal bell");
    }
    Some(Box::new(Bell))
}

/// Append-only, one file per calendar day: `<dir>/<prefix>_<YYYY-MM-DD>.log`.
#[derive(Debug, Clone)]
pub struct PostLog {
    dir: PathBuf,
    prefix: String,
}

impl PostLog {
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::LogDir(dir.to_path_buf()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.into(),
        })
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.log", self.prefix, date.format("%Y-%m-%d")))
    }

    /// Writes the whole line in a single append.
    pub fn append(&self, post: &Post, now: DateTime<Utc>) -> Result<()> {
        let path = self.path_for(now.with_timezone(&Local).date_naive());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(log_line(post).as_bytes())?;
        Ok(())
    }
}

pub fn log_line(post: &Post) -> String {
    format!(
        "{} {} {}\n",
        post.created_at.to_rfc3339(),
        post.handle,
        sanitize_for_log(&post.text)
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub printed: usize,
    pub logged: usize,
    pub critical: usize,
    pub alerted: bool,
}

pub struct Notifier {
    out: Box<dyn Write>,
    formatter: Formatter,
    log: Option<PostLog>,
    alert: Option<Box<dyn Alert>>,
    critical_only: bool,
    typing_delay: Option<Duration>,
}

impl Notifier {
    pub fn new(out: Box<dyn Write>, formatter: Formatter) -> Self {
        Self {
            out,
            formatter,
            log: None,
            alert: None,
            critical_only: false,
            typing_delay: None,
        }
    }

    pub fn from_config(config: &Config, out: Box<dyn Write>) -> Result<Self> {
        let formatter = Formatter::new(&config.alert_pattern, &config.display)?;
        let log = match &config.log.dir {
            Some(dir) => Some(PostLog::new(dir, config.log.prefix.clone())?),
            None => None,
        };
        let typing_delay = config
            .display
            .typing
            .then(|| Duration::from_millis(config.display.typing_delay_ms));

        Ok(Self {
            log,
            alert: alert_from_config(&config.sound, config.silent),
            critical_only: config.critical_only,
            typing_delay,
            ..Self::new(out, formatter)
        })
    }

    pub fn with_log(mut self, log: PostLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_alert(mut self, alert: Box<dyn Alert>) -> Self {
        self.alert = Some(alert);
        self
    }

    pub fn critical_only(mut self, critical_only: bool) -> Self {
        self.critical_only = critical_only;
        self
    }

    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = Some(delay);
        self
    }

    /// Log, print and maybe ring for one cycle's worth of new posts,
    /// given oldest first. Every post is logged before anything is
    /// printed; with `critical_only` only critical ones reach the
    /// terminal. The alert rings at most once per call, even when the
    /// terminal write fails.
    pub async fn emit(&mut self, posts: &[Post], now: DateTime<Utc>) -> Result<EmitReport> {
        let mut report = EmitReport::default();

        if let Some(log) = &self.log {
            for post in posts {
                match log.append(post, now) {
                    Ok(()) => report.logged += 1,
                    Err(e) => tracing::warn!("failed to write post log: {}", e),
                }
            }
        }

        let formatted: Vec<FormattedPost> = posts
            .iter()
            .map(|post| self.formatter.format_post(post, now))
            .collect();
        report.critical = formatted.iter().filter(|f| f.critical).count();

        let printed = self.print(&formatted, &mut report).await;

        if report.critical > 0 {
            if let Some(alert) = self.alert.as_mut() {
                alert.ring();
                report.alerted = true;
            }
        }

        printed.map(|()| report)
    }

    async fn print(&mut self, formatted: &[FormattedPost], report: &mut EmitReport) -> Result<()> {
        let critical_only = self.critical_only;
        for post in formatted.iter().filter(|f| !critical_only || f.critical) {
            let Some((body, header)) = post.lines.split_last() else {
                continue;
            };
            for line in header {
                writeln!(self.out, "{}", render_line(line))?;
            }
            self.write_body(&render_line(body)).await?;
            report.printed += 1;
        }

        if report.printed > 0 {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(())
    }

    async fn write_body(&mut self, rendered: &str) -> Result<()> {
        let Some(delay) = self.typing_delay else {
            writeln!(self.out, "{}", rendered)?;
            return Ok(());
        };

        // Escape sequences go out in one piece; only visible characters
        // are typed.
        let mut in_escape = false;
        for c in rendered.chars() {
            let mut buf = [0u8; 4];
            self.out.write_all(c.encode_utf8(&mut buf).as_bytes())?;
            if c == '\x1b' {
                in_escape = true;
            } else if in_escape {
                if c.is_ascii_alphabetic() {
                    in_escape = false;
                }
            } else if !c.is_whitespace() {
                self.out.flush()?;
                tokio::time::sleep(delay).await;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    /// Return the cursor to column 0, clear the line and drop any styling.
    pub fn reset_terminal(&mut self) -> Result<()> {
        crossterm::queue!(
            self.out,
            crossterm::cursor::MoveToColumn(0),
            crossterm::terminal::Clear(crossterm::terminal::ClearType::UntilNewLine),
            crossterm::style::ResetColor,
            crossterm::style::SetAttribute(crossterm::style::Attribute::Reset)
        )?;
        self.out.flush()?;
        Ok(())
    }
}
