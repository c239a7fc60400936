//! Durable, append-only detection log.
//!
//! One line per detection:
//! `timestamp, class, confidence, x1,y1,x2,y2, Yes|No, video_path`

use crate::detection::{Detection, PixelBox};
use crate::prelude::LogWriteError;
use chrono::NaiveDateTime;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One appended entry. Never mutated after being written.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub class_label: String,
    pub confidence: f32,
    pub bbox: PixelBox,
    pub is_animal: bool,
    pub recording: bool,
    pub video_path: Option<PathBuf>,
}

impl LogRecord {
    pub fn new(
        timestamp: NaiveDateTime,
        detection: &Detection,
        is_animal: bool,
        active_video: Option<&Path>,
    ) -> Self {
        let recording = is_animal && active_video.is_some();
        Self {
            timestamp,
            class_label: detection.class_label.clone(),
            confidence: detection.confidence,
            bbox: detection.bbox.truncated(),
            is_animal,
            recording,
            video_path: active_video.filter(|_| recording).map(Path::to_path_buf),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bbox;
        write!(
            f,
            "{}, {}, {:.2}, {},{},{},{}, {}, {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.class_label,
            self.confidence,
            b.x1,
            b.y1,
            b.x2,
            b.y2,
            if self.recording { "Yes" } else { "No" },
            self.video_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("malformed log line: {0}")]
pub struct LogParseError(pub String);

/// A log line read back from disk. `is_animal` is not part of the format.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedLine {
    pub timestamp: NaiveDateTime,
    pub class_label: String,
    pub confidence: f32,
    pub bbox: PixelBox,
    pub recording: bool,
    pub video_path: Option<PathBuf>,
}

impl FromStr for LoggedLine {
    type Err = LogParseError;

    /// Labels and paths may themselves contain `", "`. The class label ends
    /// at the first `confidence, bbox, flag` run after the timestamp; the
    /// rest of the line is the path.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\n', '\r']);
        let Some((ts, rest)) = line.split_once(", ") else {
            return Err(LogParseError(format!("expected 6 fields in {:?}", line)));
        };
        let timestamp = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
            .map_err(|e| LogParseError(format!("timestamp {:?}: {}", ts, e)))?;

        let fields: Vec<&str> = rest.split(", ").collect();
        if fields.len() < 4 {
            return Err(LogParseError(format!("expected 6 fields in {:?}", line)));
        }

        let mut first_err = None;
        for index in 1..=fields.len() - 3 {
            match parse_tail(fields[index], fields[index + 1], fields[index + 2]) {
                Ok((confidence, bbox, recording)) => {
                    let path = fields[index + 3..].join(", ");
                    let path = path.trim();
                    return Ok(Self {
                        timestamp,
                        class_label: fields[..index].join(", "),
                        confidence,
                        bbox,
                        recording,
                        video_path: (!path.is_empty()).then(|| PathBuf::from(path)),
                    });
                }
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        Err(first_err.unwrap_or_else(|| LogParseError(format!("malformed record {:?}", line))))
    }
}

fn parse_tail(conf: &str, bbox: &str, flag: &str) -> Result<(f32, PixelBox, bool), LogParseError> {
    let confidence = conf
        .parse::<f32>()
        .map_err(|e| LogParseError(format!("confidence {:?}: {}", conf, e)))?;
    let coords = bbox
        .split(',')
        .map(|v| v.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LogParseError(format!("bbox {:?}: {}", bbox, e)))?;
    let [x1, y1, x2, y2] = coords[..] else {
        return Err(LogParseError(format!("bbox {:?} needs 4 values", bbox)));
    };
    let recording = match flag {
        "Yes" => true,
        "No" => false,
        other => return Err(LogParseError(format!("recording flag {:?}", other))),
    };
    Ok((confidence, PixelBox { x1, y1, x2, y2 }, recording))
}

/// Append-only writer for [`LogRecord`]s.
///
/// Writes go through a mutex so records stay in call order even when the
/// logger is shared across threads. Every record is flushed before `log`
/// returns.
pub struct EventLogger {
    target: String,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl EventLogger {
    /// Opens `path` for appending, creating it and its parent folder if needed.
    pub fn open(path: &Path) -> Result<Self, LogWriteError> {
        let target = path.display().to_string();
        let io_err = |source| LogWriteError::Io {
            target: target.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        Ok(Self::from_writer(target, file))
    }

    pub fn from_writer(target: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            target: target.into(),
            sink: Mutex::new(Box::new(writer)),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(
        &self,
        timestamp: NaiveDateTime,
        detection: &Detection,
        is_animal: bool,
        active_video: Option<&Path>,
    ) -> Result<LogRecord, LogWriteError> {
        let record = LogRecord::new(timestamp, detection, is_animal, active_video);
        let mut sink = self.sink.lock().map_err(|_| LogWriteError::Poisoned)?;
        writeln!(sink, "{}", record)
            .and_then(|_| sink.flush())
            .map_err(|source| LogWriteError::Io {
                target: self.target.clone(),
                source,
            })?;
        Ok(record)
    }
}
