use std::fmt::Display;
use std::fs::File;
use std::io;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use atty::Stream;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;

const STDIO_PATH: &str = "-";

/// Path of an input that must be a regular file (GTC lists, manifests, SIM
/// files read in several passes).
#[derive(Debug, Clone)]
pub struct InputFile {
    path: PathBuf,
}

impl Display for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

pub fn input_file(path: &str) -> Result<InputFile, String> {
    if path == STDIO_PATH {
        return Err("standard input is not supported here; please provide a file path".to_owned());
    }

    Ok(InputFile {
        path: PathBuf::from(path),
    })
}

impl InputFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Input read once from start to end: a file or the standard input.
#[derive(Debug, Clone, Default)]
pub enum InputSource {
    #[default]
    Stdin,
    File(PathBuf),
}

pub fn input_source(path: &str) -> Result<InputSource, String> {
    if path == STDIO_PATH {
        Ok(InputSource::Stdin)
    } else {
        Ok(InputSource::File(PathBuf::from(path)))
    }
}

impl Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Stdin => write!(f, "{}", STDIO_PATH),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl InputSource {
    /// Human readable name of the source, for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            InputSource::Stdin => "standard input".to_owned(),
            InputSource::File(path) => path.display().to_string(),
        }
    }

    pub fn open(&self) -> anyhow::Result<Box<dyn Read + Send>> {
        let reader: Box<dyn Read + Send> = match self {
            InputSource::Stdin => Box::new(BufReader::new(io::stdin())),
            InputSource::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Could not open {}", path.display()))?;
                Box::new(BufReader::new(file))
            }
        };
        Ok(reader)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Binary,
}

#[derive(Debug)]
pub enum OutputWriter {
    Stdout(io::Stdout),
    File(File),
}

impl OutputWriter {
    /// Opens `output`, or a file next to `input` with `new_extension` when no
    /// output path was given. `-` is the standard output.
    pub fn from_path_and_input(
        output: &Option<PathBuf>,
        input: &Path,
        new_extension: &str,
        mode: OutputMode,
    ) -> anyhow::Result<Self> {
        match output {
            Some(path) => Self::from_path(path, mode),
            None => Self::from_path(&input.with_extension(new_extension), mode),
        }
    }

    pub fn from_path(path: &Path, mode: OutputMode) -> anyhow::Result<Self> {
        info!("Output file: {}", path.display());

        if path.as_os_str() == STDIO_PATH {
            if mode == OutputMode::Binary && atty::is(Stream::Stdout) {
                bail!("Refusing to write a binary SIM file to a terminal; use -o or redirect the standard output");
            }
            return Ok(Self::Stdout(io::stdout()));
        }

        let file =
            File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
        Ok(Self::File(file))
    }

    pub fn into_write(self) -> Box<dyn Write + Send> {
        match self {
            OutputWriter::Stdout(stdout) => Box::new(BufWriter::new(stdout)),
            OutputWriter::File(file) => Box::new(BufWriter::new(file)),
        }
    }

    /// Text output, gzip-compressed when `gzip` is set.
    pub fn into_text_write(self, gzip: bool) -> TextWriter {
        let writer = self.into_write();
        if gzip {
            TextWriter::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            TextWriter::Plain(writer)
        }
    }
}

/// Report output that has to be closed with [`TextWriter::finish`], so that
/// a failure while writing the gzip trailer is not lost.
pub enum TextWriter {
    Plain(Box<dyn Write + Send>),
    Gzip(GzEncoder<Box<dyn Write + Send>>),
}

impl TextWriter {
    pub fn finish(self) -> io::Result<()> {
        match self {
            TextWriter::Plain(mut writer) => writer.flush(),
            TextWriter::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for TextWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TextWriter::Plain(writer) => writer.write(buf),
            TextWriter::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TextWriter::Plain(writer) => writer.flush(),
            TextWriter::Gzip(encoder) => encoder.flush(),
        }
    }
}
