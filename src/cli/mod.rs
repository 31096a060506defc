//! Command line front end.
//!
//! Flags follow the single-dash style (`-put -bucket b -file f`); the
//! double-dash forms are accepted as well. The CLI reports no progress and
//! performs exactly one transfer per invocation.

use crate::client::{RestService, Service};
use crate::config::ConfigurationLoader;
use crate::transfer::NoopProgressListener;
use clap::error::ErrorKind;
use clap::{ArgGroup, Parser};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const LONG_FLAGS: &[&str] = &[
    "put", "get", "bucket", "file", "dest", "conf", "cli", "help", "version",
];

/// s3dropbox - upload or download a single file to/from an S3 bucket
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "s3dropbox", version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["put", "get"])))]
pub struct Args {
    /// Upload FILE to the bucket
    #[arg(long)]
    pub put: bool,

    /// Download FILE from the bucket
    #[arg(long)]
    pub get: bool,

    /// Bucket to use
    #[arg(long, value_name = "NAME")]
    pub bucket: String,

    /// File to upload or download
    #[arg(long, value_name = "FILE")]
    pub file: String,

    /// Download directory (defaults to the current directory)
    #[arg(long, value_name = "DIRNAME")]
    pub dest: Option<PathBuf>,

    /// Configuration file (defaults to ~/.s3dropbox.properties)
    #[arg(long, value_name = "FILE")]
    pub conf: Option<PathBuf>,

    /// Run without a graphical interface (always the case)
    #[arg(long)]
    pub cli: bool,
}

/// A transfer resolved from the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upload `source` as `bucket/{file name of source}`.
    Put {
        /// Bucket name.
        bucket: String,
        /// Local file.
        source: PathBuf,
    },
    /// Download `bucket/key` to `target`.
    Get {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Local file to write.
        target: PathBuf,
    },
}

impl Args {
    /// Resolve the transfer these arguments describe.
    pub fn command(&self) -> Command {
        if self.get {
            let dest = self.dest.clone().unwrap_or_else(|| PathBuf::from("."));
            let name = self.file.rsplit('/').next().unwrap_or(&self.file);
            Command::Get {
                bucket: self.bucket.clone(),
                key: self.file.clone(),
                target: dest.join(name),
            }
        } else {
            Command::Put {
                bucket: self.bucket.clone(),
                source: PathBuf::from(&self.file),
            }
        }
    }
}

/// Rewrite `-flag` and `-flag=value` to their `--` forms.
///
/// Only known long flag names are rewritten, so values that happen to start
/// with a dash pass through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 {
                return arg;
            }
            let text = match arg.to_str() {
                Some(text) => text.to_string(),
                None => return arg,
            };
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split('=').next().unwrap_or(rest);
                    if LONG_FLAGS.contains(&name) {
                        OsString::from(format!("-{}", text))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

/// Parse command line arguments, program name first.
pub fn parse<I, T>(args: I) -> Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    Args::try_parse_from(normalize_args(args))
}

/// Key an upload is stored under: the file name of the source.
fn upload_key(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Run one transfer against `service`, then close it.
///
/// Status lines go to `out`. The service is closed whether or not the
/// transfer succeeded.
pub async fn execute<W: Write>(
    command: &Command,
    service: &dyn Service,
    out: &mut W,
) -> anyhow::Result<()> {
    let result = transfer(command, service, out).await;
    service.close().await;
    result
}

async fn transfer<W: Write>(
    command: &Command,
    service: &dyn Service,
    out: &mut W,
) -> anyhow::Result<()> {
    let listener = Arc::new(NoopProgressListener);
    match command {
        Command::Get {
            bucket,
            key,
            target,
        } => {
            writeln!(
                out,
                "Downloading {} from bucket {} to {} ...",
                key,
                bucket,
                target.display()
            )?;
            let output = service
                .download_object(bucket, key, target, listener)
                .await?;
            debug!(bytes = output.content_length, "Download finished");
        }
        Command::Put { bucket, source } => {
            writeln!(
                out,
                "Uploading {} to bucket {} ...",
                source.display(),
                bucket
            )?;
            let output = service
                .create_object(bucket, &upload_key(source), source, listener)
                .await?;
            debug!(bytes = output.content_length, "Upload finished");
        }
    }
    writeln!(out, "... Done")?;
    Ok(())
}

/// Outcome of argument parsing.
#[derive(Debug)]
pub enum Parsed {
    /// Arguments are valid.
    Run(Args),
    /// Help, version, or a parse error was printed; exit with this code.
    Exit(i32),
}

/// Parse arguments, printing help or errors as clap renders them.
///
/// Help and version exit with 0, any other parse error with 1.
pub fn parse_or_exit<I, T>(args: I) -> Parsed
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    match parse(args) {
        Ok(args) => Parsed::Run(args),
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            if let Err(print_err) = e.print() {
                debug!(error = %print_err, "Could not print usage");
            }
            Parsed::Exit(code)
        }
    }
}

/// Load configuration, build the REST service and run the transfer.
pub async fn run(args: &Args) -> anyhow::Result<()> {
    use anyhow::Context;

    let config = ConfigurationLoader::new(args.conf.clone())
        .load()
        .context("Could not load configuration")?;
    let service = RestService::new(config).context("Could not create service")?;

    let mut stdout = std::io::stdout();
    execute(&args.command(), &service, &mut stdout).await
}
