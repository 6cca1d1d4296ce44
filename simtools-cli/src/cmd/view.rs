use std::io::{self, Write};

use anyhow::Context;
use itertools::Itertools;
use simtools::progress::ProgressNotifier;
use simtools::sim::no_seek::NoSeek;
use simtools::sim::reader::SimReader;

use crate::opts::InputSource;

pub(crate) fn view(
    input: &InputSource,
    intensities: bool,
    progress_notifier: &dyn ProgressNotifier,
) -> anyhow::Result<()> {
    let mut reader = SimReader::new(NoSeek::new(input.open()?))
        .with_context(|| format!("Could not read a SIM header from {}", input.describe()))?;
    let header = *reader.header();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", header)?;
    writeln!(out, "record length:    {}", header.record_length()?)?;
    writeln!(out)?;

    progress_notifier.set_iter_num(u64::from(header.num_samples));
    while let Some(sample) = reader
        .read_next_sample()
        .with_context(|| format!("Could not read sample #{}", reader.samples_read() + 1))?
    {
        if intensities {
            writeln!(
                out,
                "{}\t: {}",
                sample.name,
                sample.intensities.values().join(" ")
            )?;
        } else {
            writeln!(out, "{}", sample.name)?;
        }
        progress_notifier.inc_iter();
    }

    out.flush()?;
    Ok(())
}
