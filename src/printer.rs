use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::{
    channel::Channel,
    error::{Error, Result},
    media::{Geometry, MediaWidth, DPI, TOTAL_PINS},
    raster::{empty_line, pack_line, Bitmap, CommandBuffer, LineCommand},
    status::{read_status, request_status, Phase, Status, StatusKind},
};

/// Config
///
#[derive(Debug, Clone)]
pub struct Config {
    status_timeout: Duration,
    stale_drain_timeout: Duration,
    margin_dots: u16,
    auto_cut: bool,
    pad_short_pages: bool,
    line_command: LineCommand,
}

impl Config {
    /// Initialize configuration data with default values.
    ///
    /// # Example
    ///
    /// ```
    /// use ptouch_lp::Config;
    ///
    /// let config = Config::new().margin_dots(14).auto_cut(false);
    /// ```
    ///
    pub fn new() -> Config {
        Config {
            status_timeout: Duration::from_secs(10),
            stale_drain_timeout: Duration::from_millis(100),
            // 1mm
            margin_dots: 7,
            auto_cut: true,
            pad_short_pages: true,
            line_command: LineCommand::Transfer,
        }
    }

    /// How long to wait for each status reply.
    pub fn status_timeout(self, timeout: Duration) -> Self {
        Config {
            status_timeout: timeout,
            ..self
        }
    }

    /// Total time spent discarding stale bytes before a job.
    pub fn stale_drain_timeout(self, timeout: Duration) -> Self {
        Config {
            stale_drain_timeout: timeout,
            ..self
        }
    }

    pub fn margin_dots(self, dots: u16) -> Self {
        Config {
            margin_dots: dots,
            ..self
        }
    }

    pub fn auto_cut(self, flag: bool) -> Self {
        Config {
            auto_cut: flag,
            ..self
        }
    }

    /// Pad pages shorter than the minimum label length with blank lines.
    /// When disabled such pages are rejected.
    pub fn pad_short_pages(self, flag: bool) -> Self {
        Config {
            pad_short_pages: flag,
            ..self
        }
    }

    pub fn line_command(self, command: LineCommand) -> Self {
        Config {
            line_command: command,
            ..self
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

/// Image size a page must have for the loaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Exact bitmap width in pixels.
    pub width: u32,
    /// Minimum bitmap height in pixels. Shorter pages are padded.
    pub min_length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterInfo {
    /// Human readable name of the loaded media.
    pub media_name: String,
    pub bounds: Bounds,
    pub dpi: u32,
}

impl PrinterInfo {
    pub fn from_status(status: &Status) -> Result<Self> {
        let geometry = status.media_width.geometry()?;
        Ok(PrinterInfo {
            media_name: format!("{} {}", status.media_width, status.media_type),
            bounds: Bounds {
                width: geometry.pixel_span,
                min_length: geometry.min_length,
            },
            dpi: DPI,
        })
    }
}

/// Object safe view of a printer, as handed out by a
/// [`Registry`](crate::Registry).
pub trait LabelPrinter {
    fn status(&mut self) -> Result<Status>;
    fn info(&mut self) -> Result<PrinterInfo>;
    fn print(&mut self, pages: &[&dyn Bitmap]) -> Result<()>;
    fn close(self: Box<Self>) -> Result<()>;
}

/// Where the orchestrator is in a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Resetting,
    Initializing,
    AwaitingInitialStatus,
    /// Sending page `n`, counted from zero.
    Page(usize),
    AwaitingCompletion,
    Failed,
}

/// Position of a page in the job. A single page is both first and last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    first: bool,
    last: bool,
}

impl Position {
    fn of(index: usize, count: usize) -> Self {
        Position {
            first: index == 0,
            last: index + 1 == count,
        }
    }
}

/// Leading blank lines for a page `height` lines long. Any odd line is left
/// to the printer's own minimum length feed.
fn leading_pad(height: u32, min_length: u32) -> u32 {
    if height < min_length {
        (min_length - height) / 2
    } else {
        0
    }
}

/// PT-700 driver over a device channel.
///
/// The channel may be borrowed (`Printer::new(&mut handle, config)`) so the
/// caller keeps ownership of the device across jobs.
pub struct Printer<C: Channel> {
    channel: C,
    config: Config,
    state: JobState,
}

impl<C: Channel> Printer<C> {
    pub fn new(channel: C, config: Config) -> Self {
        Printer {
            channel,
            config,
            state: JobState::Idle,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    fn enter(&mut self, state: JobState) {
        debug!("job state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Read printer status.
    ///
    /// This method is convenient for inspection when a new media is added.
    /// Device errors are reported in the returned status, not as an `Err`.
    ///
    pub fn check_status(&mut self) -> Result<Status> {
        self.discard_stale()?;
        request_status(&mut self.channel)?;
        let status = read_status(&mut self.channel, self.config.status_timeout)?;
        status.expect(StatusKind::ReplyToRequest)?;
        Ok(status)
    }

    /// Loaded media and the page size it takes.
    pub fn info(&mut self) -> Result<PrinterInfo> {
        let status = self.check_status()?;
        PrinterInfo::from_status(&status)
    }

    /// Chain print `pages` as one job, so the blank leader tape is only
    /// needed once. Each page is cut individually.
    ///
    /// A failed job is never resumed: chain printing state on the device
    /// cannot be recovered mid-job, so the whole job has to be sent again.
    pub fn print<B: Bitmap>(&mut self, pages: &[B]) -> Result<()> {
        let result = self.run_job(pages);
        match &result {
            Ok(()) => {
                info!("printed {} page(s)", pages.len());
                self.enter(JobState::Idle);
            }
            Err(err) => {
                warn!("print job failed in {:?}: {}", self.state, err);
                self.enter(JobState::Failed);
            }
        }
        result
    }

    pub fn close(mut self) -> Result<()> {
        self.channel.close()
    }

    fn run_job<B: Bitmap>(&mut self, pages: &[B]) -> Result<()> {
        if pages.is_empty() {
            return Err(Error::EmptyJob);
        }

        self.enter(JobState::Resetting);
        let mut cmd = CommandBuffer::new();
        cmd.invalidate();
        self.channel.write_all(cmd.as_bytes())?;
        self.discard_stale()?;

        self.enter(JobState::Initializing);
        let mut cmd = CommandBuffer::new();
        cmd.initialize();
        self.channel.write_all(cmd.as_bytes())?;

        // Status has to be requested at least once before printing. It also
        // tells us which tape is loaded now.
        self.enter(JobState::AwaitingInitialStatus);
        request_status(&mut self.channel)?;
        let status = read_status(&mut self.channel, self.config.status_timeout)?;
        status.expect(StatusKind::ReplyToRequest)?;
        status.check()?;
        if !status.media_type.is_printable() {
            return Err(Error::UnsupportedMediaType(status.media_type));
        }
        let geometry = status.media_width.geometry()?;
        self.validate(pages, &geometry)?;
        info!(
            "printing {} page(s) on {} {}",
            pages.len(),
            status.media_width,
            status.media_type
        );

        for (index, page) in pages.iter().enumerate() {
            self.enter(JobState::Page(index));
            self.print_page(
                page,
                Position::of(index, pages.len()),
                status.media_width,
                &geometry,
            )?;
        }

        self.enter(JobState::AwaitingCompletion);
        self.wait_for(StatusKind::PrintingCompleted, None)?;
        Ok(())
    }

    /// Every page is checked before the first one is sent, so a bad page
    /// never leaves a partial chain on the tape.
    fn validate<B: Bitmap>(&self, pages: &[B], geometry: &Geometry) -> Result<()> {
        for (index, page) in pages.iter().enumerate() {
            let (width, height) = (page.width(), page.height());
            let too_short =
                height == 0 || (!self.config.pad_short_pages && height < geometry.min_length);

            if width != geometry.pixel_span || too_short {
                return Err(Error::ImageBounds {
                    page: index,
                    width,
                    height,
                    expected_width: geometry.pixel_span,
                    min_length: geometry.min_length,
                });
            }
        }
        Ok(())
    }

    fn print_page<B: Bitmap>(
        &mut self,
        page: &B,
        pos: Position,
        width: MediaWidth,
        geometry: &Geometry,
    ) -> Result<()> {
        // Between chained pages the printer reports when it is ready to
        // receive again.
        if !pos.first {
            self.wait_for(StatusKind::PhaseChange, Some(Phase::Editing))?;
        }

        let height = page.height();
        let pad = leading_pad(height, geometry.min_length);
        let line_command = self.config.line_command;

        let mut cmd = CommandBuffer::new();
        cmd.raster_mode()
            .print_information(width.code(), pad + height, pos.first)
            .mode_settings(self.config.auto_cut)
            .advanced_mode_settings(!pos.last)
            .margin(self.config.margin_dots)
            .no_compression();

        let blank = empty_line(TOTAL_PINS);
        for _ in 0..pad {
            cmd.raster_line(line_command, &blank)?;
        }
        // The printer takes the trailing edge of the label first.
        for row in (0..height).rev() {
            let line = pack_line(page, row, geometry.pin_offset, TOTAL_PINS)?;
            cmd.raster_line(line_command, &line)?;
        }

        if pos.last {
            cmd.print_and_feed();
        } else {
            cmd.print();
        }
        debug!(
            "page: {} lines ({} padding), first={} last={}",
            pad + height,
            pad,
            pos.first,
            pos.last
        );
        self.channel.write_all(cmd.as_bytes())?;

        self.wait_for(StatusKind::PhaseChange, Some(Phase::Printing))?;
        if pos.last {
            // Feeding the tape out to the cutter.
            self.wait_for(StatusKind::PhaseChange, None)?;
        }
        Ok(())
    }

    /// Read the next status, which must be of kind `kind`. A phase other than
    /// `phase` is only logged.
    fn wait_for(&mut self, kind: StatusKind, phase: Option<Phase>) -> Result<Status> {
        let status = read_status(&mut self.channel, self.config.status_timeout)?;
        status.check()?;
        status.expect(kind)?;

        if let Some(phase) = phase {
            if status.phase != phase {
                warn!("expected {} phase, printer reports {}", phase, status.phase);
            }
        }
        Ok(status)
    }

    /// Throw away anything left unread by earlier commands so it is not
    /// mistaken for the next reply.
    fn discard_stale(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.stale_drain_timeout;
        let mut scratch = [0u8; 128];
        let mut discarded = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let n = self.channel.read_available(&mut scratch, remaining)?;
            if n == 0 {
                break;
            }
            debug!("stale bytes: {:02X?}", &scratch[..n]);
            discarded += n;
            if remaining.is_zero() {
                break;
            }
        }

        if discarded > 0 {
            warn!("discarded {} stale bytes", discarded);
        }
        Ok(())
    }
}

impl<C: Channel> LabelPrinter for Printer<C> {
    fn status(&mut self) -> Result<Status> {
        self.check_status()
    }

    fn info(&mut self) -> Result<PrinterInfo> {
        Printer::info(self)
    }

    fn print(&mut self, pages: &[&dyn Bitmap]) -> Result<()> {
        Printer::print(self, pages)
    }

    fn close(self: Box<Self>) -> Result<()> {
        Printer::close(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaType, MIN_LENGTH_DOTS};
    use crate::status::{Error1, Error2};

    #[test]
    fn pad_splits_shortfall() {
        assert_eq!(leading_pad(80, 100), 10);
        assert_eq!(leading_pad(81, 100), 9);
        assert_eq!(leading_pad(100, 100), 0);
        assert_eq!(leading_pad(500, 100), 0);
    }

    #[test]
    fn positions() {
        assert_eq!(Position::of(0, 1), Position { first: true, last: true });
        assert_eq!(Position::of(0, 3), Position { first: true, last: false });
        assert_eq!(Position::of(1, 3), Position { first: false, last: false });
        assert_eq!(Position::of(2, 3), Position { first: false, last: true });
    }

    #[test]
    fn info_from_status() {
        let status = Status {
            err1: Error1::empty(),
            err2: Error2::empty(),
            media_width: MediaWidth::Width12,
            media_type: MediaType::Laminated,
            kind: StatusKind::ReplyToRequest,
            phase: Phase::Editing,
        };
        let info = PrinterInfo::from_status(&status).unwrap();
        assert_eq!(info.media_name, "12mm Laminated");
        assert_eq!(
            info.bounds,
            Bounds {
                width: 70,
                min_length: MIN_LENGTH_DOTS
            }
        );
        assert_eq!(info.dpi, 180);
    }
}
