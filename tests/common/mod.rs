//! Scripted printer for driving the orchestrator without hardware.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use ptouch_lp::{Channel, Error, RawIo, Readiness, Result, StatusKind, STATUS_LEN};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(Vec<u8>),
    Read(StatusKind),
}

/// Replies with queued status frames and records everything written.
#[derive(Default)]
pub struct MockPrinter {
    replies: VecDeque<[u8; STATUS_LEN]>,
    stale: Vec<u8>,
    pub ops: Vec<Op>,
    pub closed: bool,
}

impl MockPrinter {
    pub fn new() -> Self {
        MockPrinter::default()
    }

    pub fn reply(mut self, frame: [u8; STATUS_LEN]) -> Self {
        self.replies.push_back(frame);
        self
    }

    pub fn stale(mut self, bytes: &[u8]) -> Self {
        self.stale.extend_from_slice(bytes);
        self
    }

    pub fn written(&self) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(bytes) => Some(bytes.clone()),
                Op::Read(_) => None,
            })
            .flatten()
            .collect()
    }

    /// `W` for every write and `R` for every status read, in order.
    pub fn trace(&self) -> String {
        self.ops
            .iter()
            .map(|op| match op {
                Op::Write(_) => 'W',
                Op::Read(_) => 'R',
            })
            .collect()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Channel for MockPrinter {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Channel(std::io::Error::from_raw_os_error(9)));
        }
        self.ops.push(Op::Write(buf.to_vec()));
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<()> {
        let frame = self.replies.pop_front().ok_or(Error::Timeout)?;
        buf.copy_from_slice(&frame[..buf.len()]);
        self.ops.push(Op::Read(StatusKind::from_code(frame[18])));
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let n = self.stale.len().min(buf.len());
        buf[..n].copy_from_slice(&self.stale[..n]);
        self.stale.drain(..n);
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Status frame with the given fields at offsets 8, 9, 10, 11, 18 and 19.
pub fn frame(err1: u8, err2: u8, width: u8, media_type: u8, kind: u8, phase: u8) -> [u8; STATUS_LEN] {
    let mut buf = [0u8; STATUS_LEN];
    buf[0] = 0x80;
    buf[1] = 0x20;
    buf[8] = err1;
    buf[9] = err2;
    buf[10] = width;
    buf[11] = media_type;
    buf[18] = kind;
    buf[19] = phase;
    buf
}

pub const LAMINATED: u8 = 0x01;

pub fn status_reply(width: u8) -> [u8; STATUS_LEN] {
    frame(0, 0, width, LAMINATED, 0x00, 0x00)
}

pub fn phase_editing(width: u8) -> [u8; STATUS_LEN] {
    frame(0, 0, width, LAMINATED, 0x06, 0x00)
}

pub fn phase_printing(width: u8) -> [u8; STATUS_LEN] {
    frame(0, 0, width, LAMINATED, 0x06, 0x01)
}

pub fn completed(width: u8) -> [u8; STATUS_LEN] {
    frame(0, 0, width, LAMINATED, 0x01, 0x00)
}

/// One command decoded from the byte stream sent to the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Invalidate,
    Initialize,
    StatusRequest,
    RasterMode(u8),
    PrintInformation {
        flags: u8,
        media_width: u8,
        lines: u32,
        continuation: u8,
    },
    Mode(u8),
    Advanced(u8),
    Margin(u16),
    Compression(u8),
    Line { opcode: u8, data: Vec<u8> },
    Print,
    PrintAndFeed,
}

pub fn parse(stream: &[u8]) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut i = 0;

    while i < stream.len() {
        let rest = &stream[i..];
        let (command, len) = match rest {
            [0x00, ..] => (Command::Invalidate, 1),
            [0x1B, 0x40, ..] => (Command::Initialize, 2),
            [0x1B, 0x69, 0x53, ..] => (Command::StatusRequest, 3),
            [0x1B, 0x69, 0x61, mode, ..] => (Command::RasterMode(*mode), 4),
            [0x1B, 0x69, 0x7A, flags, _, width, _, l0, l1, l2, l3, cont, _, ..] => (
                Command::PrintInformation {
                    flags: *flags,
                    media_width: *width,
                    lines: u32::from_le_bytes([*l0, *l1, *l2, *l3]),
                    continuation: *cont,
                },
                13,
            ),
            [0x1B, 0x69, 0x4D, mode, ..] => (Command::Mode(*mode), 4),
            [0x1B, 0x69, 0x4B, mode, ..] => (Command::Advanced(*mode), 4),
            [0x1B, 0x69, 0x64, lo, hi, ..] => (Command::Margin(u16::from_le_bytes([*lo, *hi])), 5),
            [0x4D, mode, ..] => (Command::Compression(*mode), 2),
            [opcode @ (0x47 | 0x67), lo, hi, ..] => {
                let n = u16::from_le_bytes([*lo, *hi]) as usize;
                (
                    Command::Line {
                        opcode: *opcode,
                        data: rest[3..3 + n].to_vec(),
                    },
                    3 + n,
                )
            }
            [0x0C, ..] => (Command::Print, 1),
            [0x1A, ..] => (Command::PrintAndFeed, 1),
            other => panic!("unparsable command stream at {}: {:02X?}", i, &other[..other.len().min(8)]),
        };
        commands.push(command);
        i += len;
    }

    commands
}

/// Commands of one page, from raster mode up to the print command.
#[derive(Debug)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    pub fn print_information(&self) -> (u8, u32, u8) {
        self.commands
            .iter()
            .find_map(|c| match c {
                Command::PrintInformation {
                    media_width,
                    lines,
                    continuation,
                    ..
                } => Some((*media_width, *lines, *continuation)),
                _ => None,
            })
            .expect("page without print information")
    }

    pub fn advanced(&self) -> u8 {
        self.commands
            .iter()
            .find_map(|c| match c {
                Command::Advanced(mode) => Some(*mode),
                _ => None,
            })
            .expect("page without advanced mode settings")
    }

    pub fn lines(&self) -> Vec<Vec<u8>> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Line { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn print_command(&self) -> Command {
        self.commands.last().cloned().expect("empty page")
    }
}

/// Split the commands following the initial status request into pages.
pub fn split_pages(commands: &[Command]) -> Vec<Page> {
    let mut pages = Vec::new();
    let mut current: Option<Vec<Command>> = None;

    for command in commands {
        match command {
            Command::RasterMode(_) => current = Some(vec![command.clone()]),
            Command::Print | Command::PrintAndFeed => {
                let mut page = current.take().expect("print outside of a page");
                page.push(command.clone());
                pages.push(Page { commands: page });
            }
            _ => {
                if let Some(page) = current.as_mut() {
                    page.push(command.clone());
                }
            }
        }
    }

    pages
}

/// Byte-level device under a `Port`: status frames become readable once the
/// write they answer has gone out.
#[derive(Default)]
pub struct ScriptedDevice {
    answers: VecDeque<(usize, Vec<[u8; STATUS_LEN]>)>,
    inbox: VecDeque<u8>,
    writes: usize,
    spurious_empty_reads: bool,
    empty_read_pending: bool,
    pub written: Vec<u8>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        ScriptedDevice::default()
    }

    /// Queue `frames` back to back after write number `write` (from 1).
    pub fn answer(mut self, write: usize, frames: &[[u8; STATUS_LEN]]) -> Self {
        self.answers.push_back((write, frames.to_vec()));
        self
    }

    /// Start every drain with one empty read.
    pub fn spurious_empty_reads(mut self) -> Self {
        self.spurious_empty_reads = true;
        self
    }

    pub fn unread(&self) -> usize {
        self.inbox.len()
    }
}

impl RawIo for ScriptedDevice {
    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<Readiness> {
        if self.inbox.is_empty() {
            Ok(Readiness::TimedOut)
        } else {
            self.empty_read_pending = self.spurious_empty_reads;
            Ok(Readiness::Readable)
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.empty_read_pending {
            self.empty_read_pending = false;
            return Ok(0);
        }
        let n = buf.len().min(self.inbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        self.writes += 1;
        while let Some((write, _)) = self.answers.front() {
            if *write != self.writes {
                break;
            }
            if let Some((_, frames)) = self.answers.pop_front() {
                self.inbox.extend(frames.iter().flatten());
            }
        }
        Ok(buf.len())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
