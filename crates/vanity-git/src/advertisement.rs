//! Ref advertisement parsing and `HEAD` pinning.
//!
//! An upstream `info/refs?service=git-upload-pack` response looks like:
//!
//! ```text
//! 001e# service=git-upload-pack\n
//! 0000
//! 00xx<oid> HEAD\0<capabilities>\n
//! 003f<oid> refs/heads/master\n
//! ...
//! 0000
//! ```
//!
//! Parsing is a single pass over the immutable body that yields one [`Frame`]
//! per pkt-line together with its byte range. Rewriting then locates `HEAD`,
//! `refs/heads/master` and the pinned ref among those frames and emits a new
//! stream. Every byte outside the two replaced frames is copied verbatim.

use crate::pktline::{PktLine, PktLineWriter};
use crate::{GitError, Result};
use std::io::Write;
use std::ops::Range;
use vanity_types::{PinnedRef, RefKind};

/// Length of a hex SHA-1 object id.
const OID_HEX_LEN: usize = 40;

const HEAD: &str = "HEAD";
const MASTER: &str = "refs/heads/master";

/// A `<oid> <name>[\0<capabilities>]` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefRecord<'a> {
    /// 40 hex character object id.
    pub oid: &'a str,
    /// Full ref name, e.g. `refs/tags/v1^{}`.
    pub name: &'a str,
    /// Capabilities after the NUL byte, without the trailing newline.
    pub capabilities: Option<&'a str>,
}

/// What a single pkt-line frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind<'a> {
    /// `0000`.
    Flush,
    /// `0001`.
    Delimiter,
    /// `0002`.
    ResponseEnd,
    /// A `# service=...` announcement.
    Comment,
    /// A ref line.
    Ref(RefRecord<'a>),
    /// Any other well-framed payload.
    Other,
}

/// One frame of an advertisement and the bytes it occupies in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Byte range of the whole frame, length prefix included.
    pub range: Range<usize>,
    /// Parsed content.
    pub kind: FrameKind<'a>,
}

impl<'a> Frame<'a> {
    /// Returns the ref record if this frame is a ref line.
    pub fn as_ref_record(&self) -> Option<&RefRecord<'a>> {
        match &self.kind {
            FrameKind::Ref(record) => Some(record),
            _ => None,
        }
    }
}

/// Splits an advertisement into frames.
///
/// Fails on a length prefix that is not four hex digits, on the reserved
/// length `0003`, and on a frame that runs past the end of the input.
pub fn parse_advertisement(data: &[u8]) -> Result<Vec<Frame<'_>>> {
    let mut frames = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let header = data.get(pos..pos + 4).ok_or_else(|| {
            GitError::InvalidPktLine(format!("truncated length prefix at offset {pos}"))
        })?;
        let len = parse_length(header, pos)?;

        let (end, kind) = match len {
            0 => (pos + 4, FrameKind::Flush),
            1 => (pos + 4, FrameKind::Delimiter),
            2 => (pos + 4, FrameKind::ResponseEnd),
            3 => {
                return Err(GitError::InvalidPktLine(format!(
                    "reserved length 0003 at offset {pos}"
                )))
            }
            len => {
                let end = pos + len;
                let payload = data.get(pos + 4..end).ok_or_else(|| {
                    GitError::InvalidPktLine(format!(
                        "frame at offset {pos} declares {len} bytes but only {} remain",
                        data.len() - pos
                    ))
                })?;
                (end, classify(payload))
            }
        };

        frames.push(Frame {
            range: pos..end,
            kind,
        });
        pos = end;
    }

    Ok(frames)
}

fn parse_length(header: &[u8], pos: usize) -> Result<usize> {
    // from_str_radix would also accept a leading '+'
    if !header.iter().all(u8::is_ascii_hexdigit) {
        return Err(GitError::InvalidPktLine(format!(
            "invalid length prefix {:?} at offset {pos}",
            String::from_utf8_lossy(header)
        )));
    }
    let digits = std::str::from_utf8(header)
        .map_err(|_| GitError::InvalidPktLine(format!("invalid length prefix at offset {pos}")))?;
    usize::from_str_radix(digits, 16)
        .map_err(|_| GitError::InvalidPktLine(format!("invalid length prefix at offset {pos}")))
}

fn classify(payload: &[u8]) -> FrameKind<'_> {
    if payload.first() == Some(&b'#') {
        return FrameKind::Comment;
    }
    match parse_ref_line(payload) {
        Some(record) => FrameKind::Ref(record),
        None => FrameKind::Other,
    }
}

fn parse_ref_line(payload: &[u8]) -> Option<RefRecord<'_>> {
    let oid = payload.get(..OID_HEX_LEN)?;
    if !oid.iter().all(u8::is_ascii_hexdigit) || payload.get(OID_HEX_LEN) != Some(&b' ') {
        return None;
    }

    let rest = &payload[OID_HEX_LEN + 1..];
    let name_end = rest
        .iter()
        .position(|&b| b == b'\n' || b == b'\0')
        .unwrap_or(rest.len());
    if name_end == 0 {
        return None;
    }

    let capabilities = match rest.get(name_end) {
        Some(b'\0') => {
            let caps = &rest[name_end + 1..];
            let caps = caps.strip_suffix(b"\n").unwrap_or(caps);
            Some(std::str::from_utf8(caps).ok()?)
        }
        _ => None,
    };

    Some(RefRecord {
        oid: std::str::from_utf8(oid).ok()?,
        name: std::str::from_utf8(&rest[..name_end]).ok()?,
        capabilities,
    })
}

/// Rewrites an upstream advertisement so that `HEAD` and `refs/heads/master`
/// both point at the commit `pin` names.
///
/// For branch pins the new `HEAD` line claims `symref=HEAD:refs/heads/master`
/// whatever the pinned branch is called; tag pins carry no symref. Any
/// `symref=` the upstream advertised is renamed to `oldref=`.
///
/// Nothing is written to `out` on error: `HEAD` and the pinned ref must both
/// be present and the replacement lines must fit in a pkt-line.
pub fn rewrite_advertisement<W: Write>(data: &[u8], pin: &PinnedRef, out: W) -> Result<()> {
    let frames = parse_advertisement(data)?;
    let located = Located::find(&frames, pin)?;

    tracing::debug!(
        pin = %pin,
        oid = located.target_oid,
        frames = frames.len(),
        has_master = located.master.is_some(),
        "Rewriting ref advertisement"
    );

    let head_line = head_line(pin.kind(), located.target_oid, located.head.capabilities);
    let head_frame = PktLine::from_string(&head_line).encode()?;
    let master_frame = PktLine::from_string(&format!("{} {MASTER}\n", located.target_oid)).encode()?;

    let mut writer = PktLineWriter::new(out);
    write_excluding(&mut writer, &data[..located.head_range.start], 0, &located.master)?;
    writer.write_raw(&head_frame)?;
    writer.write_raw(&master_frame)?;
    write_excluding(
        &mut writer,
        &data[located.head_range.end..],
        located.head_range.end,
        &located.master,
    )?;
    writer.flush()
}

struct Located<'a> {
    head: RefRecord<'a>,
    head_range: Range<usize>,
    master: Option<Range<usize>>,
    target_oid: &'a str,
}

impl<'a> Located<'a> {
    fn find(frames: &[Frame<'a>], pin: &PinnedRef) -> Result<Self> {
        let mut head = None;
        let mut master = None;

        for frame in frames {
            let Some(record) = frame.as_ref_record() else {
                continue;
            };
            if record.name == HEAD && head.is_none() {
                head = Some((*record, frame.range.clone()));
            } else if record.name == MASTER && master.is_none() {
                master = Some(frame.range.clone());
            }
        }

        let target_oid = find_target(frames, pin);
        let not_found = || GitError::RefNotFound {
            kind: pin.kind(),
            name: pin.name().to_string(),
        };

        let (head, head_range) = head.ok_or_else(not_found)?;
        let target_oid = target_oid.ok_or_else(not_found)?;

        Ok(Self {
            head,
            head_range,
            master,
            target_oid,
        })
    }
}

fn find_target<'a>(frames: &[Frame<'a>], pin: &PinnedRef) -> Option<&'a str> {
    let lookup = |name: &str| {
        frames
            .iter()
            .filter_map(Frame::as_ref_record)
            .find(|record| record.name == name)
            .map(|record| record.oid)
    };

    let full_name = pin.full_name();
    match pin.kind() {
        RefKind::Branch => lookup(&full_name),
        // annotated tags advertise the peeled commit as <tag>^{}
        RefKind::Tag => lookup(&format!("{full_name}^{{}}")).or_else(|| lookup(&full_name)),
    }
}

fn head_line(kind: RefKind, oid: &str, upstream_caps: Option<&str>) -> String {
    let caps = upstream_caps
        .map(|caps| caps.replace("symref=", "oldref="))
        .filter(|caps| !caps.is_empty());

    match (kind, caps) {
        (RefKind::Branch, Some(caps)) => {
            format!("{oid} {HEAD}\0symref={HEAD}:{MASTER} {caps}\n")
        }
        (RefKind::Branch, None) => format!("{oid} {HEAD}\0symref={HEAD}:{MASTER}\n"),
        (RefKind::Tag, Some(caps)) => format!("{oid} {HEAD}\0{caps}\n"),
        (RefKind::Tag, None) => format!("{oid} {HEAD}\n"),
    }
}

/// Writes `chunk` (which starts at `offset` in the original input) with the
/// excised frame range left out.
fn write_excluding<W: Write>(
    writer: &mut PktLineWriter<W>,
    chunk: &[u8],
    offset: usize,
    excised: &Option<Range<usize>>,
) -> Result<()> {
    let chunk_range = offset..offset + chunk.len();
    match excised {
        Some(skip) if skip.start >= chunk_range.start && skip.end <= chunk_range.end => {
            writer.write_raw(&chunk[..skip.start - offset])?;
            writer.write_raw(&chunk[skip.end - offset..])
        }
        _ => writer.write_raw(chunk),
    }
}
