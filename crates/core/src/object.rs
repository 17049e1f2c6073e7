use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::image::Image;

const BYTES_PER_LINE: usize = 16;

/// Render the sparse text object format: `@XXXX` address markers followed
/// by two-digit byte tokens, sixteen per line. A new marker precedes every
/// non-contiguous run; unwritten cells are skipped.
pub fn format_object(image: &Image) -> String {
    let mut out = String::new();
    let mut last: i64 = -2;
    let mut column = 0;

    for (addr, byte) in image.iter_written() {
        if i64::from(addr) != last + 1 {
            if column != 0 {
                out.push('\n');
                column = 0;
            }
            let _ = writeln!(out, "@{addr:04X}");
        }

        let _ = write!(out, "{byte:02X}");
        column += 1;
        if column < BYTES_PER_LINE {
            out.push(' ');
        } else {
            out.push('\n');
            column = 0;
        }

        last = i64::from(addr);
    }

    if column != 0 {
        // Drop the trailing separator space on a partial final line.
        out.pop();
        out.push('\n');
    }
    out
}

pub fn write_object(path: &Path, image: &Image) -> io::Result<()> {
    fs::write(path, format_object(image))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectError {
    #[error("invalid object token '{token}'")]
    InvalidToken { token: String },
    #[error("byte token before any '@' address marker")]
    MissingAddress,
    #[error("object data runs past $FFFF")]
    AddressOverflow,
}

/// Replay an object file onto a fresh image. The writer's counterpart;
/// also what keeps the format honest in tests.
pub fn read_object(text: &str) -> Result<Image, ObjectError> {
    let mut image = Image::new();
    let mut addr: Option<u32> = None;

    for token in text.split_whitespace() {
        if let Some(marker) = token.strip_prefix('@') {
            if marker.len() != 4 {
                return Err(ObjectError::InvalidToken {
                    token: token.to_string(),
                });
            }
            let value =
                u32::from_str_radix(marker, 16).map_err(|_| ObjectError::InvalidToken {
                    token: token.to_string(),
                })?;
            addr = Some(value);
            continue;
        }

        if token.len() != 2 {
            return Err(ObjectError::InvalidToken {
                token: token.to_string(),
            });
        }
        let byte = u8::from_str_radix(token, 16).map_err(|_| ObjectError::InvalidToken {
            token: token.to_string(),
        })?;

        let at = addr.ok_or(ObjectError::MissingAddress)?;
        if at > 0xFFFF {
            return Err(ObjectError::AddressOverflow);
        }
        image.set(at, byte);
        addr = Some(at + 1);
    }

    Ok(image)
}
