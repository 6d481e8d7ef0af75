//! Playlist position lists
//!
//! Users name playlist entries by 1-based position: a single position
//! (`3`), an inclusive range (`1-4`) or an open range (`5-`), separated by
//! commas. Parsed lists hold 0-based positions and are resolved against a
//! playlist length before use, which also drops anything past the end.

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PositionRange {
    start: usize,
    /// Inclusive; `None` runs to the end of the playlist
    end: Option<usize>,
}

/// Parsed playlist position list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistPositions {
    ranges: Vec<PositionRange>,
}

fn parse_position(text: &str, list: &str) -> Result<usize> {
    let value: usize = text
        .trim()
        .parse()
        .map_err(|_| Error::InvalidPositions(format!("{:?} is not a position in {:?}", text, list)))?;
    if value == 0 {
        return Err(Error::InvalidPositions(format!("positions start at 1 in {:?}", list)));
    }
    Ok(value - 1)
}

impl PlaylistPositions {
    pub fn parse(list: &str) -> Result<Self> {
        let mut ranges = Vec::new();

        for item in list.split(',') {
            let item = item.trim();
            if item.is_empty() {
                return Err(Error::InvalidPositions(format!("empty item in {:?}", list)));
            }

            let range = match item.split_once('-') {
                None => {
                    let pos = parse_position(item, list)?;
                    PositionRange {
                        start: pos,
                        end: Some(pos),
                    }
                }
                Some((start, "")) => PositionRange {
                    start: parse_position(start, list)?,
                    end: None,
                },
                Some((start, end)) => {
                    let start = parse_position(start, list)?;
                    let end = parse_position(end, list)?;
                    if end < start {
                        return Err(Error::InvalidPositions(format!(
                            "range {:?} runs backwards",
                            item
                        )));
                    }
                    PositionRange {
                        start,
                        end: Some(end),
                    }
                }
            };
            ranges.push(range);
        }

        Ok(Self { ranges })
    }

    fn resolve(&self, len: usize) -> BTreeSet<usize> {
        let mut positions = BTreeSet::new();
        for range in &self.ranges {
            let end = range.end.map_or(len, |e| (e + 1).min(len));
            positions.extend(range.start..end);
        }
        positions
    }

    /// Distinct positions below `len`, lowest first
    pub fn ascending(&self, len: usize) -> Vec<usize> {
        self.resolve(len).into_iter().collect()
    }

    /// Distinct positions below `len`, highest first
    pub fn descending(&self, len: usize) -> Vec<usize> {
        self.resolve(len).into_iter().rev().collect()
    }
}

impl FromStr for PlaylistPositions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
