//! Predecessor (dependency) edge model.
//!
//! An edge `{from, to, type, offset}` says that `to` is scheduled relative
//! to `from`. Edges are stored on both endpoints; the text form of a
//! task's incoming edges is its `predecessors_name`, e.g. `"2FS,3SS+2d"`.
//!
//! # Text form
//!
//! Each token is `{fromId}{type}{±offset}{unit}`. The type defaults to
//! `FS`, a zero offset is omitted, and the unit defaults to the caller's
//! duration unit when absent (`"2FS+3"`, `"2 FS + 3 days"` and `"2FS+3d"`
//! are equivalent for a day-based project).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DurationUnit, TaskId};

/// Relationship between the predecessor and successor dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// Successor starts after predecessor finishes.
    FS,
    /// Successor starts after predecessor starts.
    SS,
    /// Successor finishes after predecessor finishes.
    FF,
    /// Successor finishes after predecessor starts.
    SF,
}

impl LinkType {
    const ALL: [LinkType; 4] = [LinkType::FS, LinkType::SS, LinkType::FF, LinkType::SF];

    /// Two-letter code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FS => "FS",
            Self::SS => "SS",
            Self::FF => "FF",
            Self::SF => "SF",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == code)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, offset dependency between two tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredecessorEdge {
    /// Predecessor task.
    pub from: TaskId,
    /// Successor task.
    pub to: TaskId,
    /// Link type.
    pub link_type: LinkType,
    /// Signed lag (negative = lead).
    pub offset: f64,
    /// Unit of `offset`.
    pub offset_unit: DurationUnit,
}

impl PredecessorEdge {
    /// Creates a zero-offset edge.
    pub fn new(from: impl Into<TaskId>, to: impl Into<TaskId>, link_type: LinkType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            link_type,
            offset: 0.0,
            offset_unit: DurationUnit::Day,
        }
    }

    /// Sets the offset.
    pub fn with_offset(mut self, offset: f64, unit: DurationUnit) -> Self {
        self.offset = offset;
        self.offset_unit = unit;
        self
    }

    /// Whether this edge connects the same pair as `other`.
    pub fn same_link(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to
    }

    /// Whether either endpoint is `id`.
    pub fn touches(&self, id: &TaskId) -> bool {
        &self.from == id || &self.to == id
    }

    /// The endpoint that is not `id`.
    pub fn other_end(&self, id: &TaskId) -> &TaskId {
        if &self.from == id {
            &self.to
        } else {
            &self.from
        }
    }

    /// Display token, e.g. `"2FS+3d"`.
    pub fn token(&self) -> String {
        let mut out = format!("{}{}", self.from, self.link_type);
        if self.offset != 0.0 {
            let sign = if self.offset > 0.0 { '+' } else { '-' };
            out.push(sign);
            out.push_str(&format_number(self.offset.abs()));
            out.push_str(self.offset_unit.suffix());
        }
        out
    }

    /// Parses one token into an edge pointing at `to`.
    ///
    /// Returns `None` for empty tokens or unparseable offsets.
    pub fn parse_token(token: &str, to: &TaskId, default_unit: DurationUnit) -> Option<Self> {
        let text = token.trim();
        if text.is_empty() {
            return None;
        }
        let upper = text.to_ascii_uppercase();

        let split = (1..upper.len().saturating_sub(1)).find_map(|i| {
            if !upper.is_char_boundary(i) || !upper.is_char_boundary(i + 2) {
                return None;
            }
            let link_type = LinkType::from_code(&upper[i..i + 2])?;
            let rest = upper[i + 2..].trim_start();
            if rest.is_empty() || rest.starts_with('+') || rest.starts_with('-') {
                Some((i, link_type))
            } else {
                None
            }
        });

        let (from, link_type, rest) = match split {
            Some((i, link_type)) => (text[..i].trim(), link_type, text[i + 2..].trim()),
            None => (text, LinkType::FS, ""),
        };
        if from.is_empty() {
            return None;
        }

        let (offset, offset_unit) = parse_offset(rest, default_unit)?;
        Some(Self {
            from: TaskId::new(from),
            to: to.clone(),
            link_type,
            offset,
            offset_unit,
        })
    }

    /// Parses a comma-separated dependency string for task `to`.
    ///
    /// Malformed tokens are skipped.
    pub fn parse_list(text: &str, to: &TaskId, default_unit: DurationUnit) -> Vec<Self> {
        text.split(',')
            .filter_map(|t| Self::parse_token(t, to, default_unit))
            .collect()
    }
}

/// Builds the display string of `own_id`'s incoming edges.
pub fn predecessors_name(edges: &[PredecessorEdge], own_id: &TaskId) -> String {
    edges
        .iter()
        .filter(|e| &e.to == own_id)
        .map(PredecessorEdge::token)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_offset(rest: &str, default_unit: DurationUnit) -> Option<(f64, DurationUnit)> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Some((0.0, default_unit));
    }
    let (sign, body) = match rest.chars().next() {
        Some('+') => (1.0, &rest[1..]),
        Some('-') => (-1.0, &rest[1..]),
        _ => (1.0, rest),
    };
    let body = body.trim_start();
    let number_len = body
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(body.len());
    let value: f64 = body[..number_len].parse().ok()?;
    let unit_text = body[number_len..].trim();
    let unit = if unit_text.is_empty() {
        default_unit
    } else {
        DurationUnit::parse(unit_text)?
    };
    Some((sign * value, unit))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        let s = format!("{value:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: &str) -> TaskId {
        TaskId::from(id)
    }

    #[test]
    fn test_parse_plain_id() {
        let e = PredecessorEdge::parse_token("2", &t("5"), DurationUnit::Day).unwrap();
        assert_eq!(e.from, t("2"));
        assert_eq!(e.to, t("5"));
        assert_eq!(e.link_type, LinkType::FS);
        assert_eq!(e.offset, 0.0);
    }

    #[test]
    fn test_parse_type_and_offset() {
        let e = PredecessorEdge::parse_token("3SS+2d", &t("5"), DurationUnit::Day).unwrap();
        assert_eq!(e.link_type, LinkType::SS);
        assert_eq!(e.offset, 2.0);
        assert_eq!(e.offset_unit, DurationUnit::Day);

        let e = PredecessorEdge::parse_token("4 ff - 3 hours", &t("5"), DurationUnit::Day).unwrap();
        assert_eq!(e.from, t("4"));
        assert_eq!(e.link_type, LinkType::FF);
        assert_eq!(e.offset, -3.0);
        assert_eq!(e.offset_unit, DurationUnit::Hour);
    }

    #[test]
    fn test_parse_offset_without_unit_uses_default() {
        let e = PredecessorEdge::parse_token("1SF+4", &t("2"), DurationUnit::Hour).unwrap();
        assert_eq!(e.offset_unit, DurationUnit::Hour);
        assert_eq!(e.offset, 4.0);
    }

    #[test]
    fn test_parse_id_ending_in_type_letters() {
        let e = PredecessorEdge::parse_token("TFFFS", &t("X"), DurationUnit::Day).unwrap();
        assert_eq!(e.from, t("TFF"));
        assert_eq!(e.link_type, LinkType::FS);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(PredecessorEdge::parse_token("  ", &t("1"), DurationUnit::Day).is_none());
        assert!(PredecessorEdge::parse_token("2FS+xd", &t("1"), DurationUnit::Day).is_none());
        assert!(PredecessorEdge::parse_token("2FS+3 weeks", &t("1"), DurationUnit::Day).is_none());
    }

    #[test]
    fn test_parse_list_skips_malformed() {
        let edges = PredecessorEdge::parse_list("1FS, ,2SS+1d,3FS+q", &t("9"), DurationUnit::Day);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[1].from, t("2"));
    }

    #[test]
    fn test_token_format() {
        let e = PredecessorEdge::new(2, 5, LinkType::FS);
        assert_eq!(e.token(), "2FS");
        let e = e.with_offset(-1.5, DurationUnit::Day);
        assert_eq!(e.token(), "2FS-1.5d");
        let e = PredecessorEdge::new(3, 5, LinkType::SS).with_offset(4.0, DurationUnit::Hour);
        assert_eq!(e.token(), "3SS+4h");
    }

    #[test]
    fn test_predecessors_name_lists_incoming_only() {
        let edges = vec![
            PredecessorEdge::new(1, 2, LinkType::FS),
            PredecessorEdge::new(2, 3, LinkType::SS),
            PredecessorEdge::new(4, 2, LinkType::FF).with_offset(2.0, DurationUnit::Day),
        ];
        assert_eq!(predecessors_name(&edges, &t("2")), "1FS,4FF+2d");
        assert_eq!(predecessors_name(&edges, &t("1")), "");
    }

    #[test]
    fn test_other_end() {
        let e = PredecessorEdge::new(1, 2, LinkType::FS);
        assert_eq!(e.other_end(&t("1")), &t("2"));
        assert_eq!(e.other_end(&t("2")), &t("1"));
        assert!(e.touches(&t("1")));
        assert!(!e.touches(&t("3")));
    }
}
