//! Stream-pointer URLs: `<scheme>://<id>.<kind>` (`spec.md` §3, §6).

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Role of a stream endpoint as seen from the side that minted the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Readable,
    Writable,
}

impl PointerKind {
    fn as_str(self) -> &'static str {
        match self {
            PointerKind::Readable => "readable",
            PointerKind::Writable => "writable",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "readable" => Some(PointerKind::Readable),
            "writable" => Some(PointerKind::Writable),
            _ => None,
        }
    }

    /// Whether the mirror endpoint on the receiving side is a source.
    ///
    /// Per §4.2: a `readable` pointer means data flows from the minting side
    /// to the receiver, so the receiver's mirror is a source (it reads what
    /// arrives via notifications). A `writable` pointer means data flows
    /// into the minting side, so the receiver's mirror is a sink.
    pub fn receiver_is_source(self) -> bool {
        matches!(self, PointerKind::Readable)
    }
}

impl fmt::Display for PointerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed or freshly minted `<scheme>://<id>.<kind>` stream pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamPointer {
    url: String,
    scheme_len: usize,
    id: String,
    kind: PointerKind,
}

impl StreamPointer {
    /// Mints a fresh, unique pointer under the given scheme.
    pub fn mint(scheme: &str, kind: PointerKind) -> Self {
        let id = Uuid::new_v4().to_string();
        let url = format!("{scheme}://{id}.{kind}");
        Self {
            url,
            scheme_len: scheme.len(),
            id,
            kind,
        }
    }

    /// Parses a method/URL string as a stream pointer, requiring the given scheme.
    pub fn parse_with_scheme(raw: &str, scheme: &str) -> Option<Self> {
        let pointer = Self::parse(raw)?;
        if pointer.scheme() == scheme {
            Some(pointer)
        } else {
            None
        }
    }

    /// Parses a method/URL string as a stream pointer of any scheme.
    ///
    /// Used to distinguish "well-formed pointer, wrong/unregistered scheme"
    /// (still a candidate for the `unhandled` path, §7 item 6) from
    /// "not pointer-shaped at all" (§7 item 5, invalid stream reference).
    pub fn parse(raw: &str) -> Option<Self> {
        let (scheme, rest) = raw.split_once("://")?;
        if scheme.is_empty() {
            return None;
        }
        let (id, kind_str) = rest.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let kind = PointerKind::parse(kind_str)?;
        Some(Self {
            url: raw.to_string(),
            scheme_len: scheme.len(),
            id: id.to_string(),
            kind,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_len]
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> PointerKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for StreamPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl FromStr for StreamPointer {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}
