//! Key encoding and decoding utilities
//!
//! All container kinds share one flat keyspace. Every key starts with a
//! [`KeyTag`] byte; names are length-prefixed so that field bytes can never be
//! mistaken for a separator:
//!
//! - Hash field: `h{len}{name}{field}`
//! - Hash size counter: `H{len}{name}`
//! - Plain key: `k{len}{name}`
//! - Set / sorted set / list counters: `S{len}{name}`, `Z{len}{name}`, `L{len}{name}`
//! - Binlog record: `\x01{seq: u64 BE}`
//! - Binlog sequence: `M:binlog_seq`
//!
//! For a fixed name, ascending field bytes give ascending keys, and the rows of
//! two distinct names never interleave.

use thiserror::Error;

/// Maximum container name length in bytes (fits the u8 length prefix)
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Key family discriminator, first byte of every stored key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyTag {
    Binlog = 0x01,
    Meta = b'M',
    Kv = b'k',
    Hash = b'h',
    HashSize = b'H',
    Set = b'e',
    SetSize = b'S',
    ZSet = b's',
    ZScore = b'z',
    ZSetSize = b'Z',
    List = b'q',
    ListSize = b'L',
}

impl KeyTag {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for KeyTag {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let tag = match byte {
            0x01 => KeyTag::Binlog,
            b'M' => KeyTag::Meta,
            b'k' => KeyTag::Kv,
            b'h' => KeyTag::Hash,
            b'H' => KeyTag::HashSize,
            b'e' => KeyTag::Set,
            b'S' => KeyTag::SetSize,
            b's' => KeyTag::ZSet,
            b'z' => KeyTag::ZScore,
            b'Z' => KeyTag::ZSetSize,
            b'q' => KeyTag::List,
            b'L' => KeyTag::ListSize,
            other => return Err(DecodeError::UnknownTag(other)),
        };
        Ok(tag)
    }
}

/// Container kinds sharing the keyspace
///
/// A name belongs to a kind while its marker row exists: the value row for
/// plain keys, the size counter for collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Kv,
    Hash,
    Set,
    ZSet,
    List,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 5] = [
        ContainerKind::Hash,
        ContainerKind::Kv,
        ContainerKind::Set,
        ContainerKind::ZSet,
        ContainerKind::List,
    ];

    /// Tag of the row that binds a name to this kind
    pub fn marker_tag(self) -> KeyTag {
        match self {
            ContainerKind::Kv => KeyTag::Kv,
            ContainerKind::Hash => KeyTag::HashSize,
            ContainerKind::Set => KeyTag::SetSize,
            ContainerKind::ZSet => KeyTag::ZSetSize,
            ContainerKind::List => KeyTag::ListSize,
        }
    }

    /// Redis TYPE name
    pub fn type_name(self) -> &'static str {
        match self {
            ContainerKind::Kv => "string",
            ContainerKind::Hash => "hash",
            ContainerKind::Set => "set",
            ContainerKind::ZSet => "zset",
            ContainerKind::List => "list",
        }
    }
}

/// Malformed key or row read back from storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty key")]
    Empty,
    #[error("unknown key tag: {0:#04x}")]
    UnknownTag(u8),
    #[error("unexpected key tag: expected {expected:?}, found {found:?}")]
    UnexpectedTag { expected: KeyTag, found: KeyTag },
    #[error("truncated key: name length {declared}, {available} bytes available")]
    Truncated { declared: usize, available: usize },
    #[error("trailing bytes after name: {0}")]
    TrailingBytes(usize),
    #[error("invalid binlog key length: {0}")]
    BinlogKeyLength(usize),
    #[error("row belongs to another name")]
    ForeignName,
    #[error("invalid size counter value: {0:?}")]
    InvalidCounter(String),
    #[error("invalid binlog record: {0}")]
    InvalidRecord(String),
}

/// Decoded hash field key, borrowing from the raw key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldKey<'a> {
    pub name: &'a [u8],
    pub field: &'a [u8],
}

/// Build `{tag}{len}{name}` with room for `extra` trailing bytes
fn name_key(tag: KeyTag, name: &[u8], extra: usize) -> Vec<u8> {
    debug_assert!(name.len() <= MAX_NAME_LEN);
    let mut result = Vec::with_capacity(2 + name.len() + extra);
    result.push(tag.as_byte());
    result.push(name.len() as u8);
    result.extend_from_slice(name);
    result
}

/// Build hash field key: `h{len}{name}{field}`
pub fn encode_field_key(name: &[u8], field: &[u8]) -> Vec<u8> {
    let mut result = name_key(KeyTag::Hash, name, field.len());
    result.extend_from_slice(field);
    result
}

/// Build hash field prefix for iteration: `h{len}{name}`
pub fn encode_field_prefix(name: &[u8]) -> Vec<u8> {
    name_key(KeyTag::Hash, name, 0)
}

/// Build hash size counter key: `H{len}{name}`
pub fn encode_counter_key(name: &[u8]) -> Vec<u8> {
    encode_marker_key(ContainerKind::Hash, name)
}

/// Build the key whose presence binds `name` to `kind`
pub fn encode_marker_key(kind: ContainerKind, name: &[u8]) -> Vec<u8> {
    name_key(kind.marker_tag(), name, 0)
}

/// Build binlog record key: `\x01{seq}` (big-endian, so keys sort by sequence)
pub fn encode_binlog_key(seq: u64) -> Vec<u8> {
    let mut result = Vec::with_capacity(9);
    result.push(KeyTag::Binlog.as_byte());
    result.extend_from_slice(&seq.to_be_bytes());
    result
}

/// Key holding the last assigned binlog sequence
pub fn binlog_seq_key() -> Vec<u8> {
    let mut result = vec![KeyTag::Meta.as_byte(), b':'];
    result.extend_from_slice(b"binlog_seq");
    result
}

/// Split `{tag}{len}{name}{rest}`, checking the tag
fn split_name_key(raw: &[u8], expected: KeyTag) -> Result<(&[u8], &[u8]), DecodeError> {
    let (&first, rest) = raw.split_first().ok_or(DecodeError::Empty)?;
    let found = KeyTag::try_from(first)?;
    if found != expected {
        return Err(DecodeError::UnexpectedTag { expected, found });
    }
    let (&len, rest) = rest.split_first().ok_or(DecodeError::Truncated {
        declared: 0,
        available: 0,
    })?;
    let len = len as usize;
    if rest.len() < len {
        return Err(DecodeError::Truncated {
            declared: len,
            available: rest.len(),
        });
    }
    Ok(rest.split_at(len))
}

/// Decode a hash field key produced by [`encode_field_key`]
pub fn decode_field_key(raw: &[u8]) -> Result<FieldKey<'_>, DecodeError> {
    let (name, field) = split_name_key(raw, KeyTag::Hash)?;
    Ok(FieldKey { name, field })
}

/// Decode a hash size counter key, returning the name
pub fn decode_counter_key(raw: &[u8]) -> Result<&[u8], DecodeError> {
    let (name, rest) = split_name_key(raw, KeyTag::HashSize)?;
    if !rest.is_empty() {
        return Err(DecodeError::TrailingBytes(rest.len()));
    }
    Ok(name)
}

/// Decode a binlog record key, returning the sequence
pub fn decode_binlog_key(raw: &[u8]) -> Result<u64, DecodeError> {
    let (&first, rest) = raw.split_first().ok_or(DecodeError::Empty)?;
    let found = KeyTag::try_from(first)?;
    if found != KeyTag::Binlog {
        return Err(DecodeError::UnexpectedTag {
            expected: KeyTag::Binlog,
            found,
        });
    }
    let bytes: [u8; 8] = rest
        .try_into()
        .map_err(|_| DecodeError::BinlogKeyLength(raw.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Smallest key greater than every key starting with `prefix`
///
/// `None` when no such key exists (prefix is all `0xff`).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut result = prefix.to_vec();
    while let Some(last) = result.pop() {
        if last < u8::MAX {
            result.push(last + 1);
            return Some(result);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_key_layout() {
        let key = encode_field_key(b"user", b"name");
        assert_eq!(key, b"h\x04username".to_vec());
        assert!(key.starts_with(&encode_field_prefix(b"user")));
        assert_eq!(encode_counter_key(b"user"), b"H\x04user".to_vec());
    }

    #[test]
    fn test_field_ordering_within_name() {
        let fields: [&[u8]; 5] = [b"", b"\x00", b"a", b"a\x00", b"b"];
        let keys: Vec<Vec<u8>> = fields.iter().map(|f| encode_field_key(b"n", f)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_names_do_not_interleave() {
        // "ab" + field "c" must not collide with "a" + field "bc"
        let a = encode_field_key(b"a", b"bc");
        let b = encode_field_key(b"ab", b"c");
        assert_ne!(a, b);

        let prefix = encode_field_prefix(b"a");
        assert!(!b.starts_with(&prefix));
        let upper = prefix_successor(&prefix).unwrap();
        assert!(a.as_slice() < upper.as_slice());
    }

    #[test]
    fn test_decode_field_key_roundtrip_with_separator_bytes() {
        let key = encode_field_key(b"na:me", b":\x00\xff:");
        let decoded = decode_field_key(&key).unwrap();
        assert_eq!(decoded.name, b"na:me");
        assert_eq!(decoded.field, b":\x00\xff:");
    }

    #[test]
    fn test_decode_field_key_errors() {
        assert_eq!(decode_field_key(b""), Err(DecodeError::Empty));
        assert_eq!(decode_field_key(b"x\x01a"), Err(DecodeError::UnknownTag(b'x')));
        assert_eq!(
            decode_field_key(b"H\x01a"),
            Err(DecodeError::UnexpectedTag {
                expected: KeyTag::Hash,
                found: KeyTag::HashSize
            })
        );
        assert_eq!(
            decode_field_key(b"h\x05ab"),
            Err(DecodeError::Truncated {
                declared: 5,
                available: 2
            })
        );
        assert!(matches!(
            decode_field_key(b"h"),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_counter_key() {
        let key = encode_counter_key(b"h1");
        assert_eq!(decode_counter_key(&key).unwrap(), b"h1");
        assert_eq!(
            decode_counter_key(b"H\x01ab"),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_binlog_key() {
        let k1 = encode_binlog_key(1);
        let k2 = encode_binlog_key(256);
        assert!(k1 < k2);
        assert_eq!(decode_binlog_key(&k2).unwrap(), 256);
        assert_eq!(
            decode_binlog_key(&k2[..5]),
            Err(DecodeError::BinlogKeyLength(5))
        );
    }

    #[test]
    fn test_tag_roundtrip() {
        for tag in [
            KeyTag::Binlog,
            KeyTag::Meta,
            KeyTag::Kv,
            KeyTag::Hash,
            KeyTag::HashSize,
            KeyTag::Set,
            KeyTag::SetSize,
            KeyTag::ZSet,
            KeyTag::ZScore,
            KeyTag::ZSetSize,
            KeyTag::List,
            KeyTag::ListSize,
        ] {
            assert_eq!(KeyTag::try_from(tag.as_byte()), Ok(tag));
        }
    }

    #[test]
    fn test_marker_keys_are_distinct_per_kind() {
        let mut keys: Vec<Vec<u8>> = ContainerKind::ALL
            .iter()
            .map(|k| encode_marker_key(*k, b"x"))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), ContainerKind::ALL.len());
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(b"a\xff"), Some(b"b".to_vec()));
        assert_eq!(prefix_successor(b"\xff\xff"), None);
    }
}
