//! Storage for fields the message type does not declare.

use crate::wire::varint::{encode_tag, encode_varint};
use crate::wire::WireKind;
use bytes::{BufMut, Bytes};

/// A field kept verbatim because its number is not declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    number: u32,
    wire_kind: WireKind,
    data: Bytes,
}

impl UnknownField {
    /// Creates an unknown field
    ///
    /// `data` is the varint or fixed-width bytes, the payload of a
    /// length-delimited field without its length prefix, or the body of a
    /// group without its end tag.
    pub fn new(number: u32, wire_kind: WireKind, data: Bytes) -> Self {
        Self {
            number,
            wire_kind,
            data,
        }
    }

    /// Field number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Wire kind
    pub fn wire_kind(&self) -> WireKind {
        self.wire_kind
    }

    /// Raw value bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    fn encode(&self, buf: &mut impl BufMut) {
        encode_tag(self.number, self.wire_kind, buf);
        match self.wire_kind {
            WireKind::LengthDelimited => {
                encode_varint(self.data.len() as u64, buf);
                buf.put_slice(&self.data);
            }
            WireKind::StartGroup => {
                buf.put_slice(&self.data);
                encode_tag(self.number, WireKind::EndGroup, buf);
            }
            _ => buf.put_slice(&self.data),
        }
    }
}

/// Unknown fields in the order they were read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFields {
    fields: Vec<UnknownField>,
}

impl UnknownFields {
    /// Appends a field
    pub fn push(&mut self, field: UnknownField) {
        self.fields.push(field);
    }

    /// Iterates in read order
    pub fn iter(&self) -> impl Iterator<Item = &UnknownField> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Drops every field
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Writes every field exactly as it was read
    pub fn encode(&self, buf: &mut impl BufMut) {
        for field in &self.fields {
            field.encode(buf);
        }
    }

    pub(crate) fn deep_clone(&self) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .map(|f| UnknownField {
                    data: Bytes::copy_from_slice(&f.data),
                    ..f.clone()
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_each_kind() {
        let mut fields = UnknownFields::default();
        fields.push(UnknownField::new(5, WireKind::Varint, Bytes::from_static(&[0x96, 0x01])));
        fields.push(UnknownField::new(6, WireKind::LengthDelimited, Bytes::from_static(b"hi")));
        fields.push(UnknownField::new(2, WireKind::StartGroup, Bytes::from_static(&[0x08, 0x05])));
        fields.push(UnknownField::new(7, WireKind::Fixed32, Bytes::from_static(&[1, 2, 3, 4])));

        let mut buf = Vec::new();
        fields.encode(&mut buf);
        assert_eq!(
            buf,
            vec![
                0x28, 0x96, 0x01, // field 5 varint
                0x32, 0x02, b'h', b'i', // field 6 len
                0x13, 0x08, 0x05, 0x14, // group 2
                0x3D, 1, 2, 3, 4, // field 7 fixed32
            ]
        );
        assert_eq!(fields.len(), 4);
    }
}
