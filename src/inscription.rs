use super::*;

/// A single inscription: the raw payloads of its tagged fields, its body,
/// and whether recovering it from a script required non-canonical ops.
///
/// Field payloads are kept as the bytes that ride the script; the typed
/// accessors below decode them on demand, so a malformed field never
/// prevents the inscription itself from round-tripping.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Eq, Default)]
pub struct Inscription {
  pub body: Vec<u8>,
  pub content_encoding: Option<Vec<u8>>,
  pub content_type: Option<Vec<u8>>,
  pub cursed: bool,
  pub delegate: Option<Vec<u8>>,
  pub metadata: Option<Vec<u8>>,
  pub metaprotocol: Option<Vec<u8>>,
  pub note: Option<Vec<u8>>,
  pub parents: Vec<Vec<u8>>,
  pub pointer: Option<Vec<u8>>,
  pub rune: Option<Vec<u8>>,
  pub unknown: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Inscription {
  /// Little-endian with trailing zero bytes trimmed, the wire form of the
  /// pointer field. A pointer of zero encodes as the empty payload.
  pub fn pointer_value(pointer: u64) -> Vec<u8> {
    let mut bytes = pointer.to_le_bytes().to_vec();

    while bytes.last().copied() == Some(0) {
      bytes.pop();
    }

    bytes
  }

  /// Same trimming as [`Inscription::pointer_value`], at rune width.
  pub fn rune_value(rune: u128) -> Vec<u8> {
    let mut bytes = rune.to_le_bytes().to_vec();

    while bytes.last().copied() == Some(0) {
      bytes.pop();
    }

    bytes
  }

  pub(crate) fn append_reveal_script_to_builder(
    &self,
    mut builder: script::Builder,
  ) -> script::Builder {
    builder = builder
      .push_opcode(opcodes::OP_FALSE)
      .push_opcode(opcodes::all::OP_IF)
      .push_slice(envelope::PROTOCOL_ID);

    Tag::ContentType.append(&mut builder, &self.content_type);
    Tag::Pointer.append(&mut builder, &self.pointer);
    Tag::Parent.append_array(&mut builder, &self.parents);
    Tag::Metadata.append(&mut builder, &self.metadata);
    Tag::Metaprotocol.append(&mut builder, &self.metaprotocol);
    Tag::ContentEncoding.append(&mut builder, &self.content_encoding);
    Tag::Delegate.append(&mut builder, &self.delegate);
    Tag::Rune.append(&mut builder, &self.rune);
    Tag::Note.append(&mut builder, &self.note);

    for (tag, value) in &self.unknown {
      builder = tag::append_pairs(builder, tag, value);
    }

    builder = builder.push_slice(envelope::BODY_TAG);

    for chunk in self.body.chunks(MAX_SCRIPT_ELEMENT_SIZE) {
      builder = builder.push_slice::<&script::PushBytes>(chunk.try_into().unwrap());
    }

    builder.push_opcode(opcodes::all::OP_ENDIF)
  }

  #[cfg(test)]
  pub(crate) fn append_reveal_script(&self, builder: script::Builder) -> ScriptBuf {
    self.append_reveal_script_to_builder(builder).into_script()
  }

  pub fn body(&self) -> &[u8] {
    &self.body
  }

  pub fn into_body(self) -> Vec<u8> {
    self.body
  }

  pub fn content_length(&self) -> usize {
    self.body.len()
  }

  pub fn content_type(&self) -> Option<&str> {
    str::from_utf8(self.content_type.as_ref()?).ok()
  }

  pub fn content_encoding(&self) -> Option<&str> {
    str::from_utf8(self.content_encoding.as_ref()?).ok()
  }

  pub fn metaprotocol(&self) -> Option<&str> {
    str::from_utf8(self.metaprotocol.as_ref()?).ok()
  }

  pub fn note(&self) -> Option<&str> {
    str::from_utf8(self.note.as_ref()?).ok()
  }

  pub fn metadata(&self) -> Option<cbor::Value> {
    cbor::decode(self.metadata.as_ref()?).ok()
  }

  pub fn delegate(&self) -> Option<InscriptionId> {
    InscriptionId::from_value(self.delegate.as_deref()?)
  }

  pub fn parents(&self) -> Vec<InscriptionId> {
    self
      .parents
      .iter()
      .filter_map(|parent| InscriptionId::from_value(parent))
      .collect()
  }

  pub fn pointer(&self) -> Option<u64> {
    Self::integer_field(self.pointer.as_deref()?, 8).map(|pointer| {
      let mut padded = [0; 8];
      padded[..pointer.len()].copy_from_slice(pointer);
      u64::from_le_bytes(padded)
    })
  }

  pub fn rune(&self) -> Option<u128> {
    Self::integer_field(self.rune.as_deref()?, 16).map(|rune| {
      let mut padded = [0; 16];
      padded[..rune.len()].copy_from_slice(rune);
      u128::from_le_bytes(padded)
    })
  }

  // Bytes beyond the integer's width must all be zero; the significant
  // prefix is returned for the caller to widen.
  fn integer_field(value: &[u8], width: usize) -> Option<&[u8]> {
    if value.iter().skip(width).any(|&byte| byte != 0) {
      return None;
    }

    Some(&value[..value.len().min(width)])
  }

  #[cfg(test)]
  pub(crate) fn to_script(&self) -> ScriptBuf {
    self.append_reveal_script(script::Builder::new())
  }
}
