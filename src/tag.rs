use super::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Tag {
  ContentType,
  Pointer,
  Parent,
  Metadata,
  Metaprotocol,
  ContentEncoding,
  Delegate,
  Rune,
  Note,
}

impl Tag {
  pub(crate) fn bytes(self) -> &'static [u8] {
    match self {
      Self::ContentType => &[1],
      Self::Pointer => &[2],
      Self::Parent => &[3],
      Self::Metadata => &[5],
      Self::Metaprotocol => &[7],
      Self::ContentEncoding => &[9],
      Self::Delegate => &[11],
      Self::Rune => &[13],
      Self::Note => &[15],
    }
  }

  pub(crate) fn from_bytes(bytes: &[u8]) -> Option<Self> {
    match bytes {
      [1] => Some(Self::ContentType),
      [2] => Some(Self::Pointer),
      [3] => Some(Self::Parent),
      [5] => Some(Self::Metadata),
      [7] => Some(Self::Metaprotocol),
      [9] => Some(Self::ContentEncoding),
      [11] => Some(Self::Delegate),
      [13] => Some(Self::Rune),
      [15] => Some(Self::Note),
      _ => None,
    }
  }

  pub(crate) fn append(self, builder: &mut script::Builder, value: &Option<Vec<u8>>) {
    if let Some(value) = value {
      let mut tmp = script::Builder::new();
      mem::swap(&mut tmp, builder);

      tmp = append_pairs(tmp, self.bytes(), value);

      mem::swap(&mut tmp, builder);
    }
  }

  pub(crate) fn append_array(self, builder: &mut script::Builder, values: &Vec<Vec<u8>>) {
    let mut tmp = script::Builder::new();
    mem::swap(&mut tmp, builder);

    for value in values {
      tmp = append_pairs(tmp, self.bytes(), value);
    }

    mem::swap(&mut tmp, builder);
  }

  pub(crate) fn take(self, fields: &mut BTreeMap<&[u8], Vec<&[u8]>>) -> Option<Vec<u8>> {
    let values = fields.remove(self.bytes())?;
    Some(values.into_iter().flatten().copied().collect())
  }

  pub(crate) fn take_array(self, fields: &mut BTreeMap<&[u8], Vec<&[u8]>>) -> Vec<Vec<u8>> {
    fields
      .remove(self.bytes())
      .unwrap_or_default()
      .into_iter()
      .map(<[u8]>::to_vec)
      .collect()
  }
}

// A present field always produces at least one pair, so an empty payload
// survives the round trip; anything longer is split at the script element
// limit with the tag byte repeated ahead of every chunk.
pub(crate) fn append_pairs(
  mut builder: script::Builder,
  tag: &[u8],
  value: &[u8],
) -> script::Builder {
  if value.is_empty() {
    return builder
      .push_slice::<&script::PushBytes>(tag.try_into().unwrap())
      .push_slice::<&script::PushBytes>(value.try_into().unwrap());
  }

  for chunk in value.chunks(MAX_SCRIPT_ELEMENT_SIZE) {
    builder = builder
      .push_slice::<&script::PushBytes>(tag.try_into().unwrap())
      .push_slice::<&script::PushBytes>(chunk.try_into().unwrap());
  }

  builder
}
