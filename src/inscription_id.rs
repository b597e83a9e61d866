use super::*;

/// The id of an inscription, `<TXID>i<INDEX>`, where `TXID` is the
/// transaction id of the reveal transaction and `INDEX` is the zero-based
/// index of the inscription among the envelopes the transaction reveals.
#[derive(
  Debug, PartialEq, Copy, Clone, Hash, Eq, PartialOrd, Ord, DeserializeFromStr, SerializeDisplay,
)]
pub struct InscriptionId {
  pub txid: Txid,
  pub index: u32,
}

impl Default for InscriptionId {
  fn default() -> Self {
    Self {
      txid: Txid::all_zeros(),
      index: 0,
    }
  }
}

impl InscriptionId {
  /// Binary form: the 32 txid bytes followed by the little-endian index
  /// with trailing zero bytes trimmed, so an index of zero contributes no
  /// suffix at all.
  pub fn value(self) -> Vec<u8> {
    let index = self.index.to_le_bytes();
    let mut suffix = index.as_slice();

    while suffix.last() == Some(&0) {
      suffix = &suffix[..suffix.len() - 1];
    }

    self
      .txid
      .to_byte_array()
      .iter()
      .chain(suffix)
      .copied()
      .collect()
  }

  /// Inverse of [`InscriptionId::value`]. An index suffix shorter than
  /// four bytes must not carry trailing zeroes; a full four-byte suffix
  /// may, since fixed-width encoders emit it padded.
  pub fn from_value(value: &[u8]) -> Option<Self> {
    if value.len() < Txid::LEN || value.len() > Txid::LEN + 4 {
      return None;
    }

    let (txid, index) = value.split_at(Txid::LEN);

    if let Some(last) = index.last() {
      if index.len() != 4 && *last == 0 {
        return None;
      }
    }

    let mut padded = [0; 4];
    padded[..index.len()].copy_from_slice(index);

    Some(Self {
      txid: Txid::from_slice(txid).ok()?,
      index: u32::from_le_bytes(padded),
    })
  }
}

impl Display for InscriptionId {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}i{}", self.txid, self.index)
  }
}

#[derive(Debug, Error)]
pub enum ParseError {
  #[error("invalid character: `{0}`")]
  Character(char),
  #[error("invalid index: {0}")]
  Index(std::num::ParseIntError),
  #[error("index `{0}` does not round trip through base 10")]
  IndexForm(String),
  #[error("invalid length: {0}")]
  Length(usize),
  #[error("invalid separator: `{0}`")]
  Separator(char),
  #[error("invalid txid: {0}")]
  Txid(bitcoin::hex::HexToArrayError),
}

impl FromStr for InscriptionId {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Some(char) = s.chars().find(|char| !char.is_ascii()) {
      return Err(ParseError::Character(char));
    }

    const TXID_LEN: usize = 64;
    const MIN_LEN: usize = TXID_LEN + 2;

    if s.len() < MIN_LEN {
      return Err(ParseError::Length(s.len()));
    }

    let txid = &s[..TXID_LEN];

    let separator = s.chars().nth(TXID_LEN).unwrap();

    if separator != 'i' {
      return Err(ParseError::Separator(separator));
    }

    let index = &s[TXID_LEN + 1..];

    let parsed = index.parse::<u32>().map_err(ParseError::Index)?;

    if parsed.to_string() != index {
      return Err(ParseError::IndexForm(index.into()));
    }

    Ok(Self {
      txid: txid.parse().map_err(ParseError::Txid)?,
      index: parsed,
    })
  }
}
