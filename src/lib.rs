//! Types for encoding, decoding, and validating ordinals inscriptions:
//! the envelope framing that embeds them in a taproot leaf script, the
//! restricted CBOR profile their metadata rides in, and the reveal
//! script that spends them.

use {
  self::{envelope::RawEnvelope, tag::Tag},
  bitcoin::{
    blockdata::{
      constants::MAX_SCRIPT_ELEMENT_SIZE,
      opcodes,
      script::{self, Instruction, Instructions},
    },
    hashes::Hash,
    Script, ScriptBuf, Transaction, Txid, Witness,
  },
  serde::{Deserialize, Serialize},
  serde_with::{DeserializeFromStr, SerializeDisplay},
  std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    iter::Peekable,
    mem,
    str::{self, FromStr},
  },
  thiserror::Error,
};

pub use crate::{
  cbor::Value,
  envelope::{parse_inscriptions, parse_witness, Envelope, ParsedEnvelope, PROTOCOL_ID},
  inscription::Inscription,
  inscription_id::InscriptionId,
  reveal::{p2tr_ord_reveal, OrdinalReveal},
};

pub mod cbor;
mod envelope;
mod inscription;
mod inscription_id;
mod reveal;
mod tag;

#[cfg(test)]
mod test;

#[cfg(test)]
use self::test::*;
